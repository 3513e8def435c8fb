mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use autobook::{scheduler, AutomationError, DriverFactory, DriverSession, Runner, Store};
use tempfile::TempDir;

use common::{fast_config, FakeDriver, World};

struct HealthyFactory {
    world: Arc<Mutex<World>>,
    created: AtomicU32,
}

impl DriverFactory for HealthyFactory {
    fn create(&self) -> Result<Arc<dyn DriverSession>, AutomationError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeDriver::new(self.world.clone())))
    }
}

struct BrokenFactory;

impl DriverFactory for BrokenFactory {
    fn create(&self) -> Result<Arc<dyn DriverSession>, AutomationError> {
        Err(AutomationError::SessionNotCreated(
            "chromedriver 120 does not support Chrome 125".into(),
        ))
    }
}

#[tokio::test]
async fn each_tick_launches_a_fresh_pass() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");
    let store = Store::open(&db).unwrap();
    let factory = Arc::new(HealthyFactory {
        world: Arc::new(Mutex::new(World::default())),
        created: AtomicU32::new(0),
    });
    let runner = Arc::new(Runner::new(factory.clone(), store, fast_config(&db)));

    // Healthy passes never end the loop; cut it off from outside and count
    // the sessions the ticks created.
    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        scheduler::run_every(runner, Duration::from_millis(50)),
    )
    .await;

    assert!(outcome.is_err(), "healthy passes should keep the loop alive");
    assert!(factory.created.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn an_unrecoverable_pass_ends_the_schedule() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");
    let store = Store::open(&db).unwrap();
    let runner = Arc::new(Runner::new(Arc::new(BrokenFactory), store, fast_config(&db)));

    let err = scheduler::run_every(runner, Duration::from_millis(10))
        .await
        .unwrap_err();

    assert!(matches!(err, AutomationError::SessionNotCreated(_)));
}
