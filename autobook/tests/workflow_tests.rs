mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use autobook::locators;
use autobook::{
    AutomationError, BookingWorkflow, DriverFactory, DriverSession, Runner, Selector, Store,
};
use tempfile::TempDir;

use common::{fast_config, CellFixture, FakeDriver, WeekFixture, World};

struct Fixture {
    world: Arc<Mutex<World>>,
    workflow: BookingWorkflow,
    store: Store,
    _dir: TempDir,
}

fn setup(weeks: Vec<WeekFixture>) -> Fixture {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");
    let store = Store::open(&db).unwrap();
    let world = Arc::new(Mutex::new(World {
        weeks,
        ..World::default()
    }));
    let driver = Arc::new(FakeDriver::new(world.clone()));
    let workflow = BookingWorkflow::new(driver, store.clone(), fast_config(&db));
    Fixture {
        world,
        workflow,
        store,
        _dir: dir,
    }
}

fn queue_referral(store: &Store, specialty: &str, free: i64) -> autobook::ReferralRecord {
    store.insert_specialty(specialty, free).unwrap();
    assert_eq!(
        store.create_referral("12345", specialty, None, None).unwrap(),
        autobook::QueueOutcome::Queued
    );
    store.pending_referrals().unwrap().remove(0)
}

fn next_week_clicks(world: &Arc<Mutex<World>>) -> usize {
    world
        .lock()
        .unwrap()
        .actions
        .iter()
        .filter(|a| *a == "click:next-week")
        .count()
}

#[test]
fn claims_the_latest_time_and_persists_it() {
    let fx = setup(vec![WeekFixture {
        grid: true,
        cells: vec![CellFixture {
            date: "15.01.2030".into(),
            times: vec!["09:00".into(), "12:30".into()],
        }],
    }]);
    let referral = queue_referral(&fx.store, "Кардиология", 5);

    let booked = fx.workflow.attempt_booking(&referral).unwrap();
    assert!(booked);

    let rows = fx.store.all_referrals().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].booked);
    assert_eq!(rows[0].booked_date.as_deref(), Some("15.01.2030"));
    assert_eq!(rows[0].booked_time.as_deref(), Some("12:30"));
    assert!(rows[0].changed_at.is_some());
    assert!(fx.store.pending_referrals().unwrap().is_empty());

    let world = fx.world.lock().unwrap();
    assert!(world.actions.iter().any(|a| a == "click:last-time"));
}

#[test]
fn week_walk_never_exceeds_three_advances() {
    let weeks = (0..5)
        .map(|_| WeekFixture {
            grid: false,
            cells: vec![],
        })
        .collect();
    let fx = setup(weeks);
    let referral = queue_referral(&fx.store, "Неврология", 2);

    let booked = fx.workflow.attempt_booking(&referral).unwrap();
    assert!(!booked);
    assert_eq!(next_week_clicks(&fx.world), 3);
}

#[test]
fn no_grid_then_no_cells_then_excluded_date_leaves_referral_pending() {
    let fx = setup(vec![
        WeekFixture {
            grid: false,
            cells: vec![],
        },
        WeekFixture {
            grid: true,
            cells: vec![],
        },
        WeekFixture {
            grid: true,
            cells: vec![CellFixture {
                date: "сегодня".into(),
                times: vec!["10:00".into()],
            }],
        },
    ]);
    let referral = queue_referral(&fx.store, "Гематология", 3);

    let booked = fx.workflow.attempt_booking(&referral).unwrap();
    assert!(!booked);
    assert_eq!(next_week_clicks(&fx.world), 3);
    assert_eq!(fx.store.pending_referrals().unwrap().len(), 1);
}

#[test]
fn rejected_cell_returns_to_the_list_before_the_next_candidate() {
    let fx = setup(vec![WeekFixture {
        grid: true,
        cells: vec![
            CellFixture {
                date: "завтра".into(),
                times: vec!["08:00".into()],
            },
            CellFixture {
                date: "20.02.2030".into(),
                times: vec!["11:15".into()],
            },
        ],
    }]);
    let referral = queue_referral(&fx.store, "Урология", 4);

    let booked = fx.workflow.attempt_booking(&referral).unwrap();
    assert!(booked);

    let rows = fx.store.all_referrals().unwrap();
    assert_eq!(rows[0].booked_date.as_deref(), Some("20.02.2030"));
    assert_eq!(rows[0].booked_time.as_deref(), Some("11:15"));

    let world = fx.world.lock().unwrap();
    assert!(world.actions.iter().any(|a| a == "click:active-cell"));
}

#[test]
fn zero_count_referral_never_touches_the_portal() {
    let fx = setup(vec![]);
    queue_referral(&fx.store, "Офтальмология", 0);

    fx.workflow.process_pending().unwrap();

    assert!(fx.world.lock().unwrap().actions.is_empty());
    assert_eq!(fx.store.pending_referrals().unwrap().len(), 1);
}

#[test]
fn run_once_polls_the_summary_into_the_ledger() {
    let fx = setup(vec![]);
    {
        let mut world = fx.world.lock().unwrap();
        world.specialties = vec![
            ("Кардиология".into(), "Свободных ячеек: 2".into()),
            ("Неврология".into(), "3".into()),
        ];
    }

    fx.workflow.run_once().unwrap();

    let counts = fx.store.specialties().unwrap();
    assert_eq!(counts.get("Кардиология"), Some(&2));
    assert_eq!(counts.get("Неврология"), Some(&3));
}

struct CountingFactory {
    world: Arc<Mutex<World>>,
    created: AtomicU32,
}

impl DriverFactory for CountingFactory {
    fn create(&self) -> Result<Arc<dyn DriverSession>, AutomationError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeDriver::new(self.world.clone())))
    }
}

#[test]
fn restart_budget_is_bounded() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");
    let store = Store::open(&db).unwrap();

    // Login field never appears, so every pass dies at sign-in.
    let world = Arc::new(Mutex::new(World {
        absent: vec![Selector::from(locators::LOGIN_INPUT).to_string()],
        ..World::default()
    }));
    let factory = Arc::new(CountingFactory {
        world,
        created: AtomicU32::new(0),
    });

    let mut config = fast_config(&db);
    config.max_restarts = 2;
    let runner = Runner::new(factory.clone(), store, config);

    match runner.run() {
        Err(AutomationError::RetryExhausted { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(factory.created.load(Ordering::SeqCst), 2);
}

struct BrokenFactory {
    created: AtomicU32,
}

impl DriverFactory for BrokenFactory {
    fn create(&self) -> Result<Arc<dyn DriverSession>, AutomationError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Err(AutomationError::SessionNotCreated(
            "chromedriver 120 does not support Chrome 125".into(),
        ))
    }
}

#[test]
fn fatal_session_error_is_never_retried() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");
    let store = Store::open(&db).unwrap();
    let factory = Arc::new(BrokenFactory {
        created: AtomicU32::new(0),
    });

    let runner = Runner::new(factory.clone(), store, fast_config(&db));

    match runner.run() {
        Err(AutomationError::SessionNotCreated(_)) => {}
        other => panic!("expected SessionNotCreated, got {other:?}"),
    }
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}
