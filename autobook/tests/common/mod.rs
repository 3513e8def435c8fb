//! A scripted in-memory driver standing in for the browser.
//!
//! Unknown selectors resolve to a generic clickable element so navigation
//! steps flow; the fixtures only script the parts a scenario cares about:
//! which weeks have a schedule grid, which cells they offer, and what the
//! specialty summary shows. Every actuation is appended to `World::actions`
//! so tests can assert on what the workflow touched.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use autobook::actuator::RetryPolicy;
use autobook::locators;
use autobook::slots;
use autobook::wait::WaitPolicy;
use autobook::{
    AutomationError, Config, DriverSession, Element, ElementImpl, Selector,
};

#[derive(Clone)]
pub struct CellFixture {
    pub date: String,
    pub times: Vec<String>,
}

pub struct WeekFixture {
    pub grid: bool,
    pub cells: Vec<CellFixture>,
}

#[derive(Default)]
pub struct World {
    pub week: usize,
    pub weeks: Vec<WeekFixture>,
    pub selected_cell: Option<usize>,
    pub specialties: Vec<(String, String)>,
    /// Selector strings (via `Selector::from`) that resolve to nothing.
    pub absent: Vec<String>,
    pub actions: Vec<String>,
}

impl World {
    fn current_week(&self) -> Option<&WeekFixture> {
        self.weeks.get(self.week)
    }

    fn selected(&self) -> Option<&CellFixture> {
        let index = self.selected_cell?;
        self.current_week()?.cells.get(index)
    }
}

#[derive(Clone, Copy)]
enum Effect {
    None,
    AdvanceWeek,
    SelectCell(usize),
    Deselect,
}

struct FakeElement {
    world: Arc<Mutex<World>>,
    label: String,
    text: String,
    effect: Effect,
}

impl ElementImpl for FakeElement {
    fn click(&self) -> Result<(), AutomationError> {
        let mut world = self.world.lock().unwrap();
        world.actions.push(format!("click:{}", self.label));
        match self.effect {
            Effect::None => {}
            Effect::AdvanceWeek => {
                world.week += 1;
                world.selected_cell = None;
            }
            Effect::SelectCell(index) => world.selected_cell = Some(index),
            Effect::Deselect => world.selected_cell = None,
        }
        Ok(())
    }

    fn text(&self) -> Result<String, AutomationError> {
        Ok(self.text.clone())
    }

    fn send_keys(&self, text: &str) -> Result<(), AutomationError> {
        let mut world = self.world.lock().unwrap();
        world.actions.push(format!("type:{}:{}", self.label, text));
        Ok(())
    }

    fn clear(&self) -> Result<(), AutomationError> {
        let mut world = self.world.lock().unwrap();
        world.actions.push(format!("clear:{}", self.label));
        Ok(())
    }

    fn is_displayed(&self) -> Result<bool, AutomationError> {
        Ok(true)
    }

    fn is_enabled(&self) -> Result<bool, AutomationError> {
        Ok(true)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

pub struct FakeDriver {
    world: Arc<Mutex<World>>,
    cell_predicate: String,
}

impl FakeDriver {
    pub fn new(world: Arc<Mutex<World>>) -> Self {
        Self {
            world,
            cell_predicate: slots::build_predicate(None).value().to_string(),
        }
    }

    fn element(&self, label: &str, text: &str, effect: Effect) -> Element {
        Element::new(Arc::new(FakeElement {
            world: self.world.clone(),
            label: label.to_string(),
            text: text.to_string(),
            effect,
        }))
    }

    fn key(selector: &Selector) -> String {
        selector.to_string()
    }
}

/// Parse `xpath:(BASE)[N]` against a known base, returning the 1-based N.
fn indexed(key: &str, base: &str) -> Option<usize> {
    let rest = key.strip_prefix("xpath:(")?.strip_suffix(']')?;
    let (xpath, index) = rest.rsplit_once(")[")?;
    if xpath == base {
        index.parse().ok()
    } else {
        None
    }
}

const SPECIALTY_COUNT_BASE: &str = "//td[contains(@class, \"specialty-count\")]";

impl DriverSession for FakeDriver {
    fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        let mut world = self.world.lock().unwrap();
        world.actions.push(format!("navigate:{url}"));
        Ok(())
    }

    fn find_element(&self, selector: &Selector) -> Result<Option<Element>, AutomationError> {
        let key = Self::key(selector);
        let world = self.world.lock().unwrap();

        if world.absent.contains(&key) {
            return Ok(None);
        }
        if key == Self::key(&Selector::from(locators::SPINNER)) {
            return Ok(None);
        }
        if key == Self::key(&Selector::from(locators::GRID_MARKER)) {
            let present = world.current_week().map(|w| w.grid).unwrap_or(false);
            drop(world);
            return Ok(present.then(|| self.element("grid", "", Effect::None)));
        }
        if key == Self::key(&Selector::from(locators::NEXT_WEEK_BUTTON)) {
            drop(world);
            return Ok(Some(self.element("next-week", "", Effect::AdvanceWeek)));
        }
        if key == Self::key(&Selector::from(locators::ACTIVE_CELL)) {
            drop(world);
            return Ok(Some(self.element("active-cell", "", Effect::Deselect)));
        }
        if key == Self::key(&Selector::from(locators::CELL_DATE_FIELD)) {
            let date = world.selected().map(|cell| cell.date.clone());
            drop(world);
            return Ok(date.map(|date| self.element("visit-date", &date, Effect::None)));
        }
        if key == Self::key(&Selector::from(locators::LAST_TIME_SLOT)) {
            let time = world.selected().and_then(|cell| cell.times.last().cloned());
            drop(world);
            return Ok(time.map(|time| self.element("last-time", &time, Effect::None)));
        }
        if let Some(index) = indexed(&key, &self.cell_predicate) {
            let exists = world
                .current_week()
                .map(|w| index <= w.cells.len())
                .unwrap_or(false);
            drop(world);
            return Ok(exists.then(|| {
                self.element(&format!("cell-{index}"), "", Effect::SelectCell(index - 1))
            }));
        }
        if let Some(index) = indexed(&key, Selector::from(locators::SPECIALTY_ROWS).value()) {
            let name = world.specialties.get(index - 1).map(|(n, _)| n.clone());
            drop(world);
            return Ok(name.map(|n| self.element("specialty-name", &n, Effect::None)));
        }
        if let Some(index) = indexed(&key, SPECIALTY_COUNT_BASE) {
            let count = world.specialties.get(index - 1).map(|(_, c)| c.clone());
            drop(world);
            return Ok(count.map(|c| self.element("specialty-count", &c, Effect::None)));
        }

        drop(world);
        Ok(Some(self.element(&key, "", Effect::None)))
    }

    fn find_elements(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError> {
        let key = Self::key(selector);
        let world = self.world.lock().unwrap();

        if key == format!("xpath:{}", self.cell_predicate) {
            let count = world.current_week().map(|w| w.cells.len()).unwrap_or(0);
            drop(world);
            return Ok((1..=count)
                .map(|i| self.element(&format!("cell-{i}"), "", Effect::SelectCell(i - 1)))
                .collect());
        }
        if key == Self::key(&Selector::from(locators::TIME_SLOTS)) {
            let times = world
                .selected()
                .map(|cell| cell.times.clone())
                .unwrap_or_default();
            drop(world);
            return Ok(times
                .iter()
                .map(|t| self.element("time-slot", t, Effect::None))
                .collect());
        }
        if key == Self::key(&Selector::from(locators::SPECIALTY_ROWS)) {
            let count = world.specialties.len();
            drop(world);
            return Ok((1..=count)
                .map(|i| self.element(&format!("row-{i}"), "", Effect::None))
                .collect());
        }

        Ok(Vec::new())
    }

    fn execute_script(
        &self,
        _script: &str,
        element: Option<&Element>,
    ) -> Result<(), AutomationError> {
        let mut world = self.world.lock().unwrap();
        let target = element.map(|e| e.describe()).unwrap_or_default();
        world.actions.push(format!("scroll:{target}"));
        Ok(())
    }

    fn page_source(&self) -> Result<String, AutomationError> {
        Ok("<html></html>".to_string())
    }

    fn close(&self) -> Result<(), AutomationError> {
        let mut world = self.world.lock().unwrap();
        world.actions.push("close".to_string());
        Ok(())
    }
}

pub fn fast_config(db_path: &std::path::Path) -> Config {
    Config {
        portal_url: "http://portal.test".into(),
        login: "user".into(),
        password: "secret".into(),
        probe_referral: "470101".into(),
        db_path: db_path.to_path_buf(),
        wait: WaitPolicy {
            timeout: Duration::from_millis(40),
            probe_timeout: Duration::from_millis(10),
            poll_interval: Duration::from_millis(5),
        },
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        },
        restart_delay: Duration::from_millis(1),
        ..Config::default()
    }
}
