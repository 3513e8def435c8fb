//! Locators for the portal's screens.
//!
//! Centralized so the workflow reads as a sequence of named steps and a
//! portal facelift means edits in exactly one place. Values parse through
//! [`crate::Selector::from`].

use crate::selector::Selector;

// -- sign-in --
pub const LOGIN_INPUT: &str = "id:Login";
pub const PASSWORD_INPUT: &str = "id:Password";
pub const SIGN_IN_BUTTON: &str = "//button[@type=\"submit\" and contains(., \"Войти\")]";

// -- navigation to the referral search screen --
pub const REFERRAL_SECTION: &str = "//a[contains(., \"Направления на госпитализацию\")]";
pub const FILTER_TOGGLE: &str = "//button[contains(., \"Поиск\")]";
pub const PHYSICIAN_FILTER_CLEAR: &str =
    "//div[contains(@class, \"filter-doctor\")]//button[contains(@class, \"clear\")]";
pub const REFERRAL_SEARCH_INPUT: &str =
    "//input[contains(@class, \"referral-number-input\")]";
pub const SEARCH_BUTTON: &str = "//button[contains(., \"Найти\")]";
pub const SPINNER: &str = "//mat-spinner | //div[contains(@class, \"loading-overlay\")]";

// -- the found referral row and its booking dialog --
pub const OPEN_REFERRAL_BUTTON: &str =
    "//button[contains(@class, \"icon-view-icon\") or contains(@class, \"icon-edit-icon\")]";
pub const BOOK_BUTTON: &str = "//button[contains(., \"Записать на прием\")]";
pub const STEP_TWO: &str = "//div[contains(@class, \"step-header\") and contains(., \"Шаг 2\")]";
pub const FIRST_SPECIALTY_ROW: &str =
    "//td[contains(@class, \"specialty-name\") and contains(text(), \"Акушерство и гинекология\")]";

// -- the specialty summary table --
pub const SPECIALTY_ROWS: &str = "//td[contains(@class, \"specialty-name\")]";
pub const SUMMARY_CLOSE: &str = "//button[contains(., \"Закрыть\")]";

// -- the weekly calendar grid --
pub const NEXT_WEEK_BUTTON: &str = "//button[contains(., \"Следующая неделя\")]";
pub const GRID_MARKER: &str = "//table[contains(@class, \"schedule-grid\")]";
pub const ACTIVE_CELL: &str = "//td[contains(@class, \"schedule-cell\") and contains(@class, \"active\")]";
pub const CELL_DATE_FIELD: &str = "//div[contains(@class, \"visit-date\")]";
pub const TIME_SLOTS: &str = "//div[contains(@class, \"visit-time\") and not(contains(@class, \"disabled\"))]";
pub const LAST_TIME_SLOT: &str =
    "(//div[contains(@class, \"visit-time\") and not(contains(@class, \"disabled\"))])[last()]";
pub const CONFIRM_BOOKING: &str = "//button[contains(., \"Записать\") and not(contains(., \"прием\"))]";
pub const CONFIRM_CLOSE: &str = "//mat-dialog-container//button[contains(., \"Закрыть\")]";
pub const DIALOG_CLOSE: &str = "//button[contains(@class, \"dialog-close\")]";

/// The n-th specialty name cell in the summary table, 1-based.
pub fn specialty_name(index: usize) -> Selector {
    Selector::xpath(format!("({SPECIALTY_ROWS})[{index}]"))
}

/// The free-slot count cell belonging to the n-th specialty row.
pub fn specialty_count(index: usize) -> Selector {
    Selector::xpath(format!(
        "(//td[contains(@class, \"specialty-count\")])[{index}]"
    ))
}

/// The search-result row carrying the given referral number.
pub fn referral_row(number: &str) -> Selector {
    Selector::xpath(format!("//tr[contains(., \"{number}\")]"))
}
