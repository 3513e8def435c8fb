//! Translating a referral's specificity into a calendar-cell search
//! predicate, and the date-exclusion rules for claimed slots.

use chrono::{Duration, NaiveDate};

use crate::selector::Selector;

/// Prefix marking a specificity as a physician-name list rather than a
/// sub-specialty label. Names after it are matched case-sensitively.
pub const PHYSICIAN_MARKER: &str = "ФИО: ";

/// XPath condition for a bookable cell in the weekly grid.
const FREE_CELL: &str = "//td[contains(@class, \"schedule-cell\") and contains(@class, \"free\")]";

/// Build the predicate that enumerates acceptable calendar cells.
///
/// - no specificity: any open cell;
/// - `"ФИО: Иванов, Петров"`: cells carrying any of the listed names,
///   case-sensitively;
/// - anything else is a sub-specialty label, matched in both the original
///   and upper case since the portal renders it inconsistently.
pub fn build_predicate(specificity: Option<&str>) -> Selector {
    let specificity = match specificity {
        None => return Selector::xpath(FREE_CELL),
        Some(s) if s.trim().is_empty() => return Selector::xpath(FREE_CELL),
        Some(s) => s,
    };

    if let Some(names) = specificity.strip_prefix(PHYSICIAN_MARKER) {
        let clauses: Vec<String> = names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| format!("contains(text(), \"{name}\")"))
            .collect();
        return Selector::xpath(format!(
            "//td[contains(@class, \"schedule-cell\") and ({})]",
            clauses.join(" or ")
        ));
    }

    Selector::xpath(format!(
        "//td[contains(@class, \"schedule-cell\") and (contains(text(), \"{}\") or contains(text(), \"{}\"))]",
        specificity,
        specificity.to_uppercase()
    ))
}

/// Address the n-th (1-based) cell matched by a predicate, so cells can be
/// opened one at a time in document order.
pub fn nth_cell(predicate: &Selector, index: usize) -> Selector {
    Selector::xpath(format!("({})[{}]", predicate.value(), index))
}

/// Dates too soon for the booking lead-time this process assumes: today and
/// the next two days, both as rendered date strings and as the portal's
/// literal words.
pub fn forbidden_dates(today: NaiveDate) -> Vec<String> {
    let mut dates: Vec<String> = (0..3)
        .map(|offset| (today + Duration::days(offset)).format("%d.%m.%Y").to_string())
        .collect();
    dates.extend(["сегодня", "завтра", "послезавтра"].map(String::from));
    dates
}

/// Whether an offered date falls in the exclusion window. Word matches are
/// case-insensitive because the portal capitalizes inconsistently.
pub fn is_forbidden(date_text: &str, forbidden: &[String]) -> bool {
    let lowered = date_text.to_lowercase();
    forbidden.iter().any(|entry| lowered.contains(entry.as_str()))
}
