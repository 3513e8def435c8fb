use serde::{Deserialize, Serialize};

/// Represents ways to locate an element on the portal page.
///
/// The portal is only ever addressed by element id or by an XPath query,
/// so those are the two strategies a [`crate::DriverSession`] must support.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// Select by the element's id attribute
    Id(String),
    /// Select using an XPath query
    XPath(String),
}

impl Selector {
    pub fn id(value: impl Into<String>) -> Self {
        Selector::Id(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Selector::XPath(value.into())
    }

    /// The raw strategy value, without the strategy prefix.
    pub fn value(&self) -> &str {
        match self {
            Selector::Id(v) => v,
            Selector::XPath(v) => v,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Id(v) => write!(f, "id:{v}"),
            Selector::XPath(v) => write!(f, "xpath:{v}"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        match s {
            _ if s.starts_with("id:") => Selector::Id(s[3..].to_string()),
            _ if s.starts_with("xpath:") => Selector::XPath(s[6..].to_string()),
            // Bare XPath queries start with an axis step or a grouped expression
            _ if s.starts_with('/') || s.starts_with('(') => Selector::XPath(s.to_string()),
            _ => Selector::Id(s.to_string()),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}
