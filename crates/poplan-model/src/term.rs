use std::fmt;

use serde::{Deserialize, Serialize};

/// A predicate or operator argument.
///
/// Names starting with `?` are variables; anything else is a constant.
/// The optional type tag is carried along for grounding layers and does not
/// take part in [`fmt::Display`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Term {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Term {
    /// Build an untyped term.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
        }
    }

    /// Build a typed term.
    pub fn typed(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind.into()),
        }
    }

    pub fn is_variable(&self) -> bool {
        self.name.starts_with('?')
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Term {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_start_with_question_mark() {
        assert!(Term::new("?person").is_variable());
        assert!(!Term::new("alice").is_variable());
    }

    #[test]
    fn type_tag_is_part_of_identity() {
        assert_ne!(Term::new("?to"), Term::typed("?to", "place"));
        assert_eq!(Term::typed("?to", "place").to_string(), "?to");
    }
}
