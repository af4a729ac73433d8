//! Kinds of user actions that can be queued while offline.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A queued user mutation.
///
/// Stored as an uppercase string (`SAVE`, `UNSAVE`). The column is an open
/// string, so anything else read back from the queue is preserved as
/// [`ActionKind::Other`] rather than failing the whole read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Add a restaurant to the user's saved list.
    Save,
    /// Remove a restaurant from the user's saved list.
    Unsave,
    /// An unrecognised kind written by another client version.
    Other(String),
}

impl ActionKind {
    /// Wire/storage representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Save => "SAVE",
            Self::Unsave => "UNSAVE",
            Self::Other(s) => s,
        }
    }

    /// Parse a stored kind. Never fails; unknown values become `Other`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "SAVE" => Self::Save,
            "UNSAVE" => Self::Unsave,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The kind that sets the saved flag to `saved`.
    #[must_use]
    pub const fn for_saved(saved: bool) -> Self {
        if saved { Self::Save } else { Self::Unsave }
    }

    /// The saved flag this action leaves behind, or `None` for unknown kinds.
    #[must_use]
    pub const fn resulting_saved_state(&self) -> Option<bool> {
        match self {
            Self::Save => Some(true),
            Self::Unsave => Some(false),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ActionKind {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_kinds() {
        assert_eq!(ActionKind::parse("SAVE"), ActionKind::Save);
        assert_eq!(ActionKind::parse("UNSAVE"), ActionKind::Unsave);
    }

    #[test]
    fn test_parse_is_case_sensitive_and_open() {
        assert_eq!(
            ActionKind::parse("save"),
            ActionKind::Other("save".to_string())
        );
        assert_eq!(ActionKind::parse("LIKE").as_str(), "LIKE");
    }

    #[test]
    fn test_resulting_saved_state() {
        assert_eq!(ActionKind::Save.resulting_saved_state(), Some(true));
        assert_eq!(ActionKind::Unsave.resulting_saved_state(), Some(false));
        assert_eq!(
            ActionKind::Other("LIKE".into()).resulting_saved_state(),
            None
        );
    }

    #[test]
    fn test_for_saved() {
        assert_eq!(ActionKind::for_saved(true), ActionKind::Save);
        assert_eq!(ActionKind::for_saved(false), ActionKind::Unsave);
    }

    #[test]
    fn test_serde_uses_storage_string() {
        assert_eq!(
            serde_json::to_string(&ActionKind::Unsave).ok().as_deref(),
            Some("\"UNSAVE\"")
        );
        let parsed: Option<ActionKind> = serde_json::from_str("\"SAVE\"").ok();
        assert_eq!(parsed, Some(ActionKind::Save));
    }
}
