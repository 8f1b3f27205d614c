use serde::{Deserialize, Serialize};

// =============================================================================
// ACTION
// =============================================================================

/// One kind of operation a privilege can grant.
///
/// `Any` is the wildcard (`*` in stored rules) and matches every action
/// during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Destroy,
    #[serde(rename = "*")]
    Any,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Destroy => "destroy",
            Action::Any => "*",
        }
    }

    /// Parse a stored action string. Returns `None` for anything outside the
    /// known set; callers decide whether that is a skip or an error.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "read" => Some(Action::Read),
            "create" => Some(Action::Create),
            "update" => Some(Action::Update),
            "destroy" => Some(Action::Destroy),
            "*" => Some(Action::Any),
            _ => None,
        }
    }

    /// Whether a rule carrying `self` applies to a request for `requested`.
    pub fn grants(&self, requested: Action) -> bool {
        *self == Action::Any || *self == requested
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// RULE
// =============================================================================

/// One privilege: an `(action, weight, resource)` grant attached to a role.
///
/// `resource` is a directory-style path prefix. It is kept verbatim as
/// loaded; resolution canonicalizes a clone, so instances inside a store
/// snapshot always hold the stored form. Weight is carried through loading
/// and listings but does not gate allow/deny.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub action: Action,
    pub weight: i64,
    pub resource: String,
}

impl Rule {
    pub fn new(action: Action, weight: i64, resource: impl Into<String>) -> Self {
        Self {
            action,
            weight,
            resource: resource.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trips_through_strings() {
        for action in [
            Action::Read,
            Action::Create,
            Action::Update,
            Action::Destroy,
            Action::Any,
        ] {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse("execute"), None);
    }

    #[test]
    fn wildcard_grants_everything() {
        assert!(Action::Any.grants(Action::Destroy));
        assert!(Action::Update.grants(Action::Update));
        assert!(!Action::Update.grants(Action::Destroy));
        assert!(!Action::Read.grants(Action::Any));
    }

    #[test]
    fn action_serializes_to_lowercase_and_star() {
        assert_eq!(serde_json::to_string(&Action::Read).unwrap(), "\"read\"");
        assert_eq!(serde_json::to_string(&Action::Any).unwrap(), "\"*\"");
        let parsed: Action = serde_json::from_str("\"destroy\"").unwrap();
        assert_eq!(parsed, Action::Destroy);
    }
}
