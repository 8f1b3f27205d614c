use std::collections::HashSet;

use uuid::Uuid;

/// The identity a request acts as, with everything the decision and audit
/// paths need: stable id, assigned role names, and the client address.
///
/// Built per request by the hosting layer from whatever session mechanism it
/// uses; this crate never mutates it.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    pub id: Option<Uuid>,
    pub username: Option<String>,
    pub roles: HashSet<String>,
    pub source_ip: Option<String>,
}

impl Principal {
    /// A request with nobody signed in. No roles, so only fallback rules
    /// apply, and denials report that authentication is required.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(id: Uuid, username: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            username: Some(username.into()),
            roles: HashSet::new(),
            source_ip: None,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = String>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_source_ip(mut self, ip: impl Into<String>) -> Self {
        self.source_ip = Some(ip.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_no_identity_and_no_roles() {
        let principal = Principal::anonymous();
        assert!(!principal.is_authenticated());
        assert!(principal.roles.is_empty());
    }

    #[test]
    fn builder_attaches_roles_and_ip() {
        let principal = Principal::authenticated(Uuid::new_v4(), "ada")
            .with_roles(vec!["editor".to_string()])
            .with_source_ip("10.0.0.9");

        assert!(principal.is_authenticated());
        assert!(principal.has_role("editor"));
        assert!(!principal.has_role("admin"));
        assert_eq!(principal.source_ip.as_deref(), Some("10.0.0.9"));
    }
}
