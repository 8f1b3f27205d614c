//! Authorization module - permission store, resolver and decision API
//!
//! This module implements role-based, path-scoped permissions:
//! - roles carry weighted `(action, resource)` rules
//! - a principal's effective rules are the union across its roles,
//!   canonicalized and cached per role set
//! - a request is allowed when any effective rule grants the action on a
//!   prefix of the normalized resource path
//! - principals with no applicable rules fall back to read access on `/`

mod authorizer;
mod principal;
mod resolver;
mod store;

pub use authorizer::Authorizer;
pub use principal::Principal;
pub use resolver::{EffectivePermissions, PermissionResolver};
pub use store::{PermissionStore, Snapshot};

/// Outcome of an authorization check.
///
/// Denials distinguish a missing login from an insufficient one so the
/// boundary can answer 401 or 403 accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied { requires_auth: bool },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}
