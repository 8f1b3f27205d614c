use std::future::Future;
use std::sync::Arc;

use super::principal::Principal;
use super::resolver::PermissionResolver;
use super::Decision;
use crate::errors::{AppError, AppResult};
use crate::models::Action;

/// The decision API mutating code goes through.
///
/// `decide`/`can` answer the question; `guard` is the only sanctioned way to
/// run side-effecting work behind it.
pub struct Authorizer {
    resolver: Arc<PermissionResolver>,
}

impl Authorizer {
    pub fn new(resolver: Arc<PermissionResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    /// Evaluate `action` on `resource` for `principal`.
    ///
    /// Anonymous principals resolve with an empty role set; a denial then
    /// carries `requires_auth` so the boundary can ask for a login instead
    /// of refusing one.
    pub fn decide(&self, principal: &Principal, action: Action, resource: &str) -> Decision {
        let permissions = self.resolver.effective_permissions(&principal.roles);

        if permissions.allows(action, resource) {
            tracing::debug!(
                username = principal.username.as_deref().unwrap_or("-"),
                action = %action,
                resource = %resource,
                "allowed"
            );
            Decision::Allowed
        } else {
            tracing::debug!(
                username = principal.username.as_deref().unwrap_or("-"),
                action = %action,
                resource = %resource,
                "denied"
            );
            Decision::Denied {
                requires_auth: !principal.is_authenticated(),
            }
        }
    }

    pub fn can(&self, principal: &Principal, action: Action, resource: &str) -> bool {
        self.decide(principal, action, resource).is_allowed()
    }

    /// Run `body` if the principal may perform `action` on `resource`,
    /// otherwise fail with `NotAuthorized` without touching `body`.
    pub async fn guard<F, Fut, T>(
        &self,
        principal: &Principal,
        action: Action,
        resource: &str,
        body: F,
    ) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        match self.decide(principal, action, resource) {
            Decision::Allowed => body().await,
            Decision::Denied { requires_auth } => Err(AppError::NotAuthorized { requires_auth }),
        }
    }
}
