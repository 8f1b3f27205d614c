use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use super::store::PermissionStore;
use crate::cache::TtlCache;
use crate::config::{AuthzConfig, DEFAULT_CACHE_TTL};
use crate::errors::AppError;
use crate::models::{Action, Rule};
use crate::paths;

/// The resolved, canonicalized rule set for one combination of roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePermissions {
    rules: Vec<Rule>,
}

impl EffectivePermissions {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// True when any rule grants `action` on a prefix of the normalized
    /// resource path. Matching is a plain OR across rules; weight plays no
    /// part in the outcome.
    pub fn allows(&self, action: Action, resource: &str) -> bool {
        let path = paths::normalize(resource);
        self.rules
            .iter()
            .any(|rule| rule.action.grants(action) && path.starts_with(&rule.resource))
    }
}

/// The minimal grant applied when a role set resolves to nothing at all.
fn fallback_rule() -> Rule {
    Rule::new(Action::Read, 1, "/")
}

/// Computes and caches effective permission sets per role combination.
pub struct PermissionResolver {
    store: Arc<PermissionStore>,
    cache: TtlCache<EffectivePermissions>,
    ttl: Duration,
}

impl PermissionResolver {
    pub fn new(store: Arc<PermissionStore>) -> Self {
        Self {
            store,
            cache: TtlCache::new(),
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn store(&self) -> &PermissionStore {
        &self.store
    }

    /// The effective rule set for `roles`, from cache when fresh.
    ///
    /// On a miss every rule of every named role is cloned out of the current
    /// snapshot, its resource path canonicalized on the clone (the snapshot's
    /// own rules stay exactly as loaded), and the accumulated list is
    /// deduplicated. An empty accumulation becomes the single fallback rule.
    pub fn effective_permissions(&self, roles: &HashSet<String>) -> Arc<EffectivePermissions> {
        let mut names: Vec<&str> = roles.iter().map(String::as_str).collect();
        names.sort_unstable();
        let key = names.join(",");

        self.cache
            .fetch_or_compute(&key, self.ttl, || self.resolve(&names))
    }

    fn resolve(&self, names: &[&str]) -> EffectivePermissions {
        let snapshot = self.store.snapshot();

        let mut seen = HashSet::new();
        let mut rules = Vec::new();
        for name in names {
            for rule in snapshot.rules_for(name) {
                let mut rule = rule.clone();
                rule.resource = paths::normalize(&rule.resource);
                if seen.insert(rule.clone()) {
                    rules.push(rule);
                }
            }
        }

        if rules.is_empty() {
            rules.push(fallback_rule());
        }

        tracing::debug!(roles = %names.join(","), rules = rules.len(), "resolved permissions");
        EffectivePermissions { rules }
    }

    /// Explicit reload: replace the store snapshot, then flush the cache so
    /// the next lookups see the new tables immediately. Store edits that skip
    /// this call become visible only as cache entries expire.
    pub async fn reload(&self, config: &AuthzConfig, pool: &SqlitePool) -> Result<(), AppError> {
        self.store.reload(config, pool).await?;
        self.cache.clear();
        Ok(())
    }

    #[cfg(test)]
    fn cached_sets(&self) -> usize {
        self.cache.len()
    }
}
