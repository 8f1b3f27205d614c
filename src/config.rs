use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

/// Resolved permissions stay cached this long before a role set is
/// recomputed from the store.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Where the permission tables come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSource {
    /// Reload roles, privileges and user assignments from the database.
    Database,
    /// Load static tables from a JSON file.
    File(PathBuf),
}

/// Immutable configuration handle for the authorization and audit core.
///
/// Built once (usually from the environment) and passed to the components
/// that need it; there is no process-global configuration state.
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    pub source: AuthSource,
    pub cache_ttl: Duration,
    /// Resource kinds whose mutations are captured in the version history.
    pub audited_kinds: HashSet<String>,
}

impl AuthzConfig {
    pub fn new(source: AuthSource) -> Self {
        Self {
            source,
            cache_ttl: DEFAULT_CACHE_TTL,
            audited_kinds: HashSet::new(),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_audited_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audited_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Read configuration from the environment.
    ///
    /// * `AUTHZ_SOURCE` - `db` (default) or `file`
    /// * `AUTHZ_RULES_FILE` - path to the static tables, required for `file`
    /// * `AUTHZ_CACHE_TTL_SECS` - cache expiry, default 60
    /// * `AUDITED_KINDS` - comma-separated resource kinds to audit
    pub fn from_env() -> Result<Self, AppError> {
        let source = match std::env::var("AUTHZ_SOURCE")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "" | "db" | "database" => AuthSource::Database,
            "file" => {
                let path = std::env::var("AUTHZ_RULES_FILE").map_err(|_| {
                    AppError::configuration("AUTHZ_RULES_FILE not set for AUTHZ_SOURCE=file")
                })?;
                AuthSource::File(PathBuf::from(path))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "unknown AUTHZ_SOURCE: {other}"
                )))
            }
        };

        let cache_ttl = match std::env::var("AUTHZ_CACHE_TTL_SECS") {
            Ok(value) => {
                let secs = value.parse::<u64>().map_err(|_| {
                    AppError::configuration("AUTHZ_CACHE_TTL_SECS must be an integer")
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => DEFAULT_CACHE_TTL,
        };

        let audited_kinds = std::env::var("AUDITED_KINDS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            source,
            cache_ttl,
            audited_kinds,
        })
    }
}
