use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use sqlx::{Row, SqlitePool};

use crate::config::{AuthSource, AuthzConfig};
use crate::errors::AppError;
use crate::models::{Action, Rule};

/// Static permission tables, the JSON file shape for `AuthSource::File`.
#[derive(Debug, Default, Deserialize)]
struct StaticTables {
    #[serde(default)]
    roles: HashMap<String, Vec<Rule>>,
    #[serde(default)]
    users: HashMap<String, Vec<String>>,
}

/// One fully-built generation of the permission tables.
///
/// Snapshots are immutable once installed; a reload builds a complete
/// replacement and swaps it in, so readers never see a half-filled table.
#[derive(Debug, Default)]
pub struct Snapshot {
    roles: HashMap<String, Vec<Rule>>,
    users: HashMap<String, Vec<String>>,
}

impl Snapshot {
    pub fn from_tables(
        roles: HashMap<String, Vec<Rule>>,
        users: HashMap<String, Vec<String>>,
    ) -> Self {
        Self { roles, users }
    }

    /// Rules attached to a role; empty for unknown role names.
    pub fn rules_for(&self, role: &str) -> &[Rule] {
        self.roles.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Role names assigned to a user; empty for unknown usernames.
    pub fn roles_for_user(&self, username: &str) -> &[String] {
        self.users.get(username).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Rebuild the tables from the database: every role with its privileges,
    /// every user with its role assignments.
    pub async fn load_from_db(pool: &SqlitePool) -> Result<Self, AppError> {
        let mut roles: HashMap<String, Vec<Rule>> = HashMap::new();

        let role_rows = sqlx::query("SELECT name FROM roles")
            .fetch_all(pool)
            .await?;
        for row in &role_rows {
            roles.entry(row.get("name")).or_default();
        }

        let privilege_rows = sqlx::query(
            r#"
            SELECT r.name AS role_name, p.action, p.weight, p.resource
            FROM privileges p
            JOIN roles r ON r.id = p.role_id
            ORDER BY r.name, p.rowid
            "#,
        )
        .fetch_all(pool)
        .await?;

        for row in &privilege_rows {
            let role_name: String = row.get("role_name");
            let action_raw: String = row.get("action");
            let Some(action) = Action::parse(&action_raw) else {
                tracing::warn!(
                    role = %role_name,
                    action = %action_raw,
                    "skipping privilege with unknown action"
                );
                continue;
            };

            roles.entry(role_name).or_default().push(Rule {
                action,
                weight: row.get("weight"),
                resource: row.get("resource"),
            });
        }

        let mut users: HashMap<String, Vec<String>> = HashMap::new();

        let user_rows = sqlx::query("SELECT username FROM users")
            .fetch_all(pool)
            .await?;
        for row in &user_rows {
            users.entry(row.get("username")).or_default();
        }

        let assignment_rows = sqlx::query(
            r#"
            SELECT u.username, r.name AS role_name
            FROM user_roles ur
            JOIN users u ON u.id = ur.user_id
            JOIN roles r ON r.id = ur.role_id
            ORDER BY u.username, ur.rowid
            "#,
        )
        .fetch_all(pool)
        .await?;

        for row in &assignment_rows {
            users
                .entry(row.get("username"))
                .or_default()
                .push(row.get("role_name"));
        }

        tracing::debug!(
            roles = roles.len(),
            users = users.len(),
            "loaded permission tables from database"
        );

        Ok(Self { roles, users })
    }

    /// Load static tables from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AppError::configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        let tables: StaticTables = serde_json::from_str(&raw).map_err(|err| {
            AppError::configuration(format!("invalid tables in {}: {err}", path.display()))
        })?;

        Ok(Self {
            roles: tables.roles,
            users: tables.users,
        })
    }
}

/// Shared handle on the current permission tables.
///
/// Readers clone the inner `Arc` out and keep using their generation even
/// while a reload installs the next one.
pub struct PermissionStore {
    current: RwLock<Arc<Snapshot>>,
}

impl PermissionStore {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// A store with no roles and no users; until a reload, everything falls
    /// back to the default read grant.
    pub fn empty() -> Self {
        Self::new(Snapshot::default())
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn install(&self, snapshot: Snapshot) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(snapshot);
    }

    /// Full-replace reload from the configured source. On failure the
    /// previously installed snapshot stays in place.
    pub async fn reload(&self, config: &AuthzConfig, pool: &SqlitePool) -> Result<(), AppError> {
        let snapshot = match &config.source {
            AuthSource::Database => Snapshot::load_from_db(pool).await?,
            AuthSource::File(path) => Snapshot::load_from_file(path)?,
        };
        self.install(snapshot);
        Ok(())
    }

    pub async fn reload_from_db(&self, pool: &SqlitePool) -> Result<(), AppError> {
        self.install(Snapshot::load_from_db(pool).await?);
        Ok(())
    }

    pub fn reload_from_file(&self, path: &Path) -> Result<(), AppError> {
        self.install(Snapshot::load_from_file(path)?);
        Ok(())
    }
}
