use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::{Row, SqlitePool};

use admin_authz::audit::{ChainStatus, VersionStore};
use admin_authz::authz::{Authorizer, PermissionResolver, PermissionStore};
use admin_authz::config::AuthzConfig;
use admin_authz::db;
use admin_authz::models::{Action, User};
use admin_authz::paths;
use admin_authz::Principal;

#[derive(Parser, Debug)]
#[command(author, version, about = "admin-authz operator tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Evaluate whether a user may perform an action on a resource path
    Check {
        username: String,
        action: String,
        resource: String,
        /// Mount prefix to strip from the resource before matching
        #[arg(long)]
        prefix: Option<String>,
    },
    /// List the effective, canonicalized rules for a user
    Effective { username: String },
    /// Walk the version history and verify its hash chain
    VerifyLog,
    /// Show the version history of one record
    History { item_type: String, item_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; fall back to the crate-local `.env` when the
    // binary runs from somewhere else.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = db::init().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = db::init().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::Check {
            username,
            action,
            resource,
            prefix,
        } => {
            let action =
                Action::parse(&action).with_context(|| format!("unknown action: {action}"))?;
            let pool = db::init().await?;
            let resolver = load_resolver(&pool).await?;
            let authorizer = Authorizer::new(resolver.clone());

            let resource = match prefix {
                Some(prefix) => paths::relativize(&resource, &prefix),
                None => resource,
            };

            let principal = match User::find_by_username(&pool, &username).await? {
                Some(user) => {
                    let snapshot = resolver.store().snapshot();
                    let roles: Vec<String> = snapshot.roles_for_user(&user.username).to_vec();
                    Principal::authenticated(user.id, user.username).with_roles(roles)
                }
                None => Principal::anonymous(),
            };

            let mut role_list: Vec<&str> = principal.roles.iter().map(String::as_str).collect();
            role_list.sort_unstable();

            if authorizer.can(&principal, action, &resource) {
                println!(
                    "ALLOW {username} {action} {resource} (roles: {})",
                    role_list.join(", ")
                );
            } else {
                println!(
                    "DENY  {username} {action} {resource} (roles: {})",
                    role_list.join(", ")
                );
                std::process::exit(1);
            }
        }
        Commands::Effective { username } => {
            let pool = db::init().await?;
            let resolver = load_resolver(&pool).await?;
            let snapshot = resolver.store().snapshot();
            let roles: HashSet<String> =
                snapshot.roles_for_user(&username).iter().cloned().collect();

            let permissions = resolver.effective_permissions(&roles);
            println!("{:<10} {:<8} {}", "Action", "Weight", "Resource");
            for rule in permissions.rules() {
                println!(
                    "{:<10} {:<8} {}",
                    rule.action.to_string(),
                    rule.weight,
                    rule.resource
                );
            }
        }
        Commands::VerifyLog => {
            let pool = db::init().await?;
            let store = VersionStore::new(pool);
            match store.verify_chain().await? {
                ChainStatus::Intact { entries } => {
                    println!("Chain intact: {entries} entries");
                }
                ChainStatus::Broken { entry, id, reason } => {
                    println!("Chain BROKEN at entry {entry} (id {id}): {reason}");
                    std::process::exit(1);
                }
            }
        }
        Commands::History { item_type, item_id } => {
            let pool = db::init().await?;
            let store = VersionStore::new(pool);
            for record in store.list_for_item(&item_type, &item_id).await? {
                println!(
                    "{} {:<8} actor={} changes={}",
                    record.created_at.to_rfc3339(),
                    record.event.to_string(),
                    record
                        .actor_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    record.object_changes
                );
            }
        }
    }

    Ok(())
}

/// Build a resolver over the configured permission source, fully loaded.
async fn load_resolver(pool: &SqlitePool) -> anyhow::Result<std::sync::Arc<PermissionResolver>> {
    let config = AuthzConfig::from_env()?;

    let store = std::sync::Arc::new(PermissionStore::empty());
    store
        .reload(&config, pool)
        .await
        .context("failed to load permission tables")?;

    Ok(std::sync::Arc::new(
        PermissionResolver::new(store).with_cache_ttl(config.cache_ttl),
    ))
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Prefer ./migrations when running from the repo root, fall back to the
    // crate-local folder for deployments with a different CWD.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {display}"))
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let table_exists = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?;

    let applied: HashSet<i64> = if table_exists.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter()
            .filter_map(|row| row.try_get::<i64, _>("version").ok())
            .collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied.contains(&migration.version) {
            "applied"
        } else {
            "pending"
        };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
