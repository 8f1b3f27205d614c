pub mod audit;
pub mod authz;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod paths;

// Re-export the decision surface consumers actually touch
pub use authz::{Authorizer, Decision, PermissionResolver, PermissionStore, Principal};
pub use errors::{AppError, AppResult};
