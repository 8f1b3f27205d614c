pub mod rbac;
pub mod user;
pub mod version;

pub use rbac::{Action, Rule};
pub use user::User;
pub use version::{VersionEvent, VersionRecord};
