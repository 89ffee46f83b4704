pub mod ai;
pub mod auth;
pub mod diagnostics;
pub mod health;
pub mod workspaces;

pub use ai::log_ai_request;
pub use auth::{login, logout, me, oauth_callback};
pub use diagnostics::{connectivity, traceroute};
pub use health::{health_check, metrics_snapshot};
pub use workspaces::{create_workspace, user_overview};
