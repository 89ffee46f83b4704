pub mod auth;

pub use auth::{admin_guard, authenticate, authorize, session_guard};
