// Library exports for testing and reuse

pub mod auth;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod session;
