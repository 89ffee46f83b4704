pub mod principal;
pub mod providers;
pub mod token;

pub use principal::{Principal, SessionUser, ROLE_ADMIN, ROLE_USER};
pub use providers::{exchange_code, resolve_redirect, verify_admin_credentials, Provider};
pub use token::{now_ms, SessionClaims, SessionTokenService, TokenError};
