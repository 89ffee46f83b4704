use crate::error::{ApiError, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub github_client_id: Option<String>,
    pub github_client_secret: Option<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub dev_mode: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub session_secret: String,
    pub session_expiry_days: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    pub agentless: bool,
    pub ml_app: String,
    pub site: String,
    pub api_key: Option<String>,
    pub service: String,
    pub environment: String,
}

/// Default session lifetime; signed tokens and the in-process session
/// store share this expiry.
pub const DEFAULT_SESSION_EXPIRY_DAYS: u64 = 30;

impl AppConfig {
    /// Reads the full configuration from process environment variables.
    /// Call after `dotenvy::dotenv()` so a local `.env` is honored.
    pub fn from_env() -> Result<Self> {
        let session_secret = std::env::var("SESSION_SECRET")
            .map_err(|_| ApiError::Config("SESSION_SECRET is not set".to_string()))?;

        let port: u16 = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let base_url =
            std::env::var("BASE_URL").unwrap_or_else(|_| format!("http://localhost:{}", port));

        let session_expiry_days = std::env::var("SESSION_EXPIRY_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SESSION_EXPIRY_DAYS);

        Ok(Self {
            server: ServerSettings {
                host,
                port,
                base_url,
            },
            auth: AuthConfig {
                github_client_id: env_opt("GITHUB_CLIENT_ID"),
                github_client_secret: env_opt("GITHUB_CLIENT_SECRET"),
                google_client_id: env_opt("GOOGLE_CLIENT_ID"),
                google_client_secret: env_opt("GOOGLE_CLIENT_SECRET"),
                dev_mode: env_flag("DEV_MODE", false),
                admin_email: env_opt("ADMIN_EMAIL"),
                admin_password: env_opt("ADMIN_PASSWORD"),
                session_secret,
                session_expiry_days,
            },
            database: DatabaseConfig {
                uri: std::env::var("MONGODB_URI")
                    .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
                name: std::env::var("DATABASE_NAME").unwrap_or_else(|_| "workbench".to_string()),
            },
            observability: ObservabilityConfig {
                enabled: env_flag("LLM_OBS_ENABLED", false),
                agentless: env_flag("LLM_OBS_AGENTLESS", true),
                ml_app: std::env::var("ML_APP_NAME").unwrap_or_else(|_| "workbench".to_string()),
                site: std::env::var("TRACE_SITE").unwrap_or_else(|_| "datadoghq.com".to_string()),
                api_key: env_opt("TRACE_API_KEY"),
                service: std::env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "workbench-server".to_string()),
                environment: std::env::var("ENVIRONMENT")
                    .unwrap_or_else(|_| "development".to_string()),
            },
        })
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "SESSION_SECRET",
            "SERVER_PORT",
            "SERVER_HOST",
            "BASE_URL",
            "SESSION_EXPIRY_DAYS",
            "GITHUB_CLIENT_ID",
            "GITHUB_CLIENT_SECRET",
            "GOOGLE_CLIENT_ID",
            "GOOGLE_CLIENT_SECRET",
            "DEV_MODE",
            "ADMIN_EMAIL",
            "ADMIN_PASSWORD",
            "MONGODB_URI",
            "DATABASE_NAME",
            "LLM_OBS_ENABLED",
            "LLM_OBS_AGENTLESS",
            "ML_APP_NAME",
            "TRACE_SITE",
            "TRACE_API_KEY",
            "SERVICE_NAME",
            "ENVIRONMENT",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn missing_session_secret_is_a_config_error() {
        clear_env();
        assert!(AppConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn defaults_apply_when_only_secret_is_set() {
        clear_env();
        std::env::set_var("SESSION_SECRET", "0123456789abcdef0123456789abcdef");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.base_url, "http://localhost:8080");
        assert_eq!(config.auth.session_expiry_days, 30);
        assert!(!config.auth.dev_mode);
        assert!(!config.observability.enabled);
        assert_eq!(config.database.name, "workbench");
    }

    #[test]
    #[serial]
    fn flags_accept_truthy_spellings() {
        clear_env();
        std::env::set_var("SESSION_SECRET", "0123456789abcdef0123456789abcdef");
        std::env::set_var("DEV_MODE", "Yes");
        std::env::set_var("LLM_OBS_ENABLED", "on");

        let config = AppConfig::from_env().unwrap();
        assert!(config.auth.dev_mode);
        assert!(config.observability.enabled);
    }

    #[test]
    #[serial]
    fn empty_optionals_read_as_unset() {
        clear_env();
        std::env::set_var("SESSION_SECRET", "0123456789abcdef0123456789abcdef");
        std::env::set_var("ADMIN_PASSWORD", "");

        let config = AppConfig::from_env().unwrap();
        assert!(config.auth.admin_password.is_none());
    }
}
