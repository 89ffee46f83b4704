use serde::Deserialize;
use url::Url;

use crate::config::AuthConfig;
use crate::error::{ApiError, Result};

use super::principal::{Principal, ROLE_ADMIN, ROLE_USER};

/// The external identity sources this service accepts, plus the local
/// development-only credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    GitHub,
    Google,
}

impl Provider {
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "github" => Some(Provider::GitHub),
            "google" => Some(Provider::Google),
            _ => None,
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::Google => "google",
        }
    }

    fn token_url(&self) -> &'static str {
        match self {
            Provider::GitHub => "https://github.com/login/oauth/access_token",
            Provider::Google => "https://oauth2.googleapis.com/token",
        }
    }

    fn profile_url(&self) -> &'static str {
        match self {
            Provider::GitHub => "https://api.github.com/user",
            Provider::Google => "https://openidconnect.googleapis.com/v1/userinfo",
        }
    }

    fn client_credentials(&self, config: &AuthConfig) -> Result<(String, String)> {
        let (id, secret) = match self {
            Provider::GitHub => (&config.github_client_id, &config.github_client_secret),
            Provider::Google => (&config.google_client_id, &config.google_client_secret),
        };
        match (id, secret) {
            (Some(id), Some(secret)) => Ok((id.clone(), secret.clone())),
            _ => Err(ApiError::Config(format!(
                "{} OAuth credentials are not configured",
                self.slug()
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GithubProfile {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

impl Principal {
    /// Maps a GitHub profile into the canonical shape: name falls back
    /// to the login handle, role is always "user".
    pub fn from_github(profile: GithubProfile) -> Self {
        let provider_id = profile.id.to_string();
        Principal {
            id: provider_id.clone(),
            email: profile.email.unwrap_or_default(),
            name: profile.name.unwrap_or(profile.login),
            role: ROLE_USER.to_string(),
            image: profile.avatar_url,
            github_id: Some(provider_id),
            google_id: None,
        }
    }

    pub fn from_google(profile: GoogleProfile) -> Self {
        let email = profile.email.unwrap_or_default();
        Principal {
            id: profile.sub.clone(),
            name: profile.name.unwrap_or_else(|| email.clone()),
            email,
            role: ROLE_USER.to_string(),
            image: profile.picture,
            github_id: None,
            google_id: Some(profile.sub),
        }
    }
}

/// Development-only credential check. Activates only when dev mode is
/// on and an admin password is configured; any mismatch is a plain
/// "no match", never an error.
pub fn verify_admin_credentials(
    config: &AuthConfig,
    email: &str,
    password: &str,
) -> Option<Principal> {
    if !config.dev_mode {
        return None;
    }

    let admin_email = config.admin_email.as_deref()?;
    let admin_password = config.admin_password.as_deref()?;

    if email != admin_email || password != admin_password {
        return None;
    }

    Some(Principal {
        id: "admin".to_string(),
        email: admin_email.to_string(),
        name: "Admin".to_string(),
        role: ROLE_ADMIN.to_string(),
        image: None,
        github_id: None,
        google_id: None,
    })
}

/// Post-auth redirect policy. Relative paths resolve against the base
/// URL, absolute same-origin URLs pass through, and everything else
/// falls back to the base URL. Cross-origin targets are never followed.
pub fn resolve_redirect(url: &str, base_url: &str) -> String {
    if url.starts_with('/') {
        return format!("{base_url}{url}");
    }

    match (Url::parse(url), Url::parse(base_url)) {
        (Ok(target), Ok(base)) if target.origin() == base.origin() => url.to_string(),
        _ => base_url.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges an OAuth authorization code for a Principal: token POST,
/// then profile GET with the bearer token, then provider-specific
/// profile mapping.
pub async fn exchange_code(
    http: &reqwest::Client,
    provider: Provider,
    config: &AuthConfig,
    code: &str,
    redirect_uri: &str,
) -> Result<Principal> {
    let (client_id, client_secret) = provider.client_credentials(config)?;

    let token: TokenResponse = http
        .post(provider.token_url())
        .header("Accept", "application/json")
        .form(&[
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| ApiError::Provider(format!("token exchange failed: {e}")))?
        .json()
        .await
        .map_err(|e| ApiError::Provider(format!("invalid token response: {e}")))?;

    let profile_request = http
        .get(provider.profile_url())
        .header("User-Agent", "workbench-server")
        .bearer_auth(&token.access_token);

    let response = profile_request
        .send()
        .await
        .map_err(|e| ApiError::Provider(format!("profile fetch failed: {e}")))?;

    let principal = match provider {
        Provider::GitHub => {
            let profile: GithubProfile = response
                .json()
                .await
                .map_err(|e| ApiError::Provider(format!("invalid github profile: {e}")))?;
            Principal::from_github(profile)
        }
        Provider::Google => {
            let profile: GoogleProfile = response
                .json()
                .await
                .map_err(|e| ApiError::Provider(format!("invalid google profile: {e}")))?;
            Principal::from_google(profile)
        }
    };

    Ok(principal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_config() -> AuthConfig {
        AuthConfig {
            github_client_id: None,
            github_client_secret: None,
            google_client_id: None,
            google_client_secret: None,
            dev_mode: true,
            admin_email: Some("admin@example.com".to_string()),
            admin_password: Some("hunter2".to_string()),
            session_secret: "0123456789abcdef0123456789abcdef".to_string(),
            session_expiry_days: 30,
        }
    }

    #[test]
    fn github_profile_maps_with_login_fallback() {
        let principal = Principal::from_github(GithubProfile {
            id: 42,
            login: "octocat".to_string(),
            name: None,
            email: Some("octo@example.com".to_string()),
            avatar_url: Some("https://example.com/a.png".to_string()),
        });

        assert_eq!(principal.id, "42");
        assert_eq!(principal.name, "octocat");
        assert_eq!(principal.email, "octo@example.com");
        assert_eq!(principal.role, ROLE_USER);
        assert_eq!(principal.github_id.as_deref(), Some("42"));
        assert!(principal.google_id.is_none());
    }

    #[test]
    fn google_profile_maps_provider_id() {
        let principal = Principal::from_google(GoogleProfile {
            sub: "g-123".to_string(),
            name: Some("G User".to_string()),
            email: Some("g@example.com".to_string()),
            picture: None,
        });

        assert_eq!(principal.id, "g-123");
        assert_eq!(principal.google_id.as_deref(), Some("g-123"));
        assert!(principal.github_id.is_none());
        assert_eq!(principal.role, ROLE_USER);
    }

    #[test]
    fn admin_credentials_match_returns_admin_principal() {
        let config = dev_config();
        let principal =
            verify_admin_credentials(&config, "admin@example.com", "hunter2").expect("match");
        assert_eq!(principal.role, ROLE_ADMIN);
        assert_eq!(principal.email, "admin@example.com");
    }

    #[test]
    fn admin_credentials_reject_wrong_password() {
        let config = dev_config();
        assert!(verify_admin_credentials(&config, "admin@example.com", "wrong").is_none());
    }

    #[test]
    fn admin_credentials_reject_outside_dev_mode() {
        let mut config = dev_config();
        config.dev_mode = false;
        assert!(verify_admin_credentials(&config, "admin@example.com", "hunter2").is_none());
    }

    #[test]
    fn admin_credentials_reject_when_password_unset() {
        let mut config = dev_config();
        config.admin_password = None;
        assert!(verify_admin_credentials(&config, "admin@example.com", "hunter2").is_none());
    }

    #[test]
    fn relative_redirect_resolves_against_base() {
        assert_eq!(
            resolve_redirect("/dashboard", "https://app.example.com"),
            "https://app.example.com/dashboard"
        );
    }

    #[test]
    fn same_origin_redirect_passes_through() {
        assert_eq!(
            resolve_redirect("https://app.example.com/settings", "https://app.example.com"),
            "https://app.example.com/settings"
        );
    }

    #[test]
    fn cross_origin_redirect_falls_back_to_base() {
        assert_eq!(
            resolve_redirect("https://evil.example.org/phish", "https://app.example.com"),
            "https://app.example.com"
        );
    }

    #[test]
    fn unparseable_redirect_falls_back_to_base() {
        assert_eq!(
            resolve_redirect("not a url", "https://app.example.com"),
            "https://app.example.com"
        );
    }
}
