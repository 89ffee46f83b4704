use serde::{Deserialize, Serialize};

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// Authenticated identity carried for the lifetime of a session.
/// Immutable once issued within a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
}

impl Principal {
    pub fn has_role(&self, required: &str) -> bool {
        // Exact match only. Role hierarchies would need explicit
        // enumeration, never substring or prefix logic.
        self.role == required
    }
}

/// Outward-facing view copied from token claims on every request;
/// only id and role cross the session boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: &str) -> Principal {
        Principal {
            id: "u-1".to_string(),
            email: "user@example.com".to_string(),
            name: "User".to_string(),
            role: role.to_string(),
            image: None,
            github_id: None,
            google_id: None,
        }
    }

    #[test]
    fn role_check_is_exact_match() {
        assert!(principal("admin").has_role("admin"));
        assert!(!principal("user").has_role("admin"));
        assert!(!principal("admin").has_role("adm"));
        assert!(!principal("administrator").has_role("admin"));
    }
}
