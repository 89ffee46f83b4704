use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::auth::Principal;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_principal(principal: &Principal) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            email: principal.email.clone(),
            name: principal.name.clone(),
            role: principal.role.clone(),
            image: principal.image.clone(),
            github_id: principal.github_id.clone(),
            google_id: principal.google_id.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persisted session row; the in-process store handles validation, this
/// is the audit/history record joined into user overviews.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(user_id: ObjectId, session_id: String, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            user_id,
            session_id,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub owner_id: ObjectId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    pub fn new(owner_id: ObjectId, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub workspace_id: ObjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const AI_REQUEST_COMPLETED: &str = "completed";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiRequestLog {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub model: String,
    pub provider: String,
    pub status: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl AiRequestLog {
    /// `completed_at` is stamped only for a "completed" status; any
    /// other status leaves it unset.
    pub fn new(
        user_id: ObjectId,
        model: String,
        provider: String,
        status: String,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> Self {
        let completed_at = (status == AI_REQUEST_COMPLETED).then(Utc::now);
        Self {
            id: None,
            user_id,
            model,
            provider,
            status,
            prompt_tokens,
            completion_tokens,
            started_at: Utc::now(),
            completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ROLE_USER;

    #[test]
    fn user_from_principal_copies_identity_fields() {
        let principal = Principal {
            id: "99".to_string(),
            email: "user@example.com".to_string(),
            name: "User".to_string(),
            role: ROLE_USER.to_string(),
            image: Some("https://example.com/a.png".to_string()),
            github_id: Some("99".to_string()),
            google_id: None,
        };

        let user = User::from_principal(&principal);
        assert_eq!(user.email, "user@example.com");
        assert_eq!(user.role, ROLE_USER);
        assert_eq!(user.github_id.as_deref(), Some("99"));
        assert!(user.id.is_none());
    }

    #[test]
    fn completed_status_stamps_completion_time() {
        let log = AiRequestLog::new(
            ObjectId::new(),
            "gpt-4o".to_string(),
            "openai".to_string(),
            AI_REQUEST_COMPLETED.to_string(),
            120,
            48,
        );
        assert!(log.completed_at.is_some());
    }

    #[test]
    fn other_statuses_leave_completion_unset() {
        for status in ["pending", "failed", "running", ""] {
            let log = AiRequestLog::new(
                ObjectId::new(),
                "gpt-4o".to_string(),
                "openai".to_string(),
                status.to_string(),
                0,
                0,
            );
            assert!(log.completed_at.is_none(), "status {status:?}");
        }
    }

    #[test]
    fn workspace_new_sets_owner() {
        let owner = ObjectId::new();
        let workspace = Workspace::new(owner, "Research".to_string());
        assert_eq!(workspace.owner_id, owner);
        assert!(workspace.id.is_none());
    }
}
