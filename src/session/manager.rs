use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::{ApiError, Result};

#[derive(Debug, Clone)]
pub struct SessionData {
    pub session_id: String,
    pub principal: Principal,
    pub expires_at: Instant,
}

impl SessionData {
    pub fn new(principal: Principal, expiry: Duration) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let expires_at = Instant::now() + expiry;

        Self {
            session_id,
            principal,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process session store consulted by the guards. A user may hold
/// multiple concurrent sessions; expiry is the only invalidation the
/// store applies on its own.
#[derive(Clone)]
pub struct SessionManager {
    // session_id -> SessionData
    sessions: Arc<DashMap<String, SessionData>>,
    expiry: Duration,
}

impl SessionManager {
    pub fn new(expiry_days: u64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            expiry: Duration::from_secs(expiry_days * 24 * 3600),
        }
    }

    pub fn create_session(&self, principal: Principal) -> SessionData {
        let session_data = SessionData::new(principal, self.expiry);

        self.sessions
            .insert(session_data.session_id.clone(), session_data.clone());

        log::info!(
            "Created session {} for {}",
            session_data.session_id,
            session_data.principal.email
        );

        session_data
    }

    pub fn validate_session(&self, session_id: &str) -> Result<SessionData> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(ApiError::Unauthorized)?;

        if session.is_expired() {
            drop(session);
            self.invalidate_session(session_id);
            return Err(ApiError::Unauthorized);
        }

        Ok(session.clone())
    }

    pub fn invalidate_session(&self, session_id: &str) {
        if self.sessions.remove(session_id).is_some() {
            log::info!("Invalidated session: {}", session_id);
        }
    }

    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;

        self.sessions.retain(|session_id, session| {
            if session.is_expired() {
                log::debug!("Cleaned up expired session: {}", session_id);
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            log::info!("Cleaned up {} expired sessions", removed);
        }

        removed
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }
}
