use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::principal::{Principal, SessionUser};

type HmacSha256 = Hmac<Sha256>;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("session token secret is too short (min {MIN_SECRET_LEN} bytes)")]
    SecretTooShort,

    #[error("invalid session token format")]
    InvalidFormat,

    #[error("session token signature is invalid")]
    InvalidSignature,

    #[error("session token is expired")]
    Expired,

    #[error("failed to decode session token payload")]
    PayloadDecode,

    #[error("failed to parse session token payload")]
    PayloadParse,
}

/// Claims embedded in the opaque signed session token. The Principal
/// fields ride along so protected handlers never need a user lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub session_id: String,
    pub principal: Principal,
    pub issued_at_ms: u64,
    pub expires_at_ms: u64,
}

impl SessionClaims {
    pub fn is_expired(&self, reference_ms: u64) -> bool {
        reference_ms >= self.expires_at_ms
    }

    /// The per-request session view: id and role copied outward.
    pub fn session_user(&self) -> SessionUser {
        SessionUser {
            id: self.principal.id.clone(),
            role: self.principal.role.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SessionTokenService {
    secret: Arc<[u8]>,
    ttl: Duration,
}

impl SessionTokenService {
    pub fn new(secret: Vec<u8>, ttl: Duration) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::SecretTooShort);
        }

        Ok(Self {
            secret: Arc::<[u8]>::from(secret),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue_session_token(
        &self,
        session_id: String,
        principal: Principal,
        issued_at_ms: u64,
    ) -> Result<String, TokenError> {
        let expires_at_ms = issued_at_ms.saturating_add(self.ttl.as_millis() as u64);
        let claims = SessionClaims {
            session_id,
            principal,
            issued_at_ms,
            expires_at_ms,
        };
        self.issue(&claims)
    }

    pub fn issue(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::PayloadParse)?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let signature = self.sign(payload_b64.as_bytes())?;
        let signature_b64 = URL_SAFE_NO_PAD.encode(signature);
        Ok(format!("{payload_b64}.{signature_b64}"))
    }

    pub fn verify(&self, token: &str, reference_ms: u64) -> Result<SessionClaims, TokenError> {
        let (payload_b64, signature_b64) =
            token.split_once('.').ok_or(TokenError::InvalidFormat)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::InvalidFormat)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| TokenError::InvalidSignature)?;
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::PayloadDecode)?;

        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::PayloadParse)?;

        if claims.session_id.is_empty() || claims.is_expired(reference_ms) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, bytes: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| TokenError::InvalidSignature)?;
        mac.update(bytes);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::ROLE_USER;

    fn test_principal() -> Principal {
        Principal {
            id: "64b2f0d1a2b3c4d5e6f70811".to_string(),
            email: "user@example.com".to_string(),
            name: "Test User".to_string(),
            role: ROLE_USER.to_string(),
            image: None,
            github_id: Some("1234".to_string()),
            google_id: None,
        }
    }

    fn test_service() -> SessionTokenService {
        SessionTokenService::new(
            b"01234567890123456789012345678901".to_vec(),
            Duration::from_secs(30),
        )
        .expect("valid service")
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let service = test_service();
        let token = service
            .issue_session_token("session-1".to_string(), test_principal(), 1_000)
            .expect("issue token");

        let claims = service.verify(&token, 1_500).expect("verify token");
        assert_eq!(claims.session_id, "session-1");
        assert_eq!(claims.principal.email, "user@example.com");
        assert_eq!(claims.principal.github_id.as_deref(), Some("1234"));
    }

    #[test]
    fn session_user_copies_id_and_role_only() {
        let service = test_service();
        let token = service
            .issue_session_token("session-1".to_string(), test_principal(), 1_000)
            .expect("issue token");

        let claims = service.verify(&token, 1_500).expect("verify token");
        let session_user = claims.session_user();
        assert_eq!(session_user.id, "64b2f0d1a2b3c4d5e6f70811");
        assert_eq!(session_user.role, ROLE_USER);
    }

    #[test]
    fn rejects_tampered_token() {
        let service = test_service();
        let token = service
            .issue_session_token("s".to_string(), test_principal(), 10)
            .expect("issue token");
        let (payload, signature) = token.split_once('.').expect("token split");
        let mut chars: Vec<char> = payload.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let tampered_payload: String = chars.into_iter().collect();
        let tampered = format!("{tampered_payload}.{signature}");

        assert!(matches!(
            service.verify(&tampered, 20),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let service = test_service();
        let token = service
            .issue_session_token("s".to_string(), test_principal(), 1_000)
            .expect("issue token");

        assert!(matches!(
            service.verify(&token, 35_000),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn rejects_short_secret() {
        assert!(matches!(
            SessionTokenService::new(b"short".to_vec(), Duration::from_secs(1)),
            Err(TokenError::SecretTooShort)
        ));
    }
}
