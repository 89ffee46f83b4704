use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web, HttpMessage,
};

use crate::auth::{Principal, ROLE_ADMIN};
use crate::error::{ApiError, Result};
use crate::session::SessionManager;

/// Session guard: consult the session store for the request's
/// `session_id` cookie. No valid session means a 401 denial; no side
/// effects beyond the read.
pub fn authenticate(req: &ServiceRequest) -> Result<Principal> {
    let session_id = req
        .cookie("session_id")
        .map(|c| c.value().to_string())
        .ok_or(ApiError::Unauthorized)?;

    let session_manager = req
        .app_data::<web::Data<SessionManager>>()
        .ok_or_else(|| ApiError::Internal("session manager not configured".to_string()))?;

    let session = session_manager.validate_session(&session_id)?;
    Ok(session.principal)
}

/// Role guard: session guard first (its denial propagates unchanged),
/// then an exact role comparison. Mismatch is a 403 denial; match
/// returns the Principal untouched.
pub fn authorize(req: &ServiceRequest, required_role: &str) -> Result<Principal> {
    let principal = authenticate(req)?;

    if !principal.has_role(required_role) {
        return Err(ApiError::Forbidden);
    }

    Ok(principal)
}

pub async fn session_guard(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> std::result::Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let principal = authenticate(&req)?;

    // Make the Principal available to handlers via ReqData
    req.extensions_mut().insert(principal);

    next.call(req).await
}

pub async fn admin_guard(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> std::result::Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let principal = authorize(&req, ROLE_ADMIN)?;

    req.extensions_mut().insert(principal);

    next.call(req).await
}
