use actix_web::{cookie::Cookie, get, post, web, HttpRequest, HttpResponse};
use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{
        exchange_code, now_ms, resolve_redirect, verify_admin_credentials, Principal, Provider,
        SessionTokenService, SessionUser,
    },
    config::AppConfig,
    db::{models::SessionRecord, models::User, MongoDbContext},
    error::{ApiError, Result},
    session::SessionManager,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub auth_token: String,
    pub principal: Principal,
}

/// Opens a session for an authenticated Principal: persist a session
/// row, register it in the in-process store, and issue the signed
/// token plus cookie.
async fn open_session(
    principal: Principal,
    db: &MongoDbContext,
    session_manager: &SessionManager,
    auth_tokens: &SessionTokenService,
    expiry_days: u64,
) -> Result<(Principal, String, Cookie<'static>)> {
    let user = db.upsert_user(User::from_principal(&principal)).await?;
    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("user row has no id".to_string()))?;

    let mut principal = principal;
    principal.id = user_id.to_hex();

    let session = session_manager.create_session(principal.clone());

    let expires_at = Utc::now() + ChronoDuration::days(expiry_days as i64);
    db.record_session(SessionRecord::new(
        user_id,
        session.session_id.clone(),
        expires_at,
    ))
    .await?;

    let auth_token = auth_tokens
        .issue_session_token(session.session_id.clone(), principal.clone(), now_ms())
        .map_err(ApiError::Token)?;

    let cookie = Cookie::build("session_id", session.session_id.clone())
        .path("/")
        .http_only(true)
        .same_site(actix_web::cookie::SameSite::Lax)
        .max_age(actix_web::cookie::time::Duration::days(expiry_days as i64))
        .finish();

    Ok((principal, auth_token, cookie))
}

/// Development-only credential login. Outside dev mode, or with any
/// mismatch, this is a plain 401.
#[post("/login")]
pub async fn login(
    req: web::Json<LoginRequest>,
    config: web::Data<AppConfig>,
    db: web::Data<MongoDbContext>,
    session_manager: web::Data<SessionManager>,
    auth_tokens: web::Data<SessionTokenService>,
) -> Result<HttpResponse> {
    log::info!("Login attempt for {}", req.email);

    let principal = verify_admin_credentials(&config.auth, &req.email, &req.password)
        .ok_or(ApiError::InvalidCredentials)?;

    let (principal, auth_token, cookie) = open_session(
        principal,
        &db,
        &session_manager,
        &auth_tokens,
        config.auth.session_expiry_days,
    )
    .await?;

    log::info!("Successful login for {}", principal.email);

    let response = LoginResponse {
        success: true,
        auth_token,
        principal,
    };

    Ok(HttpResponse::Ok().cookie(cookie).json(response))
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: String,
    #[serde(default)]
    pub redirect: Option<String>,
}

/// OAuth callback: exchange the code, map the provider profile into a
/// Principal, open a session, and redirect within the policy (relative
/// or same-origin only).
#[get("/auth/{provider}/callback")]
pub async fn oauth_callback(
    path: web::Path<String>,
    query: web::Query<OAuthCallbackQuery>,
    http: web::Data<reqwest::Client>,
    config: web::Data<AppConfig>,
    db: web::Data<MongoDbContext>,
    session_manager: web::Data<SessionManager>,
    auth_tokens: web::Data<SessionTokenService>,
) -> Result<HttpResponse> {
    let provider = Provider::from_slug(&path)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown provider: {path}")))?;

    let redirect_uri = format!(
        "{}/auth/{}/callback",
        config.server.base_url,
        provider.slug()
    );

    let principal =
        exchange_code(&http, provider, &config.auth, &query.code, &redirect_uri).await?;

    log::info!(
        "OAuth login via {} for {}",
        provider.slug(),
        principal.email
    );

    let (_, _, cookie) = open_session(
        principal,
        &db,
        &session_manager,
        &auth_tokens,
        config.auth.session_expiry_days,
    )
    .await?;

    let target = resolve_redirect(
        query.redirect.as_deref().unwrap_or("/"),
        &config.server.base_url,
    );

    Ok(HttpResponse::Found()
        .cookie(cookie)
        .insert_header(("Location", target))
        .finish())
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[post("/logout")]
pub async fn logout(
    req: HttpRequest,
    session_manager: web::Data<SessionManager>,
) -> Result<HttpResponse> {
    if let Some(cookie) = req.cookie("session_id") {
        session_manager.invalidate_session(cookie.value());
        log::info!("User logged out (session: {})", cookie.value());
    }

    let cookie = Cookie::build("session_id", "")
        .path("/")
        .max_age(actix_web::cookie::time::Duration::seconds(0))
        .finish();

    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(LogoutResponse { success: true }))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub session: SessionUser,
    pub principal: Principal,
}

#[get("/me")]
pub async fn me(principal: web::ReqData<Principal>) -> Result<HttpResponse> {
    let principal = principal.into_inner();

    let response = MeResponse {
        session: SessionUser {
            id: principal.id.clone(),
            role: principal.role.clone(),
        },
        principal,
    };

    Ok(HttpResponse::Ok().json(response))
}
