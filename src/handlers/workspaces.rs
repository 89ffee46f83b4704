use actix_web::{get, post, web, HttpResponse};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;

use crate::{
    auth::Principal,
    db::MongoDbContext,
    error::{ApiError, Result},
};

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
}

#[post("/workspaces")]
pub async fn create_workspace(
    req: web::Json<CreateWorkspaceRequest>,
    principal: web::ReqData<Principal>,
    db: web::Data<MongoDbContext>,
) -> Result<HttpResponse> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("workspace name is required".to_string()));
    }

    let owner_id = ObjectId::parse_str(&principal.id)
        .map_err(|_| ApiError::Internal("principal id is not a user id".to_string()))?;

    let created = db.create_workspace(owner_id, name.to_string()).await?;

    log::info!(
        "Created workspace {:?} for {}",
        created.workspace.name,
        principal.email
    );

    Ok(HttpResponse::Created().json(created))
}

#[derive(Debug, Deserialize)]
pub struct UserOverviewQuery {
    pub email: String,
}

/// Admin-only joined read: the user with their ten most recently
/// updated sessions, workspaces, and projects.
#[get("/users/overview")]
pub async fn user_overview(
    query: web::Query<UserOverviewQuery>,
    db: web::Data<MongoDbContext>,
) -> Result<HttpResponse> {
    let overview = db
        .find_user_by_email(&query.email)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no user with email {}", query.email)))?;

    Ok(HttpResponse::Ok().json(overview))
}
