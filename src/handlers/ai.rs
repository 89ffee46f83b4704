use actix_web::{post, web, HttpResponse};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;

use crate::{
    auth::Principal,
    db::{models::AiRequestLog, MongoDbContext},
    error::{ApiError, Result},
    observability::{LlmTracer, SpanMetadata, TagValue},
};

#[derive(Debug, Deserialize)]
pub struct AiRequestBody {
    pub model: String,
    pub provider: String,
    pub status: String,
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub input: Option<String>,
}

/// Appends an AI-request audit row, wrapped in a workflow span so the
/// write shows up in LLM traces with model/provider context.
#[post("/ai/requests")]
pub async fn log_ai_request(
    req: web::Json<AiRequestBody>,
    principal: web::ReqData<Principal>,
    db: web::Data<MongoDbContext>,
    tracer: web::Data<LlmTracer>,
) -> Result<HttpResponse> {
    let user_id = ObjectId::parse_str(&principal.id)
        .map_err(|_| ApiError::Internal("principal id is not a user id".to_string()))?;

    let body = req.into_inner();
    let entry = AiRequestLog::new(
        user_id,
        body.model.clone(),
        body.provider.clone(),
        body.status,
        body.prompt_tokens,
        body.completion_tokens,
    );

    let mut meta = SpanMetadata::default()
        .context("model", TagValue::Str(body.model))
        .context("provider", TagValue::Str(body.provider))
        .context("prompt_tokens", TagValue::Num(body.prompt_tokens as f64));
    meta.input = body.input;

    let logged = tracer
        .workflow("ai.request", meta, db.log_ai_request(entry))
        .await?;

    Ok(HttpResponse::Created().json(logged))
}
