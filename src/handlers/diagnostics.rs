use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::{
    diagnostics::{test_connectivity, trace_route, HopStat, DEFAULT_PROBE_PORT},
    error::{ApiError, Result},
    metrics::MetricsCollector,
    observability::{LlmTracer, SpanMetadata, TagValue},
};

#[derive(Debug, Deserialize)]
pub struct TraceRouteQuery {
    pub host: String,
}

#[derive(Debug, Serialize)]
pub struct TraceRouteResponse {
    pub host: String,
    pub hops: Vec<HopStat>,
}

/// Fail-loud: any trace failure surfaces as an error response rather
/// than a partial hop list.
#[get("/diagnostics/traceroute")]
pub async fn traceroute(
    query: web::Query<TraceRouteQuery>,
    metrics: web::Data<MetricsCollector>,
    tracer: web::Data<LlmTracer>,
) -> Result<HttpResponse> {
    let host = query.host.trim().to_string();
    if host.is_empty() {
        return Err(ApiError::BadRequest("host is required".to_string()));
    }

    let meta = SpanMetadata::default().context("host", TagValue::Str(host.clone()));
    let hops = tracer
        .task("diagnostics.traceroute", meta, async {
            trace_route(&host, &metrics).await
        })
        .await?;

    Ok(HttpResponse::Ok().json(TraceRouteResponse { host, hops }))
}

#[derive(Debug, Deserialize)]
pub struct ConnectivityQuery {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Fail-soft: always a 200 with a structured result, even when the
/// probe cannot run at all.
#[get("/diagnostics/connectivity")]
pub async fn connectivity(query: web::Query<ConnectivityQuery>) -> Result<HttpResponse> {
    let host = query.host.trim().to_string();
    if host.is_empty() {
        return Err(ApiError::BadRequest("host is required".to_string()));
    }

    let port = query.port.unwrap_or(DEFAULT_PROBE_PORT);
    let result = test_connectivity(&host, port).await;

    Ok(HttpResponse::Ok().json(result))
}
