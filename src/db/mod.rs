pub mod models;
pub mod repository;

pub use models::{AiRequestLog, Project, SessionRecord, User, Workspace};
pub use repository::{MongoDbContext, UserOverview, WorkspaceWithRelations};

use std::future::IntoFuture;
use std::time::Instant;

use tracing::Instrument;

use crate::error::Result;
use crate::metrics::MetricsCollector;

/// Runs one database query inside a trace span with timing metrics.
/// Success emits duration and count, failure emits an error count and
/// re-raises the original error.
pub(crate) async fn instrumented<T, F>(
    metrics: &MetricsCollector,
    operation: &'static str,
    collection: &'static str,
    fut: F,
) -> Result<T>
where
    F: IntoFuture<Output = mongodb::error::Result<T>>,
{
    let span = tracing::info_span!(
        "db_query",
        operation = operation,
        collection = collection,
        status = tracing::field::Empty,
        error = tracing::field::Empty,
    );

    let started = Instant::now();
    let result = fut.into_future().instrument(span.clone()).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(value) => {
            metrics.observe("db.query.duration_ms", elapsed_ms);
            metrics.increment("db.query.count", 1);
            span.record("status", "success");
            Ok(value)
        }
        Err(err) => {
            metrics.increment("db.query.errors", 1);
            span.record("status", "error");
            span.record("error", tracing::field::display(&err));
            log::error!("query {operation} on {collection} failed: {err}");
            Err(err.into())
        }
    }
}
