use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::Instrument;

use crate::config::ObservabilityConfig;

const OUTPUT_PREVIEW_LEN: usize = 256;

/// Fixed tag value schema for span metadata. Only strings and numbers
/// cross this boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Str(String),
    Num(f64),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Str(s) => write!(f, "{s}"),
            TagValue::Num(n) => write!(f, "{n}"),
        }
    }
}

/// Metadata attached to an LLM span at open time: an optional input
/// preview, a flat tag list, and ordered context key/values.
#[derive(Debug, Clone, Default)]
pub struct SpanMetadata {
    pub input: Option<String>,
    pub tags: Vec<String>,
    pub context: Vec<(String, TagValue)>,
}

impl SpanMetadata {
    pub fn with_input(input: impl Into<String>) -> Self {
        Self {
            input: Some(input.into()),
            ..Self::default()
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: TagValue) -> Self {
        self.context.push((key.into(), value));
        self
    }

    fn context_string(&self) -> String {
        self.context
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

struct TracerState {
    enabled: bool,
    ml_app: String,
    service: String,
    environment: String,
    site: String,
    agentless: bool,
}

/// LLM observability client. Constructed once in `main` and handed to
/// call sites; when disabled, every wrapper degrades to a plain await
/// so tracing problems never abort the caller's operation.
#[derive(Clone)]
pub struct LlmTracer {
    state: Arc<TracerState>,
}

impl LlmTracer {
    /// Infallible: configuration problems disable tracing and log a
    /// warning, the process continues untraced.
    pub fn init(config: &ObservabilityConfig) -> Self {
        let mut enabled = config.enabled;

        if enabled && config.agentless && config.api_key.is_none() {
            log::warn!("LLM observability enabled in agentless mode without TRACE_API_KEY; disabling tracing");
            enabled = false;
        }

        if enabled {
            let filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
            // Idempotent: a second init keeps the existing subscriber.
            if tracing_subscriber::fmt()
                .with_env_filter(filter)
                .try_init()
                .is_err()
            {
                log::debug!("tracing subscriber already installed");
            }
            log::info!(
                "LLM observability enabled (ml_app={}, service={}, site={}, agentless={})",
                config.ml_app,
                config.service,
                config.site,
                config.agentless
            );
        }

        Self {
            state: Arc::new(TracerState {
                enabled,
                ml_app: config.ml_app.clone(),
                service: config.service.clone(),
                environment: config.environment.clone(),
                site: config.site.clone(),
                agentless: config.agentless,
            }),
        }
    }

    /// A disabled tracer for call sites constructed outside `main`.
    pub fn disabled() -> Self {
        Self {
            state: Arc::new(TracerState {
                enabled: false,
                ml_app: String::new(),
                service: String::new(),
                environment: String::new(),
                site: String::new(),
                agentless: true,
            }),
        }
    }

    pub fn enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn site(&self) -> &str {
        &self.state.site
    }

    pub fn agentless(&self) -> bool {
        self.state.agentless
    }

    /// Wraps an operation in a workflow span. The span closes on every
    /// exit path; errors re-raise unchanged.
    pub async fn workflow<F, T, E>(
        &self,
        name: &str,
        meta: SpanMetadata,
        fut: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        T: fmt::Debug,
        E: fmt::Display,
    {
        self.traced("workflow", name, meta, fut).await
    }

    /// Same contract as `workflow` with the task span kind.
    pub async fn task<F, T, E>(&self, name: &str, meta: SpanMetadata, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        T: fmt::Debug,
        E: fmt::Display,
    {
        self.traced("task", name, meta, fut).await
    }

    async fn traced<F, T, E>(
        &self,
        kind: &'static str,
        name: &str,
        meta: SpanMetadata,
        fut: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        T: fmt::Debug,
        E: fmt::Display,
    {
        if !self.state.enabled {
            return fut.await;
        }

        let span = tracing::info_span!(
            "llm_operation",
            kind = kind,
            name = %name,
            ml_app = %self.state.ml_app,
            service = %self.state.service,
            env = %self.state.environment,
            input = tracing::field::Empty,
            tags = tracing::field::Empty,
            context = tracing::field::Empty,
            output = tracing::field::Empty,
            status = tracing::field::Empty,
            error_message = tracing::field::Empty,
        );

        if let Some(input) = &meta.input {
            span.record("input", input.as_str());
        }
        if !meta.tags.is_empty() {
            span.record("tags", meta.tags.join(",").as_str());
        }
        if !meta.context.is_empty() {
            span.record("context", meta.context_string().as_str());
        }

        let result = fut.instrument(span.clone()).await;

        match &result {
            Ok(value) => {
                span.record("output", preview(value).as_str());
                span.record("status", "success");
            }
            Err(err) => {
                span.record("status", "error");
                span.record("error_message", tracing::field::display(err));
            }
        }

        // Span closes when dropped here, on success and failure alike.
        result
    }

    /// Adds tags to whatever span is currently active. A missing span
    /// is a warning, not a failure.
    pub fn annotate(&self, tags: &[(String, TagValue)]) {
        if !self.state.enabled {
            return;
        }

        let current = tracing::Span::current();
        if current.is_none() {
            log::warn!("annotate called with no active span");
            return;
        }

        let rendered = tags
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        tracing::info!(annotations = %rendered, "span annotation");
    }

    /// Drains buffered trace data. Resolves immediately when disabled.
    pub async fn flush(&self) {
        if !self.state.enabled {
            return;
        }

        // The fmt subscriber writes synchronously; yielding lets any
        // in-flight span events land before shutdown.
        tokio::task::yield_now().await;
        log::debug!("flushed LLM trace buffers");
    }
}

fn preview<T: fmt::Debug>(value: &T) -> String {
    let mut rendered = format!("{value:?}");
    if rendered.len() > OUTPUT_PREVIEW_LEN {
        let mut cut = OUTPUT_PREVIEW_LEN;
        while !rendered.is_char_boundary(cut) {
            cut -= 1;
        }
        rendered.truncate(cut);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_tracer() -> LlmTracer {
        LlmTracer::disabled()
    }

    fn enabled_config() -> ObservabilityConfig {
        ObservabilityConfig {
            enabled: true,
            agentless: true,
            ml_app: "workbench".to_string(),
            site: "datadoghq.com".to_string(),
            api_key: Some("key".to_string()),
            service: "workbench-server".to_string(),
            environment: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn disabled_tracer_passes_through_success() {
        let tracer = disabled_tracer();
        let result: Result<u32, String> = tracer
            .workflow("noop", SpanMetadata::default(), async { Ok(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn disabled_tracer_passes_through_error_unchanged() {
        let tracer = disabled_tracer();
        let result: Result<u32, String> = tracer
            .task("noop", SpanMetadata::default(), async {
                Err("boom".to_string())
            })
            .await;
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[tokio::test]
    async fn enabled_tracer_reraises_errors() {
        let tracer = LlmTracer::init(&enabled_config());
        let result: Result<u32, String> = tracer
            .workflow(
                "failing",
                SpanMetadata::with_input("prompt"),
                async { Err("model unavailable".to_string()) },
            )
            .await;
        assert_eq!(result.unwrap_err(), "model unavailable");
    }

    #[tokio::test]
    async fn enabled_tracer_returns_success_value() {
        let tracer = LlmTracer::init(&enabled_config());
        let meta = SpanMetadata::with_input("prompt")
            .tag("unit-test")
            .context("model", TagValue::Str("gpt".to_string()))
            .context("temperature", TagValue::Num(0.2));
        let result: Result<&str, String> =
            tracer.workflow("ok", meta, async { Ok("answer") }).await;
        assert_eq!(result.unwrap(), "answer");
    }

    #[test]
    fn agentless_without_api_key_disables_tracing() {
        let mut config = enabled_config();
        config.api_key = None;
        let tracer = LlmTracer::init(&config);
        assert!(!tracer.enabled());
    }

    #[test]
    fn annotate_without_span_does_not_panic() {
        let tracer = disabled_tracer();
        tracer.annotate(&[("k".to_string(), TagValue::Num(1.0))]);
    }

    #[tokio::test]
    async fn flush_resolves_when_disabled() {
        disabled_tracer().flush().await;
    }

    #[test]
    fn preview_truncates_long_output() {
        let long = "x".repeat(1000);
        assert!(preview(&long).len() <= OUTPUT_PREVIEW_LEN);
    }

    #[test]
    fn context_string_preserves_order() {
        let meta = SpanMetadata::default()
            .context("b", TagValue::Num(2.0))
            .context("a", TagValue::Str("one".to_string()));
        assert_eq!(meta.context_string(), "b=2,a=one");
    }
}
