use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::metrics::MetricsCollector;

const PACKET_COUNT: u32 = 10;
const MAX_HOPS: u32 = 30;
const TIMEOUT_SECS: u32 = 2;
pub const DEFAULT_PROBE_PORT: u16 = 443;

const TRACE_BIN: &str = "mtr";
const PROBE_BIN: &str = "nc";

#[derive(Debug, thiserror::Error)]
pub enum DiagnosticsError {
    #[error("diagnostics binary not installed: {0}")]
    BinaryMissing(String),

    #[error("failed to launch {binary}: {source}")]
    Launch {
        binary: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary} exited with status {status}: {stderr}")]
    NonZeroExit {
        binary: &'static str,
        status: i32,
        stderr: String,
    },

    #[error("failed to parse trace output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Per-hop statistics for one trace-route invocation. One entry per
/// reported hop, source hop first. Fields the utility omits come back
/// zeroed, a missing host reads "Unknown".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HopStat {
    pub hop: u32,
    pub host: String,
    pub ip: String,
    pub loss_pct: f64,
    pub sent: u32,
    pub recv: u32,
    pub last_ms: f64,
    pub avg_ms: f64,
    pub best_ms: f64,
    pub worst_ms: f64,
    pub stdev_ms: f64,
    pub jitter_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

#[derive(Debug, Deserialize)]
struct TraceReport {
    report: ReportBody,
}

#[derive(Debug, Deserialize)]
struct ReportBody {
    #[serde(default)]
    hubs: Vec<RawHub>,
}

#[derive(Debug, Deserialize)]
struct RawHub {
    #[serde(default)]
    count: u32,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    ip: Option<String>,
    #[serde(default, rename = "Loss%")]
    loss: f64,
    #[serde(default, rename = "Snt")]
    sent: u32,
    #[serde(default, rename = "Recv")]
    recv: u32,
    #[serde(default, rename = "Last")]
    last: f64,
    #[serde(default, rename = "Avg")]
    avg: f64,
    #[serde(default, rename = "Best")]
    best: f64,
    #[serde(default, rename = "Wrst")]
    worst: f64,
    #[serde(default, rename = "StDev")]
    stdev: f64,
    #[serde(default, rename = "Javg")]
    jitter: f64,
    #[serde(default, rename = "P50")]
    p50: f64,
    #[serde(default, rename = "P90")]
    p90: f64,
    #[serde(default, rename = "P95")]
    p95: f64,
    #[serde(default, rename = "P99")]
    p99: f64,
}

impl From<RawHub> for HopStat {
    fn from(raw: RawHub) -> Self {
        HopStat {
            hop: raw.count,
            host: raw.host.unwrap_or_else(|| "Unknown".to_string()),
            ip: raw.ip.unwrap_or_default(),
            loss_pct: raw.loss,
            sent: raw.sent,
            recv: raw.recv,
            last_ms: raw.last,
            avg_ms: raw.avg,
            best_ms: raw.best,
            worst_ms: raw.worst,
            stdev_ms: raw.stdev,
            jitter_ms: raw.jitter,
            p50_ms: raw.p50,
            p90_ms: raw.p90,
            p95_ms: raw.p95,
            p99_ms: raw.p99,
        }
    }
}

/// Parses the trace utility's JSON report into hop statistics,
/// preserving the reported order.
pub fn parse_trace_report(raw: &str) -> Result<Vec<HopStat>, DiagnosticsError> {
    let report: TraceReport = serde_json::from_str(raw)?;
    Ok(report.report.hubs.into_iter().map(HopStat::from).collect())
}

/// TCP probe outcome. Always a value, never an error: failures carry a
/// -1 latency sentinel and a message instead of raising.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConnectivityResult {
    pub success: bool,
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectivityResult {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            latency_ms: -1.0,
            error: Some(message),
        }
    }
}

/// Runs `mtr --json -c 10 -m 30 -w 2 <host>` and maps the report into
/// hop statistics. Fail-loud: every failure is metered, recorded on the
/// active span, and returned as an error — never a silent partial
/// result.
pub async fn trace_route(
    host: &str,
    metrics: &MetricsCollector,
) -> Result<Vec<HopStat>, DiagnosticsError> {
    match run_trace_route(host, metrics).await {
        Ok(hops) => Ok(hops),
        Err(err) => {
            tracing::error!(host = %host, error = %err, "trace route failed");
            metrics.increment("diagnostics.traceroute.errors", 1);
            Err(err)
        }
    }
}

async fn run_trace_route(
    host: &str,
    metrics: &MetricsCollector,
) -> Result<Vec<HopStat>, DiagnosticsError> {
    let started = Instant::now();

    let output = Command::new(TRACE_BIN)
        .arg("--json")
        .args(["-c", &PACKET_COUNT.to_string()])
        .args(["-m", &MAX_HOPS.to_string()])
        .args(["-w", &TIMEOUT_SECS.to_string()])
        .arg(host)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DiagnosticsError::BinaryMissing(TRACE_BIN.to_string()),
            _ => DiagnosticsError::Launch {
                binary: TRACE_BIN,
                source: e,
            },
        })?;

    if !output.status.success() {
        return Err(DiagnosticsError::NonZeroExit {
            binary: TRACE_BIN,
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let hops = parse_trace_report(&String::from_utf8_lossy(&output.stdout))?;

    metrics.observe(
        "diagnostics.traceroute.duration_ms",
        started.elapsed().as_secs_f64() * 1000.0,
    );
    for hop in &hops {
        metrics.gauge(&format!("diagnostics.hop.{}.loss_pct", hop.hop), hop.loss_pct);
        metrics.observe("diagnostics.hop.avg_ms", hop.avg_ms);
    }

    log::info!("trace route to {} reported {} hops", host, hops.len());

    Ok(hops)
}

/// Probes `host:port` with `nc -zv -w 2`, timing the attempt with
/// sub-millisecond precision. Intentionally fail-soft, unlike
/// `trace_route`: the result is always a value.
pub async fn test_connectivity(host: &str, port: u16) -> ConnectivityResult {
    let started = Instant::now();

    let result = Command::new(PROBE_BIN)
        .args(["-zv", "-w", &TIMEOUT_SECS.to_string()])
        .arg(host)
        .arg(port.to_string())
        .output()
        .await;

    match result {
        Ok(output) if output.status.success() => {
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            log::debug!("connectivity probe {host}:{port} ok in {latency_ms:.3}ms");
            ConnectivityResult {
                success: true,
                latency_ms,
                error: None,
            }
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("probe exited with status {}", output.status.code().unwrap_or(-1))
            } else {
                stderr
            };
            log::debug!("connectivity probe {host}:{port} failed: {message}");
            ConnectivityResult::failure(message)
        }
        Err(err) => {
            log::debug!("connectivity probe {host}:{port} could not launch: {err}");
            ConnectivityResult::failure(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_REPORT: &str = r#"{
        "report": {
            "mtr": { "src": "workbench", "dst": "example.com", "tests": 10 },
            "hubs": [
                {
                    "count": 1, "host": "_gateway", "ip": "192.168.1.1",
                    "Loss%": 0.0, "Snt": 10, "Recv": 10,
                    "Last": 1.2, "Avg": 1.5, "Best": 0.9, "Wrst": 3.1,
                    "StDev": 0.4, "Javg": 0.2,
                    "P50": 1.4, "P90": 2.8, "P95": 3.0, "P99": 3.1
                },
                {
                    "count": 2, "host": "isp.example.net",
                    "Loss%": 10.0, "Snt": 10,
                    "Last": 8.0, "Avg": 9.5, "Best": 7.2, "Wrst": 14.0,
                    "StDev": 1.9
                }
            ]
        }
    }"#;

    #[test]
    fn parses_hops_in_report_order() {
        let hops = parse_trace_report(FULL_REPORT).unwrap();
        assert_eq!(hops.len(), 2);
        assert_eq!(hops[0].hop, 1);
        assert_eq!(hops[0].host, "_gateway");
        assert_eq!(hops[0].ip, "192.168.1.1");
        assert_eq!(hops[0].p99_ms, 3.1);
        assert_eq!(hops[1].hop, 2);
        assert_eq!(hops[1].loss_pct, 10.0);
    }

    #[test]
    fn missing_numeric_fields_default_to_zero() {
        let hops = parse_trace_report(FULL_REPORT).unwrap();
        let second = &hops[1];
        assert_eq!(second.recv, 0);
        assert_eq!(second.jitter_ms, 0.0);
        assert_eq!(second.p50_ms, 0.0);
        assert_eq!(second.p90_ms, 0.0);
        assert_eq!(second.p95_ms, 0.0);
        assert_eq!(second.p99_ms, 0.0);
        assert_eq!(second.ip, "");
    }

    #[test]
    fn missing_host_defaults_to_unknown() {
        let raw = r#"{"report": {"hubs": [{"count": 3, "Loss%": 100.0, "Snt": 10}]}}"#;
        let hops = parse_trace_report(raw).unwrap();
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].host, "Unknown");
        assert_eq!(hops[0].loss_pct, 100.0);
    }

    #[test]
    fn empty_hub_list_parses_to_empty_sequence() {
        let hops = parse_trace_report(r#"{"report": {"hubs": []}}"#).unwrap();
        assert!(hops.is_empty());

        let hops = parse_trace_report(r#"{"report": {}}"#).unwrap();
        assert!(hops.is_empty());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            parse_trace_report("not json"),
            Err(DiagnosticsError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn trace_route_failure_bumps_error_counter() {
        let metrics = MetricsCollector::new();
        // Invalid host name guarantees a non-success outcome whether or
        // not mtr is installed.
        let result = trace_route("", &metrics).await;
        assert!(result.is_err());
        assert_eq!(metrics.counter_value("diagnostics.traceroute.errors"), 1);
    }

    #[tokio::test]
    async fn connectivity_failure_returns_sentinel_not_error() {
        // Reserved TEST-NET-1 address; nothing listens there, and a
        // missing nc binary takes the same fail-soft path.
        let result = test_connectivity("192.0.2.1", 9).await;
        assert!(!result.success);
        assert_eq!(result.latency_ms, -1.0);
        let message = result.error.expect("failure carries a message");
        assert!(!message.is_empty());
    }

    #[test]
    fn connectivity_failure_constructor_sets_sentinel() {
        let result = ConnectivityResult::failure("refused".to_string());
        assert!(!result.success);
        assert_eq!(result.latency_ms, -1.0);
        assert_eq!(result.error.as_deref(), Some("refused"));
    }
}
