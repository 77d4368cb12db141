//! Metrics collection for readiness-service.
//!
//! HTTP request metrics go through the `metrics` facade and the Prometheus
//! exporter; service counters live in a `prometheus` registry. `/metrics`
//! renders both.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{HistogramOpts, HistogramTimer, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static SERVICE_METRICS: OnceLock<ServiceMetrics> = OnceLock::new();

struct ServiceMetrics {
    registry: Registry,
    sessions_created: IntCounterVec,
    chat_initializations: IntCounterVec,
    chat_turns: IntCounterVec,
    snapshots_generated: IntCounterVec,
    emails_sent: IntCounterVec,
    agent_calls: IntCounterVec,
    db_query_duration: HistogramVec,
}

impl ServiceMetrics {
    fn build() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let sessions_created = IntCounterVec::new(
            Opts::new("readiness_sessions_created_total", "Sessions created"),
            &["status"],
        )?;
        let chat_initializations = IntCounterVec::new(
            Opts::new(
                "readiness_chat_initializations_total",
                "Chat initializations by outcome (created, existing)",
            ),
            &["outcome"],
        )?;
        let chat_turns = IntCounterVec::new(
            Opts::new("readiness_chat_turns_total", "Chat turns by current domain"),
            &["domain"],
        )?;
        let snapshots_generated = IntCounterVec::new(
            Opts::new("readiness_snapshots_generated_total", "Snapshots generated"),
            &["status"],
        )?;
        let emails_sent = IntCounterVec::new(
            Opts::new("readiness_snapshot_emails_total", "Snapshot emails by status"),
            &["status"],
        )?;
        // No session_id label; it would explode cardinality.
        let agent_calls = IntCounterVec::new(
            Opts::new(
                "readiness_agent_calls_total",
                "Conversation agent calls by agent, operation and status",
            ),
            &["agent", "operation", "status"],
        )?;
        let db_query_duration = HistogramVec::new(
            HistogramOpts::new(
                "readiness_db_query_duration_seconds",
                "Database query duration in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["operation"],
        )?;

        registry.register(Box::new(sessions_created.clone()))?;
        registry.register(Box::new(chat_initializations.clone()))?;
        registry.register(Box::new(chat_turns.clone()))?;
        registry.register(Box::new(snapshots_generated.clone()))?;
        registry.register(Box::new(emails_sent.clone()))?;
        registry.register(Box::new(agent_calls.clone()))?;
        registry.register(Box::new(db_query_duration.clone()))?;

        Ok(Self {
            registry,
            sessions_created,
            chat_initializations,
            chat_turns,
            snapshots_generated,
            emails_sent,
            agent_calls,
            db_query_duration,
        })
    }
}

/// Initialize metrics collection. Safe to call more than once.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_none() {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                let _ = METRICS_HANDLE.set(handle);
            }
            Err(e) => tracing::warn!("Prometheus recorder not installed: {}", e),
        }
    }

    if SERVICE_METRICS.get().is_none() {
        match ServiceMetrics::build() {
            Ok(metrics) => {
                let _ = SERVICE_METRICS.set(metrics);
            }
            Err(e) => tracing::warn!("Service metrics not registered: {}", e),
        }
    }
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(metrics) = SERVICE_METRICS.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = metrics.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

pub fn record_session_created(status: &str) {
    if let Some(m) = SERVICE_METRICS.get() {
        m.sessions_created.with_label_values(&[status]).inc();
    }
}

pub fn record_chat_initialization(outcome: &str) {
    if let Some(m) = SERVICE_METRICS.get() {
        m.chat_initializations.with_label_values(&[outcome]).inc();
    }
}

pub fn record_chat_turn(domain: &str) {
    if let Some(m) = SERVICE_METRICS.get() {
        m.chat_turns.with_label_values(&[domain]).inc();
    }
}

pub fn record_snapshot_generated(status: &str) {
    if let Some(m) = SERVICE_METRICS.get() {
        m.snapshots_generated.with_label_values(&[status]).inc();
    }
}

pub fn record_email_sent(status: &str) {
    if let Some(m) = SERVICE_METRICS.get() {
        m.emails_sent.with_label_values(&[status]).inc();
    }
}

pub fn record_agent_call(agent: &str, operation: &str, status: &str) {
    if let Some(m) = SERVICE_METRICS.get() {
        m.agent_calls
            .with_label_values(&[agent, operation, status])
            .inc();
    }
}

/// Query timer; the duration is observed when the timer is dropped.
pub fn start_db_timer(operation: &str) -> Option<HistogramTimer> {
    SERVICE_METRICS.get().map(|m| {
        m.db_query_duration
            .with_label_values(&[operation])
            .start_timer()
    })
}
