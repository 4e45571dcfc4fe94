// Prometheus metrics for the webhook receiver and Graph client
//
// Exposed on /metrics when `[metrics] enabled = true`:
// - Webhook requests by method and outcome (counter)
// - Events normalized and items dropped (counter)
// - Handler invocations by category and status (counter)
// - Handler durations (histogram)
// - Graph API requests by endpoint and status (counter)

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Webhook endpoint metrics
    pub static ref WEBHOOK_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("webhook_requests_total", "Webhook requests by method and outcome"),
        &["method", "outcome"]
    ).expect("Failed to create webhook requests metric");

    pub static ref SIGNATURE_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "webhook_signature_failures_total",
        "Deliveries rejected for a missing or mismatched signature"
    ).expect("Failed to create signature failures metric");

    // Normalization metrics
    pub static ref EVENTS_NORMALIZED_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("webhook_events_normalized_total", "Canonical events produced by kind"),
        &["kind"]
    ).expect("Failed to create events normalized metric");

    pub static ref EVENTS_DROPPED_TOTAL: IntCounter = IntCounter::new(
        "webhook_events_dropped_total",
        "Payload items skipped because they were unrecognized or incomplete"
    ).expect("Failed to create events dropped metric");

    // Handler metrics
    pub static ref HANDLER_INVOCATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("webhook_handler_invocations_total", "Handler invocations by category and status"),
        &["category", "status"]
    ).expect("Failed to create handler invocations metric");

    pub static ref HANDLER_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("webhook_handler_duration_seconds", "Handler run time in seconds"),
        &["category"]
    ).expect("Failed to create handler duration metric");

    // Graph API metrics
    pub static ref GRAPH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("graph_requests_total", "Graph API requests by operation and status"),
        &["operation", "status"]
    ).expect("Failed to create graph requests metric");
}

/// Register every collector with [`REGISTRY`].
///
/// Safe to call more than once; collectors that are already registered are
/// left in place.
pub fn init() -> prometheus::Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(WEBHOOK_REQUESTS_TOTAL.clone()),
        Box::new(SIGNATURE_FAILURES_TOTAL.clone()),
        Box::new(EVENTS_NORMALIZED_TOTAL.clone()),
        Box::new(EVENTS_DROPPED_TOTAL.clone()),
        Box::new(HANDLER_INVOCATIONS_TOTAL.clone()),
        Box::new(HANDLER_DURATION_SECONDS.clone()),
        Box::new(GRAPH_REQUESTS_TOTAL.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init().unwrap();
        init().unwrap();
    }

    #[test]
    fn test_gathered_text_contains_webhook_metrics() {
        init().unwrap();
        WEBHOOK_REQUESTS_TOTAL.with_label_values(&["GET", "verified"]).inc();
        EVENTS_DROPPED_TOTAL.inc();

        let text = gather_metrics().unwrap();
        assert!(text.contains("webhook_requests_total"));
        assert!(text.contains("webhook_events_dropped_total"));
    }

    #[test]
    fn test_handler_counters_by_label() {
        let before = HANDLER_INVOCATIONS_TOTAL
            .with_label_values(&["comment", "error"])
            .get();
        HANDLER_INVOCATIONS_TOTAL
            .with_label_values(&["comment", "error"])
            .inc();
        assert_eq!(
            HANDLER_INVOCATIONS_TOTAL
                .with_label_values(&["comment", "error"])
                .get(),
            before + 1
        );
    }
}
