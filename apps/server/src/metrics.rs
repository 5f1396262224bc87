//! Prometheus metrics

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new_custom(Some("outofschool".into()), None)
        .unwrap_or_default();

    pub static ref HTTP_REQUESTS: IntCounterVec = register_counter_vec(
        "http_requests_total",
        "HTTP requests handled, by method and status code",
        &["method", "status"],
    );

    pub static ref APPLICATIONS_CREATED: IntCounter = register_counter(
        "applications_created_total",
        "Applications successfully created",
    );

    pub static ref APPLICATION_STATUS_CHANGES: IntCounterVec = register_counter_vec(
        "application_status_changes_total",
        "Application status transitions, by target status",
        &["status"],
    );

    pub static ref NOTIFICATIONS_CREATED: IntCounter = register_counter(
        "notifications_created_total",
        "Notification rows written",
    );

    pub static ref SEARCH_SYNC_OPERATIONS: IntCounterVec = register_counter_vec(
        "search_sync_operations_total",
        "Search index synchronization steps, by operation and outcome",
        &["operation", "outcome"],
    );
}

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::with_opts(Opts::new(name, help))
        .unwrap_or_else(|e| panic!("invalid metric definition {name}: {e}"));
    if let Err(e) = REGISTRY.register(Box::new(counter.clone())) {
        tracing::warn!(metric = name, error = %e, "Failed to register metric");
    }
    counter
}

fn register_counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)
        .unwrap_or_else(|e| panic!("invalid metric definition {name}: {e}"));
    if let Err(e) = REGISTRY.register(Box::new(counter.clone())) {
        tracing::warn!(metric = name, error = %e, "Failed to register metric");
    }
    counter
}

/// Render all registered metrics plus process metrics in text exposition format.
pub fn render() -> crate::Result<String> {
    let mut families = REGISTRY.gather();
    families.extend(prometheus::gather());

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buffer)
        .map_err(|e| crate::Error::Internal(format!("Failed to encode metrics: {e}")))?;

    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Internal(format!("Metrics are not valid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_metrics_include_registered_counters() {
        APPLICATIONS_CREATED.inc();
        HTTP_REQUESTS.with_label_values(&["GET", "200"]).inc();

        let text = render().unwrap();
        assert!(text.contains("outofschool_applications_created_total"));
        assert!(text.contains("outofschool_http_requests_total"));
    }
}
