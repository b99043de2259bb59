//! Prometheus counters for token lifecycle events.
//!
//! Each [`Metrics`] owns its registry, so several service instances (tests,
//! CLI commands) can coexist in one process. `GET /metrics` renders it.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::service::Consumption;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    created_total: IntCounter,
    create_conflicts_total: IntCounter,
    consumed_total: IntCounterVec,
    rejected_total: IntCounterVec,
}

/// Why a presented token was turned away.
#[derive(Debug, Clone, Copy)]
pub enum Rejection {
    NotFound,
    Unavailable,
}

impl Rejection {
    fn as_label(self) -> &'static str {
        match self {
            Rejection::NotFound => "not_found",
            Rejection::Unavailable => "unavailable",
        }
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let created_total =
            IntCounter::new("privateurl_created_total", "Total private urls created")
                .expect("valid metric definition");
        let create_conflicts_total = IntCounter::new(
            "privateurl_create_conflicts_total",
            "Token collisions retried during creation",
        )
        .expect("valid metric definition");
        let consumed_total = IntCounterVec::new(
            Opts::new("privateurl_consumed_total", "Successful token consumptions"),
            &["outcome"],
        )
        .expect("valid metric definition");
        let rejected_total = IntCounterVec::new(
            Opts::new("privateurl_rejected_total", "Presented tokens that were refused"),
            &["reason"],
        )
        .expect("valid metric definition");

        for collector in [
            Box::new(created_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(create_conflicts_total.clone()),
            Box::new(consumed_total.clone()),
            Box::new(rejected_total.clone()),
        ] {
            registry
                .register(collector)
                .expect("metric names are unique within a fresh registry");
        }

        Self {
            registry,
            created_total,
            create_conflicts_total,
            consumed_total,
            rejected_total,
        }
    }

    pub fn created(&self) {
        self.created_total.inc();
    }

    pub fn create_conflict(&self) {
        self.create_conflicts_total.inc();
    }

    pub fn consumed(&self, outcome: Consumption) {
        let label = match outcome {
            Consumption::Recorded => "recorded",
            Consumption::Deleted => "deleted",
        };
        self.consumed_total.with_label_values(&[label]).inc();
    }

    pub fn rejected(&self, reason: Rejection) {
        self.rejected_total
            .with_label_values(&[reason.as_label()])
            .inc();
    }

    /// Prometheus text exposition of all counters.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::error!("failed to encode metrics: {}", e);
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        let metrics = Metrics::new();
        metrics.created();
        metrics.consumed(Consumption::Deleted);
        metrics.rejected(Rejection::NotFound);

        let text = metrics.render();
        assert!(text.contains("privateurl_created_total 1"));
        assert!(text.contains(r#"privateurl_consumed_total{outcome="deleted"} 1"#));
        assert!(text.contains(r#"privateurl_rejected_total{reason="not_found"} 1"#));
    }

    #[test]
    fn test_instances_do_not_share_registry() {
        let a = Metrics::new();
        let b = Metrics::new();
        a.created();
        assert!(b.render().contains("privateurl_created_total 0"));
    }
}
