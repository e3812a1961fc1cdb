mod server;

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
};

pub use server::start_metrics_server;

// ============================================================================
// Metrics - Prometheus registry for the registry service
// ============================================================================
//
// Covers the write path (lifecycle outcomes, billing latency, swallowed
// publish failures), the consumer (handled vs skipped events) and the
// circuit breakers guarding remote dependencies. Scraped via /metrics.
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Lifecycle
    pub lifecycle_operations: IntCounterVec,
    pub lifecycle_failures: IntCounterVec,
    pub provisioning_duration: Histogram,
    pub publish_failures: IntCounterVec,

    // Consumer
    pub events_consumed: IntCounter,
    pub events_skipped: IntCounterVec,

    // Circuit breakers
    pub circuit_breaker_state: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let lifecycle_operations = IntCounterVec::new(
            Opts::new("subject_lifecycle_operations_total", "Successful subject lifecycle operations"),
            &["operation"],
        )?;
        registry.register(Box::new(lifecycle_operations.clone()))?;

        let lifecycle_failures = IntCounterVec::new(
            Opts::new("subject_lifecycle_failures_total", "Failed subject lifecycle operations"),
            &["operation", "kind"],
        )?;
        registry.register(Box::new(lifecycle_failures.clone()))?;

        let provisioning_duration = Histogram::with_opts(
            HistogramOpts::new("provisioning_duration_seconds", "Billing account provisioning latency")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(provisioning_duration.clone()))?;

        let publish_failures = IntCounterVec::new(
            Opts::new("publish_failures_total", "Change events that failed to publish"),
            &["reason"],
        )?;
        registry.register(Box::new(publish_failures.clone()))?;

        let events_consumed = IntCounter::new(
            "events_consumed_total",
            "Subject events decoded and handled",
        )?;
        registry.register(Box::new(events_consumed.clone()))?;

        let events_skipped = IntCounterVec::new(
            Opts::new("events_skipped_total", "Subject events skipped and sent to the dead letter queue"),
            &["reason"],
        )?;
        registry.register(Box::new(events_skipped.clone()))?;

        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new("circuit_breaker_state", "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)"),
            &["breaker"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            lifecycle_operations,
            lifecycle_failures,
            provisioning_duration,
            publish_failures,
            events_consumed,
            events_skipped,
            circuit_breaker_state,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_lifecycle_success(&self, operation: &str) {
        self.lifecycle_operations.with_label_values(&[operation]).inc();
    }

    pub fn record_lifecycle_failure(&self, operation: &str, kind: &str) {
        self.lifecycle_failures.with_label_values(&[operation, kind]).inc();
    }

    pub fn observe_provisioning(&self, duration_secs: f64) {
        self.provisioning_duration.observe(duration_secs);
    }

    pub fn record_publish_failure(&self, reason: &str) {
        self.publish_failures.with_label_values(&[reason]).inc();
    }

    pub fn record_event_consumed(&self) {
        self.events_consumed.inc();
    }

    pub fn record_event_skipped(&self, reason: &str) {
        self.events_skipped.with_label_values(&[reason]).inc();
    }

    pub fn update_circuit_breaker_state(&self, breaker: &str, state: i64) {
        self.circuit_breaker_state.with_label_values(&[breaker]).set(state);
    }
}
