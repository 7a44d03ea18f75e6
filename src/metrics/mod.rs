// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::routes;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order placement (throughput, rejections by reason, latency)
// - Order and payment status transitions
// - Payments recorded per method
// - Retry attempts on transient storage failures
//
// All metrics are registered with one Registry and scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub orders_placed: IntCounter,
    pub order_rejections: IntCounterVec,
    pub order_placement_duration: HistogramVec,
    pub order_status_transitions: IntCounterVec,

    // Payment Metrics
    pub payments_recorded: IntCounterVec,
    pub payment_status_transitions: IntCounterVec,

    // Retry Metrics
    pub retry_attempts_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Order Metrics
        let orders_placed = IntCounter::new("orders_placed_total", "Total orders placed")?;
        registry.register(Box::new(orders_placed.clone()))?;

        let order_rejections = IntCounterVec::new(
            Opts::new("order_rejections_total", "Order placements rejected"),
            &["reason"],
        )?;
        registry.register(Box::new(order_rejections.clone()))?;

        let order_placement_duration = HistogramVec::new(
            HistogramOpts::new("order_placement_duration_seconds", "Order placement duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(order_placement_duration.clone()))?;

        let order_status_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(order_status_transitions.clone()))?;

        // Payment Metrics
        let payments_recorded = IntCounterVec::new(
            Opts::new("payments_recorded_total", "Payments recorded"),
            &["method"],
        )?;
        registry.register(Box::new(payments_recorded.clone()))?;

        let payment_status_transitions = IntCounterVec::new(
            Opts::new("payment_status_transitions_total", "Payment status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(payment_status_transitions.clone()))?;

        // Retry Metrics
        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        Ok(Self {
            registry,
            orders_placed,
            order_rejections,
            order_placement_duration,
            order_status_transitions,
            payments_recorded,
            payment_status_transitions,
            retry_attempts_total,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a successful placement
    pub fn record_order_placed(&self, duration_secs: f64) {
        self.orders_placed.inc();
        self.order_placement_duration.with_label_values(&["placed"]).observe(duration_secs);
    }

    /// Helper to record a rejected placement
    pub fn record_order_rejected(&self, reason: &str, duration_secs: f64) {
        self.order_rejections.with_label_values(&[reason]).inc();
        self.order_placement_duration.with_label_values(&["rejected"]).observe(duration_secs);
    }

    pub fn record_order_transition(&self, from: &str, to: &str) {
        self.order_status_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_payment(&self, method: &str) {
        self.payments_recorded.with_label_values(&[method]).inc();
    }

    pub fn record_payment_transition(&self, from: &str, to: &str) {
        self.payment_status_transitions.with_label_values(&[from, to]).inc();
    }

    /// Helper to record retry attempt
    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total.with_label_values(&[operation, &attempt.to_string()]).inc();
    }
}
