// src/metrics/collector.rs
use crate::health::CheckOutcome;
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<CheckMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(CheckMetrics::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<CheckMetrics> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct CheckMetrics {
    pub checks_total: IntCounterVec,
    pub check_duration_seconds: Histogram,
    pub last_check_success: IntGauge,
    pub status_requests_total: IntCounterVec,
}

impl CheckMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let checks_total = IntCounterVec::new(
            Opts::new("ualive_checks_total", "Health check runs by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let check_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "ualive_check_duration_seconds",
            "Time until a health check run was decided",
        ))?;
        registry.register(Box::new(check_duration_seconds.clone()))?;

        let last_check_success = IntGauge::new(
            "ualive_last_check_success",
            "Outcome of the last decided run (1=success, 0=failure)",
        )?;
        registry.register(Box::new(last_check_success.clone()))?;

        let status_requests_total = IntCounterVec::new(
            Opts::new("ualive_status_requests_total", "Status endpoint responses by code"),
            &["code"],
        )?;
        registry.register(Box::new(status_requests_total.clone()))?;

        Ok(Self {
            checks_total,
            check_duration_seconds,
            last_check_success,
            status_requests_total,
        })
    }

    pub fn record_check(&self, outcome: CheckOutcome, duration: Duration) {
        self.checks_total
            .with_label_values(&[outcome.as_str()])
            .inc();
        self.check_duration_seconds.observe(duration.as_secs_f64());
        self.last_check_success
            .set(if outcome.is_success() { 1 } else { 0 });
    }

    /// A timed-out run's child exited and re-published its failure.
    pub fn record_late_failure(&self) {
        self.last_check_success.set(0);
    }

    pub fn record_status_request(&self, code: u16) {
        self.status_requests_total
            .with_label_values(&[&code.to_string()])
            .inc();
    }
}
