// src/metrics/mod.rs
mod collector;

pub use collector::{CheckMetrics, MetricsRegistry};
