pub mod builder;
pub mod handler;
pub mod metrics;

pub use builder::ServerBuilder;
pub use handler::StatusHandler;
pub use metrics::MetricsHandler;
