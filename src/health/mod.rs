// src/health/mod.rs
mod error;
mod result;
mod runner;
mod store;

pub use error::CheckError;
pub use result::{rfc3339_now, HealthCheckResult};
pub use runner::{split_command, CheckOutcome, CheckRunner};
pub use store::ResultStore;
