// src/lib.rs
pub mod config;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod scheduler;
pub mod server;
