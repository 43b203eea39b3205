// src/health/store.rs
use super::result::HealthCheckResult;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Single-slot holder for the latest [`HealthCheckResult`].
///
/// Cloning yields another handle to the same slot. Writers swap a whole
/// new value in; readers get an `Arc` snapshot without taking a lock.
#[derive(Debug, Clone)]
pub struct ResultStore {
    current: Arc<ArcSwap<HealthCheckResult>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(HealthCheckResult::default())),
        }
    }

    pub fn store(&self, result: HealthCheckResult) {
        self.current.store(Arc::new(result));
    }

    pub fn load(&self) -> Arc<HealthCheckResult> {
        self.current.load_full()
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}
