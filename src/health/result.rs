// src/health/result.rs
use chrono::{Local, SecondsFormat};
use serde::Serialize;

/// Outcome of one execution of the health-check command.
///
/// Only `command` and `timestamp` are serialised; the success flag is
/// carried by the HTTP status code of the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthCheckResult {
    #[serde(skip)]
    success: bool,
    command: String,
    timestamp: String,
}

impl HealthCheckResult {
    pub fn new(success: bool, command: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            success,
            command: command.into(),
            timestamp: timestamp.into(),
        }
    }

    pub fn failed(command: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self::new(false, command, timestamp)
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

/// Current wall-clock time as RFC 3339 in the local zone, whole seconds.
pub fn rfc3339_now() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_default_result_is_unknown() {
        let result = HealthCheckResult::default();
        assert!(!result.success());
        assert_eq!(result.command(), "");
        assert_eq!(result.timestamp(), "");
    }

    #[test]
    fn test_success_flag_is_not_serialized() {
        let result = HealthCheckResult::new(true, "true", "2024-01-01T00:00:00Z");
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"command":"true","timestamp":"2024-01-01T00:00:00Z"}"#);
    }

    #[test]
    fn test_timestamp_is_rfc3339() {
        let ts = rfc3339_now();
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok(), "bad timestamp {ts}");
        assert!(!ts.contains('.'));
    }
}
