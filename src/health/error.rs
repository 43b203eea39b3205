// src/health/error.rs

/// Reasons a health-check command could not be started.
///
/// These never leave the runner; they are logged and recorded as a failed
/// check.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("Health check command is empty")]
    EmptyCommand,

    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
