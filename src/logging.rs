// src/logging.rs
use tracing::Level;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LEVEL: Level = Level::INFO;

/// Maps a level name to a tracing level. `fatal` and `panic` collapse into
/// `error`, `warning` is accepted for `warn`.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" | "fatal" | "panic" => Some(Level::ERROR),
        _ => None,
    }
}

/// Filter for the given level name. Non-empty `rust_log` directives win;
/// an unknown level falls back to [`DEFAULT_LEVEL`].
fn build_filter(level: &str, rust_log: Option<&str>) -> anyhow::Result<(EnvFilter, Level)> {
    let effective = parse_level(level).unwrap_or(DEFAULT_LEVEL);

    let filter = match rust_log {
        Some(directives) if !directives.is_empty() => EnvFilter::try_new(directives)?,
        _ => EnvFilter::new(format!("ualive={},hyper=info", effective)),
    };
    Ok((filter, effective))
}

/// Install the global fmt subscriber. `RUST_LOG`, when set, overrides `level`.
pub fn init_tracing(level: &str) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (filter, effective) = build_filter(level, rust_log.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    if parse_level(level).is_none() {
        tracing::warn!("Invalid log level {}, using default {}", level, DEFAULT_LEVEL);
    }
    tracing::debug!("Log level set to {}", effective);
    Ok(())
}
