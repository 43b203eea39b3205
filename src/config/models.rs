// src/config/models.rs
use crate::scheduler::{Schedule, ScheduleError};
use clap::Parser;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Health check command must not be empty")]
    EmptyCommand,

    #[error("Timeout must be at least one second")]
    ZeroTimeout,

    #[error("Invalid periodicity: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Invalid bind address {addr:?}: {reason}")]
    BindAddress { addr: String, reason: String },

    #[error("Resource path {0:?} must start with '/'")]
    ResourcePath(String),
}

/// Runs a health-check command on a schedule and serves its latest result over HTTP.
#[derive(Debug, Clone, Parser)]
#[command(name = "ualive", version)]
pub struct Config {
    /// Command to run to perform the health check
    #[arg(long, env = "UALIVE_COMMAND")]
    pub command: String,

    /// Timeout in seconds for the health-check command
    #[arg(long, env = "UALIVE_TIMEOUT", default_value_t = 3)]
    pub timeout: u64,

    /// Health-check periodicity: cron expression or `@every <duration>`
    #[arg(long, env = "UALIVE_PERIODICITY", default_value = "@every 1s")]
    pub periodicity: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "UALIVE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Address to bind to
    #[arg(long, env = "UALIVE_BIND", default_value = ":8080")]
    pub bind: String,

    /// Name of the HTTP resource that delivers health-check results
    #[arg(long, env = "UALIVE_RESOURCE_NAME", default_value = "/health")]
    pub resource_name: String,

    /// Address for the Prometheus metrics listener (disabled when unset)
    #[arg(long, env = "UALIVE_METRICS_BIND")]
    pub metrics_bind: Option<String>,

    /// Path of the Prometheus metrics resource
    #[arg(long, env = "UALIVE_METRICS_PATH", default_value = "/metrics")]
    pub metrics_path: String,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        if self.timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        self.schedule()?;
        self.bind_addr()?;
        self.metrics_addr()?;
        for path in [&self.resource_name, &self.metrics_path] {
            if !path.starts_with('/') {
                return Err(ConfigError::ResourcePath(path.clone()));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn schedule(&self) -> Result<Schedule, ConfigError> {
        Ok(self.periodicity.parse()?)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_bind_addr(&self.bind)
    }

    pub fn metrics_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        self.metrics_bind.as_deref().map(parse_bind_addr).transpose()
    }
}

/// Resolves a listen address. A bare `:port` listens on every IPv4 interface.
pub fn parse_bind_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
    let err = |reason: String| ConfigError::BindAddress {
        addr: addr.to_string(),
        reason,
    };

    let full = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };

    if let Ok(parsed) = full.parse::<SocketAddr>() {
        return Ok(parsed);
    }

    full.to_socket_addrs()
        .map_err(|e| err(e.to_string()))?
        .next()
        .ok_or_else(|| err("no addresses resolved".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["ualive"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--command", "true"]);
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.periodicity, "@every 1s");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.bind_addr().unwrap(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.resource_name, "/health");
        assert!(config.metrics_addr().unwrap().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_command_is_required() {
        assert!(Config::try_parse_from(["ualive"]).is_err());
    }

    #[test]
    fn test_blank_command_is_rejected() {
        let config = parse(&["--command", "   "]);
        assert!(matches!(config.validate(), Err(ConfigError::EmptyCommand)));
    }

    #[test]
    fn test_malformed_periodicity_is_rejected() {
        let config = parse(&["--command", "true", "--periodicity", "every second"]);
        assert!(matches!(config.validate(), Err(ConfigError::Schedule(_))));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = parse(&["--command", "true", "--timeout", "0"]);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn test_resource_path_must_be_absolute() {
        let config = parse(&["--command", "true", "--resource-name", "health"]);
        assert!(matches!(config.validate(), Err(ConfigError::ResourcePath(_))));
    }

    #[test]
    fn test_parse_bind_addr() {
        assert_eq!(parse_bind_addr(":9000").unwrap(), "0.0.0.0:9000".parse().unwrap());
        assert_eq!(parse_bind_addr("127.0.0.1:80").unwrap(), "127.0.0.1:80".parse().unwrap());
        assert_eq!(parse_bind_addr("[::1]:80").unwrap(), "[::1]:80".parse().unwrap());
        assert!(parse_bind_addr("localhost:81").unwrap().ip().is_loopback());
        assert!(parse_bind_addr("nonsense").is_err());
    }
}
