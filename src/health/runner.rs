// src/health/runner.rs
use super::error::CheckError;
use super::result::{rfc3339_now, HealthCheckResult};
use super::store::ResultStore;
use crate::metrics::CheckMetrics;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex};
use tokio::time::{self, Duration, Instant};
use tracing::{debug, error};

/// How a single run was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Success,
    Failure,
    Timeout,
}

impl CheckOutcome {
    pub fn is_success(self) -> bool {
        self == CheckOutcome::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckOutcome::Success => "success",
            CheckOutcome::Failure => "failure",
            CheckOutcome::Timeout => "timeout",
        }
    }
}

/// Splits a command line on whitespace into program and arguments.
///
/// No quoting or escaping: `echo "a b"` yields the arguments `"a` and `b"`.
pub fn split_command(line: &str) -> Option<(&str, Vec<&str>)> {
    let mut fields = line.split_whitespace();
    let program = fields.next()?;
    Some((program, fields.collect()))
}

/// Runs the health-check command and publishes each outcome to a [`ResultStore`].
pub struct CheckRunner {
    store: ResultStore,
    run_lock: Arc<Mutex<()>>,
    metrics: Option<Arc<CheckMetrics>>,
}

impl CheckRunner {
    pub fn new(store: ResultStore) -> Self {
        Self {
            store,
            run_lock: Arc::new(Mutex::new(())),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<CheckMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Executes `command_line` once, bounded by `timeout`.
    ///
    /// Runs are serialised: a second call waits until the first one has
    /// published. On timeout a failure is stored straight away and the child
    /// is left running; when it exits it stores a failure again, never a
    /// success.
    pub async fn run_once(&self, command_line: &str, timeout: Duration) -> CheckOutcome {
        let _guard = self.run_lock.lock().await;

        let start = Instant::now();
        let timestamp = rfc3339_now();
        let settled = Arc::new(AtomicBool::new(false));
        let (done_tx, mut done_rx) = oneshot::channel();

        let worker = Worker {
            store: self.store.clone(),
            run_lock: self.run_lock.clone(),
            settled: settled.clone(),
            metrics: self.metrics.clone(),
            command_line: command_line.to_string(),
            timestamp: timestamp.clone(),
        };
        tokio::spawn(worker.run(done_tx));

        let outcome = match time::timeout(timeout, &mut done_rx).await {
            Ok(Ok(outcome)) => {
                debug!("Command {} had results", command_line);
                outcome
            }
            Ok(Err(_)) => {
                error!("Health check worker for {} exited without a result", command_line);
                self.store.store(HealthCheckResult::failed(command_line, timestamp));
                CheckOutcome::Failure
            }
            Err(_) => {
                if settle(&settled) {
                    debug!("Command {} reached timeout", command_line);
                    self.store.store(HealthCheckResult::failed(command_line, timestamp));
                    CheckOutcome::Timeout
                } else {
                    // exited between the deadline and the claim; its result stands
                    done_rx.await.unwrap_or(CheckOutcome::Failure)
                }
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_check(outcome, start.elapsed());
        }

        outcome
    }
}

/// State moved into the task that owns the child process.
struct Worker {
    store: ResultStore,
    run_lock: Arc<Mutex<()>>,
    settled: Arc<AtomicBool>,
    metrics: Option<Arc<CheckMetrics>>,
    command_line: String,
    timestamp: String,
}

impl Worker {
    async fn run(self, done: oneshot::Sender<CheckOutcome>) {
        let succeeded = match execute(&self.command_line).await {
            Ok(status) => status.success(),
            Err(e) => {
                debug!(error = %e, "Health check command could not be run");
                false
            }
        };

        if settle(&self.settled) {
            let outcome = if succeeded {
                debug!("Health check with command \"{}\", result: OK", self.command_line);
                CheckOutcome::Success
            } else {
                debug!("Health check with command \"{}\", result: KO", self.command_line);
                CheckOutcome::Failure
            };
            self.store
                .store(HealthCheckResult::new(succeeded, self.command_line, self.timestamp));
            let _ = done.send(outcome);
        } else {
            let _guard = self.run_lock.lock().await;
            debug!(
                "Health check with command \"{}\" finished after its timeout, result: KO",
                self.command_line
            );
            self.store
                .store(HealthCheckResult::failed(self.command_line, self.timestamp));
            if let Some(metrics) = &self.metrics {
                metrics.record_late_failure();
            }
        }
    }
}

/// Claims the right to decide a run. Exactly one of the worker and the
/// timeout path gets `true`.
fn settle(flag: &AtomicBool) -> bool {
    flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

async fn execute(command_line: &str) -> Result<ExitStatus, CheckError> {
    let (program, args) = split_command(command_line).ok_or(CheckError::EmptyCommand)?;

    Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|source| CheckError::Launch {
            program: program.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_command_whitespace_only() {
        assert_eq!(split_command("ls -l   /tmp"), Some(("ls", vec!["-l", "/tmp"])));
        assert_eq!(split_command("  true  "), Some(("true", vec![])));
        assert_eq!(split_command("echo \"a b\""), Some(("echo", vec!["\"a", "b\""])));
        assert_eq!(split_command("\t\n"), None);
        assert_eq!(split_command(""), None);
    }

    proptest! {
        #[test]
        fn prop_split_command_rejoins_to_normalized_line(words in prop::collection::vec("[a-z0-9/._-]{1,8}", 1..6)) {
            let line = words.join(" \t ");
            let (program, args) = split_command(&line).unwrap();
            prop_assert_eq!(program, words[0].as_str());
            prop_assert_eq!(args, words[1..].iter().map(String::as_str).collect::<Vec<_>>());
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let runner = CheckRunner::new(ResultStore::new());
        let outcome = runner.run_once("true", Duration::from_secs(3)).await;

        assert_eq!(outcome, CheckOutcome::Success);
        let result = runner.store().load();
        assert!(result.success());
        assert_eq!(result.command(), "true");
        assert!(!result.timestamp().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_arguments_are_passed() {
        let runner = CheckRunner::new(ResultStore::new());
        assert_eq!(
            runner.run_once("test  a =   a", Duration::from_secs(3)).await,
            CheckOutcome::Success
        );
        assert_eq!(runner.store().load().command(), "test  a =   a");
        assert_eq!(
            runner.run_once("test a = b", Duration::from_secs(3)).await,
            CheckOutcome::Failure
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let runner = CheckRunner::new(ResultStore::new());
        let outcome = runner.run_once("false", Duration::from_secs(3)).await;

        assert_eq!(outcome, CheckOutcome::Failure);
        assert!(!runner.store().load().success());
        assert_eq!(runner.store().load().command(), "false");
    }

    #[tokio::test]
    async fn test_launch_failure_is_failure() {
        let runner = CheckRunner::new(ResultStore::new());
        let outcome = runner
            .run_once("/nonexistent/ualive-check --flag", Duration::from_secs(3))
            .await;

        assert_eq!(outcome, CheckOutcome::Failure);
        let result = runner.store().load();
        assert!(!result.success());
        assert_eq!(result.command(), "/nonexistent/ualive-check --flag");
    }

    #[tokio::test]
    async fn test_empty_command_is_failure() {
        let runner = CheckRunner::new(ResultStore::new());
        assert_eq!(runner.run_once("   ", Duration::from_secs(1)).await, CheckOutcome::Failure);
        assert!(!runner.store().load().success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_reports_failure_and_late_success_does_not_revert() {
        let runner = CheckRunner::new(ResultStore::new());
        let start = std::time::Instant::now();
        let outcome = runner.run_once("sleep 1", Duration::from_millis(200)).await;

        assert_eq!(outcome, CheckOutcome::Timeout);
        assert!(start.elapsed() < Duration::from_millis(900));
        let at_timeout = runner.store().load();
        assert!(!at_timeout.success());
        assert_eq!(at_timeout.command(), "sleep 1");

        // `sleep 1` exits 0 after the deadline
        time::sleep(Duration::from_millis(1500)).await;
        let later = runner.store().load();
        assert!(!later.success());
        assert_eq!(later.timestamp(), at_timeout.timestamp());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_are_serialized() {
        let runner = Arc::new(CheckRunner::new(ResultStore::new()));
        let start = std::time::Instant::now();

        let first = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run_once("sleep 0.5", Duration::from_secs(3)).await })
        };
        let second = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run_once("sleep 0.5", Duration::from_secs(3)).await })
        };

        assert_eq!(first.await.unwrap(), CheckOutcome::Success);
        assert_eq!(second.await.unwrap(), CheckOutcome::Success);
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_records_metrics() {
        let registry = crate::metrics::MetricsRegistry::new().unwrap();
        let runner = CheckRunner::new(ResultStore::new()).with_metrics(registry.collector());

        runner.run_once("true", Duration::from_secs(3)).await;
        runner.run_once("false", Duration::from_secs(3)).await;

        let metrics = registry.collector();
        assert_eq!(metrics.checks_total.with_label_values(&["success"]).get(), 1);
        assert_eq!(metrics.checks_total.with_label_values(&["failure"]).get(), 1);
        assert_eq!(metrics.last_check_success.get(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_late_exit_after_timeout_clears_success_gauge() {
        let registry = crate::metrics::MetricsRegistry::new().unwrap();
        let runner = CheckRunner::new(ResultStore::new()).with_metrics(registry.collector());
        let metrics = registry.collector();

        assert_eq!(runner.run_once("sleep 1", Duration::from_millis(200)).await, CheckOutcome::Timeout);
        assert_eq!(runner.run_once("true", Duration::from_secs(3)).await, CheckOutcome::Success);
        assert_eq!(metrics.last_check_success.get(), 1);
        assert!(runner.store().load().success());

        // the abandoned `sleep 1` exits and overwrites the newer success
        time::sleep(Duration::from_millis(1500)).await;
        assert!(!runner.store().load().success());
        assert_eq!(runner.store().load().command(), "sleep 1");
        assert_eq!(metrics.last_check_success.get(), 0);
    }
}
