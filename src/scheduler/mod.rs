// src/scheduler/mod.rs
mod schedule;

pub use schedule::{Schedule, ScheduleError};

use chrono::Local;
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

/// Fires a job on a [`Schedule`] from a background task.
///
/// Every firing spawns the job as its own task, so a job that is still
/// running never delays the next firing. Overlapping jobs must coordinate
/// among themselves. Dropping the scheduler stops it.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn start<F, Fut>(schedule: Schedule, job: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(schedule, job, shutdown_rx));
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Halts future firings. Jobs already running are left to finish.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn run<F, Fut>(schedule: Schedule, job: F, mut shutdown_rx: watch::Receiver<bool>)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    info!("Starting scheduler with schedule {}", schedule);
    let mut last_fired = None;

    loop {
        let now = Local::now();
        // the timer may wake a hair before the wall clock reaches `next`
        let from = match last_fired {
            Some(last) if last > now => last,
            _ => now,
        };
        let Some(next) = schedule.next_after(from) else {
            warn!("Schedule {} has no upcoming runs, scheduler stopping", schedule);
            break;
        };
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = time::sleep(wait) => {
                debug!("Scheduled run due at {}", next.to_rfc3339());
                last_fired = Some(next);
                tokio::spawn(job());
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Scheduler shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counting_job(counter: &Arc<AtomicUsize>) -> impl Fn() -> futures::future::Ready<()> + Send + Sync + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    #[tokio::test]
    async fn test_fires_on_interval() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::start(Schedule::every(Duration::from_secs(1)), counting_job(&counter));

        // first firing is one interval after start, not immediately
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_millis(2600)).await;
        let fired = counter.load(Ordering::SeqCst);
        assert!((2..=3).contains(&fired), "fired {fired} times");

        scheduler.stop();
    }

    #[tokio::test]
    async fn test_stop_halts_future_firings() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::start(Schedule::every(Duration::from_secs(1)), counting_job(&counter));

        time::sleep(Duration::from_millis(1200)).await;
        scheduler.stop();
        time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.is_finished());

        let fired = counter.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), fired);
    }

    #[tokio::test]
    async fn test_drop_stops_scheduler() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::start(Schedule::every(Duration::from_secs(1)), counting_job(&counter));

        time::sleep(Duration::from_millis(1200)).await;
        drop(scheduler);
        time::sleep(Duration::from_millis(50)).await;

        let fired = counter.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), fired);
    }

    #[tokio::test]
    async fn test_slow_job_does_not_delay_firings() {
        let started = Arc::new(AtomicUsize::new(0));
        let job = {
            let started = started.clone();
            move || {
                let started = started.clone();
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    time::sleep(Duration::from_secs(5)).await;
                }
            }
        };
        let scheduler = Scheduler::start(Schedule::every(Duration::from_secs(1)), job);

        time::sleep(Duration::from_millis(2600)).await;
        assert!(started.load(Ordering::SeqCst) >= 2);
        scheduler.stop();
    }
}
