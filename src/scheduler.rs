use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{CafeError, Result};

/// A recurring background routine. One `run_once` is one sweep.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    async fn run_once(&self) -> Result<()>;
}

/// Per-record tally of one batch routine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl std::ops::AddAssign for BatchReport {
    fn add_assign(&mut self, other: Self) {
        self.updated += other.updated;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    /// A previous run of the same job was still in progress.
    Skipped,
}

/// Wraps a job with a guard so two runs of it never overlap.
#[derive(Clone)]
pub struct JobRunner {
    job: Arc<dyn Job>,
    running: Arc<Mutex<()>>,
}

impl JobRunner {
    pub fn new(job: Arc<dyn Job>) -> Self {
        Self {
            job,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.job.name()
    }

    /// Runs one sweep. Errors are logged here and never propagate.
    pub async fn try_run(&self) -> RunOutcome {
        let Ok(_guard) = self.running.try_lock() else {
            warn!(job = self.name(), "previous run still in progress; skipping");
            return RunOutcome::Skipped;
        };

        debug!(job = self.name(), "job started");
        match self.job.run_once().await {
            Ok(()) => RunOutcome::Completed,
            Err(e) => {
                error!(job = self.name(), error = %e, "job run failed");
                RunOutcome::Failed
            }
        }
    }
}

/// Owns the background tasks; `stop` cancels and joins them.
pub struct Scheduler {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Token cancelled by `stop`; children can drive other shutdown paths.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs `runner` now and then every `every`. A tick that comes due while
    /// a sweep is still running is dropped, not queued.
    pub fn start(&mut self, runner: JobRunner, every: Duration) {
        let token = self.cancel.child_token();
        info!(job = runner.name(), every_secs = every.as_secs(), "starting job");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!(job = runner.name(), "job shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        runner.try_run().await;
                    }
                }
            }
        });
        self.tasks.push(handle);
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "job task panicked");
            }
        }
    }
}

/// Bounds one collaborator call; failures and timeouts become `ExternalCall`.
pub async fn call_with_timeout<T, F>(op: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(CafeError::external(op, format!("{e:#}"))),
        Err(_) => Err(CafeError::external(
            op,
            format!("timed out after {}ms", limit.as_millis()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct CountingJob {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run_once(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CafeError::external("fetch", "down"));
            }
            Ok(())
        }
    }

    struct BlockingJob {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Job for BlockingJob {
        fn name(&self) -> &'static str {
            "blocking"
        }

        async fn run_once(&self) -> Result<()> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn overlapping_run_is_skipped() {
        let job = Arc::new(BlockingJob {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let runner = JobRunner::new(job.clone());

        let first = tokio::spawn({
            let runner = runner.clone();
            async move { runner.try_run().await }
        });
        job.entered.notified().await;

        assert_eq!(runner.try_run().await, RunOutcome::Skipped);

        job.release.notify_one();
        assert_eq!(first.await.unwrap(), RunOutcome::Completed);
    }

    #[tokio::test]
    async fn failed_run_is_reported_not_raised() {
        let runner = JobRunner::new(Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            fail: true,
        }));
        assert_eq!(runner.try_run().await, RunOutcome::Failed);
        assert_eq!(runner.try_run().await, RunOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_ticking_after_failures_and_stops_cleanly() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            fail: true,
        });
        let mut scheduler = Scheduler::new();
        scheduler.start(JobRunner::new(job.clone()), Duration::from_secs(60));

        // first tick fires immediately, then one per minute
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);

        let token = scheduler.token();
        scheduler.stop().await;
        assert!(token.is_cancelled());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let res: Result<()> = call_with_timeout("update_cafe", Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await;
        match res {
            Err(CafeError::ExternalCall(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn collaborator_error_becomes_external_call() {
        let res: Result<u8> = call_with_timeout("get_all_cafes", Duration::from_secs(1), async {
            Err(anyhow::anyhow!("connection refused"))
        })
        .await;
        assert!(matches!(res, Err(CafeError::ExternalCall(m)) if m.contains("connection refused")));
    }
}
