#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Periodic-task host: one spawned loop per enabled [`ScheduledTask`], run
//! immediately and then on a fixed-interval ticker, until the scheduler is stopped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A periodically-run unit of work.
///
/// Implementors typically wrap one refresh or maintenance operation (the RSS refresh
/// pipeline, the download-dispatch queue's drain task, …). Per-invocation errors are
/// logged by the scheduler and never abort the task's next tick ("Scheduler tasks:
/// per-invocation errors are logged and the next tick proceeds").
#[async_trait]
pub trait ScheduledTask: Send + Sync + 'static {
    /// Operator-facing name, used in log lines.
    fn name(&self) -> &str;

    /// Interval between successive runs.
    fn interval(&self) -> Duration;

    /// Whether the task should currently be scheduled. Checked once at `start` time.
    fn enabled(&self) -> bool;

    /// Perform one unit of work. Errors are logged, not propagated.
    async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()>;
}

/// Hosts a fixed set of [`ScheduledTask`]s, running each on its own interval loop.
///
/// A single instance is meant to live for the lifetime of the program; `start` is
/// idempotent in the sense that calling it again while already started is a no-op
/// (mirrors the source's "a single process-global scheduler instance exists; re-init is
/// a no-op").
pub struct Scheduler {
    cancel: CancellationToken,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Build a scheduler with no tasks running yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Spawn one loop per enabled task. Disabled tasks are skipped entirely.
    ///
    /// Calling `start` a second time on an instance that already has running handles is
    /// a no-op — tasks are only ever spawned once per `Scheduler`.
    pub fn start(&self, tasks: Vec<Arc<dyn ScheduledTask>>) {
        let mut handles = self.handles.lock().expect("scheduler handle lock poisoned");
        if !handles.is_empty() {
            warn!("scheduler already started; ignoring redundant start() call");
            return;
        }

        for task in tasks {
            if !task.enabled() {
                info!(task = task.name(), "scheduled task disabled, not starting");
                continue;
            }
            let cancel = self.cancel.clone();
            handles.push(tokio::spawn(run_task_loop(task, cancel)));
        }
    }

    /// Cancel every running task loop and wait for them to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handles = {
            let mut guard = self.handles.lock().expect("scheduler handle lock poisoned");
            std::mem::take(&mut *guard)
        };
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "scheduled task loop panicked");
            }
        }
    }
}

async fn run_task_loop(task: Arc<dyn ScheduledTask>, cancel: CancellationToken) {
    let name = task.name().to_string();
    run_once(&*task, &cancel, &name).await;

    let mut ticker = tokio::time::interval(task.interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => run_once(&*task, &cancel, &name).await,
        }
    }
    info!(task = %name, "scheduled task loop exited");
}

async fn run_once(task: &dyn ScheduledTask, cancel: &CancellationToken, name: &str) {
    if let Err(err) = task.run(cancel.clone()).await {
        warn!(task = %name, error = %err, "scheduled task run failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct CountingTask {
        name: &'static str,
        interval: Duration,
        enabled: bool,
        runs: Arc<AtomicUsize>,
        notify: Arc<Notify>,
    }

    #[async_trait]
    impl ScheduledTask for CountingTask {
        fn name(&self) -> &str {
            self.name
        }

        fn interval(&self) -> Duration {
            self.interval
        }

        fn enabled(&self) -> bool {
            self.enabled
        }

        async fn run(&self, _ctx: CancellationToken) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.notify.notify_waiters();
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn enabled_task_runs_immediately_then_on_ticks() {
        let runs = Arc::new(AtomicUsize::new(0));
        let notify = Arc::new(Notify::new());
        let task: Arc<dyn ScheduledTask> = Arc::new(CountingTask {
            name: "refresh",
            interval: Duration::from_secs(60),
            enabled: true,
            runs: runs.clone(),
            notify: notify.clone(),
        });

        let scheduler = Scheduler::new();
        scheduler.start(vec![task]);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_task_never_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let notify = Arc::new(Notify::new());
        let task: Arc<dyn ScheduledTask> = Arc::new(CountingTask {
            name: "disabled",
            interval: Duration::from_secs(1),
            enabled: false,
            runs: runs.clone(),
            notify,
        });

        let scheduler = Scheduler::new();
        scheduler.start(vec![task]);
        tokio::time::advance(Duration::from_secs(5)).await;
        scheduler.stop().await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_further_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let notify = Arc::new(Notify::new());
        let task: Arc<dyn ScheduledTask> = Arc::new(CountingTask {
            name: "refresh",
            interval: Duration::from_secs(10),
            enabled: true,
            runs: runs.clone(),
            notify,
        });

        let scheduler = Scheduler::new();
        scheduler.start(vec![task]);
        tokio::time::sleep(Duration::from_millis(1)).await;
        scheduler.stop().await;

        let after_stop = runs.load(Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
    }
}
