// Regression - app/scheduler.rs
//
// Periodic ingestion: runs `IngestionService::run_pass` on a background
// thread every interval, first pass immediately.
//
// Architecture:
//   - `IngestionScheduler` lives on the caller's thread; `run_schedule` owns
//     the service on a single background thread, so passes never overlap.
//   - An `Arc<AtomicBool>` cancel flag stops the loop; a second flag asks for
//     an immediate pass; a third tells callers whether a pass is running.
//   - Progress is sent as `SchedulerProgress` messages over an mpsc channel
//     and drained with `poll_progress`.
//   - The wait between passes sleeps in SCHEDULER_CHECK_INTERVAL_MS slices so
//     stop and trigger requests are seen promptly.
//
// A failed pass is logged and reported; the next tick simply tries again.

use crate::app::ingest::IngestionService;
use crate::core::model::IngestionReport;
use crate::core::store::{DataSourceRegistry, LogStore};
use crate::util::constants::SCHEDULER_CHECK_INTERVAL_MS;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Messages sent from the scheduler thread.
#[derive(Debug, Clone)]
pub enum SchedulerProgress {
    /// The loop is running; the first pass starts now.
    Started { interval: Duration },

    /// A pass finished. `pass` counts from 1.
    PassCompleted { pass: u64, report: IngestionReport },

    /// A pass failed; the error is rendered with its cause.
    PassFailed { pass: u64, message: String },

    /// `trigger_now` was called while a pass was running and was dropped.
    PassSkipped,

    /// The loop exited.
    Stopped,
}

/// Drives ingestion passes on a background thread.
pub struct IngestionScheduler {
    /// Channel receiver for progress messages.
    pub progress_rx: Option<mpsc::Receiver<SchedulerProgress>>,
    progress_tx: Option<mpsc::Sender<SchedulerProgress>>,
    cancel_flag: Option<Arc<AtomicBool>>,
    trigger_flag: Arc<AtomicBool>,
    running_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl IngestionScheduler {
    pub fn new() -> Self {
        Self {
            progress_rx: None,
            progress_tx: None,
            cancel_flag: None,
            trigger_flag: Arc::new(AtomicBool::new(false)),
            running_flag: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Start the loop. The service moves onto the background thread.
    ///
    /// `max_passes` stops the loop after that many passes (successful or
    /// not); `None` runs until `stop`. A running loop is stopped first.
    pub fn start<R, S>(
        &mut self,
        service: IngestionService<R, S>,
        interval: Duration,
        max_passes: Option<u64>,
    ) where
        R: DataSourceRegistry + Send + 'static,
        S: LogStore + Send + 'static,
    {
        self.stop();

        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        self.trigger_flag.store(false, Ordering::SeqCst);

        self.progress_rx = Some(rx);
        self.progress_tx = Some(tx.clone());
        self.cancel_flag = Some(Arc::clone(&cancel));

        let flags = LoopFlags {
            cancel,
            trigger: Arc::clone(&self.trigger_flag),
            running: Arc::clone(&self.running_flag),
        };
        self.handle = Some(std::thread::spawn(move || {
            run_schedule(service, interval, max_passes, tx, flags);
        }));

        tracing::info!(interval_secs = interval.as_secs_f64(), ?max_passes, "Scheduler started");
    }

    /// Ask for a pass now instead of at the next tick.
    ///
    /// Returns `false` (and reports `PassSkipped`) when a pass is already in
    /// progress or the scheduler is not running.
    pub fn trigger_now(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        if self.running_flag.load(Ordering::SeqCst) {
            tracing::debug!("Pass already running; trigger skipped");
            if let Some(tx) = &self.progress_tx {
                let _ = tx.send(SchedulerProgress::PassSkipped);
            }
            return false;
        }
        self.trigger_flag.store(true, Ordering::SeqCst);
        true
    }

    /// Stop the loop and wait for the thread to exit.
    ///
    /// A pass in progress is finished first. The progress channel stays open
    /// so the final `Stopped` message can still be polled.
    pub fn stop(&mut self) {
        if let Some(flag) = self.cancel_flag.take() {
            flag.store(true, Ordering::SeqCst);
        }
        self.join();
    }

    /// Block until the loop exits on its own (after `max_passes`).
    pub fn join(&mut self) {
        self.progress_tx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Scheduler thread panicked");
            }
        }
        self.cancel_flag = None;
    }

    /// Returns `true` while the background thread is running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Returns `true` while a pass is executing.
    pub fn is_pass_running(&self) -> bool {
        self.running_flag.load(Ordering::SeqCst)
    }

    /// Drain all queued progress messages without blocking.
    pub fn poll_progress(&self) -> Vec<SchedulerProgress> {
        let mut messages = Vec::new();
        if let Some(ref rx) = self.progress_rx {
            while let Ok(msg) = rx.try_recv() {
                messages.push(msg);
            }
        }
        messages
    }
}

impl Default for IngestionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IngestionScheduler {
    fn drop(&mut self) {
        if let Some(flag) = &self.cancel_flag {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

struct LoopFlags {
    cancel: Arc<AtomicBool>,
    trigger: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

/// Background loop: pass, wait, repeat.
fn run_schedule<R: DataSourceRegistry, S: LogStore>(
    mut service: IngestionService<R, S>,
    interval: Duration,
    max_passes: Option<u64>,
    tx: mpsc::Sender<SchedulerProgress>,
    flags: LoopFlags,
) {
    macro_rules! send {
        ($msg:expr) => {
            if tx.send($msg).is_err() {
                // Receiver dropped; nobody is listening.
                return;
            }
        };
    }

    send!(SchedulerProgress::Started { interval });
    let check = Duration::from_millis(SCHEDULER_CHECK_INTERVAL_MS);
    let mut pass = 0u64;

    loop {
        if flags.cancel.load(Ordering::SeqCst) {
            break;
        }

        pass += 1;
        flags.trigger.store(false, Ordering::SeqCst);
        flags.running.store(true, Ordering::SeqCst);
        let outcome = service.run_pass();
        flags.running.store(false, Ordering::SeqCst);

        match outcome {
            Ok(report) => send!(SchedulerProgress::PassCompleted { pass, report }),
            Err(e) => {
                tracing::error!(pass, error = %e, "Ingestion pass failed; retrying next tick");
                send!(SchedulerProgress::PassFailed {
                    pass,
                    message: e.to_string(),
                });
            }
        }

        if max_passes.is_some_and(|max| pass >= max) {
            break;
        }

        // Interruptible wait until the next tick or an explicit trigger.
        let deadline = Instant::now() + interval;
        loop {
            if flags.cancel.load(Ordering::SeqCst) {
                break;
            }
            if flags.trigger.swap(false, Ordering::SeqCst) {
                tracing::debug!("Immediate pass requested");
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(check.min(deadline - now));
        }
    }

    tracing::info!(passes = pass, "Scheduler stopped");
    let _ = tx.send(SchedulerProgress::Stopped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::LogDataSource;
    use crate::core::store::{MemoryStore, StaticSourceRegistry};
    use crate::util::error::StoreError;
    use chrono::NaiveDate;
    use std::path::Path;
    use tempfile::TempDir;

    fn source_at(path: &Path) -> LogDataSource {
        LogDataSource {
            id: "UUID1".to_string(),
            name: "Tomcat".to_string(),
            source_type: "local".to_string(),
            application_id: "App_UUID1".to_string(),
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            path: path.to_path_buf(),
        }
    }

    fn service_for(dir: &TempDir) -> IngestionService<StaticSourceRegistry, MemoryStore> {
        let path = dir.path().join("app.log");
        std::fs::write(
            &path,
            "15-May-2025 14:32:10.213 INFO [main] started\n15-May-2025 14:32:11.000 ERROR [main] failed\n",
        )
        .unwrap();
        IngestionService::new(
            StaticSourceRegistry::new(vec![source_at(&path)]),
            MemoryStore::new(),
        )
    }

    /// Poll until `done` holds for the collected messages or 5 s pass.
    fn collect_until(
        scheduler: &IngestionScheduler,
        done: impl Fn(&[SchedulerProgress]) -> bool,
    ) -> Vec<SchedulerProgress> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut messages = Vec::new();
        while Instant::now() < deadline {
            messages.extend(scheduler.poll_progress());
            if done(&messages) {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        messages
    }

    fn completed(messages: &[SchedulerProgress]) -> Vec<&IngestionReport> {
        messages
            .iter()
            .filter_map(|m| match m {
                SchedulerProgress::PassCompleted { report, .. } => Some(report),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_pass_runs_immediately_then_trigger_reruns() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = IngestionScheduler::new();
        scheduler.start(service_for(&dir), Duration::from_secs(3600), None);

        let first = collect_until(&scheduler, |m| completed(m).len() == 1);
        assert!(matches!(first[0], SchedulerProgress::Started { .. }));
        assert_eq!(completed(&first)[0].persisted, 2);

        assert!(scheduler.trigger_now());
        let second = collect_until(&scheduler, |m| completed(m).len() == 1);
        let report = completed(&second)[0];
        assert_eq!(report.persisted, 0);
        assert_eq!(report.duplicates, 2);

        scheduler.stop();
        assert!(!scheduler.is_active());
        let last = scheduler.poll_progress();
        assert!(matches!(last.last(), Some(SchedulerProgress::Stopped)));
    }

    #[test]
    fn test_max_passes_stops_loop() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = IngestionScheduler::new();
        scheduler.start(service_for(&dir), Duration::from_millis(10), Some(3));
        scheduler.join();

        let messages = scheduler.poll_progress();
        let reports = completed(&messages);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].persisted, 2);
        assert!(reports[1..].iter().all(|r| r.persisted == 0));
        assert!(matches!(messages.last(), Some(SchedulerProgress::Stopped)));
    }

    #[test]
    fn test_failed_pass_is_retried_next_tick() {
        let dir = TempDir::new().unwrap();
        let service = IngestionService::new(
            StaticSourceRegistry::new(vec![source_at(&dir.path().join("missing.log"))]),
            MemoryStore::new(),
        );
        let mut scheduler = IngestionScheduler::new();
        scheduler.start(service, Duration::from_millis(10), Some(2));
        scheduler.join();

        let failures: Vec<u64> = scheduler
            .poll_progress()
            .into_iter()
            .filter_map(|m| match m {
                SchedulerProgress::PassFailed { pass, message } => {
                    assert!(message.contains("missing.log"), "{message}");
                    Some(pass)
                }
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec![1, 2]);
    }

    #[test]
    fn test_trigger_while_running_is_skipped() {
        struct SlowRegistry;
        impl DataSourceRegistry for SlowRegistry {
            fn list_local_sources(&self) -> Result<Vec<LogDataSource>, StoreError> {
                std::thread::sleep(Duration::from_millis(300));
                Ok(Vec::new())
            }
        }

        let mut scheduler = IngestionScheduler::new();
        scheduler.start(
            IngestionService::new(SlowRegistry, MemoryStore::new()),
            Duration::from_secs(3600),
            None,
        );

        let deadline = Instant::now() + Duration::from_secs(5);
        while !scheduler.is_pass_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!scheduler.trigger_now());

        let messages = collect_until(&scheduler, |m| {
            m.iter().any(|p| matches!(p, SchedulerProgress::PassSkipped))
        });
        assert!(messages
            .iter()
            .any(|p| matches!(p, SchedulerProgress::PassSkipped)));
        scheduler.stop();
    }

    #[test]
    fn test_trigger_without_start_is_refused() {
        let scheduler = IngestionScheduler::new();
        assert!(!scheduler.trigger_now());
        assert!(scheduler.poll_progress().is_empty());
    }
}
