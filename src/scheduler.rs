//! Background execution: a single-worker queue for ordered, stateful work
//! and a bounded pool for read-only parallel computations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info};

use crate::error::{FinmanError, Result};

pub const DEFAULT_WORKER_THREADS: usize = 5;

type ProgressListener = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Step counter for long computations.
///
/// Counters are atomic so another thread can poll them while work is in
/// flight. The optional listener runs on the worker that recorded the step
/// and must return quickly.
pub struct Progress {
    done: AtomicU64,
    total: AtomicU64,
    listener: Option<ProgressListener>,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            done: AtomicU64::new(0),
            total: AtomicU64::new(0),
            listener: None,
        }
    }

    pub fn with_listener(listener: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        Self {
            listener: Some(Box::new(listener)),
            ..Self::new()
        }
    }

    /// Start a new run of `total` steps.
    pub fn begin(&self, total: u64) {
        self.done.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
        if let Some(listener) = &self.listener {
            listener(0, total);
        }
    }

    pub fn step(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(listener) = &self.listener {
            listener(done, self.total.load(Ordering::Relaxed));
        }
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 1.0;
        }
        self.done() as f64 / total as f64
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a submitted task.
pub struct TaskHandle<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes. A task that panicked reports
    /// `TaskFailed` instead of a value.
    pub fn wait(self) -> Result<T> {
        self.rx
            .recv()
            .map_err(|_| FinmanError::TaskFailed("worker dropped the task without a result".into()))
    }

    /// Non-blocking poll; `None` while the task is still running.
    pub fn try_result(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(value) => Some(Ok(value)),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(FinmanError::TaskFailed(
                "worker dropped the task without a result".into(),
            ))),
        }
    }
}

// Without a handler rayon aborts the process when a spawned task panics.
fn log_panic(payload: Box<dyn std::any::Any + Send>) {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    error!(%message, "background task panicked");
}

pub struct BackgroundScheduler {
    serial: ThreadPool,
    parallel: ThreadPool,
}

impl BackgroundScheduler {
    pub fn new(worker_threads: usize) -> Result<Self> {
        let workers = worker_threads.max(1);
        let serial = ThreadPoolBuilder::new()
            .num_threads(1)
            .thread_name(|_| "finman-serial".to_string())
            .panic_handler(log_panic)
            .build()
            .map_err(|e| FinmanError::TaskFailed(e.to_string()))?;
        let parallel = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("finman-worker-{i}"))
            .panic_handler(log_panic)
            .build()
            .map_err(|e| FinmanError::TaskFailed(e.to_string()))?;
        info!(workers, "background scheduler started");
        Ok(Self { serial, parallel })
    }

    /// Queue `task` behind every previously submitted serial task. At most one
    /// serial task runs at a time.
    pub fn submit_serial<T, F>(&self, message: &str, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let message = message.to_string();
        self.serial.spawn_fifo(move || {
            debug!(task = %message, "serial task started");
            let _ = tx.send(task());
        });
        TaskHandle { rx }
    }

    /// Run `task` on the parallel pool. Rayon iterators inside it fan out
    /// over the pool's workers.
    pub fn submit_parallel<T, F>(&self, message: &str, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let message = message.to_string();
        self.parallel.spawn(move || {
            debug!(task = %message, "parallel task started");
            let _ = tx.send(task());
        });
        TaskHandle { rx }
    }

    /// Run `op` inside the parallel pool and wait for its result. Borrowed
    /// data is allowed since the call blocks.
    pub fn install_parallel<T, F>(&self, op: F) -> T
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        self.parallel.install(op)
    }

    pub fn parallel_workers(&self) -> usize {
        self.parallel.current_num_threads()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_serial_tasks_run_in_submission_order() {
        let scheduler = BackgroundScheduler::new(3).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let log = Arc::clone(&log);
                scheduler.submit_serial("append", move || log.lock().unwrap().push(i))
            })
            .collect();
        for handle in handles {
            handle.wait().unwrap();
        }
        assert_eq!(*log.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_parallel_task_returns_value() {
        let scheduler = BackgroundScheduler::new(2).unwrap();
        let handle = scheduler.submit_parallel("sum", || (1..=10).sum::<u32>());
        assert_eq!(handle.wait().unwrap(), 55);
    }

    #[test]
    fn test_panicking_task_reports_failure() {
        let scheduler = BackgroundScheduler::new(1).unwrap();
        let handle = scheduler.submit_serial("boom", || -> u32 { panic!("boom") });
        assert!(matches!(handle.wait(), Err(FinmanError::TaskFailed(_))));
    }

    #[test]
    fn test_parallel_pool_size() {
        let scheduler = BackgroundScheduler::new(DEFAULT_WORKER_THREADS).unwrap();
        assert_eq!(scheduler.parallel_workers(), DEFAULT_WORKER_THREADS);
        assert_eq!(scheduler.install_parallel(rayon::current_num_threads), DEFAULT_WORKER_THREADS);
    }

    #[test]
    fn test_progress_counts_steps() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::with_listener(move |done, total| sink.lock().unwrap().push((done, total)));
        progress.begin(3);
        progress.step();
        progress.step();
        assert_eq!(progress.done(), 2);
        assert_eq!(progress.total(), 3);
        assert!((progress.fraction() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(*seen.lock().unwrap(), vec![(0, 3), (1, 3), (2, 3)]);
    }

    #[test]
    fn test_progress_of_empty_run_is_complete() {
        let progress = Progress::new();
        progress.begin(0);
        assert_eq!(progress.fraction(), 1.0);
    }
}
