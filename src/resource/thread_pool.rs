use crate::error::{JobError, panic_message};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

pub const MAX_DEFAULT_WORKERS: usize = 4;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// `min(cpu count, 4)`, never less than one.
pub fn default_thread_count() -> usize {
    num_cpus::get().clamp(1, MAX_DEFAULT_WORKERS)
}

/// Fixed set of long-lived workers pulling from one blocking queue.
///
/// A `None` in the queue is the stop sentinel; one is enqueued per worker on shutdown.
pub struct ThreadPool {
    sender: Sender<Option<Job>>,
    receiver: Receiver<Option<Job>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
}

impl ThreadPool {
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let (sender, receiver) = channel::unbounded::<Option<Job>>();
        let running = Arc::new(AtomicBool::new(true));
        let mut workers = Vec::with_capacity(threads);

        for index in 0..threads {
            let receiver = receiver.clone();
            let running = running.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("lightframe-worker-{index}"))
                .spawn(move || worker_loop(receiver, running));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => log::error!("failed to spawn worker {index}: {err}"),
            }
        }
        log::debug!("thread pool started with {} workers", workers.len());

        Self {
            sender,
            receiver,
            workers: Mutex::new(workers),
            running,
        }
    }

    pub fn with_default_threads() -> Self {
        Self::new(default_thread_count())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn thread_count(&self) -> usize {
        self.workers.lock().map(|workers| workers.len()).unwrap_or(0)
    }

    /// Enqueues fire-and-forget work. Returns `false` (and drops the job) once the pool
    /// has been shut down.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_running() {
            log::warn!("job submitted to a stopped thread pool was dropped");
            return false;
        }
        self.sender.send(Some(Box::new(job))).is_ok()
    }

    /// Enqueues work whose result (or panic) is observed through the returned handle.
    pub fn submit<T, F>(&self, job: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        self.execute(move || {
            let result = catch_unwind(AssertUnwindSafe(job))
                .map_err(|payload| JobError::Panicked(panic_message(&*payload)));
            let _ = tx.send(result);
        });
        JobHandle { receiver: rx }
    }

    /// Stops every worker and discards queued jobs without running them. Idempotent.
    pub fn shutdown_now(&self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for _ in 0..workers.len() {
            let _ = self.sender.send(None);
        }
        for worker in workers {
            if worker.join().is_err() {
                log::warn!("thread pool worker terminated abnormally");
            }
        }

        let mut dropped = 0usize;
        while let Ok(job) = self.receiver.try_recv() {
            if job.is_some() {
                dropped += 1;
            }
        }
        log::debug!("thread pool stopped, {dropped} queued jobs dropped");
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("running", &self.is_running())
            .field("threads", &self.thread_count())
            .finish()
    }
}

fn worker_loop(receiver: Receiver<Option<Job>>, running: Arc<AtomicBool>) {
    while let Ok(Some(job)) = receiver.recv() {
        if !running.load(Ordering::Acquire) {
            // Shutting down: skip whatever is still ahead of the sentinel.
            continue;
        }
        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            log::warn!("thread pool job panicked: {}", panic_message(&*payload));
        }
    }
}

/// Result slot of a job submitted with [`ThreadPool::submit`].
#[derive(Debug)]
pub struct JobHandle<T> {
    receiver: Receiver<Result<T, JobError>>,
}

impl<T> JobHandle<T> {
    /// Blocks until the job finishes. A job discarded by shutdown reports `Cancelled`.
    pub fn get(self) -> Result<T, JobError> {
        self.receiver.recv().unwrap_or(Err(JobError::Cancelled))
    }

    /// Non-blocking poll; `None` while the job is still queued or running.
    pub fn try_get(&self) -> Option<Result<T, JobError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(JobError::Cancelled)),
        }
    }

    pub fn get_timeout(&self, timeout: Duration) -> Option<Result<T, JobError>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(JobError::Cancelled)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ThreadPool, default_thread_count};
    use crate::error::JobError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn default_thread_count_is_bounded() {
        let count = default_thread_count();
        assert!((1..=4).contains(&count));
    }

    #[test]
    fn submit_returns_job_result() {
        let pool = ThreadPool::new(2);
        let handle = pool.submit(|| 6 * 7);
        assert_eq!(handle.get(), Ok(42));
    }

    #[test]
    fn execute_runs_every_job() {
        let pool = ThreadPool::new(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let counter = counter.clone();
                pool.submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.get().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn panicking_job_surfaces_through_handle() {
        let pool = ThreadPool::new(1);
        let handle = pool.submit(|| -> u32 { panic!("decode exploded") });
        assert_eq!(handle.get(), Err(JobError::Panicked("decode exploded".to_string())));

        // The worker survives the panic.
        assert_eq!(pool.submit(|| 1).get(), Ok(1));
    }

    #[test]
    fn fire_and_forget_panic_does_not_kill_worker() {
        let pool = ThreadPool::new(1);
        assert!(pool.execute(|| panic!("boom")));
        let handle = pool.submit(|| "alive");
        assert_eq!(handle.get_timeout(Duration::from_secs(5)), Some(Ok("alive")));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let pool = ThreadPool::new(2);
        assert!(pool.is_running());
        assert_eq!(pool.thread_count(), 2);
        pool.shutdown_now();
        assert!(!pool.is_running());
        assert_eq!(pool.thread_count(), 0);
        pool.shutdown_now();
        assert!(!pool.is_running());
    }

    #[test]
    fn work_after_shutdown_is_cancelled() {
        let pool = ThreadPool::new(1);
        pool.shutdown_now();
        assert!(!pool.execute(|| {}));
        let handle = pool.submit(|| 5);
        assert_eq!(handle.try_get(), Some(Err(JobError::Cancelled)));
        assert_eq!(handle.get(), Err(JobError::Cancelled));
    }
}
