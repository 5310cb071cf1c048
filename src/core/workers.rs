//! Thread pool for background decode jobs
//!
//! Uses work-stealing deques:
//! - New jobs go to a shared injector
//! - Idle workers steal from each other
//! - No lock contention between workers
//!
//! Cancellation of stale preloads is done by the jobs themselves (epoch
//! check in the loader), the pool only runs closures.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::deque::{Injector, Stealer, Worker};
use log::{error, trace};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How long `Drop` waits for workers to finish their current job
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Default pool size: leave a quarter of the cores to the UI thread
pub fn default_worker_count() -> usize {
    (num_cpus::get() * 3 / 4).max(1)
}

/// Fixed-size worker pool with work stealing.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(4)?;
/// workers.execute(move || {
///     let _ = decoder.decode_still(&path, Some(1920));
/// });
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,          // Global queue for external jobs
    handles: Vec<thread::JoinHandle<()>>,  // Thread handles for shutdown
    shutdown: Arc<AtomicBool>,             // Shutdown signal
}

impl Workers {
    /// Spawn `num_threads` workers (at least one).
    ///
    /// # Errors
    ///
    /// Thread spawn failure. Workers spawned before the failure are stopped.
    pub fn new(num_threads: usize) -> io::Result<Self> {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = locals.iter().map(Worker::stealer).collect();

        let mut pool = Self {
            injector,
            handles: Vec::with_capacity(num_threads),
            shutdown,
        };

        for (worker_id, local) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&pool.injector);
            let shutdown = Arc::clone(&pool.shutdown);
            let stealers = stealers.clone();

            // On error `pool` drops here and stops the threads already running
            let handle = thread::Builder::new()
                .name(format!("slidecache-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, &local, &injector, &stealers, &shutdown))?;

            pool.handles.push(handle);
        }

        trace!("Workers initialized: {} threads (work-stealing)", num_threads);
        Ok(pool)
    }

    /// Number of worker threads
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Queue a closure for a worker thread. No return value:
    /// results travel through channels captured by the closure.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }
}

fn run_worker(
    worker_id: usize,
    local: &Worker<Job>,
    injector: &Injector<Job>,
    stealers: &[Stealer<Job>],
    shutdown: &AtomicBool,
) {
    trace!("Worker {} started", worker_id);

    loop {
        // 1. Own queue
        if let Some(job) = local.pop() {
            run_job(worker_id, job);
            continue;
        }

        // 2. Global injector, moving a batch into the local queue
        if let Some(job) = injector.steal_batch_and_pop(local).success() {
            run_job(worker_id, job);
            continue;
        }

        // 3. Other workers
        if let Some(job) = stealers.iter().find_map(|s| s.steal().success()) {
            run_job(worker_id, job);
            continue;
        }

        // 4. Queues drained: honor shutdown
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        // 5. Idle: short sleep instead of spinning
        thread::sleep(Duration::from_millis(1));
    }

    trace!("Worker {} stopped", worker_id);
}

/// A panicking job is logged and dropped; the worker keeps going
fn run_job(worker_id: usize, job: Job) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
        error!("Worker {} job panicked: {:?}", worker_id, e);
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);

        self.shutdown.store(true, Ordering::SeqCst);

        // Stale preloads skip themselves, so this is normally quick.
        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;

        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, detaching remaining workers");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }

        trace!("All {} workers stopped gracefully", num_threads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_runs_all_jobs() {
        let workers = Workers::new(3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = unbounded();

        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            let tx = tx.clone();
            workers.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            });
        }

        for _ in 0..50 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_jobs_run_off_caller_thread() {
        let workers = Workers::new(1).unwrap();
        let (tx, rx) = unbounded();
        workers.execute(move || {
            let _ = tx.send(thread::current().name().map(str::to_string));
        });

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("slidecache-worker-0"));
    }

    #[test]
    fn test_worker_survives_panicking_job() {
        let workers = Workers::new(1).unwrap();
        let (tx, rx) = unbounded();

        workers.execute(|| panic!("codec blew up"));
        workers.execute(move || {
            let _ = tx.send(());
        });

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_zero_threads_clamped() {
        let workers = Workers::new(0).unwrap();
        assert_eq!(workers.len(), 1);
        assert!(default_worker_count() >= 1);
    }

    #[test]
    fn test_drop_is_bounded() {
        let workers = Workers::new(2).unwrap();
        workers.execute(|| thread::sleep(Duration::from_secs(3)));
        thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        drop(workers);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
