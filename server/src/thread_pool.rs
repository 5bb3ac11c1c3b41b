//! Work-stealing thread pool
//!
//! ```text
//!  submit ──round-robin──┐        submit_to(w) ──┐
//!                        ▼                       ▼
//!          ┌──────────┬──────────┬──────────┬──────────┐
//!          │ queue 0  │ queue 1  │ queue 2  │ queue N  │
//!          └────┬─────┴────┬─────┴────┬─────┴────┬─────┘
//!          back │ (LIFO)   │          │          │ front (FIFO, steal)
//!               ▼          ▼          ▼          ▼
//!           worker 0   worker 1   worker 2   worker N
//! ```
//!
//! Each worker pops its own queue from the back. On a miss it probes
//! `steal_rounds × N` randomly chosen siblings and takes the oldest task from the
//! first non-empty one. When nothing is found it parks on a condition variable
//! for at most `idle_timeout` before probing again, so a missed wakeup costs at
//! most one timeout.
//!
//! `pending` counts submitted-but-unfinished tasks and is the only state behind
//! the completion barrier: `wait_all()` returns once it drops to zero.
//!
//! A task that panics is caught at the execution site. The failure is counted,
//! logged and sent on the failure channel; the worker carries on.
//!
//! Calling `wait_all()` from inside a task deadlocks the calling worker and is
//! not supported.

use crate::config::PoolConfig;
use crate::error::{ConfigError, TaskFailure};
use crate::work_queue::WorkStealingQueue;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info};
use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum End {
    /// Popped first by the owner.
    Hot,
    /// Popped last by the owner, first by thieves.
    Cold,
}

struct Shared {
    config: PoolConfig,
    queues: Vec<WorkStealingQueue<Task>>,
    running: AtomicBool,
    next_queue: AtomicUsize,
    pending: AtomicUsize,
    steals: AtomicUsize,
    failures: AtomicUsize,
    failure_tx: Sender<TaskFailure>,

    idle_lock: Mutex<()>,
    idle_cv: Condvar,
    done_lock: Mutex<()>,
    done_cv: Condvar,
}

impl Shared {
    fn num_workers(&self) -> usize {
        self.queues.len()
    }

    fn next_worker(&self) -> usize {
        self.next_queue.fetch_add(1, Ordering::Relaxed) % self.num_workers()
    }

    fn enqueue(&self, worker_id: usize, task: Task, end: End) -> bool {
        if worker_id >= self.num_workers() || !self.running.load(Ordering::Acquire) {
            return false;
        }

        // Count before publishing so a fast worker cannot finish the task and
        // observe a zero barrier while it is still being accounted for.
        self.pending.fetch_add(1, Ordering::AcqRel);

        let queue = &self.queues[worker_id];
        match end {
            End::Hot => queue.push_back(task),
            End::Cold => queue.push_front(task),
        }

        self.idle_cv.notify_one();
        true
    }

    fn has_queued_work(&self) -> bool {
        self.queues.iter().any(|queue| !queue.is_empty())
    }

    fn find_task(&self, worker_id: usize, rng: &mut StdRng) -> Option<Task> {
        if let Some(task) = self.queues[worker_id].try_pop_back() {
            return Some(task);
        }

        let workers = self.num_workers();
        if workers < 2 {
            return None;
        }

        for _ in 0..self.config.steal_rounds * workers {
            let victim = (worker_id + rng.gen_range(1..workers)) % workers;
            let queue = &self.queues[victim];
            if queue.is_empty() {
                continue;
            }
            if let Some(task) = queue.try_pop_front() {
                self.steals.fetch_add(1, Ordering::Relaxed);
                return Some(task);
            }
        }

        None
    }

    fn run_task(&self, worker_id: usize, task: Task) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            let failure = TaskFailure {
                worker_id,
                message: panic_message(payload.as_ref()),
            };
            error!("{}", failure);
            self.failures.fetch_add(1, Ordering::Relaxed);
            // The pool keeps a receiver alive, so this only fails during teardown.
            let _ = self.failure_tx.send(failure);
        }

        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.done_lock.lock();
            self.done_cv.notify_all();
        }
    }

    fn wait_for_work(&self) {
        let mut guard = self.idle_lock.lock();
        if !self.running.load(Ordering::Acquire) || self.has_queued_work() {
            return;
        }
        self.idle_cv.wait_for(&mut guard, self.config.idle_timeout);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn worker_loop(shared: Arc<Shared>, worker_id: usize) {
    let mut rng = StdRng::seed_from_u64(
        shared.config.seed ^ (worker_id as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15),
    );
    debug!("Worker {} started", worker_id);

    while shared.running.load(Ordering::Acquire) {
        match shared.find_task(worker_id, &mut rng) {
            Some(task) => shared.run_task(worker_id, task),
            None => shared.wait_for_work(),
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Cloneable submission handle.
///
/// Held by tasks that need to schedule follow-up work, such as continuations
/// rescheduling themselves.
#[derive(Clone)]
pub struct PoolHandle {
    shared: Arc<Shared>,
}

impl PoolHandle {
    /// Round-robin submission. Returns false if the pool has shut down.
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let worker_id = self.shared.next_worker();
        self.shared.enqueue(worker_id, Box::new(task), End::Hot)
    }

    /// Direct-affinity submission. Returns false for an unknown worker or a stopped pool.
    pub fn submit_to<F>(&self, worker_id: usize, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.enqueue(worker_id, Box::new(task), End::Hot)
    }

    /// Round-robin submission behind every queued task.
    pub fn requeue<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let worker_id = self.shared.next_worker();
        self.shared.enqueue(worker_id, Box::new(task), End::Cold)
    }

    /// Affinity submission behind every task already queued on `worker_id`.
    pub fn requeue_to<F>(&self, worker_id: usize, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.enqueue(worker_id, Box::new(task), End::Cold)
    }

    pub fn num_workers(&self) -> usize {
        self.shared.num_workers()
    }
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    failure_rx: Receiver<TaskFailure>,
}

impl ThreadPool {
    /// Starts a pool with `workers` threads (at least one) and default tuning.
    pub fn new(workers: usize) -> Self {
        Self::start(PoolConfig::with_workers(workers.max(1)))
    }

    pub fn with_config(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::start(config))
    }

    fn start(config: PoolConfig) -> Self {
        let (failure_tx, failure_rx) = crossbeam_channel::unbounded();

        let shared = Arc::new(Shared {
            config,
            queues: (0..config.workers).map(|_| WorkStealingQueue::new()).collect(),
            running: AtomicBool::new(true),
            next_queue: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
            steals: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            failure_tx,
            idle_lock: Mutex::new(()),
            idle_cv: Condvar::new(),
            done_lock: Mutex::new(()),
            done_cv: Condvar::new(),
        });

        let workers = (0..config.workers)
            .map(|worker_id| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker_loop(shared, worker_id))
            })
            .collect();

        info!("Thread pool started with {} workers", config.workers);

        Self {
            shared,
            workers: Mutex::new(workers),
            failure_rx,
        }
    }

    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Round-robin submission; a no-op returning false once shut down.
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let worker_id = self.shared.next_worker();
        self.shared.enqueue(worker_id, Box::new(task), End::Hot)
    }

    /// Pins `task` to `worker_id`'s queue. It may still be stolen by an idle sibling.
    pub fn submit_to<F>(&self, worker_id: usize, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.enqueue(worker_id, Box::new(task), End::Hot)
    }

    /// Blocks until every submitted task has finished, or the pool is shut down.
    pub fn wait_all(&self) {
        let mut guard = self.shared.done_lock.lock();
        while self.shared.pending.load(Ordering::Acquire) != 0
            && self.shared.running.load(Ordering::Acquire)
        {
            self.shared.done_cv.wait(&mut guard);
        }
    }

    /// Stops and joins every worker. Idempotent.
    ///
    /// Tasks still queued are dropped without running.
    pub fn shutdown(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }

        {
            let _guard = self.shared.idle_lock.lock();
            self.shared.idle_cv.notify_all();
        }
        {
            let _guard = self.shared.done_lock.lock();
            self.shared.done_cv.notify_all();
        }

        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if handle.join().is_err() {
                error!("Worker thread terminated abnormally");
            }
        }

        let abandoned: usize = self.shared.queues.iter().map(|queue| queue.clear()).sum();
        if abandoned > 0 {
            self.shared.pending.fetch_sub(abandoned, Ordering::AcqRel);
        }

        info!(
            "Thread pool shut down ({} steals, {} abandoned tasks)",
            self.steal_count(),
            abandoned
        );
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn num_workers(&self) -> usize {
        self.shared.num_workers()
    }

    pub fn steal_count(&self) -> usize {
        self.shared.steals.load(Ordering::Relaxed)
    }

    pub fn pending_tasks(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    pub fn failure_count(&self) -> usize {
        self.shared.failures.load(Ordering::Relaxed)
    }

    /// Receiving end of the failure channel. Every caught task panic is delivered once.
    pub fn failures(&self) -> Receiver<TaskFailure> {
        self.failure_rx.clone()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_every_task_runs_exactly_once() {
        for workers in [1, 2, 4] {
            let pool = ThreadPool::new(workers);
            let runs: Arc<Vec<AtomicUsize>> =
                Arc::new((0..1_000).map(|_| AtomicUsize::new(0)).collect());

            for i in 0..runs.len() {
                let runs = Arc::clone(&runs);
                assert!(pool.submit(move || {
                    runs[i].fetch_add(1, Ordering::Relaxed);
                }));
            }
            pool.wait_all();

            assert!(
                runs.iter().all(|count| count.load(Ordering::Relaxed) == 1),
                "some task did not run exactly once with {} workers",
                workers
            );
            assert_eq!(pool.pending_tasks(), 0);
        }
    }

    #[test]
    fn test_wait_all_without_tasks_returns() {
        let pool = ThreadPool::new(2);
        pool.wait_all();
        assert_eq!(pool.pending_tasks(), 0);
    }

    #[test]
    fn test_zero_workers_clamped_to_one() {
        let pool = ThreadPool::new(0);
        assert_eq!(pool.num_workers(), 1);
    }

    #[test]
    fn test_with_config_validates() {
        let result = ThreadPool::with_config(PoolConfig::with_workers(0));
        assert!(matches!(result, Err(ConfigError::ZeroWorkers)));
    }

    #[test]
    fn test_single_worker_never_steals() {
        let pool = ThreadPool::new(1);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..200 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.wait_all();

        assert_eq!(counter.load(Ordering::Relaxed), 200);
        assert_eq!(pool.steal_count(), 0);
    }

    #[test]
    fn test_pinned_work_gets_stolen() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..64 {
            let counter = Arc::clone(&counter);
            assert!(pool.submit_to(0, move || {
                thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::Relaxed);
            }));
        }
        pool.wait_all();

        assert_eq!(counter.load(Ordering::Relaxed), 64);
        assert!(pool.steal_count() > 0);
    }

    #[test]
    fn test_submit_to_unknown_worker_rejected() {
        let pool = ThreadPool::new(2);
        assert!(!pool.submit_to(2, || {}));
        assert_eq!(pool.pending_tasks(), 0);
    }

    #[test]
    fn test_tasks_can_submit_followups() {
        let pool = ThreadPool::new(3);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let handle = pool.handle();
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                for _ in 0..10 {
                    let counter = Arc::clone(&counter);
                    handle.submit(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                    });
                }
            });
        }
        pool.wait_all();

        assert_eq!(counter.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn test_requeued_task_runs_after_owner_work() {
        let pool = ThreadPool::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(Mutex::new(()));

        // Hold the only worker so everything below is queued before it runs.
        let held = gate.lock();
        pool.submit({
            let gate = Arc::clone(&gate);
            move || drop(gate.lock())
        });
        thread::sleep(Duration::from_millis(20));

        let handle = pool.handle();
        for label in ["cold", "hot-a", "hot-b"] {
            let order = Arc::clone(&order);
            let task = move || order.lock().push(label);
            if label == "cold" {
                handle.requeue(task);
            } else {
                handle.submit(task);
            }
        }
        drop(held);
        pool.wait_all();

        assert_eq!(*order.lock(), vec!["hot-b", "hot-a", "cold"]);
    }

    #[test]
    fn test_panicking_task_reported_on_channel() {
        let pool = ThreadPool::new(2);
        let failures = pool.failures();
        let counter = Arc::new(AtomicUsize::new(0));

        for i in 0..20 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                if i == 7 {
                    panic!("task {} exploded", i);
                }
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.wait_all();

        assert_eq!(counter.load(Ordering::Relaxed), 19);
        assert_eq!(pool.failure_count(), 1);

        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.message, "task 7 exploded");
        assert!(failure.worker_id < 2);
        assert!(failures.try_recv().is_err());
    }

    #[test]
    fn test_shutdown_is_idempotent_and_rejects_new_work() {
        let pool = ThreadPool::new(2);
        pool.shutdown();
        pool.shutdown();

        assert!(!pool.is_running());
        assert!(!pool.submit(|| {}));
        assert!(!pool.handle().requeue(|| {}));
        pool.wait_all();
    }

    #[test]
    fn test_shutdown_abandons_queued_tasks() {
        let pool = Arc::new(ThreadPool::new(1));
        let executed = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Mutex::new(()));

        let held = gate.lock();
        pool.submit({
            let gate = Arc::clone(&gate);
            move || drop(gate.lock())
        });
        thread::sleep(Duration::from_millis(20));

        for _ in 0..10 {
            let executed = Arc::clone(&executed);
            pool.submit(move || {
                executed.fetch_add(1, Ordering::Relaxed);
            });
        }
        assert_eq!(pool.pending_tasks(), 11);

        // shutdown() joins the worker, so it has to run while the gate is held.
        let stopper = thread::spawn({
            let pool = Arc::clone(&pool);
            move || pool.shutdown()
        });
        while pool.is_running() {
            thread::sleep(Duration::from_millis(1));
        }
        drop(held);
        stopper.join().unwrap();

        assert_eq!(executed.load(Ordering::Relaxed), 0);
        assert_eq!(pool.pending_tasks(), 0);
        assert!(!pool.is_running());
        pool.wait_all();
    }
}
