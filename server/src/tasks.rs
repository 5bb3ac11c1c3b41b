//! Long-lived polling units driven by the pool
//!
//! A unit implements [`Continuation`]: each `step()` does a bounded slice of work
//! and says whether it wants to run again. [`schedule`] submits the unit; after
//! every `Step::Yield` it is requeued as a fresh task at the cold end of a queue,
//! behind everything already waiting there. Under LIFO owner pops this keeps a
//! rescheduling unit from starving older work, and no unit ever holds a worker
//! between steps.
//!
//! Two units drive the streaming pipeline:
//! - [`ProducerTask`] pulls one batch from a [`CommandSource`] per step and
//!   queues it on the server.
//! - [`MatchTask`] drains one match per step and finishes once every producer
//!   has finished and its queue is empty.

use crate::game_server::GameServer;
use crate::thread_pool::{PoolHandle, ThreadPool};
use log::debug;
use shared::CommandSource;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Where match work is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    RoundRobin,
    /// Match `i` goes to worker `i mod N`. Idle siblings may still steal it.
    Pinned,
}

impl Placement {
    pub fn worker_for(&self, match_id: u32, workers: usize) -> Option<usize> {
        match self {
            Placement::RoundRobin => None,
            Placement::Pinned => Some(match_id as usize % workers.max(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run again later.
    Yield,
    Done,
}

pub trait Continuation: Send + 'static {
    fn step(&mut self) -> Step;

    /// Preferred worker, or `None` for round-robin.
    fn affinity(&self) -> Option<usize> {
        None
    }
}

/// Submits `unit` to the pool. Returns false if the pool has shut down.
pub fn schedule<C: Continuation>(handle: &PoolHandle, unit: C) -> bool {
    let affinity = unit.affinity();
    let next = handle.clone();
    let task = move || run_step(next, unit);
    match affinity {
        Some(worker_id) => handle.submit_to(worker_id, task),
        None => handle.submit(task),
    }
}

fn run_step<C: Continuation>(handle: PoolHandle, mut unit: C) {
    if unit.step() == Step::Done {
        return;
    }

    let affinity = unit.affinity();
    let next = handle.clone();
    let task = move || run_step(next, unit);
    let requeued = match affinity {
        Some(worker_id) => handle.requeue_to(worker_id, task),
        None => handle.requeue(task),
    };
    if !requeued {
        debug!("Pool stopped; dropping yielded continuation");
    }
}

/// Counts producers that have finished.
pub struct ProducerProgress {
    total: usize,
    finished: AtomicUsize,
}

impl ProducerProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            finished: AtomicUsize::new(0),
        }
    }

    pub fn mark_finished(&self) {
        self.finished.fetch_add(1, Ordering::Release);
    }

    pub fn all_done(&self) -> bool {
        self.finished.load(Ordering::Acquire) >= self.total
    }
}

/// Feeds one command source into the server, one batch per step.
///
/// Reports itself finished exactly once, either when its source runs dry or when
/// it is dropped early (a panicking source, or a pool shut down under it), so
/// match tasks waiting on producers always terminate.
pub struct ProducerTask<S: CommandSource + 'static> {
    source: S,
    server: Arc<GameServer>,
    progress: Arc<ProducerProgress>,
    batch_size: usize,
    reported: bool,
}

impl<S: CommandSource + 'static> ProducerTask<S> {
    pub fn new(
        source: S,
        server: Arc<GameServer>,
        progress: Arc<ProducerProgress>,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            server,
            progress,
            batch_size: batch_size.max(1),
            reported: false,
        }
    }

    fn report_finished(&mut self) {
        if !self.reported {
            self.reported = true;
            self.progress.mark_finished();
        }
    }
}

impl<S: CommandSource + 'static> Continuation for ProducerTask<S> {
    fn step(&mut self) -> Step {
        let batch = self.source.next_batch(self.batch_size);
        if !batch.is_empty() {
            self.server.receive_commands(batch);
        }

        if self.source.is_finished() {
            self.report_finished();
            Step::Done
        } else {
            Step::Yield
        }
    }
}

impl<S: CommandSource + 'static> Drop for ProducerTask<S> {
    fn drop(&mut self) {
        self.report_finished();
    }
}

/// Drains one match per step until producers are done and nothing is queued.
pub struct MatchTask {
    match_id: u32,
    server: Arc<GameServer>,
    progress: Arc<ProducerProgress>,
    worker: Option<usize>,
}

impl MatchTask {
    pub fn new(
        match_id: u32,
        server: Arc<GameServer>,
        progress: Arc<ProducerProgress>,
        worker: Option<usize>,
    ) -> Self {
        Self {
            match_id,
            server,
            progress,
            worker,
        }
    }
}

impl Continuation for MatchTask {
    fn step(&mut self) -> Step {
        self.server.process_pending(self.match_id);

        // Producers before the queue: a producer queues its last batch before it
        // reports finished, so this order cannot miss a final batch.
        if self.progress.all_done() && self.server.pending_for(self.match_id) == 0 {
            Step::Done
        } else {
            Step::Yield
        }
    }

    fn affinity(&self) -> Option<usize> {
        self.worker
    }
}

/// Runs producers and match tasks concurrently on `pool` until every source is
/// exhausted and every match has drained.
pub fn run_streaming<S>(
    server: &Arc<GameServer>,
    pool: &ThreadPool,
    sources: Vec<S>,
    batch_size: usize,
    placement: Placement,
) where
    S: CommandSource + 'static,
{
    let handle = pool.handle();
    let progress = Arc::new(ProducerProgress::new(sources.len()));

    for source in sources {
        schedule(
            &handle,
            ProducerTask::new(source, Arc::clone(server), Arc::clone(&progress), batch_size),
        );
    }

    for match_id in 0..server.match_count() as u32 {
        let worker = placement.worker_for(match_id, pool.num_workers());
        schedule(
            &handle,
            MatchTask::new(match_id, Arc::clone(server), Arc::clone(&progress), worker),
        );
    }

    pool.wait_all();
}
