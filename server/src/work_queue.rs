//! Per-worker double-ended task queue
//!
//! The owning worker pushes and pops at the back (LIFO), which keeps freshly
//! submitted work hot in cache. Thieves take from the front (FIFO), so they pick
//! up the oldest task and disturb the owner's working set as little as possible.
//!
//! All operations share one lock; the queue is not lock-free. A separate relaxed
//! length counter lets callers skip obviously empty queues without touching the
//! lock. It can lag the real contents and must only gate fast paths, never decide
//! correctness.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct WorkStealingQueue<T> {
    items: Mutex<VecDeque<T>>,
    approx_len: AtomicUsize,
}

impl<T> WorkStealingQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            approx_len: AtomicUsize::new(0),
        }
    }

    /// Owner push onto the hot end.
    pub fn push_back(&self, item: T) {
        let mut items = self.items.lock();
        items.push_back(item);
        self.approx_len.fetch_add(1, Ordering::Relaxed);
    }

    /// Push onto the cold end, behind everything the owner will pop first.
    ///
    /// Used to requeue yielded continuations so they cannot starve older work.
    pub fn push_front(&self, item: T) {
        let mut items = self.items.lock();
        items.push_front(item);
        self.approx_len.fetch_add(1, Ordering::Relaxed);
    }

    /// Owner pop from the hot end. Never blocks on an empty queue.
    pub fn try_pop_back(&self) -> Option<T> {
        let mut items = self.items.lock();
        let item = items.pop_back()?;
        self.approx_len.fetch_sub(1, Ordering::Relaxed);
        Some(item)
    }

    /// Steal from the cold end. Never blocks on an empty queue.
    pub fn try_pop_front(&self) -> Option<T> {
        let mut items = self.items.lock();
        let item = items.pop_front()?;
        self.approx_len.fetch_sub(1, Ordering::Relaxed);
        Some(item)
    }

    /// Approximate; see module docs.
    pub fn is_empty(&self) -> bool {
        self.approx_len.load(Ordering::Relaxed) == 0
    }

    /// Approximate; see module docs.
    pub fn len(&self) -> usize {
        self.approx_len.load(Ordering::Relaxed)
    }

    /// Removes every queued item, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let dropped = items.len();
        items.clear();
        self.approx_len.store(0, Ordering::Relaxed);
        dropped
    }
}

impl<T> Default for WorkStealingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_owner_pops_lifo() {
        let queue = WorkStealingQueue::new();
        queue.push_back(1);
        queue.push_back(2);
        queue.push_back(3);

        assert_eq!(queue.try_pop_back(), Some(3));
        assert_eq!(queue.try_pop_back(), Some(2));
        assert_eq!(queue.try_pop_back(), Some(1));
        assert_eq!(queue.try_pop_back(), None);
    }

    #[test]
    fn test_thief_pops_oldest() {
        let queue = WorkStealingQueue::new();
        queue.push_back("first");
        queue.push_back("second");

        assert_eq!(queue.try_pop_front(), Some("first"));
        assert_eq!(queue.try_pop_back(), Some("second"));
        assert_eq!(queue.try_pop_front(), None);
    }

    #[test]
    fn test_push_front_runs_after_owner_work() {
        let queue = WorkStealingQueue::new();
        queue.push_back(1);
        queue.push_front(0);
        queue.push_back(2);

        assert_eq!(queue.try_pop_back(), Some(2));
        assert_eq!(queue.try_pop_back(), Some(1));
        assert_eq!(queue.try_pop_back(), Some(0));
    }

    #[test]
    fn test_len_tracks_contents_when_quiescent() {
        let queue = WorkStealingQueue::new();
        assert!(queue.is_empty());

        for i in 0..5 {
            queue.push_back(i);
        }
        queue.try_pop_front();
        assert_eq!(queue.len(), 4);
        assert!(!queue.is_empty());

        assert_eq!(queue.clear(), 4);
        assert!(queue.is_empty());
        assert_eq!(queue.try_pop_back(), None);
    }

    #[test]
    fn test_concurrent_owner_and_thieves_see_each_item_once() {
        let queue = Arc::new(WorkStealingQueue::new());
        let total = 10_000usize;

        for i in 0..total {
            queue.push_back(i);
        }

        let thieves: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut taken = Vec::new();
                    while let Some(item) = queue.try_pop_front() {
                        taken.push(item);
                    }
                    taken
                })
            })
            .collect();

        let mut seen = Vec::new();
        while let Some(item) = queue.try_pop_back() {
            seen.push(item);
        }
        for thief in thieves {
            seen.extend(thief.join().unwrap());
        }

        seen.sort_unstable();
        assert_eq!(seen, (0..total).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }
}
