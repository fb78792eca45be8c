//! Bounded priority FIFO feeding the dispatcher.

use crate::errors::QueueError;
use crate::job::{Job, Priority};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

const PRIORITY_LEVELS: usize = 4;

#[derive(Default)]
struct QueueInner {
    levels: [VecDeque<Job>; PRIORITY_LEVELS],
    size: usize,
    closed: bool,
}

/// One FIFO per priority level behind a single lock. Dequeue scans Critical
/// down to Low; within a level, insertion order is preserved. `Notify` is
/// the wait primitive, so a waiter parks and wakes without re-checking under
/// a dropped lock.
pub struct PriorityQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
}

impl PriorityQueue {
    pub fn new(capacity: usize) -> Self {
        PriorityQueue {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
            capacity,
        }
    }

    pub fn push(&self, job: Job) -> Result<(), QueueError> {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(QueueError::Closed);
            }
            if inner.size >= self.capacity {
                return Err(QueueError::Full);
            }
            inner.levels[job.priority.slot()].push_back(job);
            inner.size += 1;
            metrics::gauge!("jobs.queue.depth").set(inner.size as f64);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Blocks until a job is available, the queue closes, or `cancel` fires.
    pub async fn pop(&self, cancel: &CancellationToken) -> Result<Job, QueueError> {
        loop {
            // Arm the waiter before checking so a push between the check and
            // the await is not lost.
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock();
                if let Some(job) = take_highest(&mut inner) {
                    metrics::gauge!("jobs.queue.depth").set(inner.size as f64);
                    return Ok(job);
                }
                if inner.closed {
                    return Err(QueueError::Closed);
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return Err(QueueError::Cancelled),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// No further pushes are accepted; pending and future `pop` callers
    /// observe closure once the queue drains.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

fn take_highest(inner: &mut QueueInner) -> Option<Job> {
    for level in &mut inner.levels {
        if let Some(job) = level.pop_front() {
            inner.size -= 1;
            return Some(job);
        }
    }
    None
}

// Compile-time guard that the slot mapping covers the declared level count.
const _: () = assert!(Priority::Low.slot() == PRIORITY_LEVELS - 1);
