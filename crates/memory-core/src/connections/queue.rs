//! Bounded discovery queue with retry/backoff for connection creation.
//!
//! Mirrors the shape of `decay::batch`'s pending buffer: a bounded,
//! in-memory queue that never blocks a caller and that drops the oldest
//! entry on overflow rather than growing without bound.

use std::collections::VecDeque;

use crate::model::{now_ms, MemoryConnection};

/// A connection awaiting a (possibly retried) write to the storage
/// provider.
#[derive(Debug, Clone)]
pub struct DiscoveryTask {
    pub connection: MemoryConnection,
    pub attempts: u32,
    /// Epoch millis this task becomes eligible to dequeue again. Zero for a
    /// task that has never failed — always due immediately.
    pub ready_at: i64,
}

impl DiscoveryTask {
    pub fn new(connection: MemoryConnection) -> Self {
        DiscoveryTask {
            connection,
            attempts: 0,
            ready_at: 0,
        }
    }
}

/// Exponential backoff in milliseconds, capped, for a given attempt count.
pub fn backoff_ms(attempts: u32, base_ms: u64, cap_ms: u64) -> u64 {
    base_ms.saturating_mul(1u64 << attempts.min(16)).min(cap_ms)
}

#[derive(Debug, Clone)]
pub struct DiscoveryQueue {
    tasks: VecDeque<DiscoveryTask>,
    max_len: usize,
    max_attempts: u32,
    base_backoff_ms: u64,
    max_backoff_ms: u64,
    dropped: u64,
}

impl DiscoveryQueue {
    pub fn new(max_len: usize, max_attempts: u32) -> Self {
        DiscoveryQueue {
            tasks: VecDeque::new(),
            max_len,
            max_attempts,
            base_backoff_ms: 500,
            max_backoff_ms: 4_000,
            dropped: 0,
        }
    }

    pub fn with_backoff(mut self, base_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        self.base_backoff_ms = base_backoff_ms;
        self.max_backoff_ms = max_backoff_ms;
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn enqueue(&mut self, connection: MemoryConnection) {
        if self.tasks.len() >= self.max_len {
            self.tasks.pop_front();
            self.dropped += 1;
        }
        self.tasks.push_back(DiscoveryTask::new(connection));
    }

    pub fn dequeue(&mut self) -> Option<DiscoveryTask> {
        self.tasks.pop_front()
    }

    /// Pop the front task only if its backoff window has elapsed. Unlike
    /// `dequeue`, a task still waiting out its backoff is left in place
    /// rather than returned early.
    pub fn dequeue_due(&mut self) -> Option<DiscoveryTask> {
        if self.tasks.front()?.ready_at > now_ms() {
            return None;
        }
        self.tasks.pop_front()
    }

    /// Re-enqueue `task` after a failed write, unless it has exhausted its
    /// retry budget, in which case it is dropped and counted. The task's
    /// `ready_at` is pushed out by an exponential backoff so a consumer
    /// calling `dequeue_due` won't retry it immediately.
    pub fn retry(&mut self, mut task: DiscoveryTask) {
        task.attempts += 1;
        if task.attempts >= self.max_attempts {
            self.dropped += 1;
            return;
        }
        task.ready_at = now_ms() + backoff_ms(task.attempts, self.base_backoff_ms, self.max_backoff_ms) as i64;
        self.tasks.push_back(task);
    }
}
