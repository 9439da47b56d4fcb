//! Single-consumer work queue.
//!
//! Connection threads produce [`Work`] items; the executor thread is the
//! sole consumer. A mutex-guarded deque with a condition variable is the
//! only synchronization point between them. Pop order is FIFO, which keeps
//! per-connection arrival order; cross-connection ordering is unspecified.
//!
//! Shutdown is not a queue item: `DOWN` resolves on the executor itself,
//! which breaks its own loop and wakes the acceptor.

use crate::server::session::Session;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

/// One query read off a connection, paired with its originating session.
pub struct Query {
    /// Session to write the response to.
    pub client: Arc<Session>,
    /// Raw query line as received (command token plus verbatim args).
    pub line: Vec<u8>,
}

/// Unit of executor work.
pub enum Work {
    /// Resolve a client query.
    Query(Query),
    /// Snapshot request from the autosnap worker.
    Autosnap,
}

/// Bounded-by-memory FIFO guarded by a mutex and condition variable.
pub struct WorkQueue {
    inner: Mutex<VecDeque<Work>>,
    ready: Condvar,
}

impl WorkQueue {
    pub fn new() -> Self {
        WorkQueue {
            inner: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    /// Appends an item and wakes the consumer.
    pub fn push(&self, work: Work) {
        let mut q = self.inner.lock().unwrap();
        q.push_back(work);
        self.ready.notify_one();
    }

    /// Blocks until an item is available and pops the oldest one.
    pub fn wait_and_pop(&self) -> Work {
        let mut q = self.inner.lock().unwrap();
        loop {
            match q.pop_front() {
                Some(work) => return work,
                None => q = self.ready.wait(q).unwrap(),
            }
        }
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        WorkQueue::new()
    }
}
