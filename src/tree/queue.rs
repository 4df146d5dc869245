//! Self-terminating work queue for namespace exploration
//!
//! The workers that consume exploration orders are also the only producers
//! of new ones, so the usual "producer closes the channel" shutdown does not
//! apply: nothing outside the pool can know that exploration is finished.
//! Instead the queue tracks how many of its N workers are awake. A worker
//! that finds the queue empty parks on the condition variable; when the last
//! awake worker is about to park over an empty queue, no order can ever be
//! produced again, so the queue closes itself and wakes everyone.
//!
//! State is one mutex over {FIFO deque, awake count, closed flag} plus one
//! condition variable. Only the queue needs a lock; each parent's child list
//! is written by exactly one worker (one order per parent).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::tree::NodeKind;

/// Remote operation(s) a work order requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// No remote call; the node is already fully materialized
    None,
    /// List children under the path
    List,
    /// Read the secret at the path and materialize its fields as key leaves
    Get,
    /// Read first (key leaves), then list (namespace children)
    ListAndGet,
    /// Enumerate mount points; only ever the root's order
    Mounts,
}

impl OpKind {
    /// Decide what a node of the given kind needs fetched
    pub fn for_node(kind: NodeKind, fetch_keys: bool) -> OpKind {
        match (kind, fetch_keys) {
            (NodeKind::Root, _) => OpKind::Mounts,
            (NodeKind::Dir, _) => OpKind::List,
            (NodeKind::DirAndSecret, false) => OpKind::List,
            (NodeKind::DirAndSecret, true) => OpKind::ListAndGet,
            (NodeKind::Secret, false) => OpKind::None,
            (NodeKind::Secret, true) => OpKind::Get,
            (NodeKind::Key, _) => OpKind::None,
        }
    }
}

struct Inner<T> {
    orders: VecDeque<T>,
    /// Workers currently holding an order or not yet parked; pre-charged to
    /// the pool size so nobody self-terminates before the seed is consumed
    awake: usize,
    closed: bool,
}

/// FIFO queue shared by a fixed pool of workers that detects its own
/// completion
///
/// Invariant: `awake` never exceeds the pool size, and it reaches zero iff
/// every worker is parked on the condition variable over an empty queue. At
/// that point the queue closes permanently.
pub struct WorkQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> WorkQueue<T> {
    /// Create a queue for a pool of `workers` consumers
    pub fn new(workers: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                orders: VecDeque::new(),
                awake: workers,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append an order and wake one parked worker
    ///
    /// Orders pushed after the queue has closed are dropped; by then every
    /// worker has either exited or is draining.
    pub fn push(&self, order: T) {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        if inner.closed {
            return;
        }
        inner.orders.push_back(order);
        self.available.notify_one();
    }

    /// Take the next order, parking until one arrives
    ///
    /// Returns `None` once the queue is closed, either explicitly via
    /// [`close`](Self::close) or by self-termination: if this caller is the
    /// last awake worker and the queue is empty, no future order can exist,
    /// so the queue closes and all parked workers are released. After a
    /// `None`, every subsequent `pop` returns `None` without blocking.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        // Once closed the awake count is meaningless; skipping the decrement
        // keeps drain pops from underflowing it.
        if !inner.closed {
            inner.awake -= 1;
        }
        loop {
            if inner.closed {
                return None;
            }
            if let Some(order) = inner.orders.pop_front() {
                inner.awake += 1;
                return Some(order);
            }
            if inner.awake == 0 {
                inner.closed = true;
                self.available.notify_all();
                return None;
            }
            inner = self
                .available
                .wait(inner)
                .expect("queue mutex poisoned");
        }
    }

    /// Close the queue and release every parked worker
    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        if !inner.closed {
            inner.closed = true;
            self.available.notify_all();
        }
    }

    /// Whether the queue has closed
    pub fn is_closed(&self) -> bool {
        self.inner.lock().expect("queue mutex poisoned").closed
    }

    /// Pending orders (diagnostic only; stale the moment it returns)
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Workers currently holding an order or not yet parked
    pub fn awake(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").awake
    }
}
