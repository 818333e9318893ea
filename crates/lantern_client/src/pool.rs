//! Bounded request pool of one server configuration.

use lantern_error::{ClientError, ClientErrorKind, ClientResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

/// Caps in-flight requests and the number of callers waiting for a slot.
///
/// At most `max_concurrent` permits are out at once. Up to `queue_capacity`
/// further callers may wait; anyone beyond that is rejected with
/// [`ClientErrorKind::QueueSaturated`] instead of blocking.
#[derive(Debug)]
pub struct RequestPool {
    slots: Arc<Semaphore>,
    max_concurrent: usize,
    queue_capacity: usize,
    waiting: AtomicUsize,
    closed: AtomicBool,
}

/// One in-flight slot. The slot is released when the permit is dropped.
#[derive(Debug)]
pub struct PoolPermit {
    _permit: OwnedSemaphorePermit,
}

struct WaitGuard<'a>(&'a AtomicUsize);

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RequestPool {
    /// Create a pool with `max_concurrent` slots and room for
    /// `queue_capacity` waiters.
    pub fn new(max_concurrent: usize, queue_capacity: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            queue_capacity,
            waiting: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Maximum simultaneous requests.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Maximum waiting callers.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Requests currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent
            .saturating_sub(self.slots.available_permits())
    }

    /// Callers currently waiting for a slot.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Take a slot, waiting in the queue if every slot is busy.
    pub async fn acquire(&self) -> ClientResult<PoolPermit> {
        if self.is_closed() {
            return Err(ClientError::new(ClientErrorKind::Closed));
        }

        if let Ok(permit) = self.slots.clone().try_acquire_owned() {
            trace!(in_flight = self.in_flight(), "Acquired slot without waiting");
            return Ok(PoolPermit { _permit: permit });
        }

        let queued = self.waiting.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = WaitGuard(&self.waiting);
        if queued > self.queue_capacity {
            debug!(
                capacity = self.queue_capacity,
                "Request queue saturated, rejecting"
            );
            return Err(ClientError::new(ClientErrorKind::QueueSaturated {
                capacity: self.queue_capacity,
            }));
        }

        trace!(waiting = queued, "Waiting for a free slot");
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ClientError::new(ClientErrorKind::Closed))?;
        Ok(PoolPermit { _permit: permit })
    }

    /// Refuse new requests and wake every waiter with
    /// [`ClientErrorKind::Closed`]. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closing request pool");
            self.slots.close();
        }
    }
}
