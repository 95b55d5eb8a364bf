//! Bounded multi-producer / multi-consumer event queue.
//!
//! Built on a [`crossbeam_channel::bounded`] channel so producers block while
//! the queue is full and consumers block while it is empty.  A full queue is
//! flow control, not an error: nothing is ever dropped.
//!
//! Shutdown is signalled in-band.  [`EventQueue::push_shutdown`] enqueues a
//! sentinel behind every pending event; a consumer that pops it receives
//! `None` and must leave its loop.  One sentinel is needed per consumer.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use pvgate_types::{GatewayError, NodeId, Variant};
use uuid::Uuid;

use crate::subscription::Subscription;

/// Default number of events buffered before producers block.
pub const DEFAULT_CAPACITY: usize = 100;

/// The two kinds of work carried through the gateway.
#[derive(Clone)]
pub enum GatewayEvent {
    /// A monitor with at least one buffered update.
    SubscriptionUpdate(Arc<Subscription>),
    /// A pending write from the server side toward the remote side.
    WriteRequest {
        id: Uuid,
        node_id: NodeId,
        value: Variant,
    },
}

impl GatewayEvent {
    /// Build a write request with a fresh correlation id.
    pub fn write(node_id: NodeId, value: Variant) -> Self {
        GatewayEvent::WriteRequest {
            id: Uuid::new_v4(),
            node_id,
            value,
        }
    }

    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::SubscriptionUpdate(_) => "subscription_update",
            GatewayEvent::WriteRequest { .. } => "write_request",
        }
    }
}

impl fmt::Debug for GatewayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayEvent::SubscriptionUpdate(sub) => f
                .debug_tuple("SubscriptionUpdate")
                .field(&sub.name())
                .finish(),
            GatewayEvent::WriteRequest { id, node_id, value } => f
                .debug_struct("WriteRequest")
                .field("id", id)
                .field("node_id", &node_id.to_string())
                .field("value", value)
                .finish(),
        }
    }
}

/// Failure of a non-blocking push; the event is handed back to the caller.
#[derive(Debug)]
pub enum TryPushError {
    Full(GatewayEvent),
    Closed(GatewayEvent),
}

/// Outcome of a non-blocking pop.
#[derive(Debug)]
pub enum TryPop {
    Event(GatewayEvent),
    /// A shutdown sentinel was popped.
    Shutdown,
    Empty,
}

enum Slot {
    Event(GatewayEvent),
    Shutdown,
}

/// Bounded FIFO of [`GatewayEvent`]s with an in-band shutdown sentinel.
pub struct EventQueue {
    tx: Sender<Slot>,
    rx: Receiver<Slot>,
    capacity: usize,
    closed: AtomicBool,
}

impl EventQueue {
    /// Create a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue `event`, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// [`GatewayError::QueueClosed`] once [`EventQueue::close`] was called.
    pub fn push(&self, event: GatewayEvent) -> Result<(), GatewayError> {
        if self.is_closed() {
            return Err(GatewayError::QueueClosed);
        }
        self.tx
            .send(Slot::Event(event))
            .map_err(|_| GatewayError::QueueClosed)
    }

    /// Enqueue `event` only if there is room right now.
    pub fn try_push(&self, event: GatewayEvent) -> Result<(), TryPushError> {
        if self.is_closed() {
            return Err(TryPushError::Closed(event));
        }
        match self.tx.try_send(Slot::Event(event)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(Slot::Event(e))) => Err(TryPushError::Full(e)),
            Err(TrySendError::Disconnected(Slot::Event(e))) => Err(TryPushError::Closed(e)),
            // Only events are ever handed to try_send.
            Err(TrySendError::Full(Slot::Shutdown) | TrySendError::Disconnected(Slot::Shutdown)) => {
                unreachable!("try_push never sends a sentinel")
            }
        }
    }

    /// Enqueue one shutdown sentinel, blocking while the queue is full.
    ///
    /// Sentinels bypass the closed flag.
    pub fn push_shutdown(&self) {
        // The queue owns its receiver, so the channel cannot be disconnected.
        let _ = self.tx.send(Slot::Shutdown);
    }

    /// Dequeue the next item, blocking while the queue is empty.
    ///
    /// Returns `None` when a shutdown sentinel was popped.
    pub fn pop(&self) -> Option<GatewayEvent> {
        match self.rx.recv() {
            Ok(Slot::Event(event)) => Some(event),
            Ok(Slot::Shutdown) | Err(_) => None,
        }
    }

    /// Dequeue the next item only if one is available right now.
    pub fn try_pop(&self) -> TryPop {
        match self.rx.try_recv() {
            Ok(Slot::Event(event)) => TryPop::Event(event),
            Ok(Slot::Shutdown) => TryPop::Shutdown,
            Err(_) => TryPop::Empty,
        }
    }

    /// Reject every further ordinary push.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Accept ordinary pushes again.
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    /// `true` after [`EventQueue::close`] until the next [`EventQueue::reopen`].
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Discard everything currently queued, returning how many items were dropped.
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Number of items currently queued, sentinels included.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
