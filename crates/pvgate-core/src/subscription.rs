//! Subscription management: one live monitor per mapped process variable.
//!
//! Each [`Subscription`] wraps a remote [`Monitor`] together with a
//! *scheduled* flag.  The remote stack's data-available callback only
//! enqueues a [`GatewayEvent::SubscriptionUpdate`] when the flag was clear,
//! so a subscription is present at most once in the pipeline, whether
//! queued or being dispatched.  The worker that owns the event keeps the
//! flag set while it re-arms the subscription and clears it only when the
//! monitor turns out to be empty.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use pvgate_types::{GatewayError, RemoteValue};
use tracing::{debug, info, warn};

use crate::mapping::MappingTable;
use crate::queue::{EventQueue, GatewayEvent};
use crate::remote::{Monitor, NotifyFn, RemoteContext};

// ─────────────────────────────────────────────────────────────────────────────
// Subscription
// ─────────────────────────────────────────────────────────────────────────────

/// A live monitor shared between the remote callback and the worker pool.
pub struct Subscription {
    name: String,
    monitor: OnceLock<Box<dyn Monitor>>,
    scheduled: AtomicBool,
}

impl Subscription {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            monitor: OnceLock::new(),
            scheduled: AtomicBool::new(false),
        })
    }

    /// Name of the monitored process variable.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` while an event for this subscription is queued or dispatching.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Enqueue this subscription unless it is already in the pipeline.
    ///
    /// Blocks while the queue is full.  Returns `true` if an event was pushed.
    pub(crate) fn schedule(self: &Arc<Self>, queue: &EventQueue) -> bool {
        if !self.try_claim() {
            return false;
        }
        match queue.push(GatewayEvent::SubscriptionUpdate(Arc::clone(self))) {
            Ok(()) => true,
            Err(e) => {
                self.release();
                debug!(pv = %self.name, error = %e, "update notification dropped");
                false
            }
        }
    }

    /// Set the scheduled flag; `false` if it was already set.
    pub(crate) fn try_claim(&self) -> bool {
        !self.scheduled.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn release(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    pub(crate) fn pop(&self) -> Result<Option<RemoteValue>, GatewayError> {
        match self.monitor.get() {
            Some(monitor) => monitor.pop(),
            None => Ok(None),
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.monitor.get().is_some_and(|m| m.has_pending())
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("scheduled", &self.is_scheduled())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Manager
// ─────────────────────────────────────────────────────────────────────────────

/// Opens and retains the monitors for every mapped variable.
pub struct SubscriptionManager {
    remote: Arc<dyn RemoteContext>,
    queue: Arc<EventQueue>,
    active: Mutex<Vec<Arc<Subscription>>>,
}

impl SubscriptionManager {
    /// Manager opening monitors on `remote` and scheduling onto `queue`.
    pub fn new(remote: Arc<dyn RemoteContext>, queue: Arc<EventQueue>) -> Self {
        Self {
            remote,
            queue,
            active: Mutex::new(Vec::new()),
        }
    }

    /// Open one monitor per entry of `mappings`.
    ///
    /// A variable whose monitor cannot be opened is logged and skipped.
    /// Returns the number of monitors opened.
    pub fn open_all(&self, mappings: &MappingTable) -> usize {
        let mut opened = 0;
        for mapping in mappings.mappings() {
            match self.open(&mapping.variable_name) {
                Ok(_) => opened += 1,
                Err(e) => warn!(
                    pv = %mapping.variable_name,
                    node = %mapping.node_id,
                    error = %e,
                    "could not open monitor; variable will not be synchronised"
                ),
            }
        }
        info!(opened, mapped = mappings.len(), "subscriptions opened");
        opened
    }

    /// Open a monitor for `name` and retain it.
    pub fn open(&self, name: &str) -> Result<Arc<Subscription>, GatewayError> {
        let subscription = Subscription::new(name);
        let monitor = self.remote.monitor(name, self.notifier(&subscription))?;
        // The cell was created empty just above.
        let _ = subscription.monitor.set(monitor);

        // Updates that arrived before the cell was filled were seen as empty.
        if subscription.has_pending() {
            subscription.schedule(&self.queue);
        }

        self.active.lock().push(Arc::clone(&subscription));
        debug!(pv = %name, "monitor opened");
        Ok(subscription)
    }

    /// Drop every retained subscription, cancelling their monitors once the
    /// last queued event referring to them is gone.
    pub fn close_all(&self) {
        let closed = std::mem::take(&mut *self.active.lock());
        debug!(count = closed.len(), "subscriptions closed");
    }

    /// Number of retained subscriptions.
    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    /// `true` when no subscription is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notifier(&self, subscription: &Arc<Subscription>) -> NotifyFn {
        let weak: Weak<Subscription> = Arc::downgrade(subscription);
        let queue = Arc::clone(&self.queue);
        Box::new(move || {
            if let Some(subscription) = weak.upgrade() {
                subscription.schedule(&queue);
            }
        })
    }
}
