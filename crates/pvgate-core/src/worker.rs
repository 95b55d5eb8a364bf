//! Worker pool loop and per-event dispatch.
//!
//! Every worker runs [`Dispatcher::run`]: block in [`EventQueue::pop`]
//! (*waiting*), hand the event to its handler (*dispatching*), go back to
//! waiting.  Popping the shutdown sentinel terminates the loop.  Handler
//! errors and panics are logged here, at the dispatch boundary, and never
//! end the loop.
//!
//! A drained subscription is re-armed with a non-blocking push.  When the
//! queue is full the worker keeps the event in a local backlog instead of
//! blocking on its own queue.  While the backlog is non-empty the worker
//! serves the queue first and puts backlog events back as slots free up, so
//! a busy monitor never starves the rest of the pipeline.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use pvgate_types::{GatewayError, NodeId, RemoteValue, Variant};
use tracing::{debug, error, info_span, trace, warn};
use uuid::Uuid;

use crate::address_space::AddressSpace;
use crate::convert::{local_to_remote, remote_to_local, RemoteKind};
use crate::mapping::MappingTable;
use crate::queue::{EventQueue, GatewayEvent, TryPop, TryPushError};
use crate::remote::RemoteContext;
use crate::subscription::Subscription;

// ─────────────────────────────────────────────────────────────────────────────
// Statistics
// ─────────────────────────────────────────────────────────────────────────────

/// Monotonic pipeline counters.
#[derive(Debug, Default)]
pub struct GatewayStats {
    updates_applied: AtomicU64,
    update_failures: AtomicU64,
    writes_forwarded: AtomicU64,
    write_failures: AtomicU64,
    write_timeouts: AtomicU64,
    spurious_wakes: AtomicU64,
    dispatch_panics: AtomicU64,
}

/// Point-in-time copy of [`GatewayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub updates_applied: u64,
    pub update_failures: u64,
    pub writes_forwarded: u64,
    /// Every write that was not forwarded, timeouts included.
    pub write_failures: u64,
    /// Writes whose put was not acknowledged within the bounded wait.
    pub write_timeouts: u64,
    pub spurious_wakes: u64,
    /// Handlers that panicked; the worker survived each of them.
    pub dispatch_panics: u64,
}

impl GatewayStats {
    /// Read every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            update_failures: self.update_failures.load(Ordering::Relaxed),
            writes_forwarded: self.writes_forwarded.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            write_timeouts: self.write_timeouts.load(Ordering::Relaxed),
            spurious_wakes: self.spurious_wakes.load(Ordering::Relaxed),
            dispatch_panics: self.dispatch_panics.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a worker needs to handle events.
pub(crate) struct Dispatcher {
    pub(crate) mappings: Arc<MappingTable>,
    pub(crate) queue: Arc<EventQueue>,
    pub(crate) remote: Arc<dyn RemoteContext>,
    pub(crate) address_space: Arc<dyn AddressSpace>,
    pub(crate) put_timeout: Duration,
    pub(crate) stats: Arc<GatewayStats>,
}

impl Dispatcher {
    /// Worker loop; returns after popping a shutdown sentinel.
    pub(crate) fn run(&self, worker: usize) {
        let _span = info_span!("worker", id = worker).entered();
        debug!("worker started");

        let mut backlog: VecDeque<GatewayEvent> = VecDeque::new();
        loop {
            let event = if backlog.is_empty() {
                match self.queue.pop() {
                    Some(event) => event,
                    None => break,
                }
            } else {
                match self.queue.try_pop() {
                    TryPop::Event(event) => {
                        self.requeue(&mut backlog);
                        event
                    }
                    TryPop::Empty => match backlog.pop_front() {
                        Some(event) => event,
                        None => continue,
                    },
                    TryPop::Shutdown => break,
                }
            };
            if let Some(next) = self.dispatch_guarded(event) {
                backlog.push_back(next);
            }
        }

        for event in backlog {
            release(event);
        }
        debug!("worker stopped");
    }

    /// Move backlog events into the queue while it has room.
    fn requeue(&self, backlog: &mut VecDeque<GatewayEvent>) {
        while let Some(event) = backlog.pop_front() {
            match self.queue.try_push(event) {
                Ok(()) => {}
                Err(TryPushError::Full(event)) => {
                    backlog.push_front(event);
                    return;
                }
                Err(TryPushError::Closed(event)) => release(event),
            }
        }
    }

    /// [`Dispatcher::dispatch`] with panics caught, logged and counted.
    ///
    /// A subscription whose handler panicked is re-armed so its monitor is
    /// not left marked as scheduled forever.
    fn dispatch_guarded(&self, event: GatewayEvent) -> Option<GatewayEvent> {
        let context = event.clone();
        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(event))) {
            Ok(next) => next,
            Err(payload) => {
                GatewayStats::bump(&self.stats.dispatch_panics);
                let reason = panic_message(payload.as_ref());
                match context {
                    GatewayEvent::SubscriptionUpdate(subscription) => {
                        error!(
                            kind = "subscription_update",
                            pv = %subscription.name(),
                            panic = %reason,
                            "handler panicked; worker continues"
                        );
                        self.rearm(subscription)
                    }
                    GatewayEvent::WriteRequest { id, node_id, .. } => {
                        GatewayStats::bump(&self.stats.write_failures);
                        error!(
                            kind = "write_request",
                            request = %id,
                            node = %node_id,
                            panic = %reason,
                            "handler panicked; worker continues"
                        );
                        None
                    }
                }
            }
        }
    }

    /// Handle one event.  Returns an event the caller must dispatch next.
    pub(crate) fn dispatch(&self, event: GatewayEvent) -> Option<GatewayEvent> {
        match event {
            GatewayEvent::SubscriptionUpdate(subscription) => self.on_update(subscription),
            GatewayEvent::WriteRequest { id, node_id, value } => {
                self.on_write(id, &node_id, value);
                None
            }
        }
    }

    fn on_update(&self, subscription: Arc<Subscription>) -> Option<GatewayEvent> {
        match subscription.pop() {
            Ok(None) => {
                GatewayStats::bump(&self.stats.spurious_wakes);
                subscription.release();
                // Data that landed between the pop and the release found the
                // flag still set and did not notify.
                if subscription.has_pending() && subscription.try_claim() {
                    return self.rearm(subscription);
                }
                return None;
            }
            Ok(Some(value)) => {
                if let Err(e) = self.apply_update(subscription.name(), &value) {
                    GatewayStats::bump(&self.stats.update_failures);
                    warn!(
                        kind = "subscription_update",
                        pv = %subscription.name(),
                        error = %e,
                        "update not applied"
                    );
                }
            }
            Err(e) => {
                warn!(
                    kind = "subscription_update",
                    pv = %subscription.name(),
                    error = %e,
                    "monitor reported an error"
                );
            }
        }
        self.rearm(subscription)
    }

    fn apply_update(&self, name: &str, value: &RemoteValue) -> Result<(), GatewayError> {
        let Some(mapping) = self.mappings.lookup_by_name(name) else {
            debug!(pv = %name, "update for unmapped variable ignored");
            return Ok(());
        };
        let variant = remote_to_local(value)?;
        trace!(pv = %name, node = %mapping.node_id, value = %variant, "applying update");
        self.address_space.update_variable(&mapping.node_id, variant)?;
        GatewayStats::bump(&self.stats.updates_applied);
        Ok(())
    }

    fn rearm(&self, subscription: Arc<Subscription>) -> Option<GatewayEvent> {
        match self
            .queue
            .try_push(GatewayEvent::SubscriptionUpdate(subscription))
        {
            Ok(()) => None,
            Err(TryPushError::Full(event)) => {
                trace!("queue full; monitor kept in the worker backlog");
                Some(event)
            }
            Err(TryPushError::Closed(event)) => {
                release(event);
                None
            }
        }
    }

    fn on_write(&self, id: Uuid, node_id: &NodeId, value: Variant) {
        match self.forward_write(node_id, value) {
            Ok(()) => {
                GatewayStats::bump(&self.stats.writes_forwarded);
                debug!(kind = "write_request", request = %id, node = %node_id, "write forwarded");
            }
            Err(e) => {
                if matches!(e, GatewayError::RemoteTimeout { .. }) {
                    GatewayStats::bump(&self.stats.write_timeouts);
                }
                GatewayStats::bump(&self.stats.write_failures);
                warn!(
                    kind = "write_request",
                    request = %id,
                    node = %node_id,
                    error = %e,
                    "write not forwarded; server-side value left as written"
                );
            }
        }
    }

    fn forward_write(&self, node_id: &NodeId, value: Variant) -> Result<(), GatewayError> {
        let mapping = self
            .mappings
            .lookup_by_id(node_id)
            .ok_or_else(|| GatewayError::Unmapped(node_id.to_string()))?;

        let record = local_to_remote(&value)?;
        let path = RemoteKind::inspect(&record)?.put_path();
        let field = record
            .lookup(path)
            .cloned()
            .ok_or_else(|| GatewayError::UnsupportedType(format!("record has no {path} field")))?;

        debug!(pv = %mapping.variable_name, path, value = %value, "issuing put");
        self.remote
            .put(&mapping.variable_name, path, field)?
            .wait(self.put_timeout)
    }
}

/// Drop an event that can no longer be queued, clearing a subscription's flag.
fn release(event: GatewayEvent) {
    if let GatewayEvent::SubscriptionUpdate(subscription) = event {
        subscription.release();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeAddressSpace, FakeRemote, PutMode};
    use crate::subscription::SubscriptionManager;
    use pvgate_types::Field;
    use std::thread;
    use std::time::Instant;

    struct Harness {
        remote: Arc<FakeRemote>,
        space: Arc<FakeAddressSpace>,
        queue: Arc<EventQueue>,
        mappings: Arc<MappingTable>,
        dispatcher: Arc<Dispatcher>,
        subscriptions: SubscriptionManager,
    }

    fn harness(capacity: usize, put_timeout: Duration) -> Harness {
        let remote = Arc::new(FakeRemote::default());
        let space = Arc::new(FakeAddressSpace::default());
        let queue = Arc::new(EventQueue::new(capacity));
        let mappings = Arc::new(MappingTable::new());
        let dispatcher = Arc::new(Dispatcher {
            mappings: Arc::clone(&mappings),
            queue: Arc::clone(&queue),
            remote: remote.clone(),
            address_space: space.clone(),
            put_timeout,
            stats: Arc::new(GatewayStats::default()),
        });
        let subscriptions = SubscriptionManager::new(remote.clone(), Arc::clone(&queue));
        Harness {
            remote,
            space,
            queue,
            mappings,
            dispatcher,
            subscriptions,
        }
    }

    fn node(s: &str) -> NodeId {
        NodeId::string(2, s)
    }

    fn spawn_workers(h: &Harness, n: usize) -> Vec<thread::JoinHandle<()>> {
        (0..n)
            .map(|i| {
                let d = Arc::clone(&h.dispatcher);
                thread::spawn(move || d.run(i))
            })
            .collect()
    }

    fn shutdown(h: &Harness, workers: Vec<thread::JoinHandle<()>>) {
        h.queue.close();
        for _ in &workers {
            h.queue.push_shutdown();
        }
        for w in workers {
            w.join().unwrap();
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn write_request_issues_scalar_put() {
        let h = harness(8, Duration::from_millis(100));
        h.mappings.register("T1", node("N1"));

        let carried = h
            .dispatcher
            .dispatch(GatewayEvent::write(node("N1"), Variant::Double(42.5)));
        assert!(carried.is_none());

        assert_eq!(
            h.remote.puts(),
            vec![("T1".to_string(), "value".to_string(), Field::Float64(42.5))]
        );
        assert_eq!(h.dispatcher.stats.snapshot().writes_forwarded, 1);
    }

    #[test]
    fn boolean_write_puts_enum_index() {
        let h = harness(8, Duration::from_millis(100));
        h.mappings.register("B1", node("N2"));

        h.dispatcher
            .dispatch(GatewayEvent::write(node("N2"), Variant::Boolean(true)));
        assert_eq!(
            h.remote.puts(),
            vec![("B1".to_string(), "value.index".to_string(), Field::Int32(1))]
        );
    }

    #[test]
    fn unsupported_write_is_logged_and_counted() {
        let h = harness(8, Duration::from_millis(100));
        h.mappings.register("S1", node("N3"));

        h.dispatcher
            .dispatch(GatewayEvent::write(node("N3"), Variant::String("x".into())));
        assert!(h.remote.puts().is_empty());
        assert_eq!(h.dispatcher.stats.snapshot().write_failures, 1);
    }

    #[test]
    fn rejected_put_counts_as_failure() {
        let h = harness(8, Duration::from_millis(100));
        h.mappings.register("T1", node("N1"));
        h.remote.set_put_mode(PutMode::Reject);

        h.dispatcher
            .dispatch(GatewayEvent::write(node("N1"), Variant::Int32(3)));
        let stats = h.dispatcher.stats.snapshot();
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.write_timeouts, 0);
        assert_eq!(stats.writes_forwarded, 0);
    }

    #[test]
    fn unacknowledged_put_times_out_and_worker_keeps_running() {
        let h = harness(8, Duration::from_millis(20));
        h.mappings.register("T1", node("N1"));
        h.remote.set_put_mode(PutMode::NeverAck);
        let workers = spawn_workers(&h, 1);

        h.queue
            .push(GatewayEvent::write(node("N1"), Variant::Double(1.0)))
            .unwrap();
        wait_until(|| h.dispatcher.stats.snapshot().write_timeouts == 1);
        wait_until(|| h.dispatcher.stats.snapshot().write_failures == 1);

        // The worker is back in the waiting state and handles the next event.
        h.remote.set_put_mode(PutMode::Ack);
        h.queue
            .push(GatewayEvent::write(node("N1"), Variant::Double(2.0)))
            .unwrap();
        wait_until(|| h.dispatcher.stats.snapshot().writes_forwarded == 1);

        shutdown(&h, workers);
    }

    #[test]
    fn subscription_update_reaches_address_space_and_rearms() {
        let h = harness(8, Duration::from_millis(100));
        h.mappings.register("B1", node("N2"));
        h.subscriptions.open_all(&h.mappings);

        h.remote.post(
            "B1",
            Ok(RemoteValue::enumerated(1, vec!["Off".into(), "On".into()])),
        );
        let event = h.queue.pop().unwrap();
        assert!(h.dispatcher.dispatch(event).is_none());

        assert_eq!(h.space.updates(), vec![(node("N2"), Variant::Boolean(true))]);
        // Re-armed: the same monitor is back in the queue.
        assert!(matches!(
            h.queue.pop(),
            Some(GatewayEvent::SubscriptionUpdate(sub)) if sub.name() == "B1"
        ));
    }

    #[test]
    fn spurious_wake_drops_event_and_releases_flag() {
        let h = harness(8, Duration::from_millis(100));
        h.mappings.register("T1", node("N1"));
        let sub = h.subscriptions.open("T1").unwrap();

        h.remote.notify("T1");
        let event = h.queue.pop().unwrap();
        assert!(h.dispatcher.dispatch(event).is_none());

        assert!(h.queue.is_empty());
        assert!(!sub.is_scheduled());
        assert_eq!(h.dispatcher.stats.snapshot().spurious_wakes, 1);
    }

    #[test]
    fn conversion_failure_still_rearms() {
        let h = harness(8, Duration::from_millis(100));
        h.mappings.register("T1", node("N1"));
        h.subscriptions.open_all(&h.mappings);

        h.remote.post("T1", Ok(RemoteValue::scalar(Field::String("bad".into()))));
        let event = h.queue.pop().unwrap();
        h.dispatcher.dispatch(event);

        assert!(h.space.updates().is_empty());
        assert_eq!(h.dispatcher.stats.snapshot().update_failures, 1);
        assert_eq!(h.queue.len(), 1);
    }

    #[test]
    fn mutation_failure_is_logged_and_counted() {
        let h = harness(8, Duration::from_millis(100));
        h.mappings.register("T1", node("N1"));
        h.space.mark_object(&node("N1"));
        h.subscriptions.open_all(&h.mappings);

        h.remote.post("T1", Ok(RemoteValue::scalar(Field::Float64(1.0))));
        let event = h.queue.pop().unwrap();
        h.dispatcher.dispatch(event);
        assert_eq!(h.dispatcher.stats.snapshot().update_failures, 1);

        h.space.mark_unknown(&node("N1"));
        h.remote.post("T1", Ok(RemoteValue::scalar(Field::Float64(2.0))));
        let event = h.queue.pop().unwrap();
        h.dispatcher.dispatch(event);
        assert_eq!(h.dispatcher.stats.snapshot().update_failures, 2);
        assert!(h.space.updates().is_empty());
    }

    #[test]
    fn monitor_error_is_logged_and_rearmed() {
        let h = harness(8, Duration::from_millis(100));
        h.mappings.register("T1", node("N1"));
        h.subscriptions.open_all(&h.mappings);

        h.remote.post(
            "T1",
            Err(GatewayError::MonitorFailed {
                pv: "T1".into(),
                reason: "disconnected".into(),
            }),
        );
        h.remote.post("T1", Ok(RemoteValue::scalar(Field::Float64(3.0))));

        let event = h.queue.pop().unwrap();
        h.dispatcher.dispatch(event);
        let event = h.queue.pop().unwrap();
        h.dispatcher.dispatch(event);

        assert_eq!(h.space.updates(), vec![(node("N1"), Variant::Double(3.0))]);
    }

    #[test]
    fn full_queue_hands_rearm_back_to_worker() {
        let h = harness(1, Duration::from_millis(100));
        h.mappings.register("T1", node("N1"));
        h.subscriptions.open_all(&h.mappings);

        h.remote.post("T1", Ok(RemoteValue::scalar(Field::Float64(1.0))));
        let event = h.queue.pop().unwrap();
        // Another producer fills the only slot.
        h.queue
            .push(GatewayEvent::write(node("N1"), Variant::Double(9.0)))
            .unwrap();

        let carried = h.dispatcher.dispatch(event);
        assert!(matches!(carried, Some(GatewayEvent::SubscriptionUpdate(_))));
    }

    #[test]
    fn updates_of_one_monitor_are_applied_in_order() {
        let h = harness(16, Duration::from_millis(100));
        h.mappings.register("T1", node("N1"));
        h.subscriptions.open_all(&h.mappings);
        let workers = spawn_workers(&h, 4);

        for i in 0..50 {
            h.remote.post("T1", Ok(RemoteValue::scalar(Field::Int32(i))));
        }
        wait_until(|| h.space.updates().len() == 50);
        shutdown(&h, workers);

        let seen: Vec<Variant> = h.space.updates().into_iter().map(|(_, v)| v).collect();
        let expected: Vec<Variant> = (0..50).map(Variant::Int32).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn monitor_is_never_dispatched_concurrently() {
        let h = harness(32, Duration::from_millis(100));
        for name in ["A", "B", "C"] {
            h.mappings.register(name, node(name));
        }
        h.subscriptions.open_all(&h.mappings);
        h.space.set_delay(Duration::from_millis(1));
        let workers = spawn_workers(&h, 4);

        let producers: Vec<_> = ["A", "B", "C"]
            .into_iter()
            .map(|name| {
                let remote = Arc::clone(&h.remote);
                thread::spawn(move || {
                    for i in 0..40 {
                        remote.post(name, Ok(RemoteValue::scalar(Field::Int64(i))));
                        // Spurious callbacks must not produce a second event either.
                        remote.notify(name);
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        wait_until(|| h.space.updates().len() == 120);
        shutdown(&h, workers);
        assert_eq!(h.space.max_in_flight_per_node(), 1);
    }

    /// Records, for every update, how many puts the remote had seen by then.
    /// The first update also queues a write, as a server client would.
    struct WriteOnFirstUpdate {
        remote: Arc<FakeRemote>,
        queue: Arc<EventQueue>,
        puts_seen: parking_lot::Mutex<Vec<usize>>,
    }

    impl AddressSpace for WriteOnFirstUpdate {
        fn update_variable(&self, _node_id: &NodeId, _value: Variant) -> Result<(), GatewayError> {
            let mut seen = self.puts_seen.lock();
            if seen.is_empty() {
                self.queue
                    .try_push(GatewayEvent::write(node("W1"), Variant::Double(7.0)))
                    .unwrap();
            }
            seen.push(self.remote.puts().len());
            Ok(())
        }
    }

    #[test]
    fn backlogged_monitor_does_not_starve_queued_write() {
        let h = harness(1, Duration::from_millis(100));
        h.mappings.register("T1", node("N1"));
        h.mappings.register("W1", node("W1"));
        for i in 0..50 {
            h.remote.preload("T1", Ok(RemoteValue::scalar(Field::Int32(i))));
        }
        let space = Arc::new(WriteOnFirstUpdate {
            remote: Arc::clone(&h.remote),
            queue: Arc::clone(&h.queue),
            puts_seen: parking_lot::Mutex::new(Vec::new()),
        });
        let dispatcher = Arc::new(Dispatcher {
            mappings: Arc::clone(&h.mappings),
            queue: Arc::clone(&h.queue),
            remote: h.remote.clone(),
            address_space: space.clone(),
            put_timeout: Duration::from_millis(100),
            stats: Arc::new(GatewayStats::default()),
        });
        // Only T1 is monitored; its event fills the single slot.
        h.subscriptions.open("T1").unwrap();
        assert_eq!(h.queue.len(), 1);

        let worker = {
            let d = Arc::clone(&dispatcher);
            thread::spawn(move || d.run(0))
        };
        wait_until(|| space.puts_seen.lock().len() == 50);
        h.queue.close();
        h.queue.push_shutdown();
        worker.join().unwrap();

        let seen = space.puts_seen.lock().clone();
        let before_write = seen.iter().filter(|&&puts| puts == 0).count();
        assert_eq!(before_write, 1, "write served after {before_write} updates");
        assert_eq!(h.remote.puts().len(), 1);
        assert_eq!(dispatcher.stats.snapshot().writes_forwarded, 1);
    }

    #[test]
    fn panicking_handler_does_not_kill_worker() {
        let h = harness(8, Duration::from_millis(100));
        h.mappings.register("T1", node("N1"));
        h.space.panic_on_next_update();
        let dispatcher = Arc::clone(&h.dispatcher);
        let sub = h.subscriptions.open("T1").unwrap();
        let worker = {
            let d = Arc::clone(&dispatcher);
            thread::spawn(move || d.run(0))
        };

        h.remote.post("T1", Ok(RemoteValue::scalar(Field::Float64(1.0))));
        wait_until(|| dispatcher.stats.snapshot().dispatch_panics == 1);

        // The same worker still serves writes.
        h.queue
            .push(GatewayEvent::write(node("N1"), Variant::Double(2.0)))
            .unwrap();
        wait_until(|| dispatcher.stats.snapshot().writes_forwarded == 1);

        // The monitor was re-armed, so later updates still arrive.
        wait_until(|| !sub.is_scheduled());
        h.remote.post("T1", Ok(RemoteValue::scalar(Field::Float64(3.0))));
        wait_until(|| h.space.updates().len() == 1);
        assert_eq!(h.space.updates(), vec![(node("N1"), Variant::Double(3.0))]);

        h.queue.close();
        h.queue.push_shutdown();
        assert!(worker.join().is_ok());
        assert_eq!(dispatcher.stats.snapshot().dispatch_panics, 1);
    }
}
