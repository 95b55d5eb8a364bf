//! The gateway facade: lifecycle, write entry point and mapping registration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use pvgate_types::{GatewayError, NodeId, Variant};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::address_space::{AddressSpace, WriteDecision, WriteInterceptor};
use crate::mapping::{MappingTable, PvMapping};
use crate::queue::{DEFAULT_CAPACITY, EventQueue, GatewayEvent};
use crate::remote::RemoteContext;
use crate::subscription::SubscriptionManager;
use crate::worker::{Dispatcher, GatewayStats, StatsSnapshot};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables for a [`Gateway`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Event queue capacity.
    pub queue_capacity: usize,
    /// Bounded wait for a remote put acknowledgment, in milliseconds.
    pub put_timeout_ms: u64,
}

impl GatewayConfig {
    /// [`GatewayConfig::put_timeout_ms`] as a [`Duration`].
    pub fn put_timeout(&self) -> Duration {
        Duration::from_millis(self.put_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            queue_capacity: DEFAULT_CAPACITY,
            put_timeout_ms: 1000,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────────────────────────────────────

/// Bidirectional bridge between a remote process-variable protocol and a
/// hierarchical server address space.
///
/// The gateway owns the mapping table, the event queue and the worker pool.
/// Register mappings, call [`start`](Gateway::start), then install the
/// gateway as the node manager's [`WriteInterceptor`].
///
/// ```rust,ignore
/// let gateway = Arc::new(Gateway::new(GatewayConfig::default(), remote, space));
/// gateway.add_mapping("T1", NodeId::string(2, "Temperature"));
/// gateway.start()?;
/// // ...
/// gateway.stop();
/// ```
pub struct Gateway {
    config: GatewayConfig,
    mappings: Arc<MappingTable>,
    queue: Arc<EventQueue>,
    subscriptions: SubscriptionManager,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<GatewayStats>,
    running: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Gateway {
    /// Build a stopped gateway around its two collaborators.
    pub fn new(
        config: GatewayConfig,
        remote: Arc<dyn RemoteContext>,
        address_space: Arc<dyn AddressSpace>,
    ) -> Self {
        let mappings = Arc::new(MappingTable::new());
        let queue = Arc::new(EventQueue::new(config.queue_capacity));
        // Nothing may be queued before the workers exist.
        queue.close();
        let stats = Arc::new(GatewayStats::default());
        let dispatcher = Arc::new(Dispatcher {
            mappings: Arc::clone(&mappings),
            queue: Arc::clone(&queue),
            remote: Arc::clone(&remote),
            address_space,
            put_timeout: config.put_timeout(),
            stats: Arc::clone(&stats),
        });
        let subscriptions = SubscriptionManager::new(remote, Arc::clone(&queue));

        Self {
            config,
            mappings,
            queue,
            subscriptions,
            dispatcher,
            stats,
            running: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Configuration the gateway was built with.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Register a mapping.  `false` if the name or node is already mapped.
    pub fn add_mapping(&self, name: &str, node_id: NodeId) -> bool {
        self.try_add_mapping(name, node_id).is_ok()
    }

    /// Register a mapping, reporting a collision as an error.
    pub fn try_add_mapping(
        &self,
        name: &str,
        node_id: NodeId,
    ) -> Result<Arc<PvMapping>, GatewayError> {
        let mapping = self.mappings.try_register(name, node_id)?;
        if self.is_running() {
            warn!(
                pv = %mapping.variable_name,
                node = %mapping.node_id,
                "mapping registered while running; not monitored until the next start"
            );
        }
        Ok(mapping)
    }

    /// `true` if the process variable `name` is mapped.
    pub fn is_mapped_name(&self, name: &str) -> bool {
        self.mappings.is_mapped_name(name)
    }

    /// `true` if `node_id` is mapped.
    pub fn is_mapped_id(&self, node_id: &NodeId) -> bool {
        self.mappings.is_mapped_id(node_id)
    }

    /// The mapping table.
    pub fn mappings(&self) -> &MappingTable {
        &self.mappings
    }

    /// Spawn the worker pool and open every subscription.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::AlreadyRunning`] – `start` was already called.
    /// - [`GatewayError::WorkerSpawn`] – a worker thread could not be
    ///   created; the gateway is stopped again before returning.
    pub fn start(&self) -> Result<(), GatewayError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(GatewayError::AlreadyRunning);
        }
        self.queue.reopen();

        let worker_count = self.config.worker_count.max(1);
        let mut spawn_error = None;
        {
            let mut workers = self.workers.lock();
            for id in 0..worker_count {
                let dispatcher = Arc::clone(&self.dispatcher);
                match thread::Builder::new()
                    .name(format!("pvgate-worker-{id}"))
                    .spawn(move || dispatcher.run(id))
                {
                    Ok(handle) => workers.push(handle),
                    Err(e) => {
                        spawn_error = Some(e);
                        break;
                    }
                }
            }
        }

        if let Some(e) = spawn_error {
            error!(error = %e, "failed to spawn worker thread");
            self.stop();
            return Err(GatewayError::WorkerSpawn(e.to_string()));
        }

        // Workers must exist first: data already buffered at open time is
        // pushed with a blocking push.
        self.subscriptions.open_all(&self.mappings);

        info!(
            workers = worker_count,
            capacity = self.queue.capacity(),
            mappings = self.mappings.len(),
            "gateway started"
        );
        Ok(())
    }

    /// Stop the worker pool and release every subscription.
    ///
    /// Blocks until every worker has drained the queue up to its shutdown
    /// sentinel and exited.  A no-op when the gateway is not running.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.queue.close();
        self.subscriptions.close_all();

        let workers = std::mem::take(&mut *self.workers.lock());
        for _ in &workers {
            self.queue.push_shutdown();
        }
        for handle in workers {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }

        let discarded = self.queue.drain();
        if discarded > 0 {
            warn!(discarded, "events left in the queue after shutdown were discarded");
        }
        info!("gateway stopped");
    }

    /// `true` between a successful [`start`](Gateway::start) and the next
    /// [`stop`](Gateway::stop).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Queue a client write for forwarding to the remote side.
    ///
    /// Blocks while the queue is full.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Unmapped`] – `node_id` has no mapping; nothing is queued.
    /// - [`GatewayError::QueueClosed`] – the gateway is not running.
    pub fn enqueue_write(&self, node_id: &NodeId, value: Variant) -> Result<(), GatewayError> {
        if !self.mappings.is_mapped_id(node_id) {
            warn!(node = %node_id, "write for unmapped node rejected");
            return Err(GatewayError::Unmapped(node_id.to_string()));
        }
        let event = GatewayEvent::write(node_id.clone(), value);
        if let GatewayEvent::WriteRequest { id, .. } = &event {
            debug!(request = %id, node = %node_id, "write queued");
        }
        self.queue.push(event)
    }

    /// Current pipeline counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Write interception
// ─────────────────────────────────────────────────────────────────────────────

impl WriteInterceptor for Gateway {
    fn before_write(&self, node_id: &NodeId, value: &Variant) -> WriteDecision {
        if !self.mappings.is_mapped_id(node_id) {
            return WriteDecision::AllowDefault;
        }
        if let Err(e) = self.enqueue_write(node_id, value.clone()) {
            error!(node = %node_id, error = %e, "client write not forwarded");
        }
        WriteDecision::BlockDefault
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.stop();
    }
}
