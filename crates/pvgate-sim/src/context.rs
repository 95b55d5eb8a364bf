//! [`SimContext`] – an in-process process-variable server.
//!
//! Holds a set of named records and implements [`RemoteContext`] against
//! them, so the gateway can run end-to-end without a network.
//!
//! # Behaviour
//!
//! | Operation | Simulated behaviour |
//! |---|---|
//! | `monitor` | Buffers the current record, then every later change, per monitor in arrival order. |
//! | `put` | Writes one field path, echoes the new record to every monitor from a separate thread and acknowledges after the configured latency. |
//! | read-only PV | `put` is [`GatewayError::RemoteRejected`]. |
//! | unresponsive PV | `put` never acknowledges; the bounded wait times out. |
//!
//! # Example
//!
//! ```rust
//! use pvgate_sim::SimContext;
//! use pvgate_types::{Field, RemoteValue};
//!
//! let ctx = SimContext::new()
//!     .with_pv("ioc:Temp", RemoteValue::scalar(Field::Float64(21.0)))
//!     .with_read_only_pv("ioc:Serial", RemoteValue::scalar(Field::Int32(7)));
//!
//! ctx.post("ioc:Temp", RemoteValue::scalar(Field::Float64(21.5))).unwrap();
//! assert_eq!(
//!     ctx.current("ioc:Temp").unwrap().lookup("value"),
//!     Some(&Field::Float64(21.5))
//! );
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use pvgate_core::{Monitor, NotifyFn, PendingPut, RemoteContext};
use pvgate_types::{Field, GatewayError, RemoteValue};
use tracing::{debug, trace, warn};

type Delivery = Result<RemoteValue, GatewayError>;

// ─────────────────────────────────────────────────────────────────────────────
// Monitors
// ─────────────────────────────────────────────────────────────────────────────

struct MonitorShared {
    buffer: Mutex<VecDeque<Delivery>>,
    notify: NotifyFn,
}

impl MonitorShared {
    fn deliver(&self, item: Delivery) {
        let was_empty = {
            let mut buffer = self.buffer.lock();
            let empty = buffer.is_empty();
            buffer.push_back(item);
            empty
        };
        if was_empty {
            (self.notify)();
        }
    }
}

struct SimMonitor {
    name: String,
    shared: Arc<MonitorShared>,
}

impl Monitor for SimMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn pop(&self) -> Result<Option<RemoteValue>, GatewayError> {
        self.shared.buffer.lock().pop_front().transpose()
    }

    fn has_pending(&self) -> bool {
        !self.shared.buffer.lock().is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Puts
// ─────────────────────────────────────────────────────────────────────────────

struct SimPut {
    pv: String,
    latency: Option<Duration>,
}

impl PendingPut for SimPut {
    fn wait(self: Box<Self>, timeout: Duration) -> Result<(), GatewayError> {
        match self.latency {
            Some(latency) if latency <= timeout => {
                if !latency.is_zero() {
                    thread::sleep(latency);
                }
                Ok(())
            }
            _ => {
                thread::sleep(timeout);
                Err(GatewayError::RemoteTimeout {
                    pv: self.pv,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

struct PvRecord {
    value: RemoteValue,
    read_only: bool,
    unresponsive: bool,
    puts: usize,
    monitors: Vec<Weak<MonitorShared>>,
}

impl PvRecord {
    fn new(value: RemoteValue) -> Self {
        Self {
            value,
            read_only: false,
            unresponsive: false,
            puts: 0,
            monitors: Vec::new(),
        }
    }

    /// Live monitors; detached ones are pruned.
    fn subscribers(&mut self) -> Vec<Arc<MonitorShared>> {
        self.monitors.retain(|w| w.strong_count() > 0);
        self.monitors.iter().filter_map(Weak::upgrade).collect()
    }
}

/// Simulated process-variable server.
pub struct SimContext {
    pvs: Mutex<HashMap<String, PvRecord>>,
    ack_latency: Duration,
}

impl Default for SimContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SimContext {
    pub fn new() -> Self {
        Self {
            pvs: Mutex::new(HashMap::new()),
            ack_latency: Duration::ZERO,
        }
    }

    /// Add a writable process variable.
    pub fn with_pv(self, name: impl Into<String>, value: RemoteValue) -> Self {
        self.add_pv(name, value);
        self
    }

    /// Add a process variable that rejects every put.
    pub fn with_read_only_pv(self, name: impl Into<String>, value: RemoteValue) -> Self {
        let name = name.into();
        self.add_pv(name.clone(), value);
        if let Some(record) = self.pvs.lock().get_mut(&name) {
            record.read_only = true;
        }
        self
    }

    /// Delay between a put and its acknowledgment.
    pub fn with_ack_latency(mut self, latency: Duration) -> Self {
        self.ack_latency = latency;
        self
    }

    /// Add (or replace) a process variable at runtime.
    pub fn add_pv(&self, name: impl Into<String>, value: RemoteValue) {
        self.pvs.lock().insert(name.into(), PvRecord::new(value));
    }

    /// Make puts to `name` hang until the caller's wait times out.
    pub fn set_unresponsive(&self, name: &str, unresponsive: bool) {
        if let Some(record) = self.pvs.lock().get_mut(name) {
            record.unresponsive = unresponsive;
        }
    }

    pub fn current(&self, name: &str) -> Option<RemoteValue> {
        self.pvs.lock().get(name).map(|r| r.value.clone())
    }

    /// Puts applied to `name` so far.
    pub fn put_count(&self, name: &str) -> usize {
        self.pvs.lock().get(name).map_or(0, |r| r.puts)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pvs.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of live monitors attached to `name`.
    pub fn monitor_count(&self, name: &str) -> usize {
        self.pvs
            .lock()
            .get_mut(name)
            .map_or(0, |r| r.subscribers().len())
    }

    /// Publish a server-side change to `name`.
    pub fn post(&self, name: &str, value: RemoteValue) -> Result<(), GatewayError> {
        let subscribers = {
            let mut pvs = self.pvs.lock();
            let record = pvs.get_mut(name).ok_or_else(|| unknown(name))?;
            record.value = value.clone();
            record.subscribers()
        };
        trace!(pv = %name, monitors = subscribers.len(), "posting update");
        for monitor in subscribers {
            monitor.deliver(Ok(value.clone()));
        }
        Ok(())
    }

    /// Deliver an error (for instance a disconnect) to every monitor of `name`.
    pub fn post_error(&self, name: &str, reason: &str) -> Result<(), GatewayError> {
        let subscribers = {
            let mut pvs = self.pvs.lock();
            pvs.get_mut(name).ok_or_else(|| unknown(name))?.subscribers()
        };
        for monitor in subscribers {
            monitor.deliver(Err(GatewayError::MonitorFailed {
                pv: name.to_string(),
                reason: reason.to_string(),
            }));
        }
        Ok(())
    }
}

fn unknown(name: &str) -> GatewayError {
    GatewayError::RemoteRejected {
        pv: name.to_string(),
        reason: "unknown process variable".to_string(),
    }
}

fn rejected(name: &str, reason: String) -> GatewayError {
    GatewayError::RemoteRejected {
        pv: name.to_string(),
        reason,
    }
}

/// Check that `value` may be stored at `path` of `record`.
fn validate_put(name: &str, record: &RemoteValue, path: &str, value: &Field) -> Result<(), GatewayError> {
    let target = record
        .lookup(path)
        .ok_or_else(|| rejected(name, format!("no field '{path}'")))?;
    if !target.same_kind(value) {
        return Err(rejected(
            name,
            format!("type mismatch at '{path}': expected {}, got {}", target.type_name(), value.type_name()),
        ));
    }
    if path == "value.index" {
        if let (Field::Int32(index), Some(Field::StringArray(choices))) =
            (value, record.lookup("value.choices"))
        {
            if !choices.is_empty() && usize::try_from(*index).map_or(true, |i| i >= choices.len()) {
                return Err(rejected(name, format!("index {index} out of range")));
            }
        }
    }
    Ok(())
}

impl RemoteContext for SimContext {
    fn monitor(&self, name: &str, notify: NotifyFn) -> Result<Box<dyn Monitor>, GatewayError> {
        let mut pvs = self.pvs.lock();
        let record = pvs.get_mut(name).ok_or_else(|| GatewayError::MonitorFailed {
            pv: name.to_string(),
            reason: "unknown process variable".to_string(),
        })?;

        // The current value is buffered before the caller sees the monitor,
        // so no notification fires for it.
        let shared = Arc::new(MonitorShared {
            buffer: Mutex::new(VecDeque::from([Ok(record.value.clone())])),
            notify,
        });
        record.monitors.push(Arc::downgrade(&shared));
        debug!(pv = %name, "monitor attached");

        Ok(Box::new(SimMonitor {
            name: name.to_string(),
            shared,
        }))
    }

    fn put(&self, name: &str, path: &str, value: Field) -> Result<Box<dyn PendingPut>, GatewayError> {
        let (record, subscribers) = {
            let mut pvs = self.pvs.lock();
            let pv = pvs.get_mut(name).ok_or_else(|| unknown(name))?;
            if pv.read_only {
                return Err(rejected(name, "read-only".to_string()));
            }
            if pv.unresponsive {
                debug!(pv = %name, path, "put swallowed by unresponsive server");
                return Ok(Box::new(SimPut {
                    pv: name.to_string(),
                    latency: None,
                }));
            }
            validate_put(name, &pv.value, path, &value)?;
            if let Some(field) = pv.value.lookup_mut(path) {
                *field = value;
            }
            pv.puts += 1;
            (pv.value.clone(), pv.subscribers())
        };

        debug!(pv = %name, path, "put applied");
        // The echo runs on its own thread: the caller may be a gateway worker,
        // and the notification can block on the gateway's queue.
        if !subscribers.is_empty() {
            let spawned = thread::Builder::new()
                .name("pvgate-sim-echo".to_string())
                .spawn(move || {
                    for monitor in subscribers {
                        monitor.deliver(Ok(record.clone()));
                    }
                });
            if let Err(e) = spawned {
                warn!(pv = %name, error = %e, "put echo dropped");
            }
        }
        Ok(Box::new(SimPut {
            pv: name.to_string(),
            latency: Some(self.ack_latency),
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
