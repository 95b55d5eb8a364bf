//! Hand-written collaborators shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use pvgate_types::{Field, GatewayError, NodeId, RemoteValue, Variant};

use crate::address_space::AddressSpace;
use crate::remote::{Monitor, NotifyFn, PendingPut, RemoteContext};

type Buffer = Arc<Mutex<VecDeque<Result<RemoteValue, GatewayError>>>>;
type Notify = Arc<dyn Fn() + Send + Sync>;

struct FakeMonitor {
    name: String,
    buffer: Buffer,
}

impl Monitor for FakeMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn pop(&self) -> Result<Option<RemoteValue>, GatewayError> {
        self.buffer.lock().pop_front().transpose()
    }

    fn has_pending(&self) -> bool {
        !self.buffer.lock().is_empty()
    }
}

/// How a [`FakeRemote`] answers puts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PutMode {
    Ack,
    Reject,
    NeverAck,
}

struct FakePut {
    pv: String,
    mode: PutMode,
}

impl PendingPut for FakePut {
    fn wait(self: Box<Self>, timeout: Duration) -> Result<(), GatewayError> {
        match self.mode {
            PutMode::Ack => Ok(()),
            PutMode::Reject => Err(GatewayError::RemoteRejected {
                pv: self.pv,
                reason: "rejected by fake".to_string(),
            }),
            PutMode::NeverAck => {
                thread::sleep(timeout);
                Err(GatewayError::RemoteTimeout {
                    pv: self.pv,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

/// Remote context whose monitor buffers are fed directly by the test.
pub(crate) struct FakeRemote {
    monitors: Mutex<HashMap<String, (Buffer, Notify)>>,
    preloaded: Mutex<HashMap<String, Vec<Result<RemoteValue, GatewayError>>>>,
    refused: Mutex<HashSet<String>>,
    puts: Mutex<Vec<(String, String, Field)>>,
    put_mode: Mutex<PutMode>,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self {
            monitors: Mutex::default(),
            preloaded: Mutex::default(),
            refused: Mutex::default(),
            puts: Mutex::default(),
            put_mode: Mutex::new(PutMode::Ack),
        }
    }
}

impl FakeRemote {
    /// Append to the monitor buffer, notifying on the empty→non-empty edge.
    pub(crate) fn post(&self, name: &str, value: Result<RemoteValue, GatewayError>) {
        let (buffer, notify) = self.entry(name);
        let was_empty = {
            let mut b = buffer.lock();
            let empty = b.is_empty();
            b.push_back(value);
            empty
        };
        if was_empty {
            notify();
        }
    }

    /// Fire the data-available callback without adding data.
    pub(crate) fn notify(&self, name: &str) {
        let (_, notify) = self.entry(name);
        notify();
    }

    /// Data already buffered when the monitor is opened; no callback fires.
    pub(crate) fn preload(&self, name: &str, value: Result<RemoteValue, GatewayError>) {
        self.preloaded
            .lock()
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    pub(crate) fn refuse_monitor(&self, name: &str) {
        self.refused.lock().insert(name.to_string());
    }

    pub(crate) fn set_put_mode(&self, mode: PutMode) {
        *self.put_mode.lock() = mode;
    }

    pub(crate) fn puts(&self) -> Vec<(String, String, Field)> {
        self.puts.lock().clone()
    }

    fn entry(&self, name: &str) -> (Buffer, Notify) {
        let monitors = self.monitors.lock();
        let (buffer, notify) = monitors.get(name).expect("monitor must be open");
        (Arc::clone(buffer), Arc::clone(notify))
    }
}

impl RemoteContext for FakeRemote {
    fn monitor(&self, name: &str, notify: NotifyFn) -> Result<Box<dyn Monitor>, GatewayError> {
        if self.refused.lock().contains(name) {
            return Err(GatewayError::MonitorFailed {
                pv: name.to_string(),
                reason: "no such channel".to_string(),
            });
        }
        let initial = self.preloaded.lock().remove(name).unwrap_or_default();
        let buffer: Buffer = Arc::new(Mutex::new(initial.into_iter().collect()));
        self.monitors
            .lock()
            .insert(name.to_string(), (Arc::clone(&buffer), Arc::from(notify)));
        Ok(Box::new(FakeMonitor {
            name: name.to_string(),
            buffer,
        }))
    }

    fn put(&self, name: &str, path: &str, value: Field) -> Result<Box<dyn PendingPut>, GatewayError> {
        self.puts
            .lock()
            .push((name.to_string(), path.to_string(), value));
        Ok(Box::new(FakePut {
            pv: name.to_string(),
            mode: *self.put_mode.lock(),
        }))
    }
}

/// Address space that records every mutation.
#[derive(Default)]
pub(crate) struct FakeAddressSpace {
    updates: Mutex<Vec<(NodeId, Variant)>>,
    objects: Mutex<HashSet<String>>,
    unknown: Mutex<HashSet<String>>,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight: Mutex<usize>,
    delay: Mutex<Duration>,
    panic_next: Mutex<bool>,
}

impl FakeAddressSpace {
    pub(crate) fn updates(&self) -> Vec<(NodeId, Variant)> {
        self.updates.lock().clone()
    }

    pub(crate) fn mark_object(&self, node_id: &NodeId) {
        self.objects.lock().insert(node_id.canonical());
    }

    pub(crate) fn mark_unknown(&self, node_id: &NodeId) {
        self.unknown.lock().insert(node_id.canonical());
    }

    /// Make the next update panic inside the node manager.
    pub(crate) fn panic_on_next_update(&self) {
        *self.panic_next.lock() = true;
    }

    /// Make every update take `delay`, widening race windows.
    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Highest number of concurrent updates ever seen for a single node.
    pub(crate) fn max_in_flight_per_node(&self) -> usize {
        *self.max_in_flight.lock()
    }
}

impl AddressSpace for FakeAddressSpace {
    fn update_variable(&self, node_id: &NodeId, value: Variant) -> Result<(), GatewayError> {
        if std::mem::take(&mut *self.panic_next.lock()) {
            panic!("node manager failure on {node_id}");
        }
        let key = node_id.canonical();
        if self.unknown.lock().contains(&key) {
            return Err(GatewayError::NodeUnknown(key));
        }
        if self.objects.lock().contains(&key) {
            return Err(GatewayError::NotAVariable(key));
        }

        {
            let mut in_flight = self.in_flight.lock();
            let count = in_flight.entry(key.clone()).or_insert(0);
            *count += 1;
            let mut max = self.max_in_flight.lock();
            *max = (*max).max(*count);
        }
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.updates.lock().push((node_id.clone(), value));
        if let Some(count) = self.in_flight.lock().get_mut(&key) {
            *count -= 1;
        }
        Ok(())
    }
}
