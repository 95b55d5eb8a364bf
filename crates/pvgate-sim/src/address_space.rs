//! [`SimAddressSpace`] – a flat stand-in for the server's node manager.
//!
//! Nodes are either variables (holding a [`Variant`] and the time of their
//! last update) or objects.  Only variables accept mutations.  Client writes
//! go through [`SimAddressSpace::client_write`], which consults the
//! installed [`WriteInterceptor`] before applying the default write.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use pvgate_core::{AddressSpace, WriteDecision, WriteInterceptor};
use pvgate_types::{GatewayError, NodeId, Variant};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
enum SimNode {
    Variable {
        value: Variant,
        updated: Option<DateTime<Utc>>,
    },
    Object,
}

/// Simulated address space.
#[derive(Default)]
pub struct SimAddressSpace {
    nodes: RwLock<HashMap<String, SimNode>>,
    interceptor: RwLock<Option<Weak<dyn WriteInterceptor>>>,
    history: Mutex<Vec<(NodeId, Variant)>>,
}

impl SimAddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&self, node_id: &NodeId, initial: Variant) {
        self.nodes.write().insert(
            node_id.canonical(),
            SimNode::Variable {
                value: initial,
                updated: None,
            },
        );
    }

    pub fn add_object(&self, node_id: &NodeId) {
        self.nodes.write().insert(node_id.canonical(), SimNode::Object);
    }

    /// Install the write hook.  Only a weak reference is kept, so the
    /// interceptor may own this address space without a cycle.
    pub fn set_interceptor<I: WriteInterceptor + 'static>(&self, interceptor: &Arc<I>) {
        let weak: Weak<dyn WriteInterceptor> = Arc::downgrade(interceptor) as Weak<dyn WriteInterceptor>;
        *self.interceptor.write() = Some(weak);
    }

    pub fn value(&self, node_id: &NodeId) -> Option<Variant> {
        match self.nodes.read().get(&node_id.canonical()) {
            Some(SimNode::Variable { value, .. }) => Some(value.clone()),
            _ => None,
        }
    }

    /// Server timestamp of the last successful update, if any.
    pub fn updated_at(&self, node_id: &NodeId) -> Option<DateTime<Utc>> {
        match self.nodes.read().get(&node_id.canonical()) {
            Some(SimNode::Variable { updated, .. }) => *updated,
            _ => None,
        }
    }

    /// Every applied mutation, oldest first.
    pub fn history(&self) -> Vec<(NodeId, Variant)> {
        self.history.lock().clone()
    }

    /// A server client writes `value` to `node_id`.
    ///
    /// Returns the interceptor's decision; the write is applied locally only
    /// for [`WriteDecision::AllowDefault`].
    pub fn client_write(&self, node_id: &NodeId, value: Variant) -> Result<WriteDecision, GatewayError> {
        self.check_variable(node_id)?;

        let interceptor = self.interceptor.read().as_ref().and_then(Weak::upgrade);
        let decision = match interceptor {
            Some(hook) => hook.before_write(node_id, &value),
            None => WriteDecision::AllowDefault,
        };
        trace!(node = %node_id, ?decision, "client write intercepted");

        if decision == WriteDecision::AllowDefault {
            self.update_variable(node_id, value)?;
        }
        Ok(decision)
    }

    fn check_variable(&self, node_id: &NodeId) -> Result<(), GatewayError> {
        match self.nodes.read().get(&node_id.canonical()) {
            None => Err(GatewayError::NodeUnknown(node_id.to_string())),
            Some(SimNode::Object) => Err(GatewayError::NotAVariable(node_id.to_string())),
            Some(SimNode::Variable { .. }) => Ok(()),
        }
    }
}

impl AddressSpace for SimAddressSpace {
    fn update_variable(&self, node_id: &NodeId, value: Variant) -> Result<(), GatewayError> {
        let mut nodes = self.nodes.write();
        match nodes.get_mut(&node_id.canonical()) {
            None => Err(GatewayError::NodeUnknown(node_id.to_string())),
            Some(SimNode::Object) => Err(GatewayError::NotAVariable(node_id.to_string())),
            Some(SimNode::Variable {
                value: current,
                updated,
            }) => {
                debug!(node = %node_id, value = %value, "variable updated");
                *current = value.clone();
                *updated = Some(Utc::now());
                self.history.lock().push((node_id.clone(), value));
                Ok(())
            }
        }
    }
}
