//! [`MappingTable`] – bidirectional process-variable ⇄ node association.
//!
//! The table keeps two indices, one keyed by variable name and one keyed by
//! the canonical string form of the [`NodeId`].  Both indices live behind a
//! single [`RwLock`]: lookups take the shared side and never block each
//! other, while a registration takes the exclusive side for the duration of
//! the dual insert only.  A registration either lands in both indices or in
//! neither.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use pvgate_types::{GatewayError, NodeId};

/// Immutable association between a process-variable name and a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvMapping {
    pub variable_name: String,
    pub node_id: NodeId,
}

#[derive(Default)]
struct Indices {
    by_name: HashMap<String, Arc<PvMapping>>,
    by_node: HashMap<String, Arc<PvMapping>>,
}

/// Thread-safe mapping table.
///
/// # Example
///
/// ```
/// use pvgate_core::MappingTable;
/// use pvgate_types::NodeId;
///
/// let table = MappingTable::new();
/// assert!(table.register("ioc1:Temperature", NodeId::string(2, "Temperature")));
/// // Same name again is rejected.
/// assert!(!table.register("ioc1:Temperature", NodeId::string(2, "Other")));
///
/// let m = table.lookup_by_id(&NodeId::string(2, "Temperature")).unwrap();
/// assert_eq!(m.variable_name, "ioc1:Temperature");
/// ```
#[derive(Default)]
pub struct MappingTable {
    inner: RwLock<Indices>,
}

impl MappingTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name ⇄ node_id`, returning `true` on success.
    ///
    /// Returns `false` when either the name or the node is already mapped;
    /// both indices are then left untouched.
    pub fn register(&self, name: &str, node_id: NodeId) -> bool {
        self.try_register(name, node_id).is_ok()
    }

    /// Like [`MappingTable::register`] but reports which side collided.
    ///
    /// # Errors
    ///
    /// [`GatewayError::MappingCollision`] when `name` or `node_id` is taken.
    pub fn try_register(&self, name: &str, node_id: NodeId) -> Result<Arc<PvMapping>, GatewayError> {
        let key = node_id.canonical();
        let mapping = Arc::new(PvMapping {
            variable_name: name.to_string(),
            node_id,
        });

        let mut indices = self.inner.write();
        if indices.by_name.contains_key(name) {
            return Err(GatewayError::MappingCollision(format!(
                "variable '{name}' is already mapped"
            )));
        }
        if indices.by_node.contains_key(&key) {
            return Err(GatewayError::MappingCollision(format!(
                "node {key} is already mapped"
            )));
        }
        indices.by_name.insert(name.to_string(), Arc::clone(&mapping));
        indices.by_node.insert(key, Arc::clone(&mapping));
        Ok(mapping)
    }

    /// Mapping for the process variable `name`.
    pub fn lookup_by_name(&self, name: &str) -> Option<Arc<PvMapping>> {
        self.inner.read().by_name.get(name).cloned()
    }

    /// Mapping for `node_id`.
    pub fn lookup_by_id(&self, node_id: &NodeId) -> Option<Arc<PvMapping>> {
        self.inner.read().by_node.get(&node_id.canonical()).cloned()
    }

    /// `true` if `name` is mapped.
    pub fn is_mapped_name(&self, name: &str) -> bool {
        self.inner.read().by_name.contains_key(name)
    }

    /// `true` if `node_id` is mapped.
    pub fn is_mapped_id(&self, node_id: &NodeId) -> bool {
        self.inner.read().by_node.contains_key(&node_id.canonical())
    }

    /// Snapshot of every mapping, in unspecified order.
    pub fn mappings(&self) -> Vec<Arc<PvMapping>> {
        self.inner.read().by_name.values().cloned().collect()
    }

    /// Number of registered mappings.
    pub fn len(&self) -> usize {
        self.inner.read().by_name.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
