//! `pvgate-types` – shared data model for the process-variable gateway.
//!
//! Both sides of the bridge speak a different value dialect:
//!
//! - the **remote** side (the pub/sub process-variable protocol) exchanges
//!   structured records, modelled by [`RemoteValue`] and its [`Field`] tree;
//! - the **local** side (the hierarchical server's address space) stores
//!   flat typed values, modelled by [`Variant`] and addressed by [`NodeId`].
//!
//! [`GatewayError`] is the single error type shared by every crate in the
//! workspace.

pub mod node_id;
pub mod value;

pub use node_id::{Identifier, NodeId};
pub use value::{Field, RemoteValue, Variant, NT_ENUM_ID, NT_SCALAR_ID};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Global error type spanning conversion failures, mapping collisions,
/// address-space rejections and remote-protocol failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GatewayError {
    /// The value cannot be represented on the other side of the bridge.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Registration of an already-used variable name or node identifier.
    #[error("Mapping collision: {0}")]
    MappingCollision(String),

    /// A write was submitted for a node that has no mapping.
    #[error("Node {0} is not mapped to a process variable")]
    Unmapped(String),

    /// The mutation target does not resolve in the address space.
    #[error("Unknown node: {0}")]
    NodeUnknown(String),

    /// The mutation target resolves to something that is not a writable variable.
    #[error("Node {0} is not a variable")]
    NotAVariable(String),

    /// A remote put was not acknowledged within the bounded wait.
    #[error("Remote timeout on {pv} after {timeout_ms} ms")]
    RemoteTimeout { pv: String, timeout_ms: u64 },

    /// The remote side refused a put or get.
    #[error("Remote rejected {pv}: {reason}")]
    RemoteRejected { pv: String, reason: String },

    /// Opening a monitor failed or a live monitor reported an error.
    #[error("Monitor failure on {pv}: {reason}")]
    MonitorFailed { pv: String, reason: String },

    /// An ordinary push was attempted after the queue was closed by `stop()`.
    #[error("Event queue is closed")]
    QueueClosed,

    /// `start()` was called on a gateway that is already running.
    #[error("Gateway is already running")]
    AlreadyRunning,

    /// A worker thread could not be spawned.
    #[error("Failed to spawn worker: {0}")]
    WorkerSpawn(String),

    /// Text that is not a canonical node identifier.
    #[error("Invalid node id '{0}'")]
    InvalidNodeId(String),
}
