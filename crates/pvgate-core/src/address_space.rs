//! Contracts between the gateway and the hierarchical server's node manager.
//!
//! The node manager owns the address space.  It exposes one mutation entry
//! point ([`AddressSpace::update_variable`]) and calls back into the gateway
//! through [`WriteInterceptor::before_write`] before it applies any write
//! requested by a server client.  The gateway answers
//! [`WriteDecision::BlockDefault`] for mapped nodes (after queueing the write
//! for the remote side itself) and [`WriteDecision::AllowDefault`] otherwise.

use pvgate_types::{GatewayError, NodeId, Variant};

/// The node manager's mutation entry point.
pub trait AddressSpace: Send + Sync {
    /// Durably apply `value` to the variable `node_id`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::NodeUnknown`] – `node_id` does not resolve.
    /// - [`GatewayError::NotAVariable`] – `node_id` is not a writable variable.
    fn update_variable(&self, node_id: &NodeId, value: Variant) -> Result<(), GatewayError>;
}

/// Outcome of the write-interception hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    /// The interceptor took ownership of the write; do not apply it.
    BlockDefault,
    /// Apply the write as usual.
    AllowDefault,
}

/// Hook the node manager calls before applying a client write.
pub trait WriteInterceptor: Send + Sync {
    fn before_write(&self, node_id: &NodeId, value: &Variant) -> WriteDecision;
}
