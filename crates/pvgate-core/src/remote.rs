//! Contracts the gateway needs from the remote process-variable protocol.
//!
//! The gateway never speaks the wire protocol itself.  A client stack (or
//! the in-process simulator in `pvgate-sim`) implements these traits and
//! the gateway drives them from its worker threads.
//!
//! # Overview
//!
//! - [`RemoteContext`] – opens monitors and issues puts.
//! - [`Monitor`] – a live subscription with a non-blocking pop.
//! - [`PendingPut`] – an in-flight put that supports a bounded wait.

use std::time::Duration;

use pvgate_types::{Field, GatewayError, RemoteValue};

/// Callback invoked by the remote stack whenever a monitor has data.
///
/// Runs on a thread owned by the remote stack; it must not block on I/O.
pub type NotifyFn = Box<dyn Fn() + Send + Sync>;

/// Entry point into the remote protocol.
///
/// # Contract
///
/// * `monitor` – subscribe to `name`.  `notify` fires each time the
///   monitor's buffer goes from empty to non-empty.
///
/// * `put` – start writing `value` into the field at dotted `path`
///   (e.g. `"value"` or `"value.index"`) of the record named `name`.  The
///   returned [`PendingPut`] reports completion.
pub trait RemoteContext: Send + Sync {
    fn monitor(&self, name: &str, notify: NotifyFn) -> Result<Box<dyn Monitor>, GatewayError>;

    fn put(&self, name: &str, path: &str, value: Field) -> Result<Box<dyn PendingPut>, GatewayError>;
}

/// A live subscription to one process variable.
///
/// Dropping the monitor cancels the subscription.
pub trait Monitor: Send + Sync {
    /// Name of the subscribed variable.
    fn name(&self) -> &str;

    /// Take the oldest buffered update without blocking.
    ///
    /// * `Ok(Some(value))` – an update.
    /// * `Ok(None)` – nothing buffered.
    /// * `Err(_)` – the remote side reported a connection or server error;
    ///   later updates may still follow.
    fn pop(&self) -> Result<Option<RemoteValue>, GatewayError>;

    /// `true` when at least one update or error is buffered.
    fn has_pending(&self) -> bool;
}

/// An in-flight put.
pub trait PendingPut: Send {
    /// Block until the put completes or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::RemoteTimeout`] – no acknowledgment in time.
    /// - [`GatewayError::RemoteRejected`] – the remote side refused the put.
    fn wait(self: Box<Self>, timeout: Duration) -> Result<(), GatewayError>;
}
