//! In-process stand-ins for both sides of the gateway.
//!
//! - [`SimContext`] – a process-variable server implementing
//!   [`pvgate_core::RemoteContext`].
//! - [`SimAddressSpace`] – a node manager implementing
//!   [`pvgate_core::AddressSpace`] with a client write path.
//! - [`SimTicker`] – background drift for demo runs.

pub mod address_space;
pub mod context;
pub mod ticker;

pub use address_space::SimAddressSpace;
pub use context::SimContext;
pub use ticker::SimTicker;
