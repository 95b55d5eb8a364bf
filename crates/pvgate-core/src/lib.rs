//! # pvgate-core
//!
//! Bidirectional synchronisation between a remote process-variable protocol
//! and a hierarchical server address space.
//!
//! ## Modules
//!
//! - [`mapping`] – thread-safe name ⇄ node mapping table.
//! - [`convert`] – remote record ⇄ local variant conversion.
//! - [`queue`] – bounded event queue with an in-band shutdown sentinel.
//! - [`subscription`] – one live monitor per mapped variable.
//! - [`worker`] – the worker loop and per-event dispatch.
//! - [`gateway`] – the facade tying everything together.
//! - [`remote`] / [`address_space`] – contracts for the two collaborators.
//!
//! ## Data flow
//!
//! ```text
//!  remote monitor ── notify ──▶ ┌────────────┐ ──▶ worker ──▶ AddressSpace::update_variable
//!                               │ EventQueue │
//!  WriteInterceptor ──────────▶ └────────────┘ ──▶ worker ──▶ RemoteContext::put
//! ```

pub mod address_space;
pub mod convert;
pub mod gateway;
pub mod mapping;
pub mod queue;
pub mod remote;
pub mod subscription;
pub mod worker;

#[cfg(test)]
mod fakes;

pub use address_space::{AddressSpace, WriteDecision, WriteInterceptor};
pub use convert::{local_to_remote, remote_to_local, RemoteKind, BOOLEAN_CHOICES};
pub use gateway::{Gateway, GatewayConfig};
pub use mapping::{MappingTable, PvMapping};
pub use queue::{EventQueue, GatewayEvent, TryPop, TryPushError, DEFAULT_CAPACITY};
pub use remote::{Monitor, NotifyFn, PendingPut, RemoteContext};
pub use subscription::{Subscription, SubscriptionManager};
pub use worker::{GatewayStats, StatsSnapshot};
