//! Lobby transport layer.
//!
//! Defines the `MessageBus` seam the session protocol runs on top of —
//! peer-to-peer send, group broadcast, non-blocking receive with a
//! validated-sender flag, and the group leadership primitive — plus a
//! deterministic in-process implementation (`MemoryNetwork`) used by
//! tests and simulations.

pub mod bus;
pub mod error;
pub mod memory;

pub use bus::{BusEvent, GroupHandle, MessageBus, OpId, OpStatus, PeerId};
pub use error::BusError;
pub use memory::{MemoryBus, MemoryNetwork};
