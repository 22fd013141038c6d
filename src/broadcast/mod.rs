//! # Cross-Context Broadcast
//!
//! Typed publish/subscribe between every context sharing the same backing
//! storage. Delivery is best effort: FIFO per sender, no ordering across
//! senders. Receivers treat messages as hints to re-read authoritative state.
//!
//! ## Transports
//!
//! - **Native**: append-only channel logs in a shared directory, delivered
//!   across processes by tailing listeners
//! - **In-process**: owned listener registry, synchronous delivery

pub mod bus;
pub mod errors;
pub mod message;
pub mod transport;

pub use bus::BroadcastBus;
pub use errors::{BroadcastError, BroadcastResult};
pub use message::BroadcastMessage;
pub use transport::{BroadcastTransport, InProcessTransport, NativeTransport, RawListener};
