//! # Host Integration Layer
//!
//! The updater owns no world state and no sockets. The host plugs in:
//!
//! - **HologramHost**: languages and placeholder values, queried on the
//!   producer thread
//! - **Scheduler**: runs tasks on the authoritative world thread
//! - **PacketSink**: writes one outbound item to one player, only ever
//!   called from a scheduled task
//!
//! ```text
//! worker ──Task──► Scheduler ──(world thread)──► PacketSink::transmit
//! ```

pub mod scheduler;
pub mod traits;

pub use scheduler::TickScheduler;
pub use traits::*;
