//! # PHANTASM Networking - The Hologram Updater
//!
//! Floating text rendered through fake, non-interactive proxy entities.
//!
//! ## Architecture
//!
//! - **Protocol**: tagged packets (spawn, remove, set-text, move) and a
//!   compressed batch container
//! - **Updater**: producers enqueue snapshots; one worker resolves text,
//!   reuses identities, compiles packets
//! - **Dispatch**: packets grouped per destination set, optionally batched,
//!   and handed to the host scheduler
//!
//! ## Threading Model
//!
//! ```text
//! any thread ──update()────► [render queue] ─┐
//! any thread ──update_pos()─► [move queue] ──┼──► worker ──► Scheduler
//!                                            │                  │
//!                                            │       authoritative thread
//!                                            │                  │
//!                                            └───────────── PacketSink
//! ```
//!
//! The worker never writes to a socket. Every transmit runs inside a task
//! handed to [`integration::Scheduler`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use phantasm_networking::{HologramUpdater, UpdaterConfig, UpdaterServices};
//!
//! let updater = HologramUpdater::start(UpdaterConfig::default(), services)?;
//! updater.update(&hologram, None, &hologram.entities, true, &[])?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod hologram;
pub mod integration;
pub mod protocol;
pub mod updater;

// Re-exports for convenience
pub use config::UpdaterConfig;
pub use dispatch::{BatchDispatcher, DispatchOutcome};
pub use error::{ConfigError, ProtocolError, ProtocolResult, UpdateError, UpdateResult};
pub use hologram::{EntityEntry, Hologram, RenderCache, SpawnedRender};
pub use integration::{HologramHost, PacketSink, Scheduler, Task, TickScheduler};
pub use protocol::{
    BatchCompressor, BatchPacket, Outbound, Packet, PacketDeserializer, PacketSerializer,
    PacketType, ProxyAppearance,
};
pub use updater::{
    Anchor, Delivery, HologramUpdater, MoveEntry, PacketCompiler, Renderer, StatsSnapshot,
    UpdateEntry, UpdateWorker, UpdaterServices, UpdaterStats,
};

/// Vertical distance between two stacked lines, in blocks.
pub const DEFAULT_LINE_GAP: f32 = 0.25;

/// Worker pause between two empty drain cycles, in milliseconds.
pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 1;

/// Largest single serialized packet accepted into a batch.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 2 * 1024 * 1024;
