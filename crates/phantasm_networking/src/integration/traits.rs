//! # Integration Traits
//!
//! Traits the host implements to connect the updater to its world.
//!
//! ```text
//! Updater defines:       Host implements:
//! ┌────────────────┐    ┌────────────────┐
//! │ trait Foo      │ ←─ │ impl Foo       │
//! └────────────────┘    └────────────────┘
//! ```

use phantasm_core::{PlaceholderMap, PlayerId};
use std::collections::HashMap;

use crate::hologram::Hologram;
use crate::protocol::Outbound;

/// Unit of work handed to the authoritative thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

// ============================================================================
// WORLD THREAD
// ============================================================================

/// Runs work on the host's single authoritative thread.
pub trait Scheduler: Send + Sync {
    /// Queues `task`. Must not block the caller.
    fn run_on_authoritative_thread(&self, task: Task);
}

/// Writes packets to players.
///
/// Only called from tasks executing on the authoritative thread.
pub trait PacketSink: Send + Sync {
    /// Transmits `packet` to `player`. Unknown or offline players are ignored.
    fn transmit(&self, player: PlayerId, packet: &Outbound);
}

// ============================================================================
// HOLOGRAM DATA
// ============================================================================

/// Per-player data the updater needs when a request is enqueued.
pub trait HologramHost: Send + Sync {
    /// Preferred language variant of `player`.
    fn language_of(&self, player: PlayerId) -> Option<usize>;

    /// Placeholder values shared by every viewer.
    fn global_placeholders(&self, hologram: &Hologram) -> PlaceholderMap {
        let _ = hologram;
        PlaceholderMap::new()
    }

    /// Placeholder values specific to each of `players`.
    fn player_placeholders(
        &self,
        hologram: &Hologram,
        players: &[PlayerId],
    ) -> HashMap<PlayerId, PlaceholderMap> {
        let _ = (hologram, players);
        HashMap::new()
    }
}
