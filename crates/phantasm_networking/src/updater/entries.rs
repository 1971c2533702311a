//! Immutable request snapshots passed from producers to the worker.

use phantasm_core::{
    EntityIdentity, GridSettings, PlaceholderMap, PlayerEntry, PlayerId, TranslationMatches, Vec3,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::hologram::EntityEntry;

/// One anchor of a render request with its identity row.
#[derive(Clone, Debug)]
pub struct Anchor {
    /// Anchor whose cache the worker updates.
    pub entry: Arc<EntityEntry>,
    /// Position captured when the request was made.
    pub position: Vec3,
    /// Identities for this render, top line first.
    pub identities: Vec<EntityIdentity>,
}

/// Snapshot of a render request. Consumed once by the worker.
#[derive(Clone, Debug)]
pub struct UpdateEntry {
    /// Hologram name.
    pub hologram: String,
    /// Per-viewer rendering.
    pub visitor_sensitive: bool,
    /// Spawn (with removal of the previous render) instead of retexting.
    pub spawn: bool,
    /// Identities were reallocated; caches must be rebuilt.
    pub recache: bool,
    /// Grid configuration.
    pub grid: GridSettings,
    /// Lines last sent per variant, `None` if unknown.
    pub old_lines: Option<Vec<Vec<String>>>,
    /// Raw lines per variant.
    pub translations: Vec<Vec<String>>,
    /// Anchors with one identity row each.
    pub anchors: Vec<Anchor>,
    /// Destination players.
    pub players: Vec<PlayerEntry>,
    /// Values shared by every viewer.
    pub placeholders: PlaceholderMap,
    /// Values per viewer.
    pub player_placeholders: HashMap<PlayerId, PlaceholderMap>,
    /// Matches per variant, per line.
    pub matched: TranslationMatches,
}

/// Snapshot of a reposition request.
#[derive(Clone, Debug)]
pub struct MoveEntry {
    /// Anchor to move.
    pub entry: Arc<EntityEntry>,
    /// New base position.
    pub position: Vec3,
    /// Viewers at the time of the request.
    pub players: Vec<PlayerId>,
}

/// Packets for a set of players.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Delivery {
    /// Packets, in send order.
    pub packets: Vec<crate::protocol::Packet>,
    /// Recipients.
    pub players: Vec<PlayerId>,
}

impl Delivery {
    /// True if there is nothing to send or nobody to send it to.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty() || self.players.is_empty()
    }
}
