//! # Holograms and Their Anchors
//!
//! A hologram is one or more anchors, each rendering the same stack of
//! lines. Every anchor keeps what the worker needs to undo or reuse its
//! last render:
//!
//! ```text
//! EntityEntry
//! ├── position          live anchor position (host writes)
//! ├── viewers           players the anchor is spawned for (host writes)
//! ├── cache             removal packets of the last transmitted identities
//! └── spawned           last compiled spawn packets per variant, reused
//!                       while position, identities and lines are unchanged
//! ```
//!
//! Caches are swapped whole behind an `Arc`, so a reader always sees either
//! the previous render or the next one, never a mix.

use parking_lot::RwLock;
use phantasm_core::{EntityIdentity, GridSettings, PlayerId, TranslationMatches, Vec3};
use std::collections::HashSet;
use std::sync::Arc;

use crate::protocol::{Packet, RemoveEntity};

/// Removal packets for the identities an anchor last transmitted.
///
/// Ordered top line first, the reverse of spawn order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderCache {
    removals: Vec<RemoveEntity>,
    layout_revision: u64,
}

impl RenderCache {
    /// Cache over `removals`, built for grid layout `layout_revision`.
    #[must_use]
    pub fn new(removals: Vec<RemoveEntity>, layout_revision: u64) -> Self {
        Self {
            removals,
            layout_revision,
        }
    }

    /// Number of cached identities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.removals.len()
    }

    /// True if nothing was ever transmitted for this anchor.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty()
    }

    /// Grid layout the cache was built with.
    #[inline]
    #[must_use]
    pub const fn layout_revision(&self) -> u64 {
        self.layout_revision
    }

    /// Cached removal records.
    #[must_use]
    pub fn removals(&self) -> &[RemoveEntity] {
        &self.removals
    }

    /// Cached identities, top line first.
    #[must_use]
    pub fn identities(&self) -> Vec<EntityIdentity> {
        self.removals.iter().map(|r| r.identity).collect()
    }

    /// Cached removals as packets.
    pub fn removal_packets(&self) -> impl Iterator<Item = Packet> + '_ {
        self.removals.iter().copied().map(Packet::Remove)
    }

    /// Whether a render of `line_count` lines under `layout_revision` can
    /// reuse these identities.
    #[must_use]
    pub fn fits(&self, line_count: usize, layout_revision: u64) -> bool {
        self.removals.len() == line_count && self.layout_revision == layout_revision
    }
}

/// Spawn packets an anchor last compiled, with the inputs they came from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpawnedRender {
    position: Vec3,
    identities: Vec<EntityIdentity>,
    lines: Vec<Vec<String>>,
    packets: Vec<Vec<Packet>>,
}

impl SpawnedRender {
    /// Packets compiled from `lines` at `position` over `identities`.
    #[must_use]
    pub fn new(
        position: Vec3,
        identities: Vec<EntityIdentity>,
        lines: Vec<Vec<String>>,
        packets: Vec<Vec<Packet>>,
    ) -> Self {
        Self {
            position,
            identities,
            lines,
            packets,
        }
    }

    /// Spawn packets per variant.
    #[must_use]
    pub fn packets(&self) -> &[Vec<Packet>] {
        &self.packets
    }

    /// True if nothing was compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Whether compiling `lines` at `position` over `identities` would
    /// produce exactly these packets.
    #[must_use]
    pub fn matches(&self, position: Vec3, identities: &[EntityIdentity], lines: &[Vec<String>]) -> bool {
        !self.is_empty() && self.position == position && self.identities == identities && self.lines == lines
    }
}

/// One physical anchor of a hologram.
#[derive(Debug, Default)]
pub struct EntityEntry {
    position: RwLock<Vec3>,
    viewers: RwLock<Vec<PlayerId>>,
    cache: RwLock<Arc<RenderCache>>,
    spawned: RwLock<Arc<SpawnedRender>>,
}

impl EntityEntry {
    /// Creates an anchor at `position` with no viewers and no cache.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            position: RwLock::new(position),
            ..Self::default()
        }
    }

    /// Current anchor position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        *self.position.read()
    }

    /// Moves the anchor. Does not send anything.
    pub fn set_position(&self, position: Vec3) {
        *self.position.write() = position;
    }

    /// Snapshot of current viewers.
    #[must_use]
    pub fn viewers(&self) -> Vec<PlayerId> {
        self.viewers.read().clone()
    }

    /// Adds a viewer if not already present.
    pub fn add_viewer(&self, player: PlayerId) {
        let mut viewers = self.viewers.write();
        if !viewers.contains(&player) {
            viewers.push(player);
        }
    }

    /// Removes a viewer.
    pub fn remove_viewer(&self, player: PlayerId) {
        self.viewers.write().retain(|p| *p != player);
    }

    /// Current render cache.
    #[must_use]
    pub fn render_cache(&self) -> Arc<RenderCache> {
        Arc::clone(&self.cache.read())
    }

    /// Replaces the render cache.
    pub fn replace_cache(&self, cache: RenderCache) {
        *self.cache.write() = Arc::new(cache);
    }

    /// Last compiled spawn packets.
    #[must_use]
    pub fn spawned_render(&self) -> Arc<SpawnedRender> {
        Arc::clone(&self.spawned.read())
    }

    /// Replaces the spawn-packet cache.
    pub fn cache_spawned(&self, spawned: SpawnedRender) {
        *self.spawned.write() = Arc::new(spawned);
    }

    /// Drops the spawn-packet cache.
    pub fn clear_spawned(&self) {
        *self.spawned.write() = Arc::default();
    }
}

/// A named hologram as configured by the host.
#[derive(Clone, Debug, Default)]
pub struct Hologram {
    /// Unique name, used in diagnostics.
    pub name: String,
    /// Render independently for every viewer.
    pub visitor_sensitive: bool,
    /// Grid configuration.
    pub grid: GridSettings,
    /// Raw lines per language variant.
    pub translations: Vec<Vec<String>>,
    /// Placeholder matches per variant, per line.
    pub matched: TranslationMatches,
    /// Anchors.
    pub entities: Vec<Arc<EntityEntry>>,
}

impl Hologram {
    /// Creates an empty, shared-rendering hologram.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Union of the viewers of every anchor, in first-seen order.
    #[must_use]
    pub fn viewers(&self) -> Vec<PlayerId> {
        let mut seen = HashSet::new();
        self.entities
            .iter()
            .flat_map(|e| e.viewers())
            .filter(|p| seen.insert(*p))
            .collect()
    }

    /// Identities an anchor needs: the longest variant plus grid lines.
    ///
    /// Shorter variants take the trailing identities of the row.
    #[must_use]
    pub fn expected_line_count(&self) -> usize {
        let longest = self.translations.iter().map(Vec::len).max().unwrap_or(0);
        longest + self.grid.injected_line_count()
    }
}
