//! # Packet Compiler
//!
//! Turns lines into packets for one anchor. Lines stack bottom-up: the last
//! line sits at the anchor, every earlier line one gap higher.
//!
//! ```text
//!   "A"  ids[n-3]   y + 2·gap
//!   "B"  ids[n-2]   y + gap
//!   "C"  ids[n-1]   y
//!   ─────────────── anchor
//! ```
//!
//! With fewer lines than identities, lines take the trailing identities, so
//! line `i` always owns `ids[offset + i]` where `offset = ids - lines`.

use phantasm_core::{EntityIdentity, Vec3};

use crate::protocol::{Packet, RemoveEntity};

/// Builds spawn, set-text, remove and move packets for stacked lines.
#[derive(Clone, Copy, Debug)]
pub struct PacketCompiler {
    line_gap: f32,
}

impl PacketCompiler {
    /// Creates a compiler with the given line spacing.
    #[must_use]
    pub const fn new(line_gap: f32) -> Self {
        Self { line_gap }
    }

    /// Spawn packets for `lines` at `anchor`, bottom line first.
    ///
    /// Returns nothing (and logs) if there are fewer identities than lines.
    #[must_use]
    pub fn compile(&self, lines: &[String], anchor: Vec3, identities: &[EntityIdentity]) -> Vec<Packet> {
        if lines.len() > identities.len() {
            tracing::warn!(
                "Invalid hologram line count (lines: {}, ids: {}) lines: {:?}",
                lines.len(),
                identities.len(),
                lines
            );
            return Vec::new();
        }

        let mut y = anchor.y;
        lines
            .iter()
            .rev()
            .zip(identities.iter().rev())
            .map(|(line, &identity)| {
                let packet = Packet::spawn(identity, Vec3::new(anchor.x, y, anchor.z), line.as_str());
                y += self.line_gap;
                packet
            })
            .collect()
    }

    /// Set-text packets for `lines` over already spawned identities, top
    /// line first.
    ///
    /// Returns nothing (and logs) if there are fewer identities than lines.
    #[must_use]
    pub fn set_text(&self, lines: &[String], identities: &[EntityIdentity]) -> Vec<Packet> {
        let Some(offset) = identities.len().checked_sub(lines.len()) else {
            tracing::warn!(
                "Invalid hologram line count for update (lines: {}, ids: {})",
                lines.len(),
                identities.len()
            );
            return Vec::new();
        };

        lines
            .iter()
            .zip(&identities[offset..])
            .map(|(line, &identity)| Packet::set_text(identity, line.as_str()))
            .collect()
    }

    /// Removal records for `identities`, in the same order.
    #[must_use]
    pub fn removals(identities: &[EntityIdentity]) -> Vec<RemoveEntity> {
        identities
            .iter()
            .map(|&identity| RemoveEntity { identity })
            .collect()
    }

    /// Move packets restacking the cached identities at `anchor`, bottom
    /// line first.
    #[must_use]
    pub fn reposition(&self, removals: &[RemoveEntity], anchor: Vec3) -> Vec<Packet> {
        let mut y = anchor.y;
        removals
            .iter()
            .rev()
            .map(|removal| {
                let packet = Packet::move_to(removal.identity, Vec3::new(anchor.x, y, anchor.z));
                y += self.line_gap;
                packet
            })
            .collect()
    }
}

impl Default for PacketCompiler {
    fn default() -> Self {
        Self::new(crate::DEFAULT_LINE_GAP)
    }
}
