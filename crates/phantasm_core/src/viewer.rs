//! Destination players and the language variant each one receives.

use serde::{Deserialize, Serialize};

/// Opaque handle of a connected player, assigned by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PlayerId(pub u64);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player:{}", self.0)
    }
}

/// A player tagged with the language variant they should see.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlayerEntry {
    /// Destination player.
    pub player: PlayerId,
    /// Preferred variant index, `None` for the default variant.
    pub language: Option<usize>,
}

impl PlayerEntry {
    /// Creates a new entry.
    #[must_use]
    pub const fn new(player: PlayerId, language: Option<usize>) -> Self {
        Self { player, language }
    }

    /// Variant this player receives out of `variant_count` variants.
    ///
    /// Missing or out-of-range preferences fall back to variant 0.
    #[inline]
    #[must_use]
    pub fn variant_index(&self, variant_count: usize) -> usize {
        match self.language {
            Some(index) if index < variant_count => index,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_index_in_range() {
        let entry = PlayerEntry::new(PlayerId(1), Some(2));
        assert_eq!(entry.variant_index(3), 2);
    }

    #[test]
    fn test_variant_index_falls_back_to_default() {
        let missing = PlayerEntry::new(PlayerId(1), None);
        let beyond = PlayerEntry::new(PlayerId(2), Some(1));

        assert_eq!(missing.variant_index(4), 0);
        assert_eq!(beyond.variant_index(1), 0);
        assert_eq!(beyond.variant_index(0), 0);
    }
}
