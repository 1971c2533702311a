//! # Proxy Entity Identities
//!
//! Every stacked text line is addressed on the wire by an identity. The
//! host world owns the real entity counter, so identity issuing is a
//! service injected into the updater rather than a global.
//!
//! Identities are never recycled: a removed proxy keeps its number forever,
//! which rules out a late remove packet hitting a fresh spawn.

use parking_lot::Mutex;

/// Protocol handle of a single proxy entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityIdentity(u64);

impl EntityIdentity {
    /// Wraps a raw identity value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value written to packets.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntityIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source of fresh identities.
///
/// Implementations must be thread-safe and must never return the same value
/// twice over the life of the process.
pub trait IdentitySequence: Send + Sync {
    /// Issues the next identity.
    fn next(&self) -> EntityIdentity;

    /// Issues `count` identities in increasing order.
    fn next_block(&self, count: usize) -> Vec<EntityIdentity> {
        (0..count).map(|_| self.next()).collect()
    }
}

/// Monotonic counter behind a single lock.
///
/// Hosts that already keep an entity counter should implement
/// [`IdentitySequence`] over it instead, so proxies and real entities share
/// one number space.
#[derive(Debug)]
pub struct MonotonicSequence {
    counter: Mutex<u64>,
}

impl MonotonicSequence {
    /// Creates a sequence whose first identity is `first`.
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            counter: Mutex::new(first),
        }
    }

    /// Returns the value the next call to [`IdentitySequence::next`] will
    /// issue, without consuming it.
    #[must_use]
    pub fn peek(&self) -> u64 {
        *self.counter.lock()
    }
}

impl Default for MonotonicSequence {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdentitySequence for MonotonicSequence {
    fn next(&self) -> EntityIdentity {
        let mut counter = self.counter.lock();
        let id = *counter;
        *counter += 1;
        EntityIdentity(id)
    }

    fn next_block(&self, count: usize) -> Vec<EntityIdentity> {
        // One lock for the whole block keeps a row contiguous.
        let mut counter = self.counter.lock();
        let first = *counter;
        let count = count as u64;
        *counter += count;
        (first..first + count).map(EntityIdentity).collect()
    }
}
