//! # PHANTASM Core
//!
//! Types shared by every thread that touches a hologram:
//!
//! - **Positions**: world-space anchors for stacked text lines
//! - **Identities**: protocol handles for proxy entities, issued by an
//!   injectable monotonic sequence
//! - **Viewers**: players tagged with the language variant they receive
//! - **Placeholders**: substitution over precomputed match lists
//! - **Grids**: contracts for the external tabular formatter
//!
//! ## Architecture Rules
//!
//! 1. **No I/O** - this crate never blocks and never spawns threads
//! 2. **Snapshots are owned** - everything here is `Clone` so producers can
//!    hand immutable copies to the updater
//!
//! ## Example
//!
//! ```rust
//! use phantasm_core::{IdentitySequence, MonotonicSequence};
//!
//! let ids = MonotonicSequence::starting_at(100);
//! assert_eq!(ids.next().raw(), 100);
//! assert_eq!(ids.next().raw(), 101);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod grid;
pub mod identity;
pub mod math;
pub mod placeholder;
pub mod viewer;

pub use grid::{CallType, GridFormatter, GridSettings, GridSource, Passthrough};
pub use identity::{EntityIdentity, IdentitySequence, MonotonicSequence};
pub use math::Vec3;
pub use placeholder::{
    resolve_line, resolve_lines, resolve_translations, Layered, LineMatches,
    MatchedPlaceholder, PlaceholderMap, PlaceholderValues, TranslationMatches,
};
pub use viewer::{PlayerEntry, PlayerId};
