//! # Grid Contracts
//!
//! Tabular content (leaderboards, paged listings) is produced by an external
//! grid source and laid out by an external formatter. The updater only needs
//! to know how many lines a grid may inject and when its source may be
//! loaded.
//!
//! ```text
//! producer thread                 worker thread
//! ───────────────                 ─────────────
//! CallType::Sync  → load()
//!                                 CallType::Async → load()
//!                                 formatter.format(lines, grid)
//! ```

use std::fmt;
use std::sync::Arc;

/// Thread a grid source may be loaded on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallType {
    /// Must load on the caller of `update`, before the request is queued.
    Sync,
    /// May load on the updater worker.
    Async,
}

/// Source of rows for a grid.
pub trait GridSource: Send + Sync {
    /// Maximum number of rows this source injects.
    fn limit(&self) -> usize;

    /// Whether the source can render a header row.
    fn supports_header(&self) -> bool;

    /// Thread the source may be loaded on.
    fn call_type(&self) -> CallType;

    /// Loads (or refreshes) the rows.
    fn load(&self);

    /// Whether rows are available for formatting.
    fn is_loaded(&self) -> bool;
}

/// Snapshot of a hologram's grid configuration.
#[derive(Clone, Default)]
pub struct GridSettings {
    /// Grid feature switch.
    pub enabled: bool,
    /// Render the header row (and the blank line below it).
    pub header: bool,
    /// Row source, if configured.
    pub source: Option<Arc<dyn GridSource>>,
    /// Bumped by configuration whenever column or page layout changes.
    pub layout_revision: u64,
}

impl GridSettings {
    /// Header row plus the blank separator line.
    pub const HEADER_LINES: usize = 2;

    /// Settings with the grid feature off.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Enabled settings over `source`.
    #[must_use]
    pub fn with_source(source: Arc<dyn GridSource>, header: bool) -> Self {
        Self {
            enabled: true,
            header,
            source: Some(source),
            layout_revision: 0,
        }
    }

    /// Enabled and backed by a source.
    #[inline]
    #[must_use]
    pub fn has_source(&self) -> bool {
        self.enabled && self.source.is_some()
    }

    /// Enabled, backed by a source, and that source has rows.
    #[must_use]
    pub fn is_source_ready(&self) -> bool {
        self.enabled && self.source.as_ref().is_some_and(|s| s.is_loaded())
    }

    /// Lines this grid adds to every variant.
    #[must_use]
    pub fn injected_line_count(&self) -> usize {
        match &self.source {
            Some(source) if self.enabled => {
                let header = if source.supports_header() && self.header {
                    Self::HEADER_LINES
                } else {
                    0
                };
                source.limit() + header
            }
            _ => 0,
        }
    }
}

impl fmt::Debug for GridSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridSettings")
            .field("enabled", &self.enabled)
            .field("header", &self.header)
            .field("source", &self.source.as_ref().map(|s| (s.call_type(), s.limit())))
            .field("layout_revision", &self.layout_revision)
            .finish()
    }
}

/// Lays a variant's lines out as a grid. Must be pure.
pub trait GridFormatter: Send + Sync {
    /// Returns the formatted lines.
    fn format(&self, lines: Vec<String>, grid: &GridSettings) -> Vec<String>;
}

/// Formatter that returns lines unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl GridFormatter for Passthrough {
    fn format(&self, lines: Vec<String>, _grid: &GridSettings) -> Vec<String> {
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FixedSource {
        limit: usize,
        header: bool,
        loaded: AtomicBool,
    }

    impl GridSource for FixedSource {
        fn limit(&self) -> usize {
            self.limit
        }

        fn supports_header(&self) -> bool {
            self.header
        }

        fn call_type(&self) -> CallType {
            CallType::Async
        }

        fn load(&self) {
            self.loaded.store(true, Ordering::Release);
        }

        fn is_loaded(&self) -> bool {
            self.loaded.load(Ordering::Acquire)
        }
    }

    fn source(limit: usize, header: bool) -> Arc<FixedSource> {
        Arc::new(FixedSource {
            limit,
            header,
            loaded: AtomicBool::new(false),
        })
    }

    #[test]
    fn test_disabled_grid_injects_nothing() {
        let mut grid = GridSettings::with_source(source(5, true), true);
        grid.enabled = false;

        assert_eq!(grid.injected_line_count(), 0);
        assert!(!grid.has_source());
        assert_eq!(GridSettings::disabled().injected_line_count(), 0);
    }

    #[test]
    fn test_header_adds_two_lines_when_supported() {
        assert_eq!(GridSettings::with_source(source(5, true), true).injected_line_count(), 7);
        assert_eq!(GridSettings::with_source(source(5, true), false).injected_line_count(), 5);
        assert_eq!(GridSettings::with_source(source(5, false), true).injected_line_count(), 5);
    }

    #[test]
    fn test_source_readiness_follows_load() {
        let src = source(3, false);
        let grid = GridSettings::with_source(src.clone(), false);

        assert!(!grid.is_source_ready());
        src.load();
        assert!(grid.is_source_ready());
    }

    #[test]
    fn test_passthrough_keeps_lines() {
        let lines = vec!["a".to_owned(), "b".to_owned()];
        assert_eq!(Passthrough.format(lines.clone(), &GridSettings::disabled()), lines);
    }
}
