//! # Updater Error Types
//!
//! None of these ever stop the worker. They are logged where they surface
//! and the affected request or batch is dropped.

use thiserror::Error;

/// Errors raised while encoding or decoding packets and batches.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A single frame exceeded the configured maximum.
    #[error("frame too large: {size} bytes, max {max}")]
    FrameTooLarge {
        /// Encoded size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Input ended in the middle of a value.
    #[error("truncated input")]
    Truncated,

    /// Leading type byte does not name a packet.
    #[error("unknown packet type: {0:#04x}")]
    UnknownPacketType(u8),

    /// A text field was not valid UTF-8.
    #[error("invalid UTF-8 in text field")]
    InvalidText,

    /// A var-int ran past its maximum width.
    #[error("var-int overflow")]
    VarIntOverflow,

    /// LZ4 payload could not be decompressed.
    #[error("decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    /// Attempted to build a batch without packets.
    #[error("empty batch")]
    EmptyBatch,
}

/// Errors raised by the updater's producer API or while rendering a request.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// A row of identities is shorter than the lines it must carry.
    #[error("hologram {hologram}: {lines} lines but only {identities} identities")]
    IdentityShortfall {
        /// Hologram name.
        hologram: String,
        /// Lines to render.
        lines: usize,
        /// Identities available.
        identities: usize,
    },

    /// The worker is gone; nothing will drain the queue.
    #[error("update queue closed")]
    QueueClosed,

    /// The worker thread could not be spawned.
    #[error("failed to spawn updater worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// Errors raised while loading [`crate::UpdaterConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML for the config schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Result type for updater operations.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
