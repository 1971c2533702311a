//! # Proxy Entity Protocol
//!
//! The packet surface of a hologram line is deliberately tiny.
//!
//! ## Frame Structure
//!
//! ```text
//! ┌──────────┬──────────────────┬──────────────────────────────┐
//! │ type (1) │ identity (varint)│ body (per type)              │
//! └──────────┴──────────────────┴──────────────────────────────┘
//! ```
//!
//! ## Batch Structure
//!
//! ```text
//! LZ4( [varint len][frame] [varint len][frame] ... )
//! ```
//!
//! ## Design Philosophy
//!
//! - One tagged enum, every variant carries an identity
//! - The visual shape of a proxy is a compile-time constant
//! - Batches are built on the worker and only transmitted elsewhere

mod compression;
mod packets;
mod serialization;

pub use compression::{BatchCompressor, BatchPacket};
pub use packets::{
    MoveEntity, Outbound, Packet, PacketType, ProxyAppearance, RemoveEntity, SetEntityText,
    SpawnEntity,
};
pub use serialization::{PacketDeserializer, PacketSerializer};
