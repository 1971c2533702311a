//! # Batch Compression
//!
//! Many small packets to the same players become one compressed frame.
//!
//! ## Layout
//!
//! ```text
//! concat = [varint len][packet] [varint len][packet] ...
//! payload = [u32 LE uncompressed size][LZ4 block of concat]
//! ```
//!
//! The payload is built once on the worker and shared by every recipient.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use super::packets::Packet;
use super::serialization::{PacketDeserializer, PacketSerializer};
use crate::error::{ProtocolError, ProtocolResult};

/// A compressed batch of length-prefixed packet frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchPacket {
    /// Compressed payload with its uncompressed size prepended.
    pub payload: Vec<u8>,
    /// Number of frames inside.
    pub frame_count: usize,
}

impl BatchPacket {
    /// Compressed size in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True if the payload is empty (never the case for built batches).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Decompresses and decodes every frame.
    pub fn decode(&self) -> ProtocolResult<Vec<Packet>> {
        let raw = decompress_size_prepended(&self.payload)?;
        let mut reader = PacketDeserializer::new(&raw);
        let mut packets = Vec::with_capacity(self.frame_count);

        while reader.remaining() > 0 {
            let len = reader.read_len()?;
            let frame = reader.read_bytes(len)?;
            packets.push(PacketDeserializer::new(frame).deserialize()?);
        }

        Ok(packets)
    }
}

/// Builds [`BatchPacket`]s. Owned by the worker and reused across batches.
#[derive(Debug)]
pub struct BatchCompressor {
    frame: PacketSerializer,
    concat: PacketSerializer,
}

impl BatchCompressor {
    /// Creates a compressor that rejects packets larger than `max_frame_size`.
    #[must_use]
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            frame: PacketSerializer::new(max_frame_size),
            concat: PacketSerializer::new(usize::MAX),
        }
    }

    /// Serializes, frames and compresses `packets`.
    pub fn compress(&mut self, packets: &[Packet]) -> ProtocolResult<BatchPacket> {
        if packets.is_empty() {
            return Err(ProtocolError::EmptyBatch);
        }

        self.concat.reset();
        for packet in packets {
            let bytes = self.frame.serialize(packet)?;
            self.concat.write_var_u64(bytes.len() as u64)?;
            self.concat.write_bytes(bytes)?;
        }

        Ok(BatchPacket {
            payload: compress_prepend_size(self.concat.as_slice()),
            frame_count: packets.len(),
        })
    }
}
