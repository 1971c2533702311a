//! # Packet Serialization
//!
//! Little-endian fixed-width fields, LEB128 var-ints for identities and
//! lengths, UTF-8 strings prefixed by their byte length.
//!
//! ## Design
//!
//! - One serializer is reused for every packet of a batch
//! - Every write is bounded by the configured frame size
//! - Positions are copied directly (Pod)

use bytemuck::{bytes_of, Pod};
use phantasm_core::{EntityIdentity, Vec3};

use super::packets::{
    MoveEntity, Packet, PacketType, ProxyAppearance, RemoveEntity, SetEntityText, SpawnEntity,
};
use crate::error::{ProtocolError, ProtocolResult};

/// Widest LEB128 encoding of a `u64`.
const MAX_VARINT_LEN: usize = 10;

/// Packet serializer - writes packets into a reusable buffer.
#[derive(Debug)]
pub struct PacketSerializer {
    buffer: Vec<u8>,
    max_size: usize,
}

impl PacketSerializer {
    /// Creates a serializer that refuses frames larger than `max_size`.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(max_size.min(256)),
            max_size,
        }
    }

    /// Resets the serializer for reuse.
    #[inline]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns a slice of the written data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    fn reserve(&self, additional: usize) -> ProtocolResult<()> {
        let size = self.buffer.len() + additional;
        if size > self.max_size {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_size,
            });
        }
        Ok(())
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> ProtocolResult<()> {
        self.reserve(bytes.len())?;
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) -> ProtocolResult<()> {
        self.write_bytes(&[value])
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) -> ProtocolResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a u64 in little-endian format.
    #[inline]
    pub fn write_u64(&mut self, value: u64) -> ProtocolResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes an i64 in little-endian format.
    #[inline]
    pub fn write_i64(&mut self, value: i64) -> ProtocolResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a f32 in little-endian format.
    #[inline]
    pub fn write_f32(&mut self, value: f32) -> ProtocolResult<()> {
        self.write_u32(value.to_bits())
    }

    /// Writes a Pod type directly.
    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) -> ProtocolResult<()> {
        self.write_bytes(bytes_of(value))
    }

    /// Writes an unsigned LEB128 var-int.
    pub fn write_var_u64(&mut self, mut value: u64) -> ProtocolResult<()> {
        let mut scratch = [0u8; MAX_VARINT_LEN];
        let mut len = 0;
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                scratch[len] = byte;
                len += 1;
                break;
            }
            scratch[len] = byte | 0x80;
            len += 1;
        }
        self.write_bytes(&scratch[..len])
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) -> ProtocolResult<()> {
        self.write_var_u64(value.len() as u64)?;
        self.write_bytes(value.as_bytes())
    }

    #[inline]
    fn write_identity(&mut self, identity: EntityIdentity) -> ProtocolResult<()> {
        self.write_var_u64(identity.raw())
    }

    fn write_appearance(&mut self, look: &ProxyAppearance) -> ProtocolResult<()> {
        self.write_var_u64(u64::from(look.entity_type))?;
        self.write_u64(look.flags)?;
        self.write_f32(look.bounding_width)?;
        self.write_f32(look.bounding_height)?;
        self.write_f32(look.scale)?;
        self.write_i64(look.lead_holder)?;
        self.write_u8(look.always_show_nametag)?;
        self.write_f32(look.max_health)
    }

    /// Serializes a complete packet, replacing previous contents.
    pub fn serialize(&mut self, packet: &Packet) -> ProtocolResult<&[u8]> {
        self.reset();
        self.write_u8(packet.packet_type() as u8)?;
        self.write_identity(packet.identity())?;

        match packet {
            Packet::Spawn(spawn) => {
                self.write_pod(&spawn.position)?;
                self.write_appearance(&spawn.appearance)?;
                self.write_string(&spawn.name)?;
            }
            Packet::Remove(_) => {}
            Packet::SetText(set) => self.write_string(&set.text)?,
            Packet::Move(mv) => {
                self.write_pod(&mv.position)?;
                self.write_u8(u8::from(mv.on_ground))?;
            }
        }

        Ok(self.as_slice())
    }
}

/// Packet deserializer - reads packets from a buffer.
#[derive(Debug)]
pub struct PacketDeserializer<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> PacketDeserializer<'a> {
    /// Creates a new deserializer from a buffer.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Reads `len` raw bytes.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> ProtocolResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(ProtocolError::Truncated);
        }
        let buffer: &'a [u8] = self.buffer;
        let slice = &buffer[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> ProtocolResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> ProtocolResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a u32 in little-endian format.
    #[inline]
    pub fn read_u32(&mut self) -> ProtocolResult<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads a u64 in little-endian format.
    #[inline]
    pub fn read_u64(&mut self) -> ProtocolResult<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Reads an i64 in little-endian format.
    #[inline]
    pub fn read_i64(&mut self) -> ProtocolResult<i64> {
        self.read_array().map(i64::from_le_bytes)
    }

    /// Reads a f32 in little-endian format.
    #[inline]
    pub fn read_f32(&mut self) -> ProtocolResult<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Reads a Pod type directly.
    #[inline]
    pub fn read_pod<T: Pod>(&mut self) -> ProtocolResult<T> {
        let slice = self.read_bytes(std::mem::size_of::<T>())?;
        bytemuck::try_pod_read_unaligned(slice).map_err(|_| ProtocolError::Truncated)
    }

    /// Reads an unsigned LEB128 var-int.
    pub fn read_var_u64(&mut self) -> ProtocolResult<u64> {
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            // The tenth byte may only carry the top bit of a u64.
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(ProtocolError::VarIntOverflow);
            }
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ProtocolError::VarIntOverflow)
    }

    /// Reads a var-int length and narrows it to `usize`.
    pub fn read_len(&mut self) -> ProtocolResult<usize> {
        usize::try_from(self.read_var_u64()?).map_err(|_| ProtocolError::VarIntOverflow)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> ProtocolResult<String> {
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidText)
    }

    fn read_appearance(&mut self) -> ProtocolResult<ProxyAppearance> {
        let entity_type =
            u32::try_from(self.read_var_u64()?).map_err(|_| ProtocolError::VarIntOverflow)?;
        Ok(ProxyAppearance {
            entity_type,
            flags: self.read_u64()?,
            bounding_width: self.read_f32()?,
            bounding_height: self.read_f32()?,
            scale: self.read_f32()?,
            lead_holder: self.read_i64()?,
            always_show_nametag: self.read_u8()?,
            max_health: self.read_f32()?,
        })
    }

    /// Deserializes a packet from the buffer.
    pub fn deserialize(&mut self) -> ProtocolResult<Packet> {
        let type_byte = self.read_u8()?;
        let packet_type =
            PacketType::from_u8(type_byte).ok_or(ProtocolError::UnknownPacketType(type_byte))?;
        let identity = EntityIdentity::new(self.read_var_u64()?);

        let packet = match packet_type {
            PacketType::Spawn => {
                let position = self.read_pod::<Vec3>()?;
                let appearance = self.read_appearance()?;
                let name = self.read_string()?;
                Packet::Spawn(SpawnEntity {
                    identity,
                    position,
                    appearance,
                    name,
                })
            }
            PacketType::Remove => Packet::Remove(RemoveEntity { identity }),
            PacketType::SetText => Packet::SetText(SetEntityText {
                identity,
                text: self.read_string()?,
            }),
            PacketType::Move => {
                let position = self.read_pod::<Vec3>()?;
                let on_ground = self.read_u8()? != 0;
                Packet::Move(MoveEntity {
                    identity,
                    position,
                    on_ground,
                })
            }
        };

        Ok(packet)
    }
}
