//! # Packet Definitions
//!
//! Every packet addresses exactly one proxy entity, so the identity is
//! reachable without matching on the variant.

use phantasm_core::{EntityIdentity, Vec3};
use std::sync::Arc;

use super::compression::BatchPacket;

/// Types of packets in the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Create a proxy entity.
    Spawn = 1,
    /// Destroy a proxy entity.
    Remove = 2,
    /// Replace the nameplate text of a proxy.
    SetText = 3,
    /// Teleport a proxy.
    Move = 4,
}

impl PacketType {
    /// Decodes a type byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Spawn),
            2 => Some(Self::Remove),
            3 => Some(Self::SetText),
            4 => Some(Self::Move),
            _ => None,
        }
    }
}

/// Fixed visual state of a text proxy: invisible body, visible nameplate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProxyAppearance {
    /// Network entity type.
    pub entity_type: u32,
    /// Entity flag bitset.
    pub flags: u64,
    /// Bounding box width.
    pub bounding_width: f32,
    /// Bounding box height.
    pub bounding_height: f32,
    /// Render scale.
    pub scale: f32,
    /// Leash holder identity, `-1` for none.
    pub lead_holder: i64,
    /// Nameplate visibility override.
    pub always_show_nametag: u8,
    /// Max-health attribute.
    pub max_health: f32,
}

impl ProxyAppearance {
    /// Flag bit: nameplate may be shown.
    pub const FLAG_CAN_SHOW_NAMETAG: u32 = 14;
    /// Flag bit: nameplate shown without looking at the entity.
    pub const FLAG_ALWAYS_SHOW_NAMETAG: u32 = 15;
    /// Flag bit: entity ignores physics.
    pub const FLAG_IMMOBILE: u32 = 16;
    /// Flag bit: entity makes no sound.
    pub const FLAG_SILENT: u32 = 17;

    /// Armor stand entity type.
    pub const ARMOR_STAND: u32 = 61;

    /// Shape shared by every hologram line.
    pub const HOLOGRAM: Self = Self {
        entity_type: Self::ARMOR_STAND,
        flags: (1 << Self::FLAG_CAN_SHOW_NAMETAG)
            | (1 << Self::FLAG_ALWAYS_SHOW_NAMETAG)
            | (1 << Self::FLAG_IMMOBILE)
            | (1 << Self::FLAG_SILENT),
        bounding_width: 0.0,
        bounding_height: 0.0,
        scale: 0.0,
        lead_holder: -1,
        always_show_nametag: 1,
        max_health: 100.0,
    };

    /// Whether flag bit `bit` is set.
    #[inline]
    #[must_use]
    pub const fn has_flag(&self, bit: u32) -> bool {
        self.flags & (1 << bit) != 0
    }
}

/// Creates a proxy at a position with a nameplate.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnEntity {
    /// Proxy identity.
    pub identity: EntityIdentity,
    /// World position.
    pub position: Vec3,
    /// Visual state.
    pub appearance: ProxyAppearance,
    /// Nameplate text.
    pub name: String,
}

/// Destroys a proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RemoveEntity {
    /// Proxy identity.
    pub identity: EntityIdentity,
}

/// Replaces a proxy's nameplate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetEntityText {
    /// Proxy identity.
    pub identity: EntityIdentity,
    /// New nameplate text.
    pub text: String,
}

/// Teleports a proxy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveEntity {
    /// Proxy identity.
    pub identity: EntityIdentity,
    /// New world position.
    pub position: Vec3,
    /// Ground contact flag.
    pub on_ground: bool,
}

/// Any packet addressed to a single proxy.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// Create.
    Spawn(SpawnEntity),
    /// Destroy.
    Remove(RemoveEntity),
    /// Retext.
    SetText(SetEntityText),
    /// Teleport.
    Move(MoveEntity),
}

impl Packet {
    /// Spawn packet with the hologram appearance.
    #[must_use]
    pub fn spawn(identity: EntityIdentity, position: Vec3, name: impl Into<String>) -> Self {
        Self::Spawn(SpawnEntity {
            identity,
            position,
            appearance: ProxyAppearance::HOLOGRAM,
            name: name.into(),
        })
    }

    /// Remove packet.
    #[must_use]
    pub const fn remove(identity: EntityIdentity) -> Self {
        Self::Remove(RemoveEntity { identity })
    }

    /// Set-text packet.
    #[must_use]
    pub fn set_text(identity: EntityIdentity, text: impl Into<String>) -> Self {
        Self::SetText(SetEntityText {
            identity,
            text: text.into(),
        })
    }

    /// Move packet, marked on-ground.
    #[must_use]
    pub const fn move_to(identity: EntityIdentity, position: Vec3) -> Self {
        Self::Move(MoveEntity {
            identity,
            position,
            on_ground: true,
        })
    }

    /// Identity of the addressed proxy.
    #[inline]
    #[must_use]
    pub const fn identity(&self) -> EntityIdentity {
        match self {
            Self::Spawn(p) => p.identity,
            Self::Remove(p) => p.identity,
            Self::SetText(p) => p.identity,
            Self::Move(p) => p.identity,
        }
    }

    /// Wire type of this packet.
    #[inline]
    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        match self {
            Self::Spawn(_) => PacketType::Spawn,
            Self::Remove(_) => PacketType::Remove,
            Self::SetText(_) => PacketType::SetText,
            Self::Move(_) => PacketType::Move,
        }
    }

    /// Nameplate text carried by spawn and set-text packets.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Spawn(p) => Some(&p.name),
            Self::SetText(p) => Some(&p.text),
            Self::Remove(_) | Self::Move(_) => None,
        }
    }

    /// Position carried by spawn and move packets.
    #[must_use]
    pub const fn position(&self) -> Option<Vec3> {
        match self {
            Self::Spawn(p) => Some(p.position),
            Self::Move(p) => Some(p.position),
            Self::Remove(_) | Self::SetText(_) => None,
        }
    }
}

/// What the sink is asked to transmit.
#[derive(Clone, Debug)]
pub enum Outbound {
    /// A single packet, uncompressed.
    Entity(Packet),
    /// A compressed batch shared by every recipient.
    Batch(Arc<BatchPacket>),
}
