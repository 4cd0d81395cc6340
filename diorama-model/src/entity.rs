//! Scene entities and their identifiers
//!
//! An entity is one synchronized scene object: an opaque serialized model
//! snapshot, an optional animation clip blob, and a live transform. The
//! snapshot formats are owned by the embedding engine; this layer never
//! inspects them.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one scene entity.
///
/// Entities are created on whichever peer the user is working on, with no
/// coordinator to hand out ids. A bare counter would collide across peers,
/// so the id combines a per-process random instance token with a local
/// monotonic counter, making ids globally unique without coordination.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    origin: [u8; 8],
    seq: u64,
}

impl EntityId {
    /// The instance token of the peer that created this entity.
    pub fn origin(&self) -> [u8; 8] {
        self.origin
    }

    /// Creation sequence number within the originating instance.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", hex::encode(self.origin), self.seq)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self)
    }
}

/// Error parsing an [`EntityId`] from its wire form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid entity id {0:?}")]
pub struct ParseEntityIdError(pub String);

impl FromStr for EntityId {
    type Err = ParseEntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (token, seq) = s
            .split_once('-')
            .ok_or_else(|| ParseEntityIdError(s.to_string()))?;
        let bytes = hex::decode(token).map_err(|_| ParseEntityIdError(s.to_string()))?;
        let origin: [u8; 8] = bytes
            .try_into()
            .map_err(|_| ParseEntityIdError(s.to_string()))?;
        let seq = seq.parse().map_err(|_| ParseEntityIdError(s.to_string()))?;
        Ok(Self { origin, seq })
    }
}

/// Allocates [`EntityId`]s for locally created entities.
///
/// One allocator per process; the instance token is drawn once at startup.
pub struct IdAllocator {
    origin: [u8; 8],
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            origin: rand::random(),
            next: AtomicU64::new(0),
        }
    }

    /// Allocator with a fixed instance token (deterministic tests).
    pub fn with_origin(origin: [u8; 8]) -> Self {
        Self {
            origin,
            next: AtomicU64::new(0),
        }
    }

    pub fn allocate(&self) -> EntityId {
        EntityId {
            origin: self.origin,
            seq: self.next.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Live placement of an entity: position, orientation, scale.
///
/// Always carried in full — never as a delta — so reapplying or dropping an
/// update leaves the receiver with a valid transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: [f64; 3],
    /// Orientation quaternion, `[x, y, z, w]`.
    pub rotation: [f64; 4],
    pub scale: [f64; 3],
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0; 3],
    };

    pub fn from_position(position: [f64; 3]) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Set a uniform scale on all three axes.
    pub fn with_uniform_scale(mut self, scale: f64) -> Self {
        self.scale = [scale; 3];
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One synchronized scene object.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    /// Serialized model snapshot (geometry, materials, hierarchy). Format
    /// owned by the embedding engine.
    pub object: Vec<u8>,
    /// Serialized animation clip, if the model carries one.
    pub animation: Option<Vec<u8>>,
    pub transform: Transform,
}

impl Entity {
    pub fn new(id: EntityId, object: Vec<u8>) -> Self {
        Self {
            id,
            object,
            animation: None,
            transform: Transform::IDENTITY,
        }
    }

    pub fn with_animation(mut self, animation: Vec<u8>) -> Self {
        self.animation = Some(animation);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}
