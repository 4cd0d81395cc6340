//! Protobuf definitions for the diorama peer protocol
//!
//! The message structs are hand-derived with `prost::Message` rather than
//! generated from `.proto` files; the field tags below ARE the wire
//! contract and must not be renumbered.

pub mod convert;

pub use convert::ConvertError;

/// Live placement of an entity on the wire.
///
/// `position` is 3 doubles, `rotation` a 4-double quaternion (x, y, z, w),
/// `scale` 3 doubles. Lengths are enforced at conversion, not by the codec.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Transform3d {
    #[prost(double, repeated, tag = "1")]
    pub position: Vec<f64>,
    #[prost(double, repeated, tag = "2")]
    pub rotation: Vec<f64>,
    #[prost(double, repeated, tag = "3")]
    pub scale: Vec<f64>,
}

/// Serialized entity record: identifier, opaque model snapshot, optional
/// animation clip, and current transform.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EntityState {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(bytes = "vec", tag = "2")]
    pub object: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub animation: Option<Vec<u8>>,
    #[prost(message, optional, tag = "4")]
    pub transform: Option<Transform3d>,
}

/// Announce one entity (new, or full replace of an existing id). Flooded.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ObjectAnnounce {
    #[prost(message, optional, tag = "1")]
    pub entity: Option<EntityState>,
}

/// Overwrite the transform of one entity. Flooded.
///
/// Carries the full transform every time — no deltas — so drops and
/// reordering degrade to stale placement, never a corrupt one.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TransformUpdate {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(double, repeated, tag = "2")]
    pub position: Vec<f64>,
    #[prost(double, repeated, tag = "3")]
    pub rotation: Vec<f64>,
    #[prost(double, repeated, tag = "4")]
    pub scale: Vec<f64>,
}

/// Full-scene snapshot. Destructive replace on receipt; sent to a newcomer
/// on join, never relayed.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SceneSnapshot {
    #[prost(message, repeated, tag = "1")]
    pub entities: Vec<EntityState>,
}

/// Top-level frame exchanged between peers.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PeerMessage {
    #[prost(oneof = "peer_message::Message", tags = "1, 2, 3")]
    pub message: Option<peer_message::Message>,
}

pub mod peer_message {
    /// The message kinds of the peer protocol.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Message {
        #[prost(message, tag = "1")]
        Object(super::ObjectAnnounce),
        #[prost(message, tag = "2")]
        Update(super::TransformUpdate),
        #[prost(message, tag = "3")]
        Sync(super::SceneSnapshot),
    }
}

impl PeerMessage {
    /// Wrap an entity record as an object announcement.
    pub fn object(entity: EntityState) -> Self {
        Self {
            message: Some(peer_message::Message::Object(ObjectAnnounce {
                entity: Some(entity),
            })),
        }
    }

    /// Wrap a transform update.
    pub fn update(update: TransformUpdate) -> Self {
        Self {
            message: Some(peer_message::Message::Update(update)),
        }
    }

    /// Wrap a full-scene snapshot.
    pub fn sync(entities: Vec<EntityState>) -> Self {
        Self {
            message: Some(peer_message::Message::Sync(SceneSnapshot { entities })),
        }
    }
}
