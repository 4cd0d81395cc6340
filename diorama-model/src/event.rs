//! Events published by the sync engine to the embedding application

use crate::entity::EntityId;
use crate::types::PeerId;

/// What the sync engine tells the application.
///
/// Delivered on a broadcast channel; the application typically mirrors these
/// into its render scene (spawn the model, move it, replace everything).
#[derive(Clone, Debug)]
pub enum EngineEvent {
    /// A peer session opened (either direction).
    PeerJoined { peer: PeerId },
    /// A peer session closed or failed.
    PeerLeft { peer: PeerId },
    /// A remote peer announced an entity; it is now in the scene store.
    EntityAdded { id: EntityId },
    /// A remote transform update was applied.
    TransformUpdated { id: EntityId },
    /// A full-scene snapshot replaced the local store.
    SceneReplaced { entities: usize },
}
