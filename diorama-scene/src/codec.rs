//! Entity (de)serialization over the wire record
//!
//! Round-trips losslessly: identifier, model snapshot bytes, animation clip
//! bytes (independently optional), and transform.

use crate::store::SceneError;
use diorama_model::Entity;
use diorama_proto::EntityState;
use prost::Message;

/// Serialize an entity into its wire record bytes.
pub fn serialize_entity(entity: &Entity) -> Vec<u8> {
    EntityState::from(entity).encode_to_vec()
}

/// Deserialize an entity from wire record bytes.
pub fn deserialize_entity(bytes: &[u8]) -> Result<Entity, SceneError> {
    let state = EntityState::decode(bytes)?;
    Ok(Entity::try_from(state)?)
}
