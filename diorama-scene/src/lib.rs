//! Diorama Scene Store
//!
//! The authoritative local collection of scene entities. Owned by the sync
//! engine: local edits and inbound network data both mutate the scene
//! through this one type, so the id-uniqueness invariant is enforced on a
//! single code path.

mod codec;
mod store;

pub use codec::{deserialize_entity, serialize_entity};
pub use store::{SceneError, SceneStore};
