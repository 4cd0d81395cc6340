//! In-memory entity collection
//!
//! Interior-locked so the multi-threaded host keeps the run-to-completion
//! atomicity the protocol assumes. The lock is never held across an await.

use diorama_model::{Entity, EntityId, Transform};
use std::collections::HashMap;
use std::sync::RwLock;

/// Error from scene store operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("scene store lock poisoned")]
    Lock,

    #[error("entity record decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error(transparent)]
    Convert(#[from] diorama_proto::ConvertError),
}

/// The authoritative local scene: every entity this peer currently knows.
///
/// Identifier uniqueness is an invariant here — `add` with a known id is a
/// full replace, never a duplicate.
pub struct SceneStore {
    entities: RwLock<HashMap<EntityId, Entity>>,
}

impl SceneStore {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
        }
    }

    /// Insert an entity, replacing any existing entity with the same id.
    /// Returns true if the id was new.
    pub fn add(&self, entity: Entity) -> Result<bool, SceneError> {
        let mut entities = self.entities.write().map_err(|_| SceneError::Lock)?;
        Ok(entities.insert(entity.id, entity).is_none())
    }

    /// Remove an entity. Returns it if it was present.
    pub fn remove(&self, id: &EntityId) -> Result<Option<Entity>, SceneError> {
        let mut entities = self.entities.write().map_err(|_| SceneError::Lock)?;
        Ok(entities.remove(id))
    }

    /// Look up an entity by id.
    pub fn get(&self, id: &EntityId) -> Result<Option<Entity>, SceneError> {
        let entities = self.entities.read().map_err(|_| SceneError::Lock)?;
        Ok(entities.get(id).cloned())
    }

    pub fn contains(&self, id: &EntityId) -> Result<bool, SceneError> {
        let entities = self.entities.read().map_err(|_| SceneError::Lock)?;
        Ok(entities.contains_key(id))
    }

    /// Overwrite the transform of an entity in place.
    ///
    /// Returns false if the id is unknown — not an error: under eventual
    /// convergence an update may arrive before (or without) its entity.
    pub fn apply_transform(&self, id: &EntityId, transform: Transform) -> Result<bool, SceneError> {
        let mut entities = self.entities.write().map_err(|_| SceneError::Lock)?;
        match entities.get_mut(id) {
            Some(entity) => {
                entity.transform = transform;
                Ok(true)
            }
            None => {
                tracing::debug!(id = %id, "transform update for unknown entity, ignored");
                Ok(false)
            }
        }
    }

    /// Destructive full replace: drop everything known, install the snapshot.
    /// Returns the number of entities installed.
    pub fn replace_all(&self, snapshot: Vec<Entity>) -> Result<usize, SceneError> {
        let mut entities = self.entities.write().map_err(|_| SceneError::Lock)?;
        entities.clear();
        let count = snapshot.len();
        for entity in snapshot {
            entities.insert(entity.id, entity);
        }
        Ok(count)
    }

    /// Clone out every entity, for a full-scene sync. No ordering guarantee.
    pub fn snapshot(&self) -> Result<Vec<Entity>, SceneError> {
        let entities = self.entities.read().map_err(|_| SceneError::Lock)?;
        Ok(entities.values().cloned().collect())
    }

    pub fn len(&self) -> Result<usize, SceneError> {
        let entities = self.entities.read().map_err(|_| SceneError::Lock)?;
        Ok(entities.len())
    }

    pub fn is_empty(&self) -> Result<bool, SceneError> {
        Ok(self.len()? == 0)
    }
}

impl Default for SceneStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diorama_model::IdAllocator;

    fn entity(alloc: &IdAllocator) -> Entity {
        Entity::new(alloc.allocate(), b"model".to_vec())
    }

    #[test]
    fn test_add_is_replace_on_same_id() {
        let alloc = IdAllocator::new();
        let store = SceneStore::new();
        let e = entity(&alloc);
        let id = e.id;

        assert!(store.add(e).unwrap());

        let replacement = Entity::new(id, b"other model".to_vec());
        assert!(!store.add(replacement.clone()).unwrap());
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(&id).unwrap().unwrap(), replacement);
    }

    #[test]
    fn test_apply_transform_overwrites_in_place() {
        let alloc = IdAllocator::new();
        let store = SceneStore::new();
        let e = entity(&alloc);
        let id = e.id;
        store.add(e).unwrap();

        let t = Transform::from_position([1.0, 2.0, 3.0]);
        assert!(store.apply_transform(&id, t).unwrap());
        assert_eq!(store.get(&id).unwrap().unwrap().transform, t);

        // Idempotent: applying the same update again changes nothing.
        assert!(store.apply_transform(&id, t).unwrap());
        assert_eq!(store.get(&id).unwrap().unwrap().transform, t);
    }

    #[test]
    fn test_unknown_id_is_tolerated() {
        let alloc = IdAllocator::new();
        let store = SceneStore::new();
        store.add(entity(&alloc)).unwrap();

        let stranger = IdAllocator::new().allocate();
        let before = store.snapshot().unwrap();
        assert!(!store.apply_transform(&stranger, Transform::IDENTITY).unwrap());
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn test_replace_all_is_destructive() {
        let alloc = IdAllocator::new();
        let store = SceneStore::new();

        // Local entity with an edit that was never broadcast.
        let mut local = entity(&alloc);
        local.transform = Transform::from_position([9.0, 9.0, 9.0]);
        let local_id = local.id;
        store.add(local).unwrap();

        let foreign = entity(&alloc);
        let foreign_id = foreign.id;
        assert_eq!(store.replace_all(vec![foreign]).unwrap(), 1);

        assert!(store.get(&local_id).unwrap().is_none());
        assert!(store.get(&foreign_id).unwrap().is_some());
        assert_eq!(store.len().unwrap(), 1);
    }
}
