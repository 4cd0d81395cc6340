//! Conversions between wire records and model types
//!
//! Wire-side vectors are unchecked by the codec; every length and id check
//! lives here so a malformed frame surfaces as one typed error.

use crate::{EntityState, Transform3d, TransformUpdate};
use diorama_model::{Entity, EntityId, ParseEntityIdError, Transform};

/// Error converting a wire record into a model value.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    InvalidId(#[from] ParseEntityIdError),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("field {field} expects {expected} components, got {got}")]
    BadVector {
        field: &'static str,
        expected: usize,
        got: usize,
    },
}

fn fixed<const N: usize>(field: &'static str, v: &[f64]) -> Result<[f64; N], ConvertError> {
    <[f64; N]>::try_from(v).map_err(|_| ConvertError::BadVector {
        field,
        expected: N,
        got: v.len(),
    })
}

impl From<Transform> for Transform3d {
    fn from(t: Transform) -> Self {
        Self {
            position: t.position.to_vec(),
            rotation: t.rotation.to_vec(),
            scale: t.scale.to_vec(),
        }
    }
}

impl TryFrom<&Transform3d> for Transform {
    type Error = ConvertError;

    fn try_from(proto: &Transform3d) -> Result<Self, Self::Error> {
        Ok(Transform {
            position: fixed("position", &proto.position)?,
            rotation: fixed("rotation", &proto.rotation)?,
            scale: fixed("scale", &proto.scale)?,
        })
    }
}

impl From<&Entity> for EntityState {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.to_string(),
            object: entity.object.clone(),
            animation: entity.animation.clone(),
            transform: Some(entity.transform.into()),
        }
    }
}

impl TryFrom<EntityState> for Entity {
    type Error = ConvertError;

    fn try_from(state: EntityState) -> Result<Self, Self::Error> {
        let id: EntityId = state.id.parse()?;
        let transform = match &state.transform {
            Some(t) => Transform::try_from(t)?,
            None => Transform::IDENTITY,
        };
        Ok(Entity {
            id,
            object: state.object,
            animation: state.animation,
            transform,
        })
    }
}

impl TransformUpdate {
    /// Build an update frame from an entity id and its full current transform.
    pub fn from_parts(id: EntityId, transform: Transform) -> Self {
        Self {
            id: id.to_string(),
            position: transform.position.to_vec(),
            rotation: transform.rotation.to_vec(),
            scale: transform.scale.to_vec(),
        }
    }

    /// Parse the identifier and transform carried by this update.
    pub fn to_parts(&self) -> Result<(EntityId, Transform), ConvertError> {
        let id: EntityId = self.id.parse()?;
        let transform = Transform {
            position: fixed("position", &self.position)?,
            rotation: fixed("rotation", &self.rotation)?,
            scale: fixed("scale", &self.scale)?,
        };
        Ok((id, transform))
    }
}
