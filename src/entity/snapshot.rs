use super::affinity::AffinityToken;
use super::flags::{EntityFlags, SlotFlags};
use super::instance::Entity;
use super::slots::SlotStore;
use crate::context::EntityContext;
use crate::core::{EntityError, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{Level, event};

/// The complete persistent state of one entity instance.
///
/// Parent cache and observers are runtime attachments and are not part of
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_type: String,
    pub slots: Vec<Value>,
    pub slot_flags: Vec<SlotFlags>,
    pub entity_flags: EntityFlags,
    pub original_values: BTreeMap<String, Value>,
    pub is_new: bool,
    #[serde(default)]
    pub affinity: Option<AffinityToken>,
}

impl EntitySnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Entity {
    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            entity_type: self.entity_type.name().to_string(),
            slots: self.slots.values().to_vec(),
            slot_flags: self.slots.all_flags().to_vec(),
            entity_flags: self.flags,
            original_values: self.originals.clone(),
            is_new: self.is_new_marker,
            affinity: self.affinity.clone(),
        }
    }

    /// A detached copy with the same slots, flags and originals.
    pub fn try_clone(&self) -> Result<Entity> {
        Self::from_snapshot(&self.context, self.snapshot())
    }

    pub(crate) fn from_snapshot(
        context: &Arc<EntityContext>,
        snapshot: EntitySnapshot,
    ) -> Result<Entity> {
        let entity_type = context.registry().get(&snapshot.entity_type)?;
        let count = entity_type.field_count();
        if snapshot.slots.len() != count || snapshot.slot_flags.len() != count {
            return Err(EntityError::InvalidArgument(format!(
                "snapshot of '{}' has {} slots and {} flags, expected {}",
                snapshot.entity_type,
                snapshot.slots.len(),
                snapshot.slot_flags.len(),
                count
            )));
        }

        for field in entity_type.fields() {
            let modified = snapshot.slot_flags[field.ordinal].is_modified();
            if modified != snapshot.original_values.contains_key(&field.name) {
                return Err(EntityError::InvalidArgument(format!(
                    "snapshot of '{}' disagrees on modification of '{}'",
                    snapshot.entity_type, field.name
                )));
            }
        }
        if let Some(stray) = snapshot
            .original_values
            .keys()
            .find(|name| entity_type.find_field_index(name).is_none())
        {
            return Err(EntityError::FieldNotFound(
                stray.clone(),
                snapshot.entity_type.clone(),
            ));
        }

        let slots = SlotStore::from_parts(entity_type.name(), snapshot.slots, snapshot.slot_flags)?;
        event!(Level::DEBUG, entity = %entity_type.name(), "entity restored from snapshot");
        Ok(Entity {
            entity_type,
            context: context.clone(),
            slots,
            flags: snapshot.entity_flags,
            originals: snapshot.original_values,
            parents: HashMap::new(),
            is_new_marker: snapshot.is_new,
            initializing: false,
            affinity: snapshot.affinity,
            observers: Vec::new(),
        })
    }
}
