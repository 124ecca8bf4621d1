use super::flags::EntityFlags;
use super::instance::Entity;
use crate::core::{EntityError, Result, Value};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Derived lifecycle state. `ReadOnly` is an overlay reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    New,
    Loaded,
    DeletePending,
    Deleted,
}

impl Entity {
    /// True while the new marker is set, or while any key field is unloaded
    /// or still equal to its default value.
    pub fn is_new(&self) -> bool {
        if self.is_new_marker {
            return true;
        }
        self.entity_type.key_fields().any(|field| {
            match self.slots.loaded_value(field.ordinal) {
                Ok(Some(value)) => *value == field.default_value(),
                _ => true,
            }
        })
    }

    /// The raw marker, without the key-field derivation of [`is_new`](Self::is_new).
    pub fn is_new_marker(&self) -> bool {
        self.is_new_marker
    }

    /// Records that this instance corresponds to a stored row.
    pub fn mark_persisted(&mut self) {
        self.is_new_marker = false;
    }

    pub fn flags(&self) -> EntityFlags {
        self.flags
    }

    pub fn state(&self) -> LifecycleState {
        if self.flags.contains(EntityFlags::DELETED) {
            LifecycleState::Deleted
        } else if self.flags.contains(EntityFlags::DELETE_PENDING) {
            LifecycleState::DeletePending
        } else if self.is_new() {
            LifecycleState::New
        } else {
            LifecycleState::Loaded
        }
    }

    pub fn mark_for_deletion(&mut self) -> Result<()> {
        self.ensure_not_deleted("mark for deletion")?;
        self.flags.insert(EntityFlags::DELETE_PENDING);
        Ok(())
    }

    pub fn unmark_for_deletion(&mut self) -> Result<()> {
        self.ensure_not_deleted("unmark for deletion")?;
        self.flags.remove(EntityFlags::DELETE_PENDING);
        Ok(())
    }

    pub fn is_delete_pending(&self) -> bool {
        self.flags.contains(EntityFlags::DELETE_PENDING)
    }

    pub fn is_deleted(&self, treat_pending_as_deleted: bool) -> bool {
        self.flags.contains(EntityFlags::DELETED)
            || (treat_pending_as_deleted && self.is_delete_pending())
    }

    /// Terminal transition, once the backend confirmed physical removal.
    pub fn mark_as_deleted(&mut self) {
        self.flags.remove(EntityFlags::DELETE_PENDING);
        self.flags.insert(EntityFlags::DELETED);
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.contains(EntityFlags::READ_ONLY)
    }

    pub fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        self.ensure_not_deleted("change read-only state of")?;
        self.flags.set(EntityFlags::READ_ONLY, read_only);
        Ok(())
    }

    /// Key field values in declaration order. Unloaded keys report their
    /// default, which is what a read would seed them with.
    pub fn key_values(&self) -> Vec<Value> {
        self.entity_type
            .key_fields()
            .map(|field| match self.slots.loaded_value(field.ordinal) {
                Ok(Some(value)) => value.clone(),
                _ => field.default_value(),
            })
            .collect()
    }

    /// Key values identifying the stored row: the recorded original of a
    /// key field modified since the last save, the current value otherwise.
    pub fn stored_key_values(&self) -> Vec<Value> {
        self.entity_type
            .key_fields()
            .zip(self.key_values())
            .map(|(field, current)| self.originals.get(&field.name).cloned().unwrap_or(current))
            .collect()
    }

    fn ensure_not_deleted(&self, action: &str) -> Result<()> {
        if self.flags.contains(EntityFlags::DELETED) {
            return Err(EntityError::InvalidState(format!(
                "cannot {} a deleted '{}'",
                action,
                self.entity_type.name()
            )));
        }
        Ok(())
    }
}

/// Same entity type and pairwise-equal key values.
///
/// Two never-persisted instances of one type whose keys are unset compare
/// equal.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        let same_type = Arc::ptr_eq(&self.entity_type, &other.entity_type)
            || self.entity_type.name() == other.entity_type.name();
        same_type && self.key_values() == other.key_values()
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity_type.name().hash(state);
        self.key_values().hash(state);
    }
}
