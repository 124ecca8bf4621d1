use super::affinity::AffinityToken;
use super::events::ObserverRef;
use super::flags::EntityFlags;
use super::slots::SlotStore;
use crate::context::EntityContext;
use crate::core::{EntityError, Result, Value};
use crate::metadata::{EntityType, FieldDescriptor};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

/// Handle used wherever an entity is shared: the parent cache and the save
/// queue.
pub type SharedEntity = Arc<Mutex<Entity>>;

/// Why a field is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteReason {
    /// Application code. Rejected on read-only entities.
    User,
    /// Runtime bookkeeping such as backend-assigned keys. Validated and
    /// tracked, but allowed on read-only entities.
    Internal,
    /// Values arriving from storage. Stored raw, never tracked. Only the
    /// runtime writes with this reason.
    DemandLoad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Stored and tracked as a modification.
    Changed,
    /// Equal to the current value on a persisted entity; nothing happened.
    Unchanged,
    /// A before-change observer vetoed the write.
    Cancelled,
    /// Stored without change tracking (initializing mode or demand load).
    Stored,
}

/// Addresses a field of an entity type.
pub trait FieldKey {
    fn ordinal_in(&self, entity_type: &EntityType) -> Result<usize>;
}

impl FieldKey for usize {
    fn ordinal_in(&self, entity_type: &EntityType) -> Result<usize> {
        entity_type.field(*self).map(|field| field.ordinal)
    }
}

impl FieldKey for &str {
    fn ordinal_in(&self, entity_type: &EntityType) -> Result<usize> {
        if self.is_empty() {
            return Err(EntityError::InvalidArgument(
                "field name must not be empty".to_string(),
            ));
        }
        entity_type.field_by_name(self).map(|field| field.ordinal)
    }
}

impl FieldKey for String {
    fn ordinal_in(&self, entity_type: &EntityType) -> Result<usize> {
        self.as_str().ordinal_in(entity_type)
    }
}

impl FieldKey for &String {
    fn ordinal_in(&self, entity_type: &EntityType) -> Result<usize> {
        self.as_str().ordinal_in(entity_type)
    }
}

impl FieldKey for &FieldDescriptor {
    fn ordinal_in(&self, entity_type: &EntityType) -> Result<usize> {
        match entity_type.field(self.ordinal) {
            Ok(field) if field.name == self.name => Ok(field.ordinal),
            _ => Err(EntityError::FieldNotFound(
                self.name.clone(),
                entity_type.name().to_string(),
            )),
        }
    }
}

/// One in-memory business object backed by a stored row.
///
/// Not internally synchronized: share it through [`SharedEntity`].
pub struct Entity {
    pub(crate) entity_type: Arc<EntityType>,
    pub(crate) context: Arc<EntityContext>,
    pub(crate) slots: SlotStore,
    pub(crate) flags: EntityFlags,
    pub(crate) originals: BTreeMap<String, Value>,
    pub(crate) parents: HashMap<String, Option<SharedEntity>>,
    pub(crate) is_new_marker: bool,
    pub(crate) initializing: bool,
    pub(crate) affinity: Option<AffinityToken>,
    pub(crate) observers: Vec<ObserverRef>,
}

impl Entity {
    pub(crate) fn new(entity_type: Arc<EntityType>, context: Arc<EntityContext>) -> Self {
        let slots = SlotStore::new(entity_type.name(), entity_type.field_count());
        let affinity = context.config().default_affinity.clone();
        Self {
            entity_type,
            context,
            slots,
            flags: EntityFlags::empty(),
            originals: BTreeMap::new(),
            parents: HashMap::new(),
            is_new_marker: true,
            initializing: false,
            affinity,
            observers: Vec::new(),
        }
    }

    pub fn into_shared(self) -> SharedEntity {
        Arc::new(Mutex::new(self))
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    pub fn type_name(&self) -> &str {
        self.entity_type.name()
    }

    pub fn context(&self) -> &Arc<EntityContext> {
        &self.context
    }

    pub fn affinity(&self) -> Option<&AffinityToken> {
        self.affinity.as_ref()
    }

    pub fn set_affinity(&mut self, token: Option<AffinityToken>) {
        self.affinity = token;
    }

    pub fn add_observer(&mut self, observer: ObserverRef) {
        self.observers.push(observer);
    }

    pub fn is_initializing(&self) -> bool {
        self.initializing
    }

    /// Enters initializing mode until the returned scope is dropped.
    ///
    /// Writes made through the scope are stored raw: no notifications, no
    /// original capture, no `MODIFIED` flag.
    pub fn initializing(&mut self) -> InitScope<'_> {
        let previous = self.initializing;
        self.initializing = true;
        InitScope {
            entity: self,
            previous,
        }
    }

    /// Reads a field, demand-loading it if needed.
    ///
    /// Unloaded fields of a new or initializing entity are seeded with the
    /// field default instead of going to the backend.
    pub fn get(&mut self, field: impl FieldKey) -> Result<Value> {
        let ordinal = field.ordinal_in(&self.entity_type)?;
        self.ensure_loaded(ordinal)?;
        Ok(self.slots.value(ordinal)?.clone())
    }

    /// The loaded value of a field, without touching the backend.
    pub fn peek(&self, field: impl FieldKey) -> Result<Option<&Value>> {
        let ordinal = field.ordinal_in(&self.entity_type)?;
        self.slots.loaded_value(ordinal)
    }

    /// Writes a field as application code.
    ///
    /// The current value is read first, so a vetoed write on a new entity
    /// still leaves the field loaded with its default.
    pub fn set(&mut self, field: impl FieldKey, value: impl Into<Value>) -> Result<SetOutcome> {
        self.set_with_reason(field, value, WriteReason::User)
    }

    pub fn set_db_null(&mut self, field: impl FieldKey) -> Result<SetOutcome> {
        self.set(field, Value::Null)
    }

    /// Writes with an explicit reason.
    ///
    /// `WriteReason::DemandLoad` is reserved for values arriving from the
    /// backend and is rejected here.
    pub fn set_with_reason(
        &mut self,
        field: impl FieldKey,
        value: impl Into<Value>,
        reason: WriteReason,
    ) -> Result<SetOutcome> {
        let ordinal = field.ordinal_in(&self.entity_type)?;
        let value = value.into();

        match reason {
            WriteReason::DemandLoad => {
                return Err(EntityError::InvalidArgument(format!(
                    "demand-load writes to '{}' are reserved for the runtime",
                    self.entity_type.name()
                )));
            }
            WriteReason::User if self.flags.contains(EntityFlags::READ_ONLY) => {
                return Err(EntityError::ReadOnly(self.entity_type.name().to_string()));
            }
            _ => {}
        }

        self.entity_type.field(ordinal)?.validate(&value)?;

        if self.initializing {
            self.slots.store_loaded(ordinal, value)?;
            return Ok(SetOutcome::Stored);
        }

        self.track_change(ordinal, value)
    }

    /// Stores a value read from the backend: no validation, no tracking.
    pub(crate) fn store_from_storage(&mut self, ordinal: usize, value: Value) -> Result<SetOutcome> {
        self.slots.store_loaded(ordinal, value)?;
        Ok(SetOutcome::Stored)
    }

    pub fn is_loaded(&self, field: impl FieldKey) -> Result<bool> {
        let ordinal = field.ordinal_in(&self.entity_type)?;
        self.slots.is_loaded(ordinal)
    }

    pub(crate) fn ensure_loaded(&mut self, ordinal: usize) -> Result<()> {
        if self.slots.is_loaded(ordinal)? {
            return Ok(());
        }
        if self.initializing || self.is_new() {
            let default = self.entity_type.field(ordinal)?.default_value();
            return self.slots.store_loaded(ordinal, default);
        }
        self.load_missing(ordinal)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.entity_type.name())
            .field("slots", &self.slots)
            .field("flags", &self.flags)
            .field("originals", &self.originals)
            .field("is_new_marker", &self.is_new_marker)
            .field("affinity", &self.affinity)
            .finish_non_exhaustive()
    }
}

/// Initializing-mode scope returned by [`Entity::initializing`].
pub struct InitScope<'a> {
    entity: &'a mut Entity,
    previous: bool,
}

impl Deref for InitScope<'_> {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        self.entity
    }
}

impl DerefMut for InitScope<'_> {
    fn deref_mut(&mut self) -> &mut Entity {
        self.entity
    }
}

impl Drop for InitScope<'_> {
    fn drop(&mut self) {
        self.entity.initializing = self.previous;
    }
}
