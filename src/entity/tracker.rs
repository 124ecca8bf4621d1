use super::events::{ChangeDecision, FieldChange};
use super::instance::{Entity, FieldKey, SetOutcome};
use crate::core::{Result, Value};
use crate::metadata::FieldDescriptor;
use tracing::{Level, event};

/// One modified field: the value before its first modification and now.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDelta {
    pub name: String,
    pub original: Value,
    pub current: Value,
}

impl Entity {
    /// Stores `value` as a tracked modification of `ordinal`.
    ///
    /// The current effective value is read first (this can demand-load) and
    /// becomes the original on the first modification since the last reset.
    /// On a new entity every write counts as a change. A cancelled write
    /// still leaves the slot seeded with its default and loaded.
    pub(crate) fn track_change(&mut self, ordinal: usize, value: Value) -> Result<SetOutcome> {
        self.ensure_loaded(ordinal)?;
        let existing = self.slots.value(ordinal)?.clone();

        if !self.is_new() && existing == value {
            return Ok(SetOutcome::Unchanged);
        }

        let entity_type = self.entity_type.clone();
        let field = entity_type.field(ordinal)?;

        let pending = FieldChange {
            entity_type: &entity_type,
            field,
            existing: &existing,
            proposed: &value,
        };
        let cancelled = self
            .observers
            .iter()
            .any(|observer| observer.before_field_change(&pending) == ChangeDecision::Cancel);
        if cancelled {
            event!(
                Level::DEBUG,
                entity = %entity_type.name(),
                field = %field.name,
                "field change cancelled by observer"
            );
            return Ok(SetOutcome::Cancelled);
        }

        if !self.originals.contains_key(&field.name) {
            self.originals.insert(field.name.clone(), existing.clone());
        }
        self.slots.store_modified(ordinal, value.clone())?;

        let applied = FieldChange {
            entity_type: &entity_type,
            field,
            existing: &existing,
            proposed: &value,
        };
        for observer in &self.observers {
            observer.after_field_change(&applied);
        }
        Ok(SetOutcome::Changed)
    }

    pub fn is_modified(&self, field: impl FieldKey) -> Result<bool> {
        let ordinal = field.ordinal_in(&self.entity_type)?;
        self.slots.is_modified(ordinal)
    }

    pub fn is_modified_any(&self) -> bool {
        self.slots.is_modified_any()
    }

    /// The value the field held before its first modification since the
    /// last reset, or `None` if it has not been modified.
    ///
    /// `Some(Value::Null)` means the original was legitimately null.
    pub fn original_value(&self, field: impl FieldKey) -> Result<Option<Value>> {
        let ordinal = field.ordinal_in(&self.entity_type)?;
        let name = &self.entity_type.field(ordinal)?.name;
        Ok(self.originals.get(name).cloned())
    }

    pub fn modified_fields(&self) -> Vec<&FieldDescriptor> {
        let fields = self.entity_type.fields();
        self.slots
            .modified_ordinals()
            .into_iter()
            .map(|ordinal| &fields[ordinal])
            .collect()
    }

    pub fn changes(&self) -> Vec<FieldDelta> {
        self.modified_fields()
            .into_iter()
            .map(|field| FieldDelta {
                name: field.name.clone(),
                original: self
                    .originals
                    .get(&field.name)
                    .cloned()
                    .unwrap_or(Value::Null),
                current: self.slots.values()[field.ordinal].clone(),
            })
            .collect()
    }

    /// Re-baselines the entity: clears every `MODIFIED` flag and all
    /// recorded originals. Loaded flags and values stay.
    ///
    /// Meant for the save pipeline and trusted callers that have persisted
    /// the changes some other way. Anything else loses the pending changes
    /// and the stored key of a modified key field.
    pub fn reset_modified_flags(&mut self) {
        self.slots.clear_modified_flags();
        self.originals.clear();
    }
}
