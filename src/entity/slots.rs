use super::flags::SlotFlags;
use crate::core::{EntityError, Result, Value};

/// Fixed-size value storage with a parallel flag array, indexed by ordinal.
///
/// Unloaded slots hold `Value::Null` as a placeholder; callers must consult
/// the `LOADED` flag before trusting a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotStore {
    entity: String,
    values: Vec<Value>,
    flags: Vec<SlotFlags>,
}

impl SlotStore {
    pub fn new(entity: impl Into<String>, field_count: usize) -> Self {
        Self {
            entity: entity.into(),
            values: vec![Value::Null; field_count],
            flags: vec![SlotFlags::empty(); field_count],
        }
    }

    /// Rebuilds a store from raw parts, rejecting mismatched lengths.
    pub fn from_parts(
        entity: impl Into<String>,
        values: Vec<Value>,
        flags: Vec<SlotFlags>,
    ) -> Result<Self> {
        let entity = entity.into();
        if values.len() != flags.len() {
            return Err(EntityError::InvalidArgument(format!(
                "slot count {} does not match flag count {} for '{}'",
                values.len(),
                flags.len(),
                entity
            )));
        }
        Ok(Self {
            entity,
            values,
            flags,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn check(&self, ordinal: usize) -> Result<()> {
        if ordinal >= self.values.len() {
            return Err(EntityError::OrdinalOutOfRange {
                entity: self.entity.clone(),
                ordinal,
                count: self.values.len(),
            });
        }
        Ok(())
    }

    pub fn flags(&self, ordinal: usize) -> Result<SlotFlags> {
        self.check(ordinal)?;
        Ok(self.flags[ordinal])
    }

    pub fn is_loaded(&self, ordinal: usize) -> Result<bool> {
        Ok(self.flags(ordinal)?.is_loaded())
    }

    pub fn is_modified(&self, ordinal: usize) -> Result<bool> {
        Ok(self.flags(ordinal)?.is_modified())
    }

    pub fn is_modified_any(&self) -> bool {
        self.flags.iter().any(|flags| flags.is_modified())
    }

    /// Raw slot contents regardless of the `LOADED` flag.
    pub fn value(&self, ordinal: usize) -> Result<&Value> {
        self.check(ordinal)?;
        Ok(&self.values[ordinal])
    }

    /// The slot value if loaded.
    pub fn loaded_value(&self, ordinal: usize) -> Result<Option<&Value>> {
        self.check(ordinal)?;
        Ok(self.flags[ordinal]
            .is_loaded()
            .then(|| &self.values[ordinal]))
    }

    /// Stores a value and marks it loaded, leaving `MODIFIED` as it was.
    pub fn store_loaded(&mut self, ordinal: usize, value: Value) -> Result<()> {
        self.check(ordinal)?;
        self.values[ordinal] = value;
        self.flags[ordinal].insert(SlotFlags::LOADED);
        Ok(())
    }

    /// Stores a value and marks it loaded and modified.
    pub fn store_modified(&mut self, ordinal: usize, value: Value) -> Result<()> {
        self.check(ordinal)?;
        self.values[ordinal] = value;
        self.flags[ordinal].insert(SlotFlags::LOADED | SlotFlags::MODIFIED);
        Ok(())
    }

    pub fn clear_modified_flags(&mut self) {
        for flags in &mut self.flags {
            flags.remove(SlotFlags::MODIFIED);
        }
    }

    pub fn modified_ordinals(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, flags)| flags.is_modified())
            .map(|(ordinal, _)| ordinal)
            .collect()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn all_flags(&self) -> &[SlotFlags] {
        &self.flags
    }
}
