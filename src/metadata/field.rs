use crate::core::{EntityError, FieldType, Result, Value};
use serde::{Deserialize, Serialize};

/// Describes one field of an entity type.
///
/// The ordinal is assigned when the owning [`EntityType`](super::EntityType)
/// is built and stays stable for the lifetime of the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub ordinal: usize,
    /// Byte size; only consulted by demand-load batching.
    pub size: u32,
    pub is_key: bool,
    /// Large fields (blobs, long text) are always fetched on their own.
    pub is_large: bool,
    pub is_nullable: bool,
    pub default: Option<Value>,
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            ordinal: 0,
            size: field_type.default_size(),
            is_key: false,
            is_large: false,
            is_nullable: false,
            default: None,
            field_type,
        }
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }

    pub fn large(mut self) -> Self {
        self.is_large = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn default_value_of(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// The value a slot is seeded with when it is read before being loaded
    /// or assigned.
    pub fn default_value(&self) -> Value {
        match &self.default {
            Some(value) => value.clone(),
            None if self.is_nullable => Value::Null,
            None => self.field_type.default_value(),
        }
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.is_nullable {
                return Err(EntityError::ConstraintViolation(format!(
                    "Field '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        if !self.field_type.is_compatible(value) {
            return Err(EntityError::TypeMismatch(format!(
                "Field '{}' expects type {}, got {}",
                self.name,
                self.field_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}
