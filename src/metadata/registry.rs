use super::EntityType;
use crate::core::{EntityError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps entity type names to their field tables.
///
/// Built once at startup and then shared read-only through the
/// [`EntityContext`](crate::EntityContext).
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<EntityType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity_type: EntityType) -> Result<Arc<EntityType>> {
        let name = entity_type.name().to_string();
        if self.types.contains_key(&name) {
            return Err(EntityError::InvalidArgument(format!(
                "entity type '{}' is already registered",
                name
            )));
        }
        let entity_type = Arc::new(entity_type);
        self.types.insert(name, entity_type.clone());
        Ok(entity_type)
    }

    /// Chaining form of [`register`](Self::register) for startup code.
    pub fn with_type(mut self, entity_type: EntityType) -> Result<Self> {
        self.register(entity_type)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<Arc<EntityType>> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| EntityError::UnknownEntityType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
