use super::FieldDescriptor;
use crate::core::{EntityError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A link from a child entity type to the type it references.
///
/// `fields` are the child's local fields, matched positionally against the
/// parent's key fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    pub name: String,
    pub parent_type: String,
    pub fields: Vec<String>,
}

impl ParentLink {
    pub fn new<I, S>(name: impl Into<String>, parent_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parent_type: parent_type.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// The field table of one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    name: String,
    fields: Vec<FieldDescriptor>,
    key_ordinals: Vec<usize>,
    links: Vec<ParentLink>,
    by_name: HashMap<String, usize>,
}

impl EntityType {
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder {
            name: name.into(),
            fields: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, ordinal: usize) -> Result<&FieldDescriptor> {
        self.fields
            .get(ordinal)
            .ok_or_else(|| EntityError::OrdinalOutOfRange {
                entity: self.name.clone(),
                ordinal,
                count: self.fields.len(),
            })
    }

    pub fn find_field_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn field_by_name(&self, name: &str) -> Result<&FieldDescriptor> {
        self.find_field_index(name)
            .map(|idx| &self.fields[idx])
            .ok_or_else(|| EntityError::FieldNotFound(name.to_string(), self.name.clone()))
    }

    /// Key field ordinals in declaration order.
    pub fn key_ordinals(&self) -> &[usize] {
        &self.key_ordinals
    }

    pub fn key_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.key_ordinals.iter().map(|&idx| &self.fields[idx])
    }

    pub fn links(&self) -> &[ParentLink] {
        &self.links
    }

    pub fn link(&self, name: &str) -> Result<&ParentLink> {
        self.links
            .iter()
            .find(|link| link.name == name)
            .ok_or_else(|| EntityError::LinkNotFound(name.to_string(), self.name.clone()))
    }
}

pub struct EntityTypeBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
    links: Vec<ParentLink>,
}

impl EntityTypeBuilder {
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn parent_link(mut self, link: ParentLink) -> Self {
        self.links.push(link);
        self
    }

    /// Assigns ordinals in declaration order and validates names and links.
    pub fn build(self) -> Result<EntityType> {
        if self.name.trim().is_empty() {
            return Err(EntityError::InvalidArgument(
                "entity type name must not be empty".to_string(),
            ));
        }

        let mut fields = self.fields;
        let mut by_name = HashMap::with_capacity(fields.len());
        for (ordinal, field) in fields.iter_mut().enumerate() {
            if field.name.trim().is_empty() {
                return Err(EntityError::InvalidArgument(format!(
                    "field #{} of '{}' has an empty name",
                    ordinal, self.name
                )));
            }
            field.ordinal = ordinal;
            if by_name.insert(field.name.clone(), ordinal).is_some() {
                return Err(EntityError::InvalidArgument(format!(
                    "duplicate field '{}' on '{}'",
                    field.name, self.name
                )));
            }
        }

        let key_ordinals = fields
            .iter()
            .filter(|field| field.is_key)
            .map(|field| field.ordinal)
            .collect();

        let mut link_names = HashSet::new();
        for link in &self.links {
            if !link_names.insert(link.name.as_str()) {
                return Err(EntityError::InvalidArgument(format!(
                    "duplicate parent link '{}' on '{}'",
                    link.name, self.name
                )));
            }
            if link.fields.is_empty() {
                return Err(EntityError::InvalidArgument(format!(
                    "parent link '{}' on '{}' declares no fields",
                    link.name, self.name
                )));
            }
            if let Some(missing) = link.fields.iter().find(|f| !by_name.contains_key(*f)) {
                return Err(EntityError::FieldNotFound(missing.clone(), self.name.clone()));
            }
        }

        Ok(EntityType {
            name: self.name,
            fields,
            key_ordinals,
            links: self.links,
            by_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldType;

    fn order_type() -> EntityType {
        EntityType::builder("Order")
            .field(FieldDescriptor::new("id", FieldType::Integer).key())
            .field(FieldDescriptor::new("customer_id", FieldType::Integer).nullable())
            .field(FieldDescriptor::new("notes", FieldType::Text).large().nullable())
            .parent_link(ParentLink::new("customer", "Customer", ["customer_id"]))
            .build()
            .unwrap()
    }

    #[test]
    fn build_assigns_ordinals_and_keys() {
        let ty = order_type();
        assert_eq!(ty.field_count(), 3);
        assert_eq!(ty.field_by_name("notes").unwrap().ordinal, 2);
        assert_eq!(ty.key_ordinals(), &[0]);
        assert_eq!(ty.link("customer").unwrap().parent_type, "Customer");
    }

    #[test]
    fn lookups_report_unknown_names() {
        let ty = order_type();
        assert!(matches!(ty.field(9), Err(EntityError::OrdinalOutOfRange { .. })));
        assert!(matches!(ty.field_by_name("nope"), Err(EntityError::FieldNotFound(..))));
        assert!(matches!(ty.link("nope"), Err(EntityError::LinkNotFound(..))));
    }

    #[test]
    fn build_rejects_duplicates_and_dangling_links() {
        let dup = EntityType::builder("T")
            .field(FieldDescriptor::new("a", FieldType::Integer))
            .field(FieldDescriptor::new("a", FieldType::Text))
            .build();
        assert!(matches!(dup, Err(EntityError::InvalidArgument(_))));

        let dangling = EntityType::builder("T")
            .field(FieldDescriptor::new("a", FieldType::Integer))
            .parent_link(ParentLink::new("p", "P", ["missing"]))
            .build();
        assert!(matches!(dangling, Err(EntityError::FieldNotFound(..))));
    }
}
