// Entity metadata: field descriptors, entity types and the startup registry.

pub mod entity_type;
pub mod field;
pub mod registry;

pub use entity_type::{EntityType, EntityTypeBuilder, ParentLink};
pub use field::FieldDescriptor;
pub use registry::TypeRegistry;
