use crate::core::{Result, Value};
use crate::metadata::{EntityType, FieldDescriptor, ParentLink};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// One demand-load round trip: fetch exactly `ordinals` of the row `key`.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub entity_type: &'a EntityType,
    pub key: &'a [Value],
    pub ordinals: &'a [usize],
}

impl LoadRequest<'_> {
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        let fields = self.entity_type.fields();
        self.ordinals.iter().filter_map(move |&ordinal| fields.get(ordinal))
    }
}

/// Resolve the parent referenced through `link` by the child's link values.
#[derive(Debug, Clone, Copy)]
pub struct ParentRequest<'a> {
    pub child_type: &'a EntityType,
    pub child_key: &'a [Value],
    pub link: &'a ParentLink,
    /// Current values of the child's link fields, in link order.
    pub link_values: &'a [Value],
    pub parent_type: &'a EntityType,
}

impl ParentRequest<'_> {
    /// Parent key field names matched positionally against `link_values`.
    pub fn parent_field_names(&self) -> Vec<&str> {
        self.parent_type
            .key_fields()
            .map(|field| field.name.as_str())
            .collect()
    }
}

/// Field values returned by the backend, addressed by ordinal.
///
/// Only the listed fields are loaded into the entity built from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowData {
    pub fields: Vec<(usize, Value)>,
}

impl RowData {
    pub fn new() -> Self {
        Self::default()
    }

    /// A row where every value's position is its ordinal.
    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            fields: values.into_iter().enumerate().collect(),
        }
    }

    pub fn with(mut self, ordinal: usize, value: impl Into<Value>) -> Self {
        self.fields.push((ordinal, value.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub ordinal: usize,
    pub name: String,
    pub value: Value,
}

/// Pending modifications of one entity handed to the backend on save.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub entity_type: Arc<EntityType>,
    pub kind: ChangeKind,
    /// Current key values.
    pub key: Vec<Value>,
    /// Modified fields in ordinal order.
    pub fields: Vec<FieldValue>,
    pub originals: BTreeMap<String, Value>,
}

impl ChangeSet {
    /// The key the stored row is filed under: the original value of a key
    /// field that was modified since the last save, the current one otherwise.
    pub fn stored_key(&self) -> Vec<Value> {
        self.entity_type
            .key_fields()
            .zip(&self.key)
            .map(|(field, current)| {
                self.originals
                    .get(&field.name)
                    .cloned()
                    .unwrap_or_else(|| current.clone())
            })
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }
}

/// Backend acknowledgement of a save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReceipt {
    /// Key values assigned by the backend on insert.
    pub generated_keys: Vec<(usize, Value)>,
}

/// Phase durations recorded while saving.
#[derive(Debug, Clone, Default)]
pub struct SaveTimings {
    phases: Vec<(String, Duration)>,
}

impl SaveTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, phase: impl Into<String>, elapsed: Duration) {
        self.phases.push((phase.into(), elapsed));
    }

    pub fn get(&self, phase: &str) -> Option<Duration> {
        self.phases
            .iter()
            .find(|(name, _)| name == phase)
            .map(|(_, elapsed)| *elapsed)
    }

    pub fn phases(&self) -> &[(String, Duration)] {
        &self.phases
    }
}

/// What `get_by_id` does when no row matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnNotFound {
    #[default]
    ReturnNone,
    Error,
}

/// The backend collaborator. The entity runtime never talks to storage in
/// any other way.
///
/// Every call is synchronous and all-or-nothing.
pub trait PersistenceService: Send + Sync {
    /// Values for exactly `request.ordinals`, in the same order.
    fn demand_load(&self, request: &LoadRequest<'_>) -> Result<Vec<Value>>;

    fn save_changes(
        &self,
        changes: &ChangeSet,
        timings: Option<&mut SaveTimings>,
    ) -> Result<SaveReceipt>;

    fn save_changes_outside_transaction(&self, changes: &ChangeSet) -> Result<SaveReceipt>;

    fn get_parent(&self, request: &ParentRequest<'_>) -> Result<Option<RowData>>;

    fn get_by_id(&self, entity_type: &EntityType, key: &[Value]) -> Result<Option<RowData>>;
}
