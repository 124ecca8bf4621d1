use super::service::{
    ChangeKind, ChangeSet, LoadRequest, ParentRequest, PersistenceService, RowData, SaveReceipt,
    SaveTimings,
};
use crate::core::{EntityError, FieldType, Result, Value};
use crate::metadata::EntityType;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// A demand-load request as the backend saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadCall {
    pub entity_type: String,
    pub key: Vec<Value>,
    pub ordinals: Vec<usize>,
}

/// A save as the backend applied it.
#[derive(Debug, Clone)]
pub struct SavedChange {
    pub changes: ChangeSet,
    pub outside_transaction: bool,
}

#[derive(Default)]
struct Faults {
    load: Option<String>,
    save: Option<String>,
    parent: Option<String>,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, HashMap<Vec<Value>, Vec<Value>>>,
    load_log: Vec<LoadCall>,
    parent_fetches: usize,
    saves: Vec<SavedChange>,
    faults: Faults,
}

/// Row store living in process memory.
///
/// Rows are filed per entity type under their key values. Every call is
/// logged so callers can observe round trips, and each operation family
/// supports one-shot fault injection.
#[derive(Default)]
pub struct InMemoryPersistence {
    state: Mutex<MemoryState>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a complete row, replacing any row with the same key.
    pub fn insert_row(&self, entity_type: &EntityType, values: Vec<Value>) -> Result<()> {
        if values.len() != entity_type.field_count() {
            return Err(EntityError::InvalidArgument(format!(
                "row for '{}' has {} values, expected {}",
                entity_type.name(),
                values.len(),
                entity_type.field_count()
            )));
        }
        let key = entity_type
            .key_ordinals()
            .iter()
            .map(|&ordinal| values[ordinal].clone())
            .collect();
        let mut state = self.state.lock()?;
        state
            .tables
            .entry(entity_type.name().to_string())
            .or_default()
            .insert(key, values);
        Ok(())
    }

    pub fn row(&self, type_name: &str, key: &[Value]) -> Result<Option<Vec<Value>>> {
        let state = self.state.lock()?;
        Ok(state
            .tables
            .get(type_name)
            .and_then(|table| table.get(key))
            .cloned())
    }

    pub fn row_count(&self, type_name: &str) -> Result<usize> {
        let state = self.state.lock()?;
        Ok(state.tables.get(type_name).map_or(0, HashMap::len))
    }

    pub fn load_calls(&self) -> Result<Vec<LoadCall>> {
        Ok(self.state.lock()?.load_log.clone())
    }

    pub fn clear_load_log(&self) -> Result<()> {
        self.state.lock()?.load_log.clear();
        Ok(())
    }

    pub fn parent_fetch_count(&self) -> Result<usize> {
        Ok(self.state.lock()?.parent_fetches)
    }

    pub fn saves(&self) -> Result<Vec<SavedChange>> {
        Ok(self.state.lock()?.saves.clone())
    }

    /// The next demand load fails with `message`.
    pub fn fail_next_load(&self, message: impl Into<String>) -> Result<()> {
        self.state.lock()?.faults.load = Some(message.into());
        Ok(())
    }

    pub fn fail_next_save(&self, message: impl Into<String>) -> Result<()> {
        self.state.lock()?.faults.save = Some(message.into());
        Ok(())
    }

    pub fn fail_next_parent_fetch(&self, message: impl Into<String>) -> Result<()> {
        self.state.lock()?.faults.parent = Some(message.into());
        Ok(())
    }

    fn apply(&self, changes: &ChangeSet, outside_transaction: bool) -> Result<SaveReceipt> {
        let mut state = self.state.lock()?;
        if let Some(message) = state.faults.save.take() {
            return Err(EntityError::Backend(message));
        }

        let entity_type = &changes.entity_type;
        let type_name = entity_type.name().to_string();
        let table = state.tables.entry(type_name.clone()).or_default();
        let mut receipt = SaveReceipt::default();

        match changes.kind {
            ChangeKind::Insert => {
                let mut row: Vec<Value> = entity_type
                    .fields()
                    .iter()
                    .map(|field| field.default_value())
                    .collect();
                for field in &changes.fields {
                    row[field.ordinal] = field.value.clone();
                }
                for (&ordinal, value) in entity_type.key_ordinals().iter().zip(&changes.key) {
                    row[ordinal] = value.clone();
                }

                if let Some((ordinal, id)) = next_identity(entity_type, table, &row) {
                    row[ordinal] = id.clone();
                    receipt.generated_keys.push((ordinal, id));
                }

                let key: Vec<Value> = entity_type
                    .key_ordinals()
                    .iter()
                    .map(|&ordinal| row[ordinal].clone())
                    .collect();
                if table.contains_key(&key) {
                    return Err(EntityError::Backend(format!(
                        "duplicate key {:?} for '{}'",
                        key, type_name
                    )));
                }
                table.insert(key, row);
            }
            ChangeKind::Update => {
                let stored_key = changes.stored_key();
                let mut row = table.remove(&stored_key).ok_or_else(|| {
                    EntityError::NotFound(format!("'{}' with key {:?}", type_name, stored_key))
                })?;
                for field in &changes.fields {
                    row[field.ordinal] = field.value.clone();
                }
                let key = entity_type
                    .key_ordinals()
                    .iter()
                    .map(|&ordinal| row[ordinal].clone())
                    .collect();
                table.insert(key, row);
            }
            ChangeKind::Delete => {
                let stored_key = changes.stored_key();
                if table.remove(&stored_key).is_none() {
                    return Err(EntityError::NotFound(format!(
                        "'{}' with key {:?}",
                        type_name, stored_key
                    )));
                }
            }
        }

        state.saves.push(SavedChange {
            changes: changes.clone(),
            outside_transaction,
        });
        Ok(receipt)
    }

    fn loadable_row(entity_type: &EntityType, row: &[Value]) -> RowData {
        RowData {
            fields: entity_type
                .fields()
                .iter()
                .filter(|field| !field.is_large)
                .map(|field| (field.ordinal, row[field.ordinal].clone()))
                .collect(),
        }
    }
}

/// A single integer key still at its default gets the next free id.
fn next_identity(
    entity_type: &EntityType,
    table: &HashMap<Vec<Value>, Vec<Value>>,
    row: &[Value],
) -> Option<(usize, Value)> {
    let [ordinal] = entity_type.key_ordinals() else {
        return None;
    };
    let field = entity_type.field(*ordinal).ok()?;
    if field.field_type != FieldType::Integer || row[*ordinal] != field.default_value() {
        return None;
    }
    let max = table
        .keys()
        .filter_map(|key| key.first().and_then(Value::as_i64))
        .max()
        .unwrap_or(0);
    Some((*ordinal, Value::Integer(max + 1)))
}

impl PersistenceService for InMemoryPersistence {
    fn demand_load(&self, request: &LoadRequest<'_>) -> Result<Vec<Value>> {
        let mut state = self.state.lock()?;
        state.load_log.push(LoadCall {
            entity_type: request.entity_type.name().to_string(),
            key: request.key.to_vec(),
            ordinals: request.ordinals.to_vec(),
        });
        if let Some(message) = state.faults.load.take() {
            return Err(EntityError::Backend(message));
        }

        let row = state
            .tables
            .get(request.entity_type.name())
            .and_then(|table| table.get(request.key))
            .ok_or_else(|| {
                EntityError::NotFound(format!(
                    "'{}' with key {:?}",
                    request.entity_type.name(),
                    request.key
                ))
            })?;

        request
            .ordinals
            .iter()
            .map(|&ordinal| {
                row.get(ordinal).cloned().ok_or_else(|| {
                    EntityError::Backend(format!("stored row has no ordinal {}", ordinal))
                })
            })
            .collect()
    }

    fn save_changes(
        &self,
        changes: &ChangeSet,
        timings: Option<&mut SaveTimings>,
    ) -> Result<SaveReceipt> {
        let started = Instant::now();
        let receipt = self.apply(changes, false)?;
        if let Some(timings) = timings {
            timings.record("memory.apply", started.elapsed());
        }
        Ok(receipt)
    }

    fn save_changes_outside_transaction(&self, changes: &ChangeSet) -> Result<SaveReceipt> {
        self.apply(changes, true)
    }

    fn get_parent(&self, request: &ParentRequest<'_>) -> Result<Option<RowData>> {
        let mut state = self.state.lock()?;
        state.parent_fetches += 1;
        if let Some(message) = state.faults.parent.take() {
            return Err(EntityError::Backend(message));
        }
        if request.link_values.iter().any(Value::is_null) {
            return Ok(None);
        }
        Ok(state
            .tables
            .get(request.parent_type.name())
            .and_then(|table| table.get(request.link_values))
            .map(|row| Self::loadable_row(request.parent_type, row)))
    }

    fn get_by_id(&self, entity_type: &EntityType, key: &[Value]) -> Result<Option<RowData>> {
        let state = self.state.lock()?;
        Ok(state
            .tables
            .get(entity_type.name())
            .and_then(|table| table.get(key))
            .map(|row| Self::loadable_row(entity_type, row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FieldDescriptor;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn item_type() -> Arc<EntityType> {
        Arc::new(
            EntityType::builder("Item")
                .field(FieldDescriptor::new("id", FieldType::Integer).key())
                .field(FieldDescriptor::new("name", FieldType::Text))
                .field(FieldDescriptor::new("blob", FieldType::Bytes).large().nullable())
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn demand_load_returns_requested_ordinals_and_logs() {
        let ty = item_type();
        let store = InMemoryPersistence::new();
        store
            .insert_row(&ty, vec![1.into(), "one".into(), Value::Null])
            .unwrap();

        let key = [Value::Integer(1)];
        let values = store
            .demand_load(&LoadRequest {
                entity_type: &ty,
                key: &key,
                ordinals: &[1, 2],
            })
            .unwrap();
        assert_eq!(values, vec![Value::from("one"), Value::Null]);
        assert_eq!(store.load_calls().unwrap()[0].ordinals, vec![1, 2]);
    }

    #[test]
    fn injected_fault_fires_once() {
        let ty = item_type();
        let store = InMemoryPersistence::new();
        store
            .insert_row(&ty, vec![1.into(), "one".into(), Value::Null])
            .unwrap();
        store.fail_next_load("disk on fire").unwrap();

        let key = [Value::Integer(1)];
        let request = LoadRequest {
            entity_type: &ty,
            key: &key,
            ordinals: &[1],
        };
        assert!(matches!(
            store.demand_load(&request),
            Err(EntityError::Backend(_))
        ));
        assert!(store.demand_load(&request).is_ok());
    }

    #[test]
    fn insert_assigns_identity_for_default_integer_key() {
        let ty = item_type();
        let store = InMemoryPersistence::new();
        let changes = ChangeSet {
            entity_type: ty.clone(),
            kind: ChangeKind::Insert,
            key: vec![Value::Integer(0)],
            fields: vec![],
            originals: BTreeMap::new(),
        };
        let receipt = store.save_changes(&changes, None).unwrap();
        assert_eq!(receipt.generated_keys, vec![(0, Value::Integer(1))]);
        let receipt = store.save_changes(&changes, None).unwrap();
        assert_eq!(receipt.generated_keys, vec![(0, Value::Integer(2))]);
        assert_eq!(store.row_count("Item").unwrap(), 2);
    }

    #[test]
    fn get_by_id_skips_large_fields() {
        let ty = item_type();
        let store = InMemoryPersistence::new();
        store
            .insert_row(&ty, vec![3.into(), "three".into(), vec![1u8, 2].into()])
            .unwrap();
        let row = store.get_by_id(&ty, &[Value::Integer(3)]).unwrap().unwrap();
        let ordinals: Vec<usize> = row.fields.iter().map(|(o, _)| *o).collect();
        assert_eq!(ordinals, vec![0, 1]);
    }
}
