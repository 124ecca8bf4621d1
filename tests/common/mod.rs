//! Shared fixtures for the integration tests
#![allow(dead_code)]

use lazyrecord::{
    ChangeDecision, EntityContext, EntityObserver, EntityType, FieldChange, FieldDescriptor,
    FieldType, InMemoryPersistence, ParentLink, RuntimeConfig, SaveOutcome, SaveScope,
    TypeRegistry, Value,
};
use std::sync::{Arc, Mutex};

/// id key, four 100-byte text fields, then one 3900-byte text field.
pub fn wide_type() -> EntityType {
    EntityType::builder("Wide")
        .field(FieldDescriptor::new("id", FieldType::Integer).key())
        .field(FieldDescriptor::new("a", FieldType::Text).size(100))
        .field(FieldDescriptor::new("b", FieldType::Text).size(100))
        .field(FieldDescriptor::new("c", FieldType::Text).size(100))
        .field(FieldDescriptor::new("d", FieldType::Text).size(100))
        .field(FieldDescriptor::new("e", FieldType::Text).size(3900))
        .build()
        .unwrap()
}

pub fn doc_type() -> EntityType {
    EntityType::builder("Doc")
        .field(FieldDescriptor::new("id", FieldType::Integer).key())
        .field(FieldDescriptor::new("title", FieldType::Text))
        .field(FieldDescriptor::new("body", FieldType::Bytes).large().nullable())
        .field(FieldDescriptor::new("summary", FieldType::Text))
        .build()
        .unwrap()
}

pub fn customer_type() -> EntityType {
    EntityType::builder("Customer")
        .field(FieldDescriptor::new("id", FieldType::Integer).key())
        .field(FieldDescriptor::new("name", FieldType::Text))
        .field(FieldDescriptor::new("nickname", FieldType::Text).nullable())
        .build()
        .unwrap()
}

pub fn order_type() -> EntityType {
    EntityType::builder("Order")
        .field(FieldDescriptor::new("id", FieldType::Integer).key())
        .field(FieldDescriptor::new("customer_id", FieldType::Integer).nullable())
        .field(FieldDescriptor::new("total", FieldType::Float))
        .parent_link(ParentLink::new("customer", "Customer", ["customer_id"]))
        .build()
        .unwrap()
}

/// Owner link over a non-nullable field.
pub fn account_type() -> EntityType {
    EntityType::builder("Account")
        .field(FieldDescriptor::new("id", FieldType::Integer).key())
        .field(FieldDescriptor::new("owner_id", FieldType::Integer))
        .parent_link(ParentLink::new("owner", "Customer", ["owner_id"]))
        .build()
        .unwrap()
}

/// Two-part key.
pub fn region_type() -> EntityType {
    EntityType::builder("Region")
        .field(FieldDescriptor::new("country", FieldType::Text).key())
        .field(FieldDescriptor::new("code", FieldType::Text).key())
        .build()
        .unwrap()
}

/// Links to `Region` through a single field, which cannot match its key.
pub fn office_type() -> EntityType {
    EntityType::builder("Office")
        .field(FieldDescriptor::new("id", FieldType::Integer).key())
        .field(FieldDescriptor::new("region_code", FieldType::Text).nullable())
        .parent_link(ParentLink::new("region", "Region", ["region_code"]))
        .build()
        .unwrap()
}

pub fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .with_type(wide_type())
        .unwrap()
        .with_type(doc_type())
        .unwrap()
        .with_type(customer_type())
        .unwrap()
        .with_type(order_type())
        .unwrap()
        .with_type(account_type())
        .unwrap()
        .with_type(region_type())
        .unwrap()
        .with_type(office_type())
        .unwrap()
}

pub fn setup() -> (Arc<EntityContext>, Arc<InMemoryPersistence>) {
    setup_with_config(RuntimeConfig::default())
}

pub fn setup_with_config(config: RuntimeConfig) -> (Arc<EntityContext>, Arc<InMemoryPersistence>) {
    let store = Arc::new(InMemoryPersistence::new());
    let context = EntityContext::new(registry(), store.clone())
        .with_config(config)
        .shared();
    (context, store)
}

pub fn seed(context: &EntityContext, store: &InMemoryPersistence, type_name: &str, row: Vec<Value>) {
    let entity_type = context.registry().get(type_name).unwrap();
    store.insert_row(&entity_type, row).unwrap();
}

pub fn seed_wide(context: &EntityContext, store: &InMemoryPersistence, id: i64) {
    seed(
        context,
        store,
        "Wide",
        vec![
            Value::Integer(id),
            "a".into(),
            "b".into(),
            "c".into(),
            "d".into(),
            "e".into(),
        ],
    );
}

pub fn seed_customer(context: &EntityContext, store: &InMemoryPersistence, id: i64, name: &str) {
    seed(
        context,
        store,
        "Customer",
        vec![Value::Integer(id), name.into(), Value::Null],
    );
}

/// Records every notification as a readable line.
#[derive(Default)]
pub struct Recorder {
    label: String,
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new(label: &str) -> Self {
        Self::sharing(label, Arc::new(Mutex::new(Vec::new())))
    }

    pub fn sharing(label: &str, events: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label: label.to_string(),
            events,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        let line = if self.label.is_empty() {
            event
        } else {
            format!("{}:{}", self.label, event)
        };
        self.events.lock().unwrap().push(line);
    }
}

impl EntityObserver for Recorder {
    fn before_field_change(&self, change: &FieldChange<'_>) -> ChangeDecision {
        self.push(format!("before {}={}", change.field.name, change.proposed));
        ChangeDecision::Proceed
    }

    fn after_field_change(&self, change: &FieldChange<'_>) {
        self.push(format!(
            "after {} {}->{}",
            change.field.name, change.existing, change.proposed
        ));
    }

    fn after_load(&self, _entity_type: &EntityType, ordinals: &[usize]) {
        self.push(format!("loaded {:?}", ordinals));
    }

    fn saving(&self, entity_type: &EntityType) {
        self.push(format!("saving {}", entity_type.name()));
    }

    fn before_save_changes(&self, _entity_type: &EntityType, scope: SaveScope) {
        self.push(format!("before save {:?}", scope));
    }

    fn after_save_changes(&self, _entity_type: &EntityType, scope: SaveScope, outcome: &SaveOutcome) {
        self.push(format!("after save {:?} {:?}", scope, outcome));
    }
}

/// Cancels every write to the named field.
pub struct Veto(pub &'static str);

impl EntityObserver for Veto {
    fn before_field_change(&self, change: &FieldChange<'_>) -> ChangeDecision {
        if change.field.name == self.0 {
            ChangeDecision::Cancel
        } else {
            ChangeDecision::Proceed
        }
    }
}
