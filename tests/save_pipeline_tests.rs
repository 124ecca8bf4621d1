//! Saving through the persistence collaborator

mod common;

use common::{Recorder, registry, seed_customer, setup};
use lazyrecord::{
    ChangeKind, ChangeSet, EntityContext, EntityError, EntityType, InMemoryPersistence,
    LoadRequest, ParentRequest, PersistenceService, Result, RowData, SaveOutcome, SaveReceipt,
    SaveTimings, Value,
};
use std::sync::Arc;

/// Memory backend whose receipts also claim to have generated `name`.
struct NonKeyReceipt(Arc<InMemoryPersistence>);

impl PersistenceService for NonKeyReceipt {
    fn demand_load(&self, request: &LoadRequest<'_>) -> Result<Vec<Value>> {
        self.0.demand_load(request)
    }

    fn save_changes(
        &self,
        changes: &ChangeSet,
        timings: Option<&mut SaveTimings>,
    ) -> Result<SaveReceipt> {
        let mut receipt = self.0.save_changes(changes, timings)?;
        receipt.generated_keys.push((1, Value::from("generated")));
        Ok(receipt)
    }

    fn save_changes_outside_transaction(&self, changes: &ChangeSet) -> Result<SaveReceipt> {
        self.0.save_changes_outside_transaction(changes)
    }

    fn get_parent(&self, request: &ParentRequest<'_>) -> Result<Option<RowData>> {
        self.0.get_parent(request)
    }

    fn get_by_id(&self, entity_type: &EntityType, key: &[Value]) -> Result<Option<RowData>> {
        self.0.get_by_id(entity_type, key)
    }
}

#[test]
fn test_insert_applies_generated_key() {
    let (context, store) = setup();
    let mut customer = context.create("Customer").unwrap();
    customer.set("name", "Ada").unwrap();
    assert!(customer.has_pending_changes());
    assert_eq!(customer.change_set().unwrap().kind, ChangeKind::Insert);

    assert_eq!(customer.save_changes(None).unwrap(), SaveOutcome::Inserted);
    assert_eq!(customer.get("id").unwrap(), Value::Integer(1));
    assert!(!customer.is_new());
    assert!(!customer.is_modified_any());
    assert!(!customer.has_pending_changes());

    let row = store.row("Customer", &[Value::Integer(1)]).unwrap().unwrap();
    assert_eq!(row[1], Value::from("Ada"));
}

#[test]
fn test_update_sends_only_modified_fields() {
    let (context, store) = setup();
    seed_customer(&context, &store, 5, "Ada");

    let mut customer = context.attach("Customer", vec![Value::Integer(5)]).unwrap();
    customer.set("name", "Grace").unwrap();
    assert_eq!(customer.save_changes(None).unwrap(), SaveOutcome::Updated);

    let saves = store.saves().unwrap();
    assert_eq!(saves.len(), 1);
    let changes = &saves[0].changes;
    assert_eq!(changes.kind, ChangeKind::Update);
    assert_eq!(changes.fields.len(), 1);
    assert_eq!(changes.field("name"), Some(&Value::from("Grace")));
    assert_eq!(changes.originals.get("name"), Some(&Value::from("Ada")));
    assert!(!saves[0].outside_transaction);

    assert_eq!(customer.original_value("name").unwrap(), None);
    let row = store.row("Customer", &[Value::Integer(5)]).unwrap().unwrap();
    assert_eq!(row[1], Value::from("Grace"));
}

#[test]
fn test_key_change_moves_stored_row() {
    let (context, store) = setup();
    seed_customer(&context, &store, 5, "Ada");

    let mut customer = context.attach("Customer", vec![Value::Integer(5)]).unwrap();
    customer.set("id", 6).unwrap();
    assert_eq!(
        customer.change_set().unwrap().stored_key(),
        vec![Value::Integer(5)]
    );
    customer.save_changes(None).unwrap();

    assert!(store.row("Customer", &[Value::Integer(5)]).unwrap().is_none());
    assert!(store.row("Customer", &[Value::Integer(6)]).unwrap().is_some());
}

#[test]
fn test_unmodified_entity_has_nothing_to_save() {
    let (context, store) = setup();
    seed_customer(&context, &store, 5, "Ada");

    let mut customer = context.attach("Customer", vec![Value::Integer(5)]).unwrap();
    assert!(customer.change_set().is_none());
    assert_eq!(customer.save_changes(None).unwrap(), SaveOutcome::NothingToSave);
    assert!(store.saves().unwrap().is_empty());
}

#[test]
fn test_delete_removes_row_and_ends_lifecycle() {
    let (context, store) = setup();
    seed_customer(&context, &store, 5, "Ada");

    let mut customer = context.attach("Customer", vec![Value::Integer(5)]).unwrap();
    customer.mark_for_deletion().unwrap();
    assert_eq!(customer.change_set().unwrap().kind, ChangeKind::Delete);
    assert_eq!(customer.save_changes(None).unwrap(), SaveOutcome::Deleted);

    assert!(customer.is_deleted(false));
    assert_eq!(store.row_count("Customer").unwrap(), 0);
    assert_eq!(customer.save_changes(None).unwrap(), SaveOutcome::NothingToSave);
}

#[test]
fn test_deleting_new_entity_is_discarded() {
    let (context, store) = setup();
    let mut customer = context.create("Customer").unwrap();
    customer.set("name", "Ada").unwrap();
    customer.mark_for_deletion().unwrap();

    assert_eq!(customer.save_changes(None).unwrap(), SaveOutcome::Discarded);
    assert!(customer.is_deleted(false));
    assert!(store.saves().unwrap().is_empty());
}

#[test]
fn test_failed_save_keeps_pending_changes() {
    let (context, store) = setup();
    seed_customer(&context, &store, 5, "Ada");
    store.fail_next_save("deadlock victim").unwrap();

    let mut customer = context.attach("Customer", vec![Value::Integer(5)]).unwrap();
    customer.set("name", "Grace").unwrap();
    let err = customer.save_changes(None).unwrap_err();
    assert!(matches!(err, EntityError::Backend(_)));

    assert!(customer.is_modified("name").unwrap());
    assert_eq!(
        customer.original_value("name").unwrap(),
        Some(Value::from("Ada"))
    );

    assert_eq!(customer.save_changes(None).unwrap(), SaveOutcome::Updated);
    assert!(!customer.is_modified_any());
}

#[test]
fn test_duplicate_insert_is_rejected_by_backend() {
    let (context, store) = setup();
    seed_customer(&context, &store, 5, "Ada");

    let mut customer = context.create("Customer").unwrap();
    customer.set("id", 5).unwrap();
    let err = customer.save_changes(None).unwrap_err();
    assert!(err.is_backend());
    assert!(customer.is_new());
}

#[test]
fn test_timings_are_recorded() {
    let (context, _store) = setup();
    let mut customer = context.create("Customer").unwrap();
    customer.set("name", "Ada").unwrap();

    let mut timings = SaveTimings::new();
    customer.save_changes(Some(&mut timings)).unwrap();
    assert!(timings.get("memory.apply").is_some());
    assert!(timings.get("backend").is_some());
    assert!(timings.get("total").is_some());
    assert!(timings.get("backend").unwrap() <= timings.get("total").unwrap());
}

#[test]
fn test_outside_transaction_path() {
    let (context, store) = setup();
    let recorder = Arc::new(Recorder::new(""));
    let mut customer = context.create("Customer").unwrap();
    customer.add_observer(recorder.clone());
    customer.initializing().set("name", "Ada").unwrap();

    assert_eq!(
        customer.save_changes_outside_transaction().unwrap(),
        SaveOutcome::Inserted
    );
    assert!(store.saves().unwrap()[0].outside_transaction);
    assert_eq!(
        recorder.events(),
        vec![
            "saving Customer".to_string(),
            "before save OutsideTransaction".to_string(),
            "after save OutsideTransaction Inserted".to_string(),
        ]
    );
}

#[test]
fn test_failed_save_skips_after_save_notification() {
    let (context, store) = setup();
    store.fail_next_save("offline").unwrap();
    let recorder = Arc::new(Recorder::new(""));
    let mut customer = context.create("Customer").unwrap();
    customer.add_observer(recorder.clone());

    assert!(customer.save_changes(None).is_err());
    assert_eq!(
        recorder.events(),
        vec![
            "saving Customer".to_string(),
            "before save InTransaction".to_string(),
        ]
    );
}

#[test]
fn test_non_key_generated_value_applies_nothing() {
    let store = Arc::new(InMemoryPersistence::new());
    let context = EntityContext::new(registry(), Arc::new(NonKeyReceipt(store.clone()))).shared();

    let mut customer = context.create("Customer").unwrap();
    customer.set("name", "Ada").unwrap();

    let err = customer.save_changes(None).unwrap_err();
    assert!(matches!(err, EntityError::Backend(_)));

    // The generated id was valid but is not applied either
    assert_eq!(customer.peek("id").unwrap(), None);
    assert_eq!(customer.get("name").unwrap(), Value::from("Ada"));
    assert!(customer.is_new());
    assert!(customer.is_modified("name").unwrap());
}
