//! New/persisted derivation, deletion, read-only and identity

mod common;

use common::{seed_customer, setup};
use lazyrecord::{EntityError, EntityFlags, LifecycleState, SetOutcome, Value, WriteReason};
use std::collections::HashSet;

#[test]
fn test_created_entity_is_new() {
    let (context, _store) = setup();
    let customer = context.create("Customer").unwrap();
    assert!(customer.is_new());
    assert!(customer.is_new_marker());
    assert_eq!(customer.state(), LifecycleState::New);
}

#[test]
fn test_attached_entity_is_persisted() {
    let (context, _store) = setup();
    let customer = context.attach("Customer", vec![Value::Integer(3)]).unwrap();
    assert!(!customer.is_new());
    assert_eq!(customer.state(), LifecycleState::Loaded);
    assert_eq!(customer.key_values(), vec![Value::Integer(3)]);
}

#[test]
fn test_default_key_keeps_entity_new() {
    let (context, _store) = setup();

    // The marker is off but the key still holds its default
    let mut customer = context.attach("Customer", vec![Value::Integer(0)]).unwrap();
    assert!(!customer.is_new_marker());
    assert!(customer.is_new());

    customer.set("id", 12).unwrap();
    customer.reset_modified_flags();
    assert!(!customer.is_new());

    customer.set("id", 0).unwrap();
    assert!(customer.is_new());
}

#[test]
fn test_attach_checks_key_arity() {
    let (context, _store) = setup();
    let err = context.attach("Region", vec!["SE".into()]).unwrap_err();
    assert!(matches!(err, EntityError::InvalidArgument(_)));
}

#[test]
fn test_deletion_marks_round_trip() {
    let (context, _store) = setup();
    let mut customer = context.attach("Customer", vec![Value::Integer(3)]).unwrap();

    customer.mark_for_deletion().unwrap();
    assert!(customer.is_delete_pending());
    assert!(customer.is_deleted(true));
    assert!(!customer.is_deleted(false));
    assert_eq!(customer.state(), LifecycleState::DeletePending);

    customer.unmark_for_deletion().unwrap();
    assert!(!customer.is_delete_pending());
    assert_eq!(customer.state(), LifecycleState::Loaded);
}

#[test]
fn test_deleted_is_terminal() {
    let (context, _store) = setup();
    let mut customer = context.attach("Customer", vec![Value::Integer(3)]).unwrap();
    customer.mark_for_deletion().unwrap();
    customer.mark_as_deleted();

    assert_eq!(customer.flags(), EntityFlags::DELETED);
    assert!(customer.is_deleted(false));
    assert!(!customer.is_delete_pending());
    assert!(matches!(
        customer.mark_for_deletion(),
        Err(EntityError::InvalidState(_))
    ));
    assert!(matches!(
        customer.unmark_for_deletion(),
        Err(EntityError::InvalidState(_))
    ));
    assert!(matches!(
        customer.set_read_only(true),
        Err(EntityError::InvalidState(_))
    ));
}

#[test]
fn test_read_only_rejects_user_writes() {
    let (context, store) = setup();
    seed_customer(&context, &store, 3, "Ada");
    let mut customer = context.attach("Customer", vec![Value::Integer(3)]).unwrap();
    customer.set_read_only(true).unwrap();
    assert!(customer.is_read_only());

    let err = customer.set("name", "Grace").unwrap_err();
    assert!(matches!(err, EntityError::ReadOnly(_)));
    assert!(!customer.is_modified_any());

    // Reads still work and runtime writes go through
    assert_eq!(customer.get("name").unwrap(), Value::from("Ada"));
    assert_eq!(
        customer
            .set_with_reason("name", "Grace", WriteReason::Internal)
            .unwrap(),
        SetOutcome::Changed
    );

    customer.set_read_only(false).unwrap();
    assert!(customer.set("name", "Hedy").is_ok());
}

#[test]
fn test_identity_is_type_plus_key() {
    let (context, _store) = setup();
    let one = context.attach("Customer", vec![Value::Integer(1)]).unwrap();
    let also_one = context.attach("Customer", vec![Value::Integer(1)]).unwrap();
    let two = context.attach("Customer", vec![Value::Integer(2)]).unwrap();
    let order_one = context.attach("Order", vec![Value::Integer(1)]).unwrap();

    assert_eq!(one, also_one);
    assert_ne!(one, two);
    assert_ne!(one, order_one);

    let mut set = HashSet::new();
    set.insert(one);
    assert!(set.contains(&also_one));
    assert!(!set.contains(&two));
}

#[test]
fn test_two_fresh_entities_compare_equal() {
    let (context, _store) = setup();
    let first = context.create("Customer").unwrap();
    let second = context.create("Customer").unwrap();
    assert_eq!(first, second);
}
