use super::save::SaveOutcome;
use crate::core::Value;
use crate::metadata::{EntityType, FieldDescriptor};
use std::sync::Arc;

/// Answer of a before-field-change observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeDecision {
    #[default]
    Proceed,
    Cancel,
}

/// A field write about to happen, or one that just happened.
#[derive(Debug, Clone, Copy)]
pub struct FieldChange<'a> {
    pub entity_type: &'a EntityType,
    pub field: &'a FieldDescriptor,
    pub existing: &'a Value,
    pub proposed: &'a Value,
}

/// Which collaborator path a save goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveScope {
    InTransaction,
    OutsideTransaction,
}

/// Receives entity notifications. Every hook has a no-op default.
///
/// Observers run synchronously on the thread that mutates the entity.
pub trait EntityObserver: Send + Sync {
    /// Returning [`ChangeDecision::Cancel`] abandons the write with no state
    /// change.
    fn before_field_change(&self, _change: &FieldChange<'_>) -> ChangeDecision {
        ChangeDecision::Proceed
    }

    fn after_field_change(&self, _change: &FieldChange<'_>) {}

    /// Fired after a demand load stored `ordinals`.
    fn after_load(&self, _entity_type: &EntityType, _ordinals: &[usize]) {}

    fn saving(&self, _entity_type: &EntityType) {}

    fn before_save_changes(&self, _entity_type: &EntityType, _scope: SaveScope) {}

    fn after_save_changes(
        &self,
        _entity_type: &EntityType,
        _scope: SaveScope,
        _outcome: &SaveOutcome,
    ) {
    }
}

pub type ObserverRef = Arc<dyn EntityObserver>;
