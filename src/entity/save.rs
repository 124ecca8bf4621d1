use super::events::SaveScope;
use super::instance::Entity;
use crate::core::{EntityError, Result};
use crate::persistence::{ChangeKind, ChangeSet, FieldValue, SaveTimings};
use std::time::Instant;
use tracing::{Level, event, info_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Updated,
    Deleted,
    /// A never-persisted entity marked for deletion; nothing reached the
    /// backend.
    Discarded,
    NothingToSave,
}

impl Entity {
    /// Whether a save would reach the backend.
    pub fn has_pending_changes(&self) -> bool {
        if self.is_deleted(false) {
            return false;
        }
        self.is_new() || self.is_modified_any() || self.is_delete_pending()
    }

    /// The changes a save would send, or `None` when there are none.
    pub fn change_set(&self) -> Option<ChangeSet> {
        if !self.has_pending_changes() {
            return None;
        }
        let kind = if self.is_delete_pending() {
            ChangeKind::Delete
        } else if self.is_new() {
            ChangeKind::Insert
        } else {
            ChangeKind::Update
        };
        let fields = self
            .modified_fields()
            .into_iter()
            .map(|field| FieldValue {
                ordinal: field.ordinal,
                name: field.name.clone(),
                value: self.slots.values()[field.ordinal].clone(),
            })
            .collect();
        Some(ChangeSet {
            entity_type: self.entity_type.clone(),
            kind,
            key: self.key_values(),
            fields,
            originals: self.originals.clone(),
        })
    }

    pub fn save_changes(&mut self, timings: Option<&mut SaveTimings>) -> Result<SaveOutcome> {
        self.save_in_scope(SaveScope::InTransaction, timings)
    }

    pub fn save_changes_outside_transaction(&mut self) -> Result<SaveOutcome> {
        self.save_in_scope(SaveScope::OutsideTransaction, None)
    }

    fn save_in_scope(
        &mut self,
        scope: SaveScope,
        mut timings: Option<&mut SaveTimings>,
    ) -> Result<SaveOutcome> {
        let started = Instant::now();
        let Some(changes) = self.change_set() else {
            return Ok(SaveOutcome::NothingToSave);
        };

        if changes.kind == ChangeKind::Delete && self.is_new() {
            self.mark_as_deleted();
            event!(Level::DEBUG, entity = %self.type_name(), "new entity discarded");
            return Ok(SaveOutcome::Discarded);
        }

        let entity_type = self.entity_type.clone();
        let context = self.context.clone();
        let span = info_span!("save_changes", entity = %entity_type.name(), kind = ?changes.kind);
        let _enter = span.enter();

        for observer in &self.observers {
            observer.saving(&entity_type);
        }
        for observer in &self.observers {
            observer.before_save_changes(&entity_type, scope);
        }

        let backend_started = Instant::now();
        let result = match scope {
            SaveScope::InTransaction => context
                .service()
                .save_changes(&changes, timings.as_deref_mut()),
            SaveScope::OutsideTransaction => {
                context.service().save_changes_outside_transaction(&changes)
            }
        };
        let receipt = match result {
            Ok(receipt) => receipt,
            Err(err) => {
                event!(Level::WARN, error = %err, "save failed");
                return Err(err);
            }
        };
        if let Some(timings) = timings.as_deref_mut() {
            timings.record("backend", backend_started.elapsed());
        }

        let outcome = match changes.kind {
            ChangeKind::Delete => {
                self.mark_as_deleted();
                SaveOutcome::Deleted
            }
            kind => {
                // Checked up front so a bad receipt applies nothing
                for (ordinal, _) in &receipt.generated_keys {
                    let field = entity_type.field(*ordinal)?;
                    if !field.is_key {
                        event!(Level::ERROR, field = %field.name, "backend generated a non-key value");
                        return Err(EntityError::Backend(format!(
                            "backend generated a value for non-key field '{}'",
                            field.name
                        )));
                    }
                }
                for (ordinal, value) in receipt.generated_keys {
                    self.slots.store_loaded(ordinal, value)?;
                }
                self.reset_modified_flags();
                self.is_new_marker = false;
                if kind == ChangeKind::Insert {
                    SaveOutcome::Inserted
                } else {
                    SaveOutcome::Updated
                }
            }
        };

        for observer in &self.observers {
            observer.after_save_changes(&entity_type, scope, &outcome);
        }
        if let Some(timings) = timings {
            timings.record("total", started.elapsed());
        }
        event!(Level::INFO, outcome = ?outcome, "entity saved");
        Ok(outcome)
    }
}
