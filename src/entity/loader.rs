use super::instance::{Entity, FieldKey};
use crate::core::{EntityError, Result};
use crate::metadata::FieldDescriptor;
use crate::persistence::LoadRequest;
use tracing::{Level, event, info_span};

/// Fields fetched together in one demand-load round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    /// The requested ordinal first, then batched candidates in scan order.
    pub ordinals: Vec<usize>,
    /// Budget left after packing; negative when the requested field alone
    /// exceeds the budget.
    pub remaining_budget: i64,
}

impl FetchPlan {
    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }
}

/// Greedy, size-bounded packing of unloaded fields around `requested`.
///
/// Large fields are never batched, and a large requested field is fetched
/// alone. Otherwise candidates are scanned from `requested + 1` to the end,
/// then from 0 up to `requested`; each unloaded, non-large candidate that
/// fits the remaining budget is taken. Candidates that do not fit are
/// skipped and the scan ends once the budget is used up.
///
/// # Panics
///
/// Panics if `requested` is not an index into `fields`.
pub fn plan_fetch(
    fields: &[FieldDescriptor],
    requested: usize,
    budget: u32,
    is_loaded: impl Fn(usize) -> bool,
) -> FetchPlan {
    let target = &fields[requested];
    let mut ordinals = vec![requested];
    let mut remaining = i64::from(budget) - i64::from(target.size);

    if target.is_large {
        return FetchPlan {
            ordinals,
            remaining_budget: remaining,
        };
    }

    let candidates = (requested + 1..fields.len()).chain(0..requested);
    for ordinal in candidates {
        if remaining <= 0 {
            break;
        }
        let candidate = &fields[ordinal];
        let size = i64::from(candidate.size);
        if candidate.is_large || is_loaded(ordinal) || size > remaining {
            continue;
        }
        ordinals.push(ordinal);
        remaining -= size;
    }

    FetchPlan {
        ordinals,
        remaining_budget: remaining,
    }
}

impl Entity {
    /// Fetches `field` and its batch from the backend.
    ///
    /// Fails with [`EntityError::DemandLoadOnNew`] on a new entity. A field
    /// that is already loaded is left as is.
    pub fn demand_load(&mut self, field: impl FieldKey) -> Result<()> {
        let ordinal = field.ordinal_in(&self.entity_type)?;
        if self.is_new() {
            return Err(EntityError::DemandLoadOnNew {
                entity: self.entity_type.name().to_string(),
                field: self.entity_type.field(ordinal)?.name.clone(),
            });
        }
        if self.slots.is_loaded(ordinal)? {
            return Ok(());
        }
        self.load_missing(ordinal)
    }

    /// The plan a demand load of `field` would use right now.
    pub fn fetch_plan(&self, field: impl FieldKey) -> Result<FetchPlan> {
        let ordinal = field.ordinal_in(&self.entity_type)?;
        Ok(self.plan_for(ordinal))
    }

    fn plan_for(&self, ordinal: usize) -> FetchPlan {
        let slots = &self.slots;
        plan_fetch(
            self.entity_type.fields(),
            ordinal,
            self.context.config().demand_load_budget,
            |candidate| slots.is_loaded(candidate).unwrap_or(true),
        )
    }

    pub(crate) fn load_missing(&mut self, ordinal: usize) -> Result<()> {
        if self.is_new() {
            return Err(EntityError::DemandLoadOnNew {
                entity: self.entity_type.name().to_string(),
                field: self.entity_type.field(ordinal)?.name.clone(),
            });
        }

        let plan = self.plan_for(ordinal);
        let key = self.stored_key_values();
        let entity_type = self.entity_type.clone();
        let context = self.context.clone();
        let field_name = &entity_type.field(ordinal)?.name;

        let values = {
            let _affinity = context.enter_affinity(self.affinity.as_ref())?;
            let span = info_span!(
                "demand_load",
                entity = %entity_type.name(),
                field = %field_name,
                batch = plan.len()
            );
            let _enter = span.enter();

            let request = LoadRequest {
                entity_type: &entity_type,
                key: &key,
                ordinals: &plan.ordinals,
            };
            match context.service().demand_load(&request) {
                Ok(values) => values,
                Err(err) => {
                    event!(Level::WARN, error = %err, "demand load failed");
                    return Err(err);
                }
            }
        };

        if values.len() != plan.len() {
            return Err(EntityError::Backend(format!(
                "demand load of '{}' returned {} values for {} fields",
                entity_type.name(),
                values.len(),
                plan.len()
            )));
        }

        for (&loaded, value) in plan.ordinals.iter().zip(values) {
            self.slots.store_loaded(loaded, value)?;
        }
        for observer in &self.observers {
            observer.after_load(&entity_type, &plan.ordinals);
        }
        event!(
            Level::DEBUG,
            entity = %entity_type.name(),
            fields = plan.len(),
            remaining_budget = plan.remaining_budget,
            "demand load applied"
        );
        Ok(())
    }
}
