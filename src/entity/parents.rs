use super::instance::{Entity, SharedEntity};
use crate::core::{EntityError, Result, Value};
use crate::persistence::ParentRequest;
use tracing::{Level, event, info_span};

impl Entity {
    /// The entity referenced through `link`, fetched on first use and cached
    /// afterwards, including a "no parent" answer.
    pub fn get_parent(&mut self, link: &str) -> Result<Option<SharedEntity>> {
        if let Some(cached) = self.parents.get(link) {
            return Ok(cached.clone());
        }

        let entity_type = self.entity_type.clone();
        let context = self.context.clone();
        let link_def = entity_type.link(link)?;
        let parent_type = context.registry().get(&link_def.parent_type)?;

        let mut link_values = Vec::with_capacity(link_def.fields.len());
        for field in &link_def.fields {
            link_values.push(self.get(field)?);
        }
        let child_key = self.stored_key_values();

        let row = {
            let _affinity = context.enter_affinity(self.affinity.as_ref())?;
            let span = info_span!(
                "parent_fetch",
                entity = %entity_type.name(),
                link = %link_def.name
            );
            let _enter = span.enter();

            let request = ParentRequest {
                child_type: &entity_type,
                child_key: &child_key,
                link: link_def,
                link_values: &link_values,
                parent_type: &parent_type,
            };
            match context.service().get_parent(&request) {
                Ok(row) => row,
                Err(err) => {
                    event!(Level::WARN, error = %err, "parent fetch failed");
                    return Err(err);
                }
            }
        };

        let parent = match row {
            Some(row) => Some(context.from_row(&parent_type, row)?.into_shared()),
            None => None,
        };
        event!(
            Level::DEBUG,
            link = %link_def.name,
            found = parent.is_some(),
            "parent resolved"
        );
        self.parents.insert(link.to_string(), parent.clone());
        Ok(parent)
    }

    /// Points `link` at `parent`, copying its key values into the local link
    /// fields, or clears the link fields when `parent` is `None`.
    ///
    /// The cache always ends up holding `parent`.
    pub fn set_parent(&mut self, link: &str, parent: Option<SharedEntity>) -> Result<()> {
        let entity_type = self.entity_type.clone();
        let link_def = entity_type.link(link)?;

        match &parent {
            Some(parent_entity) => {
                let (parent_type, key) = {
                    let guard = parent_entity.lock()?;
                    (guard.type_name().to_string(), guard.key_values())
                };
                if parent_type != link_def.parent_type {
                    return Err(EntityError::InvalidArgument(format!(
                        "parent link '{}' expects '{}', got '{}'",
                        link_def.name, link_def.parent_type, parent_type
                    )));
                }
                if key.len() != link_def.fields.len() {
                    return Err(EntityError::LinkKeyMismatch {
                        link: link_def.name.clone(),
                        link_fields: link_def.fields.len(),
                        key_fields: key.len(),
                    });
                }
                for (field, value) in link_def.fields.iter().zip(key) {
                    self.set(field, value)?;
                }
            }
            None => {
                for field in &link_def.fields {
                    self.set(field, Value::Null)?;
                }
            }
        }

        self.parents.insert(link.to_string(), parent);
        Ok(())
    }

    /// The cached answer for `link`: `None` if unresolved, `Some(None)` for
    /// a cached "no parent".
    pub fn cached_parent(&self, link: &str) -> Option<Option<SharedEntity>> {
        self.parents.get(link).cloned()
    }

    pub fn invalidate_parent(&mut self, link: &str) {
        self.parents.remove(link);
    }

    pub fn clear_parent_cache(&mut self) {
        self.parents.clear();
    }
}
