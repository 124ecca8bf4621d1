use crate::config::RuntimeConfig;
use crate::core::{EntityError, Result, Value};
use crate::entity::{
    AffinityGuard, AffinitySetup, AffinityToken, Entity, EntitySnapshot, WriteReason,
};
use crate::metadata::{EntityType, TypeRegistry};
use crate::persistence::{OnNotFound, PersistenceService, RowData};
use std::fmt;
use std::sync::Arc;
use tracing::{Level, event};

/// Everything an entity needs from its surroundings: the type registry, the
/// persistence collaborator, the optional affinity setup and configuration.
///
/// Entities are created through a shared context and keep it for their
/// lifetime.
pub struct EntityContext {
    registry: TypeRegistry,
    service: Arc<dyn PersistenceService>,
    affinity_setup: Option<Arc<dyn AffinitySetup>>,
    config: RuntimeConfig,
}

impl EntityContext {
    pub fn new(registry: TypeRegistry, service: Arc<dyn PersistenceService>) -> Self {
        Self {
            registry,
            service,
            affinity_setup: None,
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_affinity_setup(mut self, setup: Arc<dyn AffinitySetup>) -> Self {
        self.affinity_setup = Some(setup);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn service(&self) -> &Arc<dyn PersistenceService> {
        &self.service
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub(crate) fn enter_affinity(&self, token: Option<&AffinityToken>) -> Result<AffinityGuard> {
        AffinityGuard::enter(self.affinity_setup.as_deref(), token)
    }

    /// A brand-new entity: nothing loaded, new marker set.
    pub fn create(self: &Arc<Self>, type_name: &str) -> Result<Entity> {
        let entity_type = self.registry.get(type_name)?;
        Ok(Entity::new(entity_type, self.clone()))
    }

    /// A reference to a stored row with only its key fields populated; every
    /// other field is demand-loaded on first read.
    pub fn attach(self: &Arc<Self>, type_name: &str, key: Vec<Value>) -> Result<Entity> {
        let entity_type = self.registry.get(type_name)?;
        let key_ordinals = entity_type.key_ordinals();
        if key.len() != key_ordinals.len() {
            return Err(EntityError::InvalidArgument(format!(
                "'{}' has {} key fields, got {} values",
                type_name,
                key_ordinals.len(),
                key.len()
            )));
        }

        let mut entity = Entity::new(entity_type.clone(), self.clone());
        {
            let mut init = entity.initializing();
            for (&ordinal, value) in key_ordinals.iter().zip(key) {
                init.set_with_reason(ordinal, value, WriteReason::Internal)?;
            }
        }
        entity.mark_persisted();
        Ok(entity)
    }

    /// An entity populated from backend data. Only the fields present in
    /// `row` are marked loaded.
    pub fn from_row(self: &Arc<Self>, entity_type: &Arc<EntityType>, row: RowData) -> Result<Entity> {
        let mut entity = Entity::new(entity_type.clone(), self.clone());
        {
            let mut init = entity.initializing();
            for (ordinal, value) in row.fields {
                init.store_from_storage(ordinal, value)?;
            }
        }
        entity.mark_persisted();
        Ok(entity)
    }

    pub fn get_by_id(
        self: &Arc<Self>,
        type_name: &str,
        key: &[Value],
        on_not_found: OnNotFound,
    ) -> Result<Option<Entity>> {
        let entity_type = self.registry.get(type_name)?;
        if key.len() != entity_type.key_ordinals().len() {
            return Err(EntityError::InvalidArgument(format!(
                "'{}' has {} key fields, got {} values",
                type_name,
                entity_type.key_ordinals().len(),
                key.len()
            )));
        }

        let row = {
            let _affinity = self.enter_affinity(self.config.default_affinity.as_ref())?;
            self.service.get_by_id(&entity_type, key)?
        };
        match row {
            Some(row) => Ok(Some(self.from_row(&entity_type, row)?)),
            None => {
                event!(Level::DEBUG, entity = %type_name, "get_by_id found no row");
                match on_not_found {
                    OnNotFound::ReturnNone => Ok(None),
                    OnNotFound::Error => Err(EntityError::NotFound(format!(
                        "'{}' with key {:?}",
                        type_name, key
                    ))),
                }
            }
        }
    }

    pub fn restore(self: &Arc<Self>, snapshot: EntitySnapshot) -> Result<Entity> {
        Entity::from_snapshot(self, snapshot)
    }
}

impl fmt::Debug for EntityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityContext")
            .field("types", &self.registry.type_names())
            .field("affinity_setup", &self.affinity_setup.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
