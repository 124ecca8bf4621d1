//! Recommended API entrypoints grouped by abstraction level.
//!
//! `app` covers application code that reads and writes entities.
//! `integration` is for code implementing the backend collaborators.

pub mod app {
    //! Entity access surface for business logic.
    pub use crate::{
        ChangeDecision, Entity, EntityContext, EntityError, EntityObserver, FieldChange,
        LazySaveQueue, OnNotFound, Result, RuntimeConfig, SaveOutcome, SetOutcome, SharedEntity,
        Value,
    };
}

pub mod integration {
    //! Collaborator contracts and the metadata they receive.
    pub use crate::entity::{AffinityBinding, AffinitySetup, AffinityToken};
    pub use crate::metadata::{EntityType, FieldDescriptor, ParentLink, TypeRegistry};
    pub use crate::persistence::{
        ChangeKind, ChangeSet, FieldValue, LoadRequest, ParentRequest, PersistenceService,
        RowData, SaveReceipt, SaveTimings,
    };
}
