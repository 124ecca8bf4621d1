// ============================================================================
// lazyrecord Library
// ============================================================================

pub mod config;
pub mod context;
pub mod core;
pub mod entity;
pub mod metadata;
pub mod persistence;
pub mod prelude;
pub mod queue;

// Re-export main types for convenience
pub use config::RuntimeConfig;
pub use context::EntityContext;
pub use core::{EntityError, FieldType, Result, Value};
pub use entity::{
    AffinityBinding, AffinitySetup, AffinityToken, ChangeDecision, Entity, EntityFlags,
    EntityObserver, EntitySnapshot, FetchPlan, FieldChange, FieldDelta, LifecycleState,
    SaveOutcome, SaveScope, SetOutcome, SharedEntity, SlotFlags, WriteReason, plan_fetch,
};
pub use metadata::{EntityType, FieldDescriptor, ParentLink, TypeRegistry};
pub use persistence::{
    ChangeKind, ChangeSet, InMemoryPersistence, LoadRequest, OnNotFound, ParentRequest,
    PersistenceService, RowData, SaveReceipt, SaveTimings,
};
pub use queue::{LazySaveQueue, SaveQueueStats, SaveTicket};
