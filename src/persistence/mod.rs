// The persistence collaborator boundary and an in-memory implementation.

pub mod memory;
pub mod service;

pub use memory::{InMemoryPersistence, LoadCall, SavedChange};
pub use service::{
    ChangeKind, ChangeSet, FieldValue, LoadRequest, OnNotFound, ParentRequest,
    PersistenceService, RowData, SaveReceipt, SaveTimings,
};
