// Entity instance runtime.
//
// `instance` owns the struct and the slot read/write paths; the remaining
// modules add impl blocks for demand loading, change tracking, lifecycle,
// parent links, saving and snapshots.

pub mod affinity;
pub mod events;
pub mod flags;
pub mod instance;
pub mod lifecycle;
pub mod loader;
pub mod parents;
pub mod save;
pub mod slots;
pub mod snapshot;
pub mod tracker;

pub use affinity::{AffinityBinding, AffinityGuard, AffinitySetup, AffinityToken};
pub use events::{ChangeDecision, EntityObserver, FieldChange, ObserverRef, SaveScope};
pub use flags::{EntityFlags, SlotFlags};
pub use instance::{Entity, FieldKey, InitScope, SetOutcome, SharedEntity, WriteReason};
pub use lifecycle::LifecycleState;
pub use loader::{FetchPlan, plan_fetch};
pub use save::SaveOutcome;
pub use slots::SlotStore;
pub use snapshot::EntitySnapshot;
pub use tracker::FieldDelta;
