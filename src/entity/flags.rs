use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-field state. `LOADED` and `MODIFIED` toggle independently.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SlotFlags: u8 {
        const LOADED = 0b0000_0001;
        const MODIFIED = 0b0000_0010;
    }
}

bitflags! {
    /// Instance-wide state. The empty set is the normal state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct EntityFlags: u8 {
        const DELETE_PENDING = 0b0000_0001;
        const DELETED = 0b0000_0010;
        const READ_ONLY = 0b0000_0100;
    }
}

impl SlotFlags {
    pub fn is_loaded(self) -> bool {
        self.contains(Self::LOADED)
    }

    pub fn is_modified(self) -> bool {
        self.contains(Self::MODIFIED)
    }
}

impl EntityFlags {
    pub fn is_normal(self) -> bool {
        self.is_empty()
    }
}
