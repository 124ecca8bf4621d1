use crate::core::Result;
use crate::entity::AffinityToken;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Byte budget of one demand-load round trip, including the requested field.
pub const DEFAULT_DEMAND_LOAD_BUDGET: u32 = 4096;

pub const DEFAULT_SAVE_QUEUE_NAME: &str = "lazy-save";

/// Entity runtime configuration
///
/// Injected into every entity through its [`EntityContext`](crate::EntityContext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Byte budget for demand-load batching
    pub demand_load_budget: u32,

    /// Affinity token stamped on every entity created through the context
    pub default_affinity: Option<AffinityToken>,

    /// Name of the lazy save worker thread
    pub save_queue_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            demand_load_budget: DEFAULT_DEMAND_LOAD_BUDGET,
            default_affinity: None,
            save_queue_name: DEFAULT_SAVE_QUEUE_NAME.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the demand-load byte budget
    pub fn demand_load_budget(mut self, budget: u32) -> Self {
        self.demand_load_budget = budget;
        self
    }

    /// Set the affinity token new entities start with
    pub fn default_affinity(mut self, token: impl Into<AffinityToken>) -> Self {
        self.default_affinity = Some(token.into());
        self
    }

    /// Set the save worker thread name
    pub fn save_queue_name(mut self, name: &str) -> Self {
        self.save_queue_name = name.to_string();
        self
    }

    /// Parse from a JSON document; missing keys keep their defaults.
    ///
    /// ```
    /// use lazyrecord::RuntimeConfig;
    ///
    /// let config = RuntimeConfig::from_json_str(r#"{"demand_load_budget": 8192}"#).unwrap();
    /// assert_eq!(config.demand_load_budget, 8192);
    /// assert_eq!(config.save_queue_name, "lazy-save");
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
