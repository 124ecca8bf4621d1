use crate::core::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{Level, event};

/// Opaque hint naming the backend connection or context an entity prefers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AffinityToken(String);

impl AffinityToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AffinityToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for AffinityToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl fmt::Display for AffinityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bound connection or context handed out by an [`AffinitySetup`].
pub trait AffinityBinding: Send {
    fn activate(&self) -> Result<()>;
    fn deactivate(&self);
}

/// External collaborator that turns an affinity token into a binding.
pub trait AffinitySetup: Send + Sync {
    fn setup_affinity(&self, token: &AffinityToken) -> Option<Box<dyn AffinityBinding>>;

    /// Whether some binding is already active for the calling thread.
    fn has_active_binding(&self) -> bool;
}

/// Scoped affinity binding around one collaborator call.
///
/// Deactivates on drop only if this guard did the activation, so nested
/// calls never disturb an ambient binding.
#[must_use = "the binding is released as soon as the guard is dropped"]
pub struct AffinityGuard {
    binding: Option<Box<dyn AffinityBinding>>,
}

impl AffinityGuard {
    pub fn unbound() -> Self {
        Self { binding: None }
    }

    pub fn enter(setup: Option<&dyn AffinitySetup>, token: Option<&AffinityToken>) -> Result<Self> {
        let (Some(setup), Some(token)) = (setup, token) else {
            return Ok(Self::unbound());
        };

        let Some(binding) = setup.setup_affinity(token) else {
            return Ok(Self::unbound());
        };
        if setup.has_active_binding() {
            event!(Level::TRACE, token = %token, "affinity already bound, reusing ambient binding");
            return Ok(Self::unbound());
        }

        binding.activate()?;
        event!(Level::TRACE, token = %token, "affinity binding activated");
        Ok(Self {
            binding: Some(binding),
        })
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }
}

impl Drop for AffinityGuard {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.deactivate();
        }
    }
}
