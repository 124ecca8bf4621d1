use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntityError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Field '{0}' not found on entity type '{1}'")]
    FieldNotFound(String, String),

    #[error("Field ordinal {ordinal} out of range for entity type '{entity}' ({count} fields)")]
    OrdinalOutOfRange {
        entity: String,
        ordinal: usize,
        count: usize,
    },

    #[error("Cannot demand-load field '{field}' on new entity of type '{entity}'")]
    DemandLoadOnNew { entity: String, field: String },

    #[error("Entity of type '{0}' is read-only")]
    ReadOnly(String),

    #[error(
        "Parent link '{link}' declares {link_fields} fields but the parent has {key_fields} key fields"
    )]
    LinkKeyMismatch {
        link: String,
        link_fields: usize,
        key_fields: usize,
    },

    #[error("Parent link '{0}' not found on entity type '{1}'")]
    LinkNotFound(String, String),

    #[error("Entity type '{0}' is not registered")]
    UnknownEntityType(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Save queue error: {0}")]
    Queue(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl EntityError {
    /// Programming errors: the caller used the runtime incorrectly.
    pub fn is_invalid_usage(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::FieldNotFound(..)
                | Self::OrdinalOutOfRange { .. }
                | Self::DemandLoadOnNew { .. }
                | Self::ReadOnly(_)
                | Self::LinkKeyMismatch { .. }
                | Self::LinkNotFound(..)
                | Self::UnknownEntityType(_)
                | Self::TypeMismatch(_)
                | Self::ConstraintViolation(_)
                | Self::InvalidState(_)
        )
    }

    /// Failures raised by the persistence collaborator.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, EntityError>;

impl<T> From<std::sync::PoisonError<T>> for EntityError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for EntityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for EntityError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
