pub mod error;
pub mod value;

pub use error::{EntityError, Result};
pub use value::{FieldType, Value};
