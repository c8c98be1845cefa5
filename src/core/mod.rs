// Core Layer: crate-wide error handling

pub mod error;

pub use error::{GraphError, NodeValidationFailure, Result};
