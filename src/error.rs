//! Error handling module for rigbuild
//!
//! Each component defines its own error enum next to the code that raises
//! it; `RigError` gathers them for callers that drive the whole stack (the
//! CLI, configuration loading).

use crate::configurator::ConfiguratorError;
use crate::slots::SlotTableError;
use thiserror::Error;

/// Main error type for rigbuild
#[derive(Error, Debug)]
pub enum RigError {
    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid slot table in the configuration
    #[error("Slot table error: {0}")]
    SlotTable(#[from] SlotTableError),

    /// Build configurator errors
    #[error(transparent)]
    Configurator(#[from] ConfiguratorError),

    /// Validation errors (user input)
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for rigbuild operations
pub type Result<T> = std::result::Result<T, RigError>;

impl RigError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
