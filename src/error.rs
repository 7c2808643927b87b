//! Error handling for the bridge
//!
//! This module defines the error taxonomy shared by the conversion engine,
//! the data element tree and the configuration layer, together with a
//! Result alias for use throughout the crate.
//!
//! Conversion and no-data errors are raised to the consumer processing cycle
//! that asked for the value. A missing field in an incoming structure is never
//! raised to the delivery side; it is recorded on the affected leaf and shows
//! up as [`BridgeError::StructureMismatch`] when that leaf is read. Binding
//! errors surface while chains are built, before any data flows.

use thiserror::Error;

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Read attempted while the incoming slot is empty
    #[error("No incoming data")]
    NoData,

    /// Native value kind is incompatible with the requested kind
    #[error("Type mismatch: cannot convert {native} to {requested}")]
    TypeMismatch { native: String, requested: String },

    /// Numeric narrowing conversion out of the target range
    #[error("Range overflow: {value} does not fit into {target}")]
    RangeOverflow { value: String, target: String },

    /// Element expected by the tree is absent from the last incoming structure
    #[error("Element '{path}' missing from incoming structure")]
    StructureMismatch { path: String },

    /// Path of an item is already bound to a different record
    #[error("Element '{path}' of item '{item}' is already bound to record '{existing}'")]
    DuplicateBinding {
        item: String,
        path: String,
        existing: String,
    },

    /// Record connector is already linked to another element
    #[error("Record '{record}' is already linked to '{item}' element '{path}'")]
    AlreadyLinked {
        record: String,
        item: String,
        path: String,
    },

    /// Malformed element path
    #[error("Invalid element path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Path clashes with the shape of the already built tree
    #[error("Element path '{path}' conflicts with existing tree: {reason}")]
    StructureConflict { path: String, reason: String },

    /// Transport reported a failed write for this record
    #[error("Write from record '{0}' failed")]
    WriteFailed(String),

    /// Record connector has no element bound to it
    #[error("Record '{0}' is not linked to any element")]
    NotLinked(String),

    /// Reference to an item that was never configured
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<BridgeError>,
    },
}

impl BridgeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        BridgeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a type mismatch between two displayable kinds
    pub fn type_mismatch(native: impl ToString, requested: impl ToString) -> Self {
        BridgeError::TypeMismatch {
            native: native.to_string(),
            requested: requested.to_string(),
        }
    }

    /// Shorthand for a range overflow of `value` into `target`
    pub fn range_overflow(value: impl ToString, target: impl ToString) -> Self {
        BridgeError::RangeOverflow {
            value: value.to_string(),
            target: target.to_string(),
        }
    }

    /// The innermost error, skipping any context wrappers
    pub fn root_cause(&self) -> &BridgeError {
        match self {
            BridgeError::WithContext { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
