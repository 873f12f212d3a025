//! Error types for accessor generation

use crate::classify::UnclassifiedReason;
use ddr_store::{SchemaConflict, StoreError};
use std::path::PathBuf;
use thiserror::Error;

/* Reaching this many errors stops the run instead of logging and skipping */
pub const ERROR_THRESHOLD: usize = 100;

#[derive(Error, Debug)]
pub enum GenError {
    /// Incompatible re-definition of a field while merging schemas
    #[error(transparent)]
    SchemaConflict(#[from] SchemaConflict),

    /// Declared type spelling the classifier does not understand
    #[error("{structure}.{field}: cannot classify `{declared_type}` ({reason})")]
    UnclassifiedType {
        structure: String,
        field: String,
        declared_type: String,
        reason: UnclassifiedReason,
    },

    /// Field that every schema must have was not captured
    #[error("{structure}.{field}: required field `{declared_type}` is missing from the schema")]
    MissingRequiredField {
        structure: String,
        field: String,
        declared_type: String,
    },

    /// Artifact could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The superset itself could not be loaded
    #[error("Failed to load schema: {0}")]
    SchemaLoad(#[source] StoreError),

    /// Malformed cache flag properties
    #[error("Invalid cache properties in {path}: {message}")]
    InvalidCacheProperties { path: PathBuf, message: String },

    /// The error count reached the threshold
    #[error("Too many errors ({count}), last: {last}")]
    TooManyErrors {
        count: usize,
        /* Structures that had failed when the run stopped */
        failed_structures: Vec<String>,
        #[source]
        last: Box<GenError>,
    },
}

impl GenError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GenError::Io {
            path: path.into(),
            source,
        }
    }

    /* Errors that end the run immediately */
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GenError::SchemaLoad(_)
                | GenError::InvalidCacheProperties { .. }
                | GenError::TooManyErrors { .. }
        )
    }
}
