//! Error types for the schema store

use std::path::PathBuf;
use thiserror::Error;

/// Two blobs disagree about the layout of the same (structure, field) pair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "conflicting definition of {structure}.{field} from '{key}': existing `{existing_type}` @ {existing_offset}, incoming `{incoming_type}` @ {incoming_offset}"
)]
pub struct SchemaConflict {
    /// Store key of the blob that introduced the conflicting definition
    pub key: String,
    pub structure: String,
    pub field: String,
    pub existing_type: String,
    pub existing_offset: u64,
    pub incoming_type: String,
    pub incoming_offset: u64,
}

/// Main error type for schema store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O errors, with the path that failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A blob or index file could not be decoded
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A blob or index file could not be encoded
    #[error("Failed to serialize {path}: {message}")]
    Serialize { path: PathBuf, message: String },

    /// File extension does not name a known blob format
    #[error("Unsupported blob format: {0}")]
    UnsupportedFormat(PathBuf),

    /// One or more structures failed to merge
    #[error("{} schema conflict(s), first: {}", .0.len(), .0.first().map(|c| c.to_string()).unwrap_or_default())]
    Conflicts(Vec<SchemaConflict>),

    /// Blobs captured with different format versions cannot share a superset
    #[error("Blob '{key}' has format version {version}, but '{first_key}' has {first_version}")]
    MixedFormatVersions {
        key: String,
        version: u32,
        first_key: String,
        first_version: u32,
    },

    /// The merge order names a key that is not in the store
    #[error("Order names unknown store key '{0}'")]
    UnknownOrderKey(String),

    /// The same store key was supplied twice in one operation
    #[error("Store key '{0}' given more than once")]
    DuplicateKey(String),

    /// A key cannot be used as a store identity
    #[error("Invalid store key '{0}'")]
    InvalidKey(String),

    /// Malformed properties-style input (order file, aux field info)
    #[error("Invalid properties in {path}: {message}")]
    InvalidProperties { path: PathBuf, message: String },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
