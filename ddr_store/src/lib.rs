//! Schema store and superset merging
//!
//! This crate persists structure-layout blobs captured from individual
//! builds or platforms, folds them in a defined order into one
//! conflict-checked superset, and reads the properties-style side files
//! (merge order, auxiliary field info) that steer the merge.

pub mod aux_info;
pub mod error;
pub mod file;
pub mod properties;
pub mod store;
pub mod superset;

// Re-export commonly used types at the crate root
pub use aux_info::{AuxField, AuxFieldInfo, AuxFieldKind};
pub use error::{SchemaConflict, StoreError};
pub use file::{BlobFormat, blob_files_in, key_for_path, read_blob, write_blob};
pub use properties::{Properties, parse_bool, parse_properties, read_properties};
pub use store::{DEFAULT_SUPERSET_NAME, ORDER_KEY, SchemaStore};
pub use superset::Superset;

// Re-export ddr_types for convenience
pub use ddr_types;
