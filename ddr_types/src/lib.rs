//! Structure Schema Definitions
//!
//! This crate contains the core data model for captured structure layouts.
//! It provides pure data structures for representing structure blobs and
//! the merged superset, without any store or code generation logic.

pub mod blob;
pub mod types;

// Re-export commonly used types at the crate root
pub use blob::*;
pub use types::*;
