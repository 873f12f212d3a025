//! Accessor code generation for merged structure supersets.
//!
//! Each structure in a superset becomes one Rust module holding a typed
//! pointer wrapper with an accessor per field. Hand-written regions of a
//! previously generated module are carried into the next generation.

pub mod classify;
pub mod cmds;
pub mod emit;
pub mod error;
pub mod helpers;
pub mod merge;

pub use classify::{Category, NumericPolicy, TypeClassifier};
pub use cmds::codegen::{RunSummary, run};
pub use cmds::common::{CacheProperties, GeneratorConfig, DEFAULT_FLAG_STRUCTURES};
pub use emit::{EmitOptions, EmittedStructure, OffsetNaming, emit, emit_build_flags};
pub use error::{ERROR_THRESHOLD, GenError};
pub use merge::{CacheFlags, UserRegions, extract};
