use crate::types::Structure;
use serde_derive::{Deserialize, Serialize};

/* Blob format generation written by current capture tooling */
pub const CURRENT_FORMAT_VERSION: u32 = 2;

fn default_format_version() -> u32 {
    CURRENT_FORMAT_VERSION
}

/// A serialized collection of structure definitions captured from one
/// build or platform. The merged superset uses the same shape.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Blob {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default)]
    pub structures: Vec<Structure>,
}

impl Default for Blob {
    fn default() -> Self {
        Self {
            format_version: CURRENT_FORMAT_VERSION,
            structures: Vec::new(),
        }
    }
}

impl Blob {
    pub fn new(structures: Vec<Structure>) -> Self {
        Self {
            format_version: CURRENT_FORMAT_VERSION,
            structures,
        }
    }

    pub fn structure(&self, name: &str) -> Option<&Structure> {
        self.structures.iter().find(|s| s.name == name)
    }

    /// Names of every structure in the blob, used to classify `Foo` vs `Foo *`.
    pub fn structure_names(&self) -> impl Iterator<Item = &str> {
        self.structures.iter().map(|s| s.name.as_str())
    }
}
