use crate::error::StoreError;
use crate::properties::{Properties, read_properties};
use crate::superset::Superset;
use ddr_types::Field;
use std::path::Path;
use tracing::{debug, warn};

/* Value marking a field as required in every accepted schema version */
const REQUIRED: &str = "required";

/* What an auxiliary entry says about one field */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuxFieldKind {
    /* Field must exist in every schema version */
    Required,
    /* Field may be missing in some versions; accessor uses this type */
    Optional(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxField {
    pub structure: String,
    pub field: String,
    pub kind: AuxFieldKind,
}

/// Supplementary field knowledge merged into a superset before generation.
///
/// Each line has the form `Structure.field = required` or
/// `Structure.field = <declared type>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxFieldInfo {
    entries: Vec<AuxField>,
}

impl AuxFieldInfo {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let properties = read_properties(path)?;
        Self::from_properties(&properties, path)
    }

    pub fn from_properties(properties: &Properties, path: &Path) -> Result<Self, StoreError> {
        let mut entries = Vec::with_capacity(properties.len());
        for (key, value) in properties {
            let (structure, field) = key
                .split_once('.')
                .filter(|(s, f)| !s.is_empty() && !f.is_empty())
                .ok_or_else(|| StoreError::InvalidProperties {
                    path: path.to_path_buf(),
                    message: format!("key '{}' is not of the form Structure.field", key),
                })?;
            let value = value.trim();
            if value.is_empty() {
                return Err(StoreError::InvalidProperties {
                    path: path.to_path_buf(),
                    message: format!("no type given for '{}'", key),
                });
            }
            let kind = if value == REQUIRED {
                AuxFieldKind::Required
            } else {
                AuxFieldKind::Optional(value.to_string())
            };
            entries.push(AuxField {
                structure: structure.to_string(),
                field: field.to_string(),
                kind,
            });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[AuxField] {
        &self.entries
    }

    /* Merge into a superset. Captured definitions always win over the
       auxiliary type; entries for unknown structures are skipped. */
    pub fn apply(&self, superset: &mut Superset) {
        for entry in &self.entries {
            let Some(structure) = superset.get_mut(&entry.structure) else {
                warn!(
                    "Auxiliary field info names unknown structure {} (field {})",
                    entry.structure, entry.field
                );
                continue;
            };

            match (&entry.kind, structure.field_mut(&entry.field)) {
                (AuxFieldKind::Required, Some(field)) => field.required = true,
                (AuxFieldKind::Required, None) => {
                    debug!("{}.{}: required but not captured", entry.structure, entry.field);
                    structure
                        .fields
                        .push(Field::new(entry.field.clone(), "", 0).required().absent());
                }
                (AuxFieldKind::Optional(_), Some(_)) => {}
                (AuxFieldKind::Optional(declared_type), None) => {
                    debug!("{}.{}: optional {}", entry.structure, entry.field, declared_type);
                    structure
                        .fields
                        .push(Field::new(entry.field.clone(), declared_type.clone(), 0).absent());
                }
            }
        }
    }
}
