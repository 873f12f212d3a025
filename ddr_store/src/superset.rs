use crate::error::SchemaConflict;
use ddr_types::{Blob, CURRENT_FORMAT_VERSION, Field, Structure};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/* Merged, conflict-checked view of every folded blob. Structures are kept
   in name order so traversal is stable across runs. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superset {
    structures: BTreeMap<String, Structure>,
    /* Format version shared by every folded blob */
    format_version: u32,
}

impl Default for Superset {
    fn default() -> Self {
        Self {
            structures: BTreeMap::new(),
            format_version: CURRENT_FORMAT_VERSION,
        }
    }
}

impl Superset {
    pub fn new() -> Self {
        Self::default()
    }

    /* Build a superset from an already merged blob (e.g. a persisted superset) */
    pub fn from_blob(blob: Blob) -> Self {
        let mut superset = Self::new();
        superset.format_version = blob.format_version;
        for structure in blob.structures {
            superset.structures.insert(structure.name.clone(), structure);
        }
        superset
    }

    /* Serialize back to blob form with deterministic ordering */
    pub fn to_blob(&self) -> Blob {
        let mut blob = Blob::new(
            self.structures
                .values()
                .map(|s| {
                    let mut s = s.clone();
                    s.sort();
                    s
                })
                .collect(),
        );
        blob.format_version = self.format_version;
        blob
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn set_format_version(&mut self, format_version: u32) {
        self.format_version = format_version;
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Structure> {
        self.structures.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Structure> {
        self.structures.get_mut(name)
    }

    pub fn insert(&mut self, structure: Structure) {
        self.structures.insert(structure.name.clone(), structure);
    }

    /* Structures in name order */
    pub fn structures(&self) -> impl Iterator<Item = &Structure> {
        self.structures.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.structures.keys().map(String::as_str)
    }

    /* Fold one blob's structures into the superset.

       A new structure is inserted as-is. An existing one is merged field by
       field on a copy; if any field disagrees on declared type or offset the
       copy is discarded and the previous definition stays untouched. Every
       conflicting field is reported. */
    pub fn fold(&mut self, key: &str, structures: &[Structure]) -> Vec<SchemaConflict> {
        let mut conflicts = Vec::new();

        for incoming in structures {
            let Some(existing) = self.structures.get(&incoming.name) else {
                debug!("{}: new structure {}", key, incoming.name);
                self.structures.insert(incoming.name.clone(), incoming.clone());
                continue;
            };

            let mut merged = existing.clone();
            let structure_conflicts = merge_structure(key, &mut merged, incoming);

            if structure_conflicts.is_empty() {
                self.structures.insert(merged.name.clone(), merged);
            } else {
                warn!(
                    "{}: structure {} not merged, {} conflicting field(s)",
                    key,
                    incoming.name,
                    structure_conflicts.len()
                );
                conflicts.extend(structure_conflicts);
            }
        }

        conflicts
    }

    /* Keep only constants that an older superset also declares on the same
       structure. A structure unknown to the older superset keeps none. */
    pub fn limit_constants(&mut self, older: &Superset) {
        for (name, structure) in self.structures.iter_mut() {
            let before = structure.constants.len();
            match older.get(name) {
                Some(old) => structure
                    .constants
                    .retain(|c| old.constant(&c.name).is_some()),
                None => structure.constants.clear(),
            }
            let dropped = before - structure.constants.len();
            if dropped > 0 {
                debug!("{}: dropped {} constant(s) not in older superset", name, dropped);
            }
        }
    }
}

fn merge_structure(key: &str, merged: &mut Structure, incoming: &Structure) -> Vec<SchemaConflict> {
    let mut conflicts = Vec::new();

    if merged.pointer_name.is_none() {
        merged.pointer_name = incoming.pointer_name.clone();
    }
    if merged.super_name.is_none() {
        merged.super_name = incoming.super_name.clone();
    }

    for field in &incoming.fields {
        match merged.field_mut(&field.name) {
            None => merged.fields.push(field.clone()),
            Some(existing) => {
                if let Some(conflict) = merge_field(key, &incoming.name, existing, field) {
                    conflicts.push(conflict);
                }
            }
        }
    }

    /* Constants are unioned by name; the first value seen wins */
    for constant in &incoming.constants {
        if merged.constant(&constant.name).is_none() {
            merged.constants.push(constant.clone());
        }
    }

    conflicts
}

/* A field that was never captured is only a placeholder: a captured
   definition replaces it and conflicts are only raised between two
   captured definitions. */
fn merge_field(
    key: &str,
    structure: &str,
    existing: &mut Field,
    incoming: &Field,
) -> Option<SchemaConflict> {
    if existing.present && incoming.present && !existing.same_layout(incoming) {
        return Some(SchemaConflict {
            key: key.to_string(),
            structure: structure.to_string(),
            field: existing.name.clone(),
            existing_type: existing.declared_type.clone(),
            existing_offset: existing.offset,
            incoming_type: incoming.declared_type.clone(),
            incoming_offset: incoming.offset,
        });
    }

    if !existing.present && incoming.present {
        existing.declared_type = incoming.declared_type.clone();
        existing.offset = incoming.offset;
    }
    existing.present |= incoming.present;
    existing.required |= incoming.required;
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddr_types::Constant;

    fn foo(fields: Vec<Field>) -> Structure {
        let mut s = Structure::new("Foo");
        s.fields = fields;
        s
    }

    #[test]
    fn blob_round_trip_keeps_format_version() {
        let mut blob = Blob::new(vec![foo(vec![Field::new("x", "U32", 0)])]);
        blob.format_version = 1;

        let superset = Superset::from_blob(blob);
        assert_eq!(superset.format_version(), 1);
        assert_eq!(superset.to_blob().format_version, 1);
        assert_eq!(Superset::new().to_blob().format_version, CURRENT_FORMAT_VERSION);
    }

    #[test]
    fn new_fields_are_added() {
        let mut superset = Superset::new();
        assert!(superset.fold("a", &[foo(vec![Field::new("x", "U32", 0)])]).is_empty());
        assert!(
            superset
                .fold("b", &[foo(vec![Field::new("x", "U32", 0), Field::new("y", "I32", 4)])])
                .is_empty()
        );

        let merged = superset.get("Foo").expect("Foo");
        assert_eq!(merged.fields.len(), 2);
        assert!(merged.field("y").is_some());
    }

    #[test]
    fn conflicting_structure_is_left_untouched() {
        let mut superset = Superset::new();
        superset.fold("a", &[foo(vec![Field::new("x", "U32", 0)])]);

        let conflicts = superset.fold(
            "c",
            &[foo(vec![Field::new("x", "U32", 8), Field::new("z", "U8", 12)])],
        );

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].structure, "Foo");
        assert_eq!(conflicts[0].field, "x");
        assert_eq!(conflicts[0].existing_offset, 0);
        assert_eq!(conflicts[0].incoming_offset, 8);
        /* z must not leak in from the rejected definition */
        let foo = superset.get("Foo").expect("Foo");
        assert!(foo.field("z").is_none());
        assert_eq!(foo.field("x").map(|f| f.offset), Some(0));
    }

    #[test]
    fn conflict_in_one_structure_does_not_block_others() {
        let mut superset = Superset::new();
        superset.fold("a", &[foo(vec![Field::new("x", "U32", 0)])]);

        let bar = Structure::new("Bar").with_field(Field::new("b", "U8", 0));
        let conflicts = superset.fold("b", &[foo(vec![Field::new("x", "U64", 0)]), bar]);

        assert_eq!(conflicts.len(), 1);
        assert!(superset.get("Bar").is_some());
    }

    #[test]
    fn flags_are_combined_and_placeholders_replaced() {
        let mut superset = Superset::new();
        superset.fold("a", &[foo(vec![Field::new("x", "", 0).required().absent()])]);
        superset.fold("b", &[foo(vec![Field::new("x", "U16", 6)])]);

        let x = superset.get("Foo").and_then(|s| s.field("x")).expect("x");
        assert!(x.required);
        assert!(x.present);
        assert_eq!(x.declared_type, "U16");
        assert_eq!(x.offset, 6);
    }

    #[test]
    fn constants_union_first_value_wins() {
        let mut superset = Superset::new();
        superset.fold("a", &[Structure::new("Foo").with_constant(Constant::new("SIZEOF", 8))]);
        superset.fold(
            "b",
            &[Structure::new("Foo")
                .with_constant(Constant::new("SIZEOF", 16))
                .with_constant(Constant::new("FLAG", 1))],
        );

        let foo = superset.get("Foo").expect("Foo");
        assert_eq!(foo.constant("SIZEOF").map(|c| c.value), Some(8));
        assert!(foo.constant("FLAG").is_some());
    }

    #[test]
    fn limit_constants_keeps_only_older_names() {
        let mut older = Superset::new();
        older.insert(Structure::new("Foo").with_constant(Constant::new("A", 0)));

        let mut newer = Superset::new();
        newer.insert(
            Structure::new("Foo")
                .with_constant(Constant::new("A", 0))
                .with_constant(Constant::new("B", 0)),
        );
        newer.insert(Structure::new("Bar").with_constant(Constant::new("C", 0)));

        newer.limit_constants(&older);

        let names: Vec<&str> = newer
            .get("Foo")
            .expect("Foo")
            .constants
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["A"]);
        assert!(newer.get("Bar").expect("Bar").constants.is_empty());
    }

    #[test]
    fn to_blob_is_sorted() {
        let mut superset = Superset::new();
        superset.fold(
            "a",
            &[
                Structure::new("Zed"),
                foo(vec![Field::new("b", "U8", 1), Field::new("a", "U8", 0)]),
            ],
        );
        let blob = superset.to_blob();
        let names: Vec<&str> = blob.structure_names().collect();
        assert_eq!(names, vec!["Foo", "Zed"]);
        assert_eq!(blob.structures[0].fields[0].name, "a");
    }
}
