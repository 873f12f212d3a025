use serde_derive::{Deserialize, Serialize};
use std::cmp::Ordering;

fn default_present() -> bool {
    true
}

/// A symbolic constant attached to a structure, e.g. `SIZEOF` or a build flag.
///
/// In a merged superset the value is only a placeholder; the real value is
/// resolved from the memory image at load time.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Constant {
    pub name: String,
    #[serde(default)]
    pub value: i64,
}

impl Constant {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl PartialOrd for Constant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Constant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.value.cmp(&other.value))
    }
}

/// One field of a captured structure.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Field {
    pub name: String,
    /// Raw type spelling as captured, e.g. `struct J9Class *`, `U32` or `U32:4`.
    pub declared_type: String,
    #[serde(default)]
    pub offset: u64,
    /// Must exist in every accepted schema version.
    #[serde(default)]
    pub required: bool,
    /// Was actually found when this schema was captured.
    #[serde(default = "default_present")]
    pub present: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, offset: u64) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            offset,
            required: false,
            present: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn absent(mut self) -> Self {
        self.present = false;
        self
    }

    /* A required field that was not captured cannot be emitted */
    pub fn is_missing_required(&self) -> bool {
        self.required && !self.present
    }

    /* Two definitions of the same field are compatible when type and offset agree */
    pub fn same_layout(&self, other: &Field) -> bool {
        self.declared_type == other.declared_type && self.offset == other.offset
    }
}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Field {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.offset.cmp(&other.offset))
            .then_with(|| self.declared_type.cmp(&other.declared_type))
    }
}

/// A captured native structure layout.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Structure {
    pub name: String,
    /// Accessor type name; derived from `name` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer_name: Option<String>,
    /// Structure whose accessor this one extends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub constants: Vec<Constant>,
}

impl Structure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pointer_name: None,
            super_name: None,
            fields: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_constant(mut self, constant: Constant) -> Self {
        self.constants.push(constant);
        self
    }

    pub fn with_super(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    pub fn pointer_name(&self) -> String {
        match &self.pointer_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}Pointer", self.name),
        }
    }

    /// Super structure name, treating an empty string as no super structure.
    pub fn super_name(&self) -> Option<&str> {
        self.super_name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.constants.iter().find(|c| c.name == name)
    }

    pub fn sort(&mut self) {
        self.fields.sort();
        self.constants.sort();
    }

    /// Fields in emission order.
    pub fn sorted_fields(&self) -> Vec<&Field> {
        let mut fields: Vec<&Field> = self.fields.iter().collect();
        fields.sort();
        fields
    }

    pub fn sorted_constants(&self) -> Vec<&Constant> {
        let mut constants: Vec<&Constant> = self.constants.iter().collect();
        constants.sort();
        constants
    }
}
