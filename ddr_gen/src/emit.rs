/* Accessor emission

   Turns one structure of the superset into the text sections of a Rust
   accessor module: imports, the pointer type declaration, constructors and
   one accessor unit per field. Each field accessor is followed by an `EA`
   routine returning the address of the field slot. Assembling the sections
   and preserving user regions is left to the merge step. */

use crate::classify::{ArrayComponent, Category, NumericPolicy, SimpleType, SrpWidth, TypeClassifier};
use crate::error::GenError;
use crate::helpers::{escape_rust_keyword, legacy_offset_name};
use ddr_types::{Field, Structure};
use std::fmt::Write;
use tracing::{debug, warn};

/* Base accessor type for structures without a super structure */
pub const STRUCTURE_POINTER: &str = "StructurePointer";

/* Default path of the runtime crate the generated code links against */
pub const DEFAULT_RUNTIME_CRATE: &str = "ddr_runtime";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetNaming {
    /* Strip a trailing `_v<digits>` from the field name */
    Legacy,
    /* Use the field name verbatim */
    #[default]
    Current,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    pub offset_naming: OffsetNaming,
    /* Memoize one accessor per address */
    pub cache_class: bool,
    /* Memoize each decoded field value */
    pub cache_fields: bool,
    pub numeric: NumericPolicy,
    /* Hand-written regions are carried over between generations */
    pub user_code: bool,
    pub runtime_crate: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            offset_naming: OffsetNaming::Current,
            cache_class: false,
            cache_fields: false,
            numeric: NumericPolicy::Exact,
            user_code: true,
            runtime_crate: DEFAULT_RUNTIME_CRATE.to_string(),
        }
    }
}

impl EmitOptions {
    /* Same options with per-structure cache flags */
    pub fn with_cache(&self, cache_class: bool, cache_fields: bool) -> Self {
        Self {
            cache_class,
            cache_fields,
            ..self.clone()
        }
    }

    fn offset_name(&self, field: &Field) -> String {
        match self.offset_naming {
            OffsetNaming::Legacy => legacy_offset_name(&field.name),
            OffsetNaming::Current => field.name.clone(),
        }
    }
}

/* A memoized value slot added to the pointer struct */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSlot {
    pub name: String,
    pub value_type: String,
}

/* Generated text for one field: its accessor and `EA` companion */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorUnit {
    pub field: String,
    pub category: Category,
    pub text: String,
    pub cache_slots: Vec<CacheSlot>,
}

/// Generated sections of one accessor module, in assembly order.
#[derive(Debug)]
pub struct EmittedStructure {
    pub structure: String,
    /* Type (and file stem) of the generated accessor */
    pub type_name: String,
    /* Build-flag modules carry no user regions */
    pub user_regions: bool,
    pub header: String,
    pub imports: String,
    /* Everything from the type declaration up to the user code region */
    pub declaration: String,
    /* Constructors and cache support after the user code region */
    pub support: String,
    pub units: Vec<AccessorUnit>,
    pub footer: String,
    /* Per-field problems; the affected fields have no unit */
    pub diagnostics: Vec<GenError>,
}

impl EmittedStructure {
    pub fn unit(&self, field: &str) -> Option<&AccessorUnit> {
        self.units.iter().find(|u| u.field == field)
    }
}

/* Anonymous fields (e.g. `#1` on some compilers) are never emitted */
pub fn is_excluded(structure: &Structure, field: &Field) -> bool {
    format!("{}.{}", structure.pointer_name(), field.name).contains('#')
}

fn header() -> String {
    let mut out = String::new();
    out.push_str("// Generated by ddr-gen from the structure superset. Only the USER IMPORTS and\n");
    out.push_str("// USER CODE regions survive regeneration.\n");
    out.push_str("#![allow(non_snake_case, unused_imports)]\n");
    out
}

/// Emit the accessor module sections for a structure.
pub fn emit(structure: &Structure, classifier: &TypeClassifier, options: &EmitOptions) -> EmittedStructure {
    let pointer_name = structure.pointer_name();
    let mut units = Vec::new();
    let mut diagnostics = Vec::new();

    for field in structure.sorted_fields() {
        if is_excluded(structure, field) {
            continue;
        }
        if field.is_missing_required() {
            diagnostics.push(GenError::MissingRequiredField {
                structure: structure.name.clone(),
                field: field.name.clone(),
                declared_type: field.declared_type.clone(),
            });
            continue;
        }

        let category = classifier.classify(&field.declared_type);
        debug!(
            "{}.{}: `{}` -> {:?}",
            structure.name, field.name, field.declared_type, category
        );
        if let Category::Unclassified { reason, .. } = &category {
            diagnostics.push(GenError::UnclassifiedType {
                structure: structure.name.clone(),
                field: field.name.clone(),
                declared_type: field.declared_type.clone(),
                reason: *reason,
            });
            continue;
        }

        if field.name.is_empty() && !matches!(category, Category::Bitfield { .. }) {
            warn!(
                "{}: skipping unnamed field of type `{}`",
                structure.name, field.declared_type
            );
            continue;
        }

        let mut writer = UnitWriter::new(structure, field, options);
        writer.write(&category);
        units.push(AccessorUnit {
            field: field.name.clone(),
            category,
            text: writer.out,
            cache_slots: writer.slots,
        });
    }

    let slots: Vec<&CacheSlot> = units.iter().flat_map(|u| u.cache_slots.iter()).collect();

    EmittedStructure {
        structure: structure.name.clone(),
        type_name: pointer_name.clone(),
        user_regions: true,
        header: header(),
        imports: imports(structure, options),
        declaration: declaration(structure, &slots, options),
        support: support(structure, &slots, options),
        units,
        footer: "}\n".to_string(),
        diagnostics,
    }
}

fn imports(structure: &Structure, options: &EmitOptions) -> String {
    let rt = &options.runtime_crate;
    let mut out = String::new();
    writeln!(out, "use {}::pointer::*;", rt).ok();
    writeln!(out, "use {}::structure::*;", rt).ok();
    writeln!(out, "use {}::types::*;", rt).ok();
    if structure.fields.is_empty() {
        writeln!(out, "use {}::AbstractPointer;", rt).ok();
    } else {
        writeln!(out, "use {}::{{AbstractPointer, DdrError, DdrResult}};", rt).ok();
    }
    if options.cache_fields {
        out.push_str("use std::cell::OnceCell;\n");
    }
    if options.cache_class {
        out.push_str("use std::cell::RefCell;\n");
        out.push_str("use std::collections::HashMap;\n");
    }
    out.push_str("use std::ops::Deref;\n");
    out.push_str("use super::*;\n");
    out
}

fn super_pointer(structure: &Structure) -> String {
    match structure.super_name() {
        Some(name) => format!("{}Pointer", name),
        None => STRUCTURE_POINTER.to_string(),
    }
}

fn declaration(structure: &Structure, slots: &[&CacheSlot], options: &EmitOptions) -> String {
    let name = structure.pointer_name();
    let base = super_pointer(structure);
    let mut out = String::new();

    if options.cache_class {
        out.push_str("thread_local! {\n");
        out.push_str("    // Class Cache\n");
        writeln!(
            out,
            "    static CLASS_CACHE: RefCell<HashMap<u64, {}>> = RefCell::new(HashMap::new());",
            name
        )
        .ok();
        out.push_str("}\n\n");
    }

    writeln!(out, "/// Accessor for `{}` structures in a memory image.", structure.name).ok();
    out.push_str("#[derive(Clone, Debug)]\n");
    writeln!(out, "pub struct {} {{", name).ok();
    writeln!(out, "    base: {},", base).ok();
    for slot in slots {
        writeln!(out, "    {}: OnceCell<{}>,", slot.name, slot.value_type).ok();
    }
    out.push_str("}\n\n");

    writeln!(out, "impl Deref for {} {{", name).ok();
    writeln!(out, "    type Target = {};", base).ok();
    out.push('\n');
    writeln!(out, "    fn deref(&self) -> &{} {{", base).ok();
    out.push_str("        &self.base\n");
    out.push_str("    }\n");
    out.push_str("}\n\n");

    writeln!(out, "impl {} {{", name).ok();
    /* With user regions the flags live in the user code instead */
    if !options.user_code {
        if options.cache_class {
            out.push_str("    const CACHE_CLASS: bool = true;\n");
        }
        if options.cache_fields {
            out.push_str("    const CACHE_FIELDS: bool = true;\n");
        }
    }
    out
}

fn support(structure: &Structure, slots: &[&CacheSlot], options: &EmitOptions) -> String {
    let base = super_pointer(structure);
    let size = format!("{}::SIZEOF()", structure.name);
    let mut out = String::new();

    out.push_str("    // Do not call this constructor. Use cast instead.\n");
    out.push_str("    #[doc(hidden)]\n");
    out.push_str("    pub fn new(address: u64) -> Self {\n");
    out.push_str("        Self {\n");
    writeln!(out, "            base: {}::new(address),", base).ok();
    for slot in slots {
        writeln!(out, "            {}: OnceCell::new(),", slot.name).ok();
    }
    out.push_str("        }\n");
    out.push_str("    }\n\n");

    out.push_str("    pub fn null() -> Self {\n");
    out.push_str("        Self::new(0)\n");
    out.push_str("    }\n\n");

    out.push_str("    pub fn cast_from<P: AbstractPointer>(pointer: &P) -> Self {\n");
    out.push_str("        Self::cast(pointer.address())\n");
    out.push_str("    }\n\n");

    out.push_str("    pub fn cast_udata(udata: UDATA) -> Self {\n");
    out.push_str("        Self::cast(udata.value())\n");
    out.push_str("    }\n\n");

    out.push_str("    pub fn cast(address: u64) -> Self {\n");
    out.push_str("        if address == 0 {\n");
    out.push_str("            return Self::null();\n");
    out.push_str("        }\n\n");
    if options.cache_class {
        out.push_str("        if Self::CACHE_CLASS {\n");
        out.push_str("            if let Some(cached) = Self::check_cache(address) {\n");
        out.push_str("                return cached;\n");
        out.push_str("            }\n");
        out.push_str("            let created = Self::new(address);\n");
        out.push_str("            Self::set_cache(address, created.clone());\n");
        out.push_str("            return created;\n");
        out.push_str("        }\n");
    }
    out.push_str("        Self::new(address)\n");
    out.push_str("    }\n\n");

    let arithmetic = [
        ("add", "count", format!("self.address().wrapping_add({}.wrapping_mul(count))", size)),
        ("add_offset", "offset", "self.address().wrapping_add(offset)".to_string()),
        ("sub", "count", format!("self.address().wrapping_sub({}.wrapping_mul(count))", size)),
        ("sub_offset", "offset", "self.address().wrapping_sub(offset)".to_string()),
        ("untag", "mask", "self.address() & !mask".to_string()),
    ];
    for (method, arg, expr) in arithmetic {
        writeln!(out, "    pub fn {}(&self, {}: u64) -> Self {{", method, arg).ok();
        writeln!(out, "        Self::cast({})", expr).ok();
        out.push_str("    }\n\n");
    }

    out.push_str("    pub fn untag_aligned(&self) -> Self {\n");
    out.push_str("        self.untag(UDATA::SIZEOF() - 1)\n");
    out.push_str("    }\n\n");

    out.push_str("    pub fn size_of_base_type(&self) -> u64 {\n");
    writeln!(out, "        {}", size).ok();
    out.push_str("    }\n\n");

    if options.cache_class {
        out.push_str("    // Caching support methods\n\n");
        out.push_str("    fn set_cache(address: u64, pointer: Self) {\n");
        out.push_str("        CLASS_CACHE.with(|cache| {\n");
        out.push_str("            cache.borrow_mut().insert(address, pointer);\n");
        out.push_str("        });\n");
        out.push_str("    }\n\n");
        out.push_str("    fn check_cache(address: u64) -> Option<Self> {\n");
        out.push_str("        CLASS_CACHE.with(|cache| cache.borrow().get(&address).cloned())\n");
        out.push_str("    }\n\n");
    }

    out.push_str("    // Implementation methods\n\n");
    out
}

/* One generated routine: statements computing a value of `return_type` */
struct Routine {
    name: String,
    return_type: String,
    null_check: bool,
    statements: Vec<String>,
    value: String,
    cacheable: bool,
}

struct UnitWriter<'a> {
    structure: &'a Structure,
    field: &'a Field,
    options: &'a EmitOptions,
    out: String,
    slots: Vec<CacheSlot>,
}

impl<'a> UnitWriter<'a> {
    fn new(structure: &'a Structure, field: &'a Field, options: &'a EmitOptions) -> Self {
        Self {
            structure,
            field,
            options,
            out: String::new(),
            slots: Vec::new(),
        }
    }

    fn getter(&self) -> String {
        escape_rust_keyword(&self.field.name)
    }

    /* `Foo::_barOffset_()` */
    fn offset(&self) -> String {
        format!("{}::_{}Offset_()", self.structure.name, self.options.offset_name(self.field))
    }

    fn slot_address(&self) -> String {
        format!("self.address().wrapping_add({})", self.offset())
    }

    fn accessor(&self, return_type: impl Into<String>, value: impl Into<String>) -> Routine {
        Routine {
            name: self.getter(),
            return_type: return_type.into(),
            null_check: false,
            statements: Vec::new(),
            value: value.into(),
            cacheable: true,
        }
    }

    fn write(&mut self, category: &Category) {
        /* Anonymous bit-fields pad the layout and have nothing to read */
        if self.field.name.is_empty() {
            self.write_placeholder();
            return;
        }

        let offset = self.offset();
        let policy = self.options.numeric;

        match category {
            Category::Structure(name) => {
                let target = format!("{}Pointer", name);
                self.write_embedded(&target);
            }
            Category::Void => self.write_embedded("VoidPointer"),
            Category::StructurePointer(name) => {
                let target = format!("{}Pointer", name);
                let mut routine = self.accessor(&target, format!("{}::cast(pointer)", target));
                routine
                    .statements
                    .push(format!("let pointer = self.pointer_at_offset({})?;", offset));
                self.write_routine(routine);
                self.write_ea("PointerPointer");
            }
            Category::Pointer(pointer_type) => {
                let return_type = policy.pointer(pointer_type);
                let value = format!("{}::cast(self.pointer_at_offset({})?).into()", pointer_type, offset);
                let routine = self.accessor(return_type, value);
                self.write_routine(routine);
                self.write_ea("PointerPointer");
            }
            Category::Array(component) => {
                /* Arrays only expose the address of their first element */
                let pointer_type = policy.pointer(&component.pointer_type());
                match component {
                    ArrayComponent::Enum(name) => self.write_enum_ea(&pointer_type, name),
                    _ => self.write_ea(&pointer_type),
                }
            }
            Category::SelfRelative { width, target } => self.write_srp(*width, target),
            Category::SelfRelativePointer(width) => {
                let pointer_type = width.pointer_type();
                let value = format!("{}::cast(self.pointer_at_offset({})?)", pointer_type, offset);
                let routine = self.accessor(pointer_type, value);
                self.write_routine(routine);
                self.write_ea("PointerPointer");
            }
            Category::ObjectReference => {
                let value = format!("self.object_reference_at_offset({})?", offset);
                let routine = self.accessor("J9ObjectPointer", value);
                self.write_routine(routine);
                self.write_ea("ObjectReferencePointer");
            }
            Category::ObjectReferencePointer => {
                let mut routine = self.accessor(
                    "ObjectReferencePointer",
                    "ObjectReferencePointer::cast(pointer)",
                );
                routine
                    .statements
                    .push(format!("let pointer = self.pointer_at_offset({})?;", offset));
                self.write_routine(routine);
                self.write_ea("PointerPointer");
            }
            Category::ObjectClass => {
                let value = format!("self.object_class_at_offset({})?", offset);
                let routine = self.accessor("J9ClassPointer", value);
                self.write_routine(routine);
                self.write_ea("ObjectClassReferencePointer");
            }
            Category::ObjectClassPointer => {
                self.write_stub("ObjectClassReferencePointer", "j9objectclass_t*");
                self.write_ea("PointerPointer");
            }
            Category::ObjectMonitor => {
                let value = format!("self.object_monitor_at_offset({})?", offset);
                let routine = self.accessor("J9ObjectMonitorPointer", value);
                self.write_routine(routine);
                self.write_ea("ObjectMonitorReferencePointer");
            }
            Category::ObjectMonitorPointer => {
                self.write_stub("ObjectMonitorReferencePointer", "j9objectmonitor_t*");
                self.write_ea("PointerPointer");
            }
            Category::Bool => {
                let routine = self.accessor("bool", format!("self.bool_at_offset({})?", offset));
                self.write_routine(routine);
                self.write_ea("BoolPointer");
            }
            Category::Double => {
                let routine = self.accessor("f64", format!("self.f64_at_offset({})?", offset));
                self.write_routine(routine);
                self.write_ea("DoublePointer");
            }
            Category::Float => {
                let routine = self.accessor("f32", format!("self.f32_at_offset({})?", offset));
                self.write_routine(routine);
                self.write_ea("FloatPointer");
            }
            Category::Enum(name) => {
                let mut routine = self.accessor("i64", "raw");
                routine.statements = enum_read(name, &offset);
                self.write_routine(routine);
                self.write_enum_ea("EnumPointer", name);
            }
            Category::EnumPointer(name) => {
                let value = format!(
                    "EnumPointer::cast_sized(self.pointer_at_offset({})?, {}::SIZEOF())",
                    offset, name
                );
                let routine = self.accessor("EnumPointer", value);
                self.write_routine(routine);
                self.write_ea("PointerPointer");
            }
            Category::Simple(simple) => self.write_simple(*simple, policy),
            Category::Bitfield { base, .. } => self.write_bitfield(base),
            Category::Unclassified { .. } => {}
        }
    }

    fn write_placeholder(&mut self) {
        writeln!(self.out, "    // {} {}", self.field.declared_type, self.field.name).ok();
        self.out.push('\n');
    }

    /* Structure embedded by value: its address is the slot address */
    fn write_embedded(&mut self, target: &str) {
        let mut routine = self.accessor(target, format!("{}::cast({})", target, self.slot_address()));
        routine.null_check = true;
        self.write_routine(routine);
        self.write_ea("PointerPointer");
    }

    fn write_simple(&mut self, simple: SimpleType, policy: NumericPolicy) {
        let return_type = policy.simple(simple).name();
        let value = format!(
            "{}::new(self.{}_at_offset({})?).into()",
            simple.name(),
            simple.reader(),
            self.offset()
        );
        let routine = self.accessor(return_type, value);
        self.write_routine(routine);
        self.write_ea(&format!("{}Pointer", return_type));
    }

    fn write_bitfield(&mut self, base: &str) {
        let value_type = SimpleType::from_spelling(base)
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| crate::classify::remove_type_tags(base));
        let name = &self.field.name;
        let value = format!(
            "self.bitfield::<{}>({}::_{}_s_(), {}::_{}_b_())?",
            value_type, self.structure.name, name, self.structure.name, name
        );
        let routine = self.accessor(value_type.clone(), value);
        self.write_routine(routine);
        self.write_ea(&format!("{}Pointer", value_type));
    }

    fn write_srp(&mut self, width: SrpWidth, target: &str) {
        let offset = self.offset();
        let read = match width {
            SrpWidth::Narrow => format!("i64::from(self.i32_at_offset({})?)", offset),
            SrpWidth::Wide => format!("self.pointer_at_offset({})? as i64", offset),
        };
        let mut routine = self.accessor(
            target,
            format!(
                "{}::cast(self.address().wrapping_add({}).wrapping_add_signed(next_address))",
                target, offset
            ),
        );
        routine.null_check = true;
        routine.statements = vec![
            format!("let next_address = {};", read),
            "if next_address == 0 {".to_string(),
            format!("    return Ok({}::null());", target),
            "}".to_string(),
        ];
        self.write_routine(routine);
        self.write_ea(width.pointer_type());
    }

    /* Unimplemented access kept as an explicit stub returning null */
    fn write_stub(&mut self, return_type: &str, spelling: &str) {
        let routine = Routine {
            name: self.getter(),
            return_type: return_type.to_string(),
            null_check: false,
            statements: vec![format!("// {} method goes here", spelling)],
            value: format!("{}::null()", return_type),
            cacheable: false,
        };
        self.write_routine(routine);
    }

    fn write_ea(&mut self, return_type: &str) {
        let routine = Routine {
            name: format!("{}EA", self.field.name),
            return_type: return_type.to_string(),
            null_check: true,
            statements: Vec::new(),
            value: format!("{}::cast({})", return_type, self.slot_address()),
            cacheable: true,
        };
        self.write_routine(routine);
    }

    fn write_enum_ea(&mut self, return_type: &str, enum_name: &str) {
        let routine = Routine {
            name: format!("{}EA", self.field.name),
            return_type: return_type.to_string(),
            null_check: true,
            statements: Vec::new(),
            value: format!(
                "{}::cast_sized({}, {}::SIZEOF())",
                return_type,
                self.slot_address(),
                enum_name
            ),
            cacheable: true,
        };
        self.write_routine(routine);
    }

    fn write_routine(&mut self, routine: Routine) {
        let cached = self.options.cache_fields && routine.cacheable;
        let slot_name = format!("{}_cache", routine.name.trim_start_matches("r#"));

        writeln!(self.out, "    // {} {}", self.field.declared_type, self.field.name).ok();
        writeln!(
            self.out,
            "    pub fn {}(&self) -> DdrResult<{}> {{",
            routine.name, routine.return_type
        )
        .ok();

        if routine.null_check {
            self.out.push_str("        if self.address() == 0 {\n");
            self.out.push_str("            return Err(DdrError::NullPointerDereference);\n");
            self.out.push_str("        }\n\n");
        }

        if cached {
            self.out.push_str("        if Self::CACHE_FIELDS {\n");
            writeln!(self.out, "            if let Some(value) = self.{}.get() {{", slot_name).ok();
            self.out.push_str("                return Ok(value.clone());\n");
            self.out.push_str("            }\n");
            self.out.push_str("        }\n");
        }

        for statement in &routine.statements {
            writeln!(self.out, "        {}", statement).ok();
        }

        if cached {
            writeln!(
                self.out,
                "        let value: {} = {};",
                routine.return_type, routine.value
            )
            .ok();
            self.out.push_str("        if Self::CACHE_FIELDS {\n");
            writeln!(self.out, "            let _ = self.{}.set(value.clone());", slot_name).ok();
            self.out.push_str("        }\n");
            self.out.push_str("        Ok(value)\n");
            self.slots.push(CacheSlot {
                name: slot_name,
                value_type: routine.return_type.clone(),
            });
        } else {
            writeln!(self.out, "        Ok({})", routine.value).ok();
        }

        self.out.push_str("    }\n\n");
    }
}

/* Enums are read at whatever width the image reports for them */
fn enum_read(enum_name: &str, offset: &str) -> Vec<String> {
    let mut lines = vec![format!("let raw = match {}::SIZEOF() {{", enum_name)];
    for (size, reader) in [(1, "i8"), (2, "i16"), (4, "i32"), (8, "i64")] {
        if reader == "i64" {
            lines.push(format!("    {} => self.{}_at_offset({})?,", size, reader, offset));
        } else {
            lines.push(format!(
                "    {} => i64::from(self.{}_at_offset({})?),",
                size, reader, offset
            ));
        }
    }
    lines.push("    _ => return Err(DdrError::corrupt(\"Unexpected ENUM size in core file\")),".to_string());
    lines.push("};".to_string());
    lines
}

/// Constants-only module for a build-flag structure: one boolean per
/// constant, false unless the image defines it as non-zero.
pub fn emit_build_flags(structure: &Structure, options: &EmitOptions) -> EmittedStructure {
    let rt = &options.runtime_crate;
    let name = &structure.name;
    let constants = structure.sorted_constants();

    let mut imports = String::new();
    writeln!(imports, "use {}::{{ConstantSource, DdrResult}};", rt).ok();
    imports.push_str("use std::collections::HashMap;\n");

    let mut out = String::new();
    writeln!(out, "/// Build flags recorded in `{}`.", name).ok();
    out.push_str("#[derive(Clone, Debug, Default, PartialEq, Eq)]\n");
    writeln!(out, "pub struct {} {{", name).ok();
    for constant in &constants {
        writeln!(out, "    pub {}: bool,", escape_rust_keyword(&constant.name)).ok();
    }
    out.push_str("}\n\n");

    writeln!(out, "impl {} {{", name).ok();
    out.push_str("    pub fn load(image: &dyn ConstantSource) -> DdrResult<Self> {\n");
    out.push_str("        let mut defaultValues: HashMap<&str, bool> = HashMap::new();\n\n");
    out.push_str("        // Edit default values here\n");
    for constant in &constants {
        writeln!(out, "        defaultValues.insert(\"{}\", false);", constant.name).ok();
    }
    out.push('\n');
    out.push_str("        // Overwrite default value with real value if it exists.\n");
    writeln!(out, "        for (name, value) in image.constants(\"{}\")? {{", name).ok();
    out.push_str("            if let Some(slot) = defaultValues.get_mut(name.as_str()) {\n");
    out.push_str("                *slot = value != 0;\n");
    out.push_str("            }\n");
    out.push_str("        }\n\n");
    out.push_str("        Ok(Self {\n");
    for constant in &constants {
        writeln!(
            out,
            "            {}: defaultValues[\"{}\"],",
            escape_rust_keyword(&constant.name),
            constant.name
        )
        .ok();
    }
    out.push_str("        })\n");
    out.push_str("    }\n");

    EmittedStructure {
        structure: name.clone(),
        type_name: name.clone(),
        user_regions: false,
        header: header(),
        imports,
        declaration: out,
        support: String::new(),
        units: Vec::new(),
        footer: "}\n".to_string(),
        diagnostics: Vec::new(),
    }
}
