/* Declared-type classification

   Maps the raw C type spelling captured for a field onto the closed set of
   categories the accessor emitter knows how to read. Classification only
   depends on the spelling, the set of known structure names and the numeric
   policy chosen by the caller. */

use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

static CONST_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\bconst\s+").expect("valid const pattern"));

static TYPE_TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\b(class|enum|struct)\s+").expect("valid tag pattern"));

/* Fixed-width and word-sized scalar types understood by the runtime */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    UDATA,
    IDATA,
}

impl SimpleType {
    pub fn name(self) -> &'static str {
        match self {
            SimpleType::U8 => "U8",
            SimpleType::U16 => "U16",
            SimpleType::U32 => "U32",
            SimpleType::U64 => "U64",
            SimpleType::I8 => "I8",
            SimpleType::I16 => "I16",
            SimpleType::I32 => "I32",
            SimpleType::I64 => "I64",
            SimpleType::UDATA => "UDATA",
            SimpleType::IDATA => "IDATA",
        }
    }

    /* Runtime reader method suffix, e.g. `u32` for `u32_at_offset` */
    pub fn reader(self) -> &'static str {
        match self {
            SimpleType::U8 => "u8",
            SimpleType::U16 => "u16",
            SimpleType::U32 => "u32",
            SimpleType::U64 => "u64",
            SimpleType::I8 => "i8",
            SimpleType::I16 => "i16",
            SimpleType::I32 => "i32",
            SimpleType::I64 => "i64",
            SimpleType::UDATA => "udata",
            SimpleType::IDATA => "idata",
        }
    }

    /* 32 and 64 bit widths collapse to the platform word type */
    pub fn generalized(self) -> Self {
        match self {
            SimpleType::I32 | SimpleType::I64 => SimpleType::IDATA,
            SimpleType::U32 | SimpleType::U64 => SimpleType::UDATA,
            other => other,
        }
    }

    /* Recognize both the runtime names and the common C spellings */
    pub fn from_spelling(spelling: &str) -> Option<Self> {
        let normalized = spelling.split_whitespace().collect::<Vec<_>>().join(" ");
        let simple = match normalized.as_str() {
            "U8" | "uint8_t" | "unsigned char" | "jbyte_unsigned" => SimpleType::U8,
            "U16" | "uint16_t" | "unsigned short" | "unsigned short int" | "jchar" => {
                SimpleType::U16
            }
            "U32" | "uint32_t" | "unsigned int" | "unsigned" => SimpleType::U32,
            "U64" | "uint64_t" | "unsigned long long" | "unsigned long long int" => {
                SimpleType::U64
            }
            "I8" | "int8_t" | "char" | "signed char" | "jbyte" => SimpleType::I8,
            "I16" | "int16_t" | "short" | "short int" | "signed short" | "jshort" => {
                SimpleType::I16
            }
            "I32" | "int32_t" | "int" | "signed int" | "signed" | "jint" => SimpleType::I32,
            "I64" | "int64_t" | "long long" | "long long int" | "signed long long" | "jlong" => {
                SimpleType::I64
            }
            "UDATA" | "size_t" | "uintptr_t" | "unsigned long" | "unsigned long int" => {
                SimpleType::UDATA
            }
            "IDATA" | "intptr_t" | "ssize_t" | "ptrdiff_t" | "long" | "long int"
            | "signed long" => SimpleType::IDATA,
            _ => return None,
        };
        Some(simple)
    }
}

impl fmt::Display for SimpleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/* Self-relative pointers store a signed displacement from their own slot */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SrpWidth {
    /* 4-byte displacement, `J9SRP` */
    Narrow,
    /* pointer-width displacement, `J9WSRP` */
    Wide,
}

impl SrpWidth {
    pub fn pointer_type(self) -> &'static str {
        match self {
            SrpWidth::Narrow => "SelfRelativePointer",
            SrpWidth::Wide => "WideSelfRelativePointer",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            SrpWidth::Narrow => "J9SRP",
            SrpWidth::Wide => "J9WSRP",
        }
    }
}

/* Element kinds an array field may have */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayComponent {
    Bool,
    Enum(String),
    Double,
    Float,
    /* Any pointer-like element: raw pointers, nested arrays, tagged object pointers */
    Pointer,
    Structure(String),
    ObjectReference,
    ObjectClass,
    ObjectMonitor,
    Simple(SimpleType),
}

impl ArrayComponent {
    /* Pointer type used to address the first element */
    pub fn pointer_type(&self) -> String {
        match self {
            ArrayComponent::Bool => "BoolPointer".to_string(),
            ArrayComponent::Enum(_) => "EnumPointer".to_string(),
            ArrayComponent::Double => "DoublePointer".to_string(),
            ArrayComponent::Float => "FloatPointer".to_string(),
            ArrayComponent::Pointer => "PointerPointer".to_string(),
            ArrayComponent::Structure(name) => format!("{}Pointer", name),
            ArrayComponent::ObjectReference => "ObjectReferencePointer".to_string(),
            ArrayComponent::ObjectClass => "ObjectClassReferencePointer".to_string(),
            ArrayComponent::ObjectMonitor => "ObjectMonitorReferencePointer".to_string(),
            ArrayComponent::Simple(simple) => format!("{}Pointer", simple.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnclassifiedReason {
    Empty,
    UnknownSpelling,
    UnsupportedArray,
    UnsupportedSelfRelativeTarget,
}

impl fmt::Display for UnclassifiedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnclassifiedReason::Empty => "empty type",
            UnclassifiedReason::UnknownSpelling => "unknown type spelling",
            UnclassifiedReason::UnsupportedArray => "unsupported array element type",
            UnclassifiedReason::UnsupportedSelfRelativeTarget => {
                "unsupported self-relative pointer target"
            }
        };
        f.write_str(text)
    }
}

/* Semantic category of a declared type */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Void,
    Bool,
    Float,
    Double,
    Simple(SimpleType),
    Bitfield { base: String, width: u32 },
    Enum(String),
    EnumPointer(String),
    /* Embedded structure (by value) */
    Structure(String),
    StructurePointer(String),
    /* Any other pointer, carrying the runtime pointer type name */
    Pointer(String),
    Array(ArrayComponent),
    /* Self-relative pointer, carrying the pointer type of its target */
    SelfRelative { width: SrpWidth, target: String },
    SelfRelativePointer(SrpWidth),
    ObjectReference,
    ObjectReferencePointer,
    ObjectClass,
    ObjectClassPointer,
    ObjectMonitor,
    ObjectMonitorPointer,
    Unclassified { spelling: String, reason: UnclassifiedReason },
}

impl Category {
    fn unclassified(spelling: &str, reason: UnclassifiedReason) -> Self {
        Category::Unclassified {
            spelling: spelling.to_string(),
            reason,
        }
    }
}

/* Whether accessor return types keep exact integer widths */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericPolicy {
    #[default]
    Exact,
    /* I32/I64 report as IDATA and U32/U64 as UDATA */
    Generalized,
}

impl NumericPolicy {
    pub fn simple(self, simple: SimpleType) -> SimpleType {
        match self {
            NumericPolicy::Exact => simple,
            NumericPolicy::Generalized => simple.generalized(),
        }
    }

    /* Generalize a runtime pointer type name such as `U32Pointer` */
    pub fn pointer(self, pointer_type: &str) -> String {
        if self == NumericPolicy::Generalized {
            if let Some(simple) = pointer_type
                .strip_suffix("Pointer")
                .and_then(SimpleType::from_spelling)
            {
                return format!("{}Pointer", simple.generalized().name());
            }
        }
        pointer_type.to_string()
    }
}

pub struct TypeClassifier {
    structures: HashSet<String>,
    policy: NumericPolicy,
}

impl TypeClassifier {
    pub fn new<I, S>(structures: I, policy: NumericPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            structures: structures.into_iter().map(Into::into).collect(),
            policy,
        }
    }

    pub fn policy(&self) -> NumericPolicy {
        self.policy
    }

    pub fn is_structure(&self, name: &str) -> bool {
        self.structures.contains(name)
    }

    /// Classify a declared type spelling. Never fails: unknown spellings
    /// produce [`Category::Unclassified`].
    pub fn classify(&self, declared_type: &str) -> Category {
        let spelling = declared_type.trim();
        if spelling.is_empty() {
            return Category::unclassified(declared_type, UnclassifiedReason::Empty);
        }

        /* Bit-fields first: `U32:4` */
        if let Some((base, width)) = split_bitfield(spelling) {
            return Category::Bitfield {
                base: base.to_string(),
                width,
            };
        }

        if spelling.ends_with(']') {
            return self.classify_array(spelling);
        }

        let spelling = CONST_PATTERN.replace_all(spelling, " ");
        let spelling = spelling.trim();

        let stars = top_level_stars(spelling);
        match stars.first() {
            Some(&first_star) => self.classify_pointer(spelling, first_star, stars.len()),
            None => self.classify_value(spelling),
        }
    }

    fn classify_array(&self, spelling: &str) -> Category {
        let Some(open) = spelling.rfind('[') else {
            return Category::unclassified(spelling, UnclassifiedReason::UnknownSpelling);
        };
        let component = spelling[..open].trim();

        let element = match self.classify(component) {
            Category::Bool => ArrayComponent::Bool,
            Category::Enum(name) => ArrayComponent::Enum(name),
            Category::Double => ArrayComponent::Double,
            Category::Float => ArrayComponent::Float,
            Category::Pointer(_)
            | Category::Array(_)
            | Category::StructurePointer(_)
            | Category::ObjectReferencePointer
            | Category::ObjectClassPointer
            | Category::ObjectMonitorPointer => ArrayComponent::Pointer,
            Category::Structure(name) => ArrayComponent::Structure(name),
            Category::ObjectReference => ArrayComponent::ObjectReference,
            Category::ObjectClass => ArrayComponent::ObjectClass,
            Category::ObjectMonitor => ArrayComponent::ObjectMonitor,
            Category::Simple(simple) => ArrayComponent::Simple(simple),
            Category::Unclassified { reason, .. } => {
                return Category::unclassified(spelling, reason);
            }
            Category::Void
            | Category::Bitfield { .. }
            | Category::EnumPointer(_)
            | Category::SelfRelative { .. }
            | Category::SelfRelativePointer(_) => {
                return Category::unclassified(spelling, UnclassifiedReason::UnsupportedArray);
            }
        };
        Category::Array(element)
    }

    fn classify_pointer(&self, spelling: &str, first_star: usize, depth: usize) -> Category {
        /* Two or more levels of indirection look the same */
        if depth > 1 {
            return Category::Pointer("PointerPointer".to_string());
        }

        let pointee = spelling[..first_star].trim();
        if let Some(width) = srp_width(pointee) {
            return Category::SelfRelativePointer(width);
        }

        match pointee {
            "void" => return Category::Pointer("VoidPointer".to_string()),
            "bool" | "jboolean" => return Category::Pointer("BoolPointer".to_string()),
            "double" => return Category::Pointer("DoublePointer".to_string()),
            "float" => return Category::Pointer("FloatPointer".to_string()),
            "fj9object_t" => return Category::ObjectReferencePointer,
            "j9objectclass_t" => return Category::ObjectClassPointer,
            "j9objectmonitor_t" => return Category::ObjectMonitorPointer,
            _ => {}
        }

        if let Some(name) = strip_tag(pointee, "enum") {
            return Category::EnumPointer(name.to_string());
        }
        if let Some(name) = strip_tag(pointee, "struct").or_else(|| strip_tag(pointee, "class")) {
            return Category::StructurePointer(name.to_string());
        }
        if self.is_structure(pointee) {
            return Category::StructurePointer(pointee.to_string());
        }
        if let Some(simple) = SimpleType::from_spelling(pointee) {
            return Category::Pointer(format!("{}Pointer", simple.name()));
        }

        let name = remove_type_tags(pointee);
        if is_identifier(&name) {
            Category::Pointer(format!("{}Pointer", name))
        } else {
            Category::unclassified(spelling, UnclassifiedReason::UnknownSpelling)
        }
    }

    fn classify_value(&self, spelling: &str) -> Category {
        if let Some(width) = srp_width(spelling) {
            return self.classify_srp(spelling, width);
        }

        match spelling {
            "void" => return Category::Void,
            "bool" | "jboolean" => return Category::Bool,
            "float" => return Category::Float,
            "double" => return Category::Double,
            "fj9object_t" => return Category::ObjectReference,
            "j9objectclass_t" => return Category::ObjectClass,
            "j9objectmonitor_t" => return Category::ObjectMonitor,
            _ => {}
        }

        if let Some(simple) = SimpleType::from_spelling(spelling) {
            return Category::Simple(simple);
        }
        if let Some(name) = strip_tag(spelling, "enum") {
            return Category::Enum(name.to_string());
        }
        if let Some(name) = strip_tag(spelling, "struct").or_else(|| strip_tag(spelling, "class")) {
            return Category::Structure(name.to_string());
        }
        if self.is_structure(spelling) {
            return Category::Structure(spelling.to_string());
        }

        Category::unclassified(spelling, UnclassifiedReason::UnknownSpelling)
    }

    /* `J9SRP(T)` / `J9WSRP(T)`; a missing or empty `T` means void */
    fn classify_srp(&self, spelling: &str, width: SrpWidth) -> Category {
        let rest = spelling[width.prefix().len()..].trim();
        let referenced = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("void");

        let target = match self.classify(referenced) {
            Category::Structure(name) => format!("{}Pointer", name),
            Category::Void => "VoidPointer".to_string(),
            Category::SelfRelative { width, .. } => width.pointer_type().to_string(),
            Category::Simple(simple) => format!("{}Pointer", simple.name()),
            _ => {
                return Category::unclassified(
                    spelling,
                    UnclassifiedReason::UnsupportedSelfRelativeTarget,
                );
            }
        };
        Category::SelfRelative { width, target }
    }
}

/* `<base>:<width>` with a decimal width */
fn split_bitfield(spelling: &str) -> Option<(&str, u32)> {
    let (base, width) = spelling.rsplit_once(':')?;
    let base = base.trim();
    let width = width.trim();
    if base.is_empty() || base.ends_with(':') || width.is_empty() {
        return None;
    }
    if !width.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    width.parse().ok().map(|w| (base, w))
}

/* Positions of `*` outside any parentheses, so `J9SRP(struct Foo *)` is not a pointer */
fn top_level_stars(spelling: &str) -> Vec<usize> {
    let mut depth = 0usize;
    let mut stars = Vec::new();
    for (index, c) in spelling.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '*' if depth == 0 => stars.push(index),
            _ => {}
        }
    }
    stars
}

fn srp_width(spelling: &str) -> Option<SrpWidth> {
    for width in [SrpWidth::Wide, SrpWidth::Narrow] {
        if let Some(rest) = spelling.strip_prefix(width.prefix()) {
            let rest = rest.trim_start();
            if rest.is_empty() || rest.starts_with('(') {
                return Some(width);
            }
        }
    }
    None
}

/* `struct Foo` -> `Foo` */
fn strip_tag<'a>(spelling: &'a str, tag: &str) -> Option<&'a str> {
    let rest = spelling.strip_prefix(tag)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let name = rest.trim();
    (!name.is_empty()).then_some(name)
}

pub fn remove_type_tags(spelling: &str) -> String {
    TYPE_TAG_PATTERN.replace_all(spelling, " ").trim().to_string()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> TypeClassifier {
        TypeClassifier::new(["J9Class", "Foo"], NumericPolicy::Exact)
    }

    #[test]
    fn classification_corpus() {
        let c = classifier();
        assert_eq!(c.classify("int"), Category::Simple(SimpleType::I32));
        assert_eq!(c.classify("U32"), Category::Simple(SimpleType::U32));
        assert_eq!(
            c.classify("struct Foo *"),
            Category::StructurePointer("Foo".to_string())
        );
        assert_eq!(
            c.classify("J9SRP(struct Foo)"),
            Category::SelfRelative {
                width: SrpWidth::Narrow,
                target: "FooPointer".to_string()
            }
        );
        assert_eq!(
            c.classify("x:4"),
            Category::Bitfield {
                base: "x".to_string(),
                width: 4
            }
        );
        assert_eq!(c.classify("struct Foo *[8]"), Category::Array(ArrayComponent::Pointer));
        assert_eq!(
            c.classify("void **"),
            Category::Pointer("PointerPointer".to_string())
        );
    }

    #[test]
    fn pointer_pointee_handling() {
        let c = classifier();
        assert_eq!(c.classify("const char *"), Category::Pointer("I8Pointer".to_string()));
        assert_eq!(c.classify("void *"), Category::Pointer("VoidPointer".to_string()));
        assert_eq!(c.classify("J9Class *"), Category::StructurePointer("J9Class".to_string()));
        assert_eq!(c.classify("enum State *"), Category::EnumPointer("State".to_string()));
        assert_eq!(c.classify("J9Thing *"), Category::Pointer("J9ThingPointer".to_string()));
        assert_eq!(c.classify("fj9object_t *"), Category::ObjectReferencePointer);
        assert_eq!(c.classify("j9objectclass_t *"), Category::ObjectClassPointer);
        assert_eq!(
            c.classify("J9WSRP(U8) *"),
            Category::SelfRelativePointer(SrpWidth::Wide)
        );
    }

    #[test]
    fn self_relative_targets() {
        let c = classifier();
        assert_eq!(
            c.classify("J9WSRP"),
            Category::SelfRelative {
                width: SrpWidth::Wide,
                target: "VoidPointer".to_string()
            }
        );
        assert_eq!(
            c.classify("J9SRP()"),
            Category::SelfRelative {
                width: SrpWidth::Narrow,
                target: "VoidPointer".to_string()
            }
        );
        assert_eq!(
            c.classify("J9SRP(U32)"),
            Category::SelfRelative {
                width: SrpWidth::Narrow,
                target: "U32Pointer".to_string()
            }
        );
        assert_eq!(
            c.classify("J9SRP(J9WSRP(Foo))"),
            Category::SelfRelative {
                width: SrpWidth::Narrow,
                target: "WideSelfRelativePointer".to_string()
            }
        );
        assert!(matches!(
            c.classify("J9SRP(double)"),
            Category::Unclassified {
                reason: UnclassifiedReason::UnsupportedSelfRelativeTarget,
                ..
            }
        ));
    }

    #[test]
    fn stars_inside_parentheses_do_not_make_a_pointer() {
        let c = classifier();
        assert!(matches!(
            c.classify("J9SRP(struct Foo *)"),
            Category::Unclassified {
                reason: UnclassifiedReason::UnsupportedSelfRelativeTarget,
                ..
            }
        ));
        assert_eq!(
            c.classify("J9SRP(struct Foo *) *"),
            Category::SelfRelativePointer(SrpWidth::Narrow)
        );
        assert_eq!(
            c.classify("J9WSRP(U8 *) **"),
            Category::Pointer("PointerPointer".to_string())
        );
    }

    #[test]
    fn array_components() {
        let c = classifier();
        assert_eq!(c.classify("bool[4]"), Category::Array(ArrayComponent::Bool));
        assert_eq!(
            c.classify("enum Mode[2]"),
            Category::Array(ArrayComponent::Enum("Mode".to_string()))
        );
        assert_eq!(
            c.classify("struct Foo[3]"),
            Category::Array(ArrayComponent::Structure("Foo".to_string()))
        );
        assert_eq!(c.classify("U8[16][4]"), Category::Array(ArrayComponent::Pointer));
        assert_eq!(c.classify("fj9object_t[2]"), Category::Array(ArrayComponent::ObjectReference));
        assert_eq!(
            c.classify("unsigned char[8]"),
            Category::Array(ArrayComponent::Simple(SimpleType::U8))
        );
        assert!(matches!(
            c.classify("J9SRP(Foo)[2]"),
            Category::Unclassified {
                reason: UnclassifiedReason::UnsupportedArray,
                ..
            }
        ));
    }

    #[test]
    fn value_categories() {
        let c = classifier();
        assert_eq!(c.classify("Foo"), Category::Structure("Foo".to_string()));
        assert_eq!(c.classify("class Bar"), Category::Structure("Bar".to_string()));
        assert_eq!(c.classify("enum Mode"), Category::Enum("Mode".to_string()));
        assert_eq!(c.classify("jboolean"), Category::Bool);
        assert_eq!(c.classify("double"), Category::Double);
        assert_eq!(c.classify("j9objectmonitor_t"), Category::ObjectMonitor);
        assert_eq!(c.classify("unsigned  long"), Category::Simple(SimpleType::UDATA));
        assert!(matches!(
            c.classify("Mystery"),
            Category::Unclassified {
                reason: UnclassifiedReason::UnknownSpelling,
                ..
            }
        ));
        assert!(matches!(
            c.classify("  "),
            Category::Unclassified {
                reason: UnclassifiedReason::Empty,
                ..
            }
        ));
    }

    #[test]
    fn generalized_policy_only_touches_wide_integers() {
        let policy = NumericPolicy::Generalized;
        assert_eq!(policy.simple(SimpleType::I64), SimpleType::IDATA);
        assert_eq!(policy.simple(SimpleType::U32), SimpleType::UDATA);
        assert_eq!(policy.simple(SimpleType::U16), SimpleType::U16);
        assert_eq!(policy.pointer("U64Pointer"), "UDATAPointer");
        assert_eq!(policy.pointer("FooPointer"), "FooPointer");
        assert_eq!(NumericPolicy::Exact.pointer("I32Pointer"), "I32Pointer");
    }
}
