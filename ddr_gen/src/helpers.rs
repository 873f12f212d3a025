/* Helper utilities for accessor code generation */

use regex::Regex;
use std::sync::LazyLock;

static OFFSET_VERSION_PATTERN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^(.+)_v\d+$").expect("valid offset pattern"));

/* Escape Rust keywords to valid identifiers */
pub fn escape_rust_keyword(name: &str) -> String {
  const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "static", "struct", "trait", "true",
    "type", "unsafe", "use", "where", "while", "async", "await", "dyn",
    "abstract", "become", "box", "do", "final", "macro", "override", "priv",
    "typeof", "unsized", "virtual", "yield", "try", "gen",
  ];

  /* These cannot be raw identifiers */
  const RESERVED: &[&str] = &["self", "Self", "super", "crate"];

  if RESERVED.contains(&name) {
    format!("{}_", name)
  } else if RUST_KEYWORDS.contains(&name) {
    format!("r#{}", name)
  } else {
    name.to_string()
  }
}

/* Offset symbol for a field; legacy captures drop a `_v<digits>` suffix */
pub fn legacy_offset_name(field_name: &str) -> String {
  match OFFSET_VERSION_PATTERN.captures(field_name) {
    Some(captures) => captures[1].to_string(),
    None => field_name.to_string(),
  }
}

/* Module (and file stem) for a generated accessor type */
pub fn module_name(type_name: &str) -> String {
  type_name.to_ascii_lowercase()
}
