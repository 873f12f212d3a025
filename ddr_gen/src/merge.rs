/* Regeneration with preserved user regions

   A generated module may contain two hand-written regions delimited by
   marker comments. They are captured from the previous artifact, spliced
   into the new one verbatim, and the artifact is only rewritten when its
   bytes change. */

use crate::emit::EmittedStructure;
use crate::error::GenError;
use std::path::Path;

pub const BEGIN_USER_IMPORTS: &str = "[BEGIN USER IMPORTS]";
pub const END_USER_IMPORTS: &str = "[END USER IMPORTS]";
pub const BEGIN_USER_CODE: &str = "[BEGIN USER CODE]";
pub const END_USER_CODE: &str = "[END USER CODE]";

const CACHE_CLASS_DECL: &str = "const CACHE_CLASS: bool";
const CACHE_FIELDS_DECL: &str = "const CACHE_FIELDS: bool";

/* Captured code longer than this is also written as a helper file */
const HELPER_MIN_LINES: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRegions {
    pub imports: Vec<String>,
    pub code: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheFlags {
    pub class: bool,
    pub fields: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InImports,
    InCode,
}

/// Capture the lines strictly between the user region markers of a
/// previously generated artifact. Markers are recognized anywhere on a line.
pub fn extract(previous: &str) -> UserRegions {
    let mut regions = UserRegions::default();
    let mut state = ScanState::Outside;

    for line in previous.lines() {
        state = match state {
            ScanState::Outside if line.contains(BEGIN_USER_IMPORTS) => ScanState::InImports,
            ScanState::Outside if line.contains(BEGIN_USER_CODE) => ScanState::InCode,
            ScanState::Outside => ScanState::Outside,
            ScanState::InImports if line.contains(END_USER_IMPORTS) => ScanState::Outside,
            ScanState::InImports => {
                regions.imports.push(line.to_string());
                ScanState::InImports
            }
            ScanState::InCode if line.contains(END_USER_CODE) => ScanState::Outside,
            ScanState::InCode => {
                regions.code.push(line.to_string());
                ScanState::InCode
            }
        };
    }

    regions
}

impl UserRegions {
    /// Recover caching flags declared in the captured code, e.g.
    /// `const CACHE_FIELDS: bool = true;`.
    pub fn cache_flags(&self) -> CacheFlags {
        let mut flags = CacheFlags::default();
        for line in &self.code {
            if let Some(pos) = line.find(CACHE_FIELDS_DECL) {
                flags.fields |= flag_value(line, pos);
            }
            if let Some(pos) = line.find(CACHE_CLASS_DECL) {
                flags.class |= flag_value(line, pos);
            }
        }
        flags
    }

    pub fn wants_helper(&self) -> bool {
        self.code.len() > HELPER_MIN_LINES
    }
}

/* Text between the `=` and `;` that follow `start`, read as a boolean */
fn flag_value(line: &str, start: usize) -> bool {
    let rest = &line[start..];
    let Some(equals) = rest.find('=') else {
        return false;
    };
    let after = &rest[equals + 1..];
    match after.find(';') {
        Some(semicolon) => after[..semicolon].trim().eq_ignore_ascii_case("true"),
        None => false,
    }
}

fn write_region(out: &mut String, begin: &str, end: &str, lines: &[String]) {
    out.push_str("/*");
    out.push_str(begin);
    out.push_str("*/\n");
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("/*");
    out.push_str(end);
    out.push_str("*/\n");
}

/// Assemble the final artifact: header, captured imports, generated imports,
/// type declaration, captured code, generated support and accessor units.
pub fn assemble(emitted: &EmittedStructure, regions: &UserRegions, user_code: bool) -> String {
    let with_regions = user_code && emitted.user_regions;
    let mut out = String::new();

    out.push_str(&emitted.header);
    out.push('\n');
    if with_regions {
        write_region(&mut out, BEGIN_USER_IMPORTS, END_USER_IMPORTS, &regions.imports);
        out.push('\n');
    }
    out.push_str(&emitted.imports);
    out.push('\n');
    out.push_str(&emitted.declaration);
    if with_regions {
        write_region(&mut out, BEGIN_USER_CODE, END_USER_CODE, &regions.code);
    }
    if !emitted.support.is_empty() || !emitted.units.is_empty() {
        out.push('\n');
    }
    out.push_str(&emitted.support);
    for unit in &emitted.units {
        out.push_str(&unit.text);
    }
    out.push_str(&emitted.footer);
    out
}

/// True when `candidate` differs from what is already on disk.
pub fn should_write(previous: Option<&[u8]>, candidate: &str) -> bool {
    previous != Some(candidate.as_bytes())
}

/// Write `contents` to `path` unless the file already holds exactly these
/// bytes. Returns whether a write happened.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool, GenError> {
    let previous = match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(GenError::io(path, e)),
    };
    if !should_write(previous.as_deref(), contents) {
        return Ok(false);
    }
    std::fs::write(path, contents).map_err(|e| GenError::io(path, e))?;
    Ok(true)
}

/* Standalone copy of the captured regions for review */
pub fn helper_text(regions: &UserRegions) -> String {
    let mut out = String::new();
    for line in regions.imports.iter().chain(regions.code.iter()) {
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREVIOUS: &str = "\
// header
/*[BEGIN USER IMPORTS]*/
use crate::helpers::Walker;
/*[END USER IMPORTS]*/

impl FooPointer {
    /*[BEGIN USER CODE]*/
    const CACHE_FIELDS: bool = true;
    const CACHE_CLASS: bool = false ;

    pub fn walk(&self) -> Walker { Walker::new(self.address()) }
/*[END USER CODE]*/
}
";

    #[test]
    fn extracts_lines_between_markers() {
        let regions = extract(PREVIOUS);
        assert_eq!(regions.imports, vec!["use crate::helpers::Walker;"]);
        assert_eq!(regions.code.len(), 4);
        assert_eq!(regions.code[0], "    const CACHE_FIELDS: bool = true;");
        assert_eq!(regions.code[2], "");
    }

    #[test]
    fn unterminated_region_runs_to_end() {
        let regions = extract("/*[BEGIN USER CODE]*/\nfn a() {}\n");
        assert_eq!(regions.code, vec!["fn a() {}"]);
    }

    #[test]
    fn cache_flags_come_from_user_code() {
        let flags = extract(PREVIOUS).cache_flags();
        assert!(flags.fields);
        assert!(!flags.class);

        let regions = UserRegions {
            imports: Vec::new(),
            code: vec!["const CACHE_CLASS: bool = TRUE;".to_string()],
        };
        assert!(regions.cache_flags().class);

        let malformed = UserRegions {
            imports: Vec::new(),
            code: vec!["const CACHE_FIELDS: bool = true".to_string()],
        };
        assert!(!malformed.cache_flags().fields);
    }

    #[test]
    fn helper_threshold_is_more_than_four_lines() {
        let mut regions = UserRegions::default();
        regions.code = vec![String::new(); 4];
        assert!(!regions.wants_helper());
        regions.code.push(String::new());
        assert!(regions.wants_helper());
    }

    #[test]
    fn write_only_when_bytes_differ() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("foopointer.rs");

        assert!(write_if_changed(&path, "a\n").expect("first write"));
        assert!(!write_if_changed(&path, "a\n").expect("same content"));
        assert!(write_if_changed(&path, "b\n").expect("changed content"));
        assert!(should_write(None, ""));
        assert!(!should_write(Some(b"x"), "x"));
    }
}
