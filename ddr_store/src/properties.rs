use crate::error::StoreError;
use indexmap::IndexMap;
use std::path::Path;

/* ============================================================================
   Properties-style configuration files
   ============================================================================

   Used for the merge order file, cache flag properties and auxiliary field
   info. Supported syntax:

     # comment            ! comment
     key = value          key: value          key value
     long.key = first \
                second    (continuation, leading blanks dropped)
     escaped\ key = tab\there \u0041

   Later assignments to the same key replace earlier ones but keep the
   original position. */

pub type Properties = IndexMap<String, String>;

/* Read and parse a properties file */
pub fn read_properties(path: &Path) -> Result<Properties, StoreError> {
    let contents = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    parse_properties(&contents, path)
}

/* Parse properties text; `path` is only used for error messages */
pub fn parse_properties(contents: &str, path: &Path) -> Result<Properties, StoreError> {
    let mut properties = Properties::new();
    let mut lines = contents.lines().enumerate();

    while let Some((index, raw)) = lines.next() {
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        /* Join continuation lines into one logical line */
        let mut logical = String::new();
        let mut current = trimmed;
        loop {
            if ends_with_continuation(current) {
                logical.push_str(&current[..current.len() - 1]);
                match lines.next() {
                    Some((_, next)) => current = next.trim_start(),
                    None => break,
                }
            } else {
                logical.push_str(current);
                break;
            }
        }

        let (key, value) = split_key_value(&logical);
        let key = unescape(key).map_err(|message| invalid(path, index, message))?;
        let value = unescape(value).map_err(|message| invalid(path, index, message))?;
        properties.insert(key, value);
    }

    Ok(properties)
}

fn invalid(path: &Path, index: usize, message: String) -> StoreError {
    StoreError::InvalidProperties {
        path: path.to_path_buf(),
        message: format!("line {}: {}", index + 1, message),
    }
}

/* An odd number of trailing backslashes continues the line */
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/* Split at the first unescaped separator ('=', ':' or whitespace) */
fn split_key_value(line: &str) -> (&str, &str) {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'=' | b':' | b' ' | b'\t' | b'\x0c' => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(bytes.len());
    let key = &line[..key_end];

    let mut rest = line[key_end..].trim_start_matches([' ', '\t', '\x0c']);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches([' ', '\t', '\x0c']);
    }
    (key, rest)
}

fn unescape(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("malformed \\u escape '\\u{}'", hex))?;
                out.push(code);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

/* Parse a boolean the way property files spell them */
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        t if t.eq_ignore_ascii_case("true") => Some(true),
        t if t.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Properties {
        parse_properties(text, Path::new("test.properties")).expect("should parse")
    }

    #[test]
    fn separators_and_comments() {
        let props = parse("# header\n! bang\na=1\nb : 2\nc 3\n\n  d=\n");
        assert_eq!(props.get("a").map(String::as_str), Some("1"));
        assert_eq!(props.get("b").map(String::as_str), Some("2"));
        assert_eq!(props.get("c").map(String::as_str), Some("3"));
        assert_eq!(props.get("d").map(String::as_str), Some(""));
        assert_eq!(props.len(), 4);
    }

    #[test]
    fn continuation_joins_lines() {
        let props = parse("ddr.order = linux, \\\n    windows,\\\n  aix\n");
        assert_eq!(
            props.get("ddr.order").map(String::as_str),
            Some("linux, windows,aix")
        );
    }

    #[test]
    fn escapes_in_keys_and_values() {
        let props = parse("my\\ key = a\\tb\\u0041\n");
        assert_eq!(props.get("my key").map(String::as_str), Some("a\tbA"));
    }

    #[test]
    fn later_assignment_wins_keeps_position() {
        let props = parse("x=1\ny=2\nx=3\n");
        let entries: Vec<(&str, &str)> = props
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(entries, vec![("x", "3"), ("y", "2")]);
    }

    #[test]
    fn malformed_unicode_escape_is_rejected() {
        let err = parse_properties("k=\\u00zz\n", Path::new("bad.properties"))
            .expect_err("should fail");
        assert!(matches!(err, StoreError::InvalidProperties { .. }));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn booleans() {
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
