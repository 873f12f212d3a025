/* Configuration shared by the codegen command and its callers */

use crate::classify::NumericPolicy;
use crate::emit::{DEFAULT_RUNTIME_CRATE, EmitOptions, OffsetNaming};
use crate::error::GenError;
use crate::merge::CacheFlags;
use ddr_store::{Properties, parse_bool, read_properties};
use ddr_types::CURRENT_FORMAT_VERSION;
use std::path::{Path, PathBuf};

/* Structures emitted as constants-only build flag modules by default */
pub const DEFAULT_FLAG_STRUCTURES: &[&str] = &["J9BuildFlags"];

/* Schema format generation of captures made with legacy tooling */
pub const LEGACY_FORMAT_VERSION: u32 = 1;

/* Value used for structures the cache properties do not mention */
const DEFAULT_CACHE_SETTING: &str = "false,false";

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
  /* Directory receiving the generated modules and mod.rs */
  pub output_dir: PathBuf,
  /* Superset blob file, or a store directory to merge first */
  pub source: PathBuf,
  /* Superset file name inside a store directory source */
  pub superset_name: Option<String>,
  /* Overrides the format version recorded in the superset */
  pub format_version: Option<u32>,
  /* Force legacy offset naming regardless of format version */
  pub legacy: bool,
  pub helper_dir: Option<PathBuf>,
  pub user_code: bool,
  pub cache_properties: Option<PathBuf>,
  pub aux_field_info: Option<PathBuf>,
  pub runtime_crate: String,
  pub flag_structures: Vec<String>,
}

impl Default for GeneratorConfig {
  fn default() -> Self {
    Self {
      output_dir: PathBuf::from("."),
      source: PathBuf::new(),
      superset_name: None,
      format_version: None,
      legacy: false,
      helper_dir: None,
      user_code: true,
      cache_properties: None,
      aux_field_info: None,
      runtime_crate: DEFAULT_RUNTIME_CRATE.to_string(),
      flag_structures: DEFAULT_FLAG_STRUCTURES.iter().map(|s| s.to_string()).collect(),
    }
  }
}

impl GeneratorConfig {
  pub fn is_flag_structure(&self, name: &str) -> bool {
    self.flag_structures.iter().any(|s| s == name)
  }

  /* Emitter options for a schema of the given format version */
  pub fn emit_options(&self, format_version: u32) -> EmitOptions {
    let (offset_naming, numeric) = if format_version <= LEGACY_FORMAT_VERSION {
      (OffsetNaming::Legacy, NumericPolicy::Exact)
    } else {
      (OffsetNaming::Current, NumericPolicy::Generalized)
    };

    EmitOptions {
      offset_naming: if self.legacy { OffsetNaming::Legacy } else { offset_naming },
      cache_class: false,
      cache_fields: false,
      numeric,
      user_code: self.user_code,
      runtime_crate: self.runtime_crate.clone(),
    }
  }

  pub fn resolved_format_version(&self, recorded: u32) -> u32 {
    self.format_version.unwrap_or(if recorded == 0 { CURRENT_FORMAT_VERSION } else { recorded })
  }
}

/* Per-structure cache flags read from `Structure=<bool>,<bool>` lines */
#[derive(Debug, Clone, Default)]
pub struct CacheProperties {
  properties: Properties,
}

impl CacheProperties {
  pub fn load(path: &Path) -> Result<Self, GenError> {
    if !path.exists() {
      return Err(GenError::InvalidCacheProperties {
        path: path.to_path_buf(),
        message: "file does not exist".to_string(),
      });
    }
    let properties = read_properties(path).map_err(|e| GenError::InvalidCacheProperties {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;

    /* Reject malformed settings up front rather than per structure */
    for (key, value) in &properties {
      parse_setting(value).map_err(|message| GenError::InvalidCacheProperties {
        path: path.to_path_buf(),
        message: format!("key [{}]: {}", key, message),
      })?;
    }
    Ok(Self { properties })
  }

  pub fn flags(&self, structure: &str) -> CacheFlags {
    let value = self
      .properties
      .get(structure)
      .map(String::as_str)
      .unwrap_or(DEFAULT_CACHE_SETTING);
    parse_setting(value).unwrap_or_default()
  }
}

fn parse_setting(value: &str) -> Result<CacheFlags, String> {
  let parts: Vec<&str> = value.split(',').collect();
  if parts.len() != 2 {
    return Err(format!(
      "'{}' should be in the format <boolean>,<boolean>",
      value
    ));
  }
  let class = parse_bool(parts[0]).ok_or_else(|| format!("'{}' is not a boolean", parts[0].trim()))?;
  let fields = parse_bool(parts[1]).ok_or_else(|| format!("'{}' is not a boolean", parts[1].trim()))?;
  Ok(CacheFlags { class, fields })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn format_version_selects_naming_and_widths() {
    let config = GeneratorConfig::default();

    let legacy = config.emit_options(1);
    assert_eq!(legacy.offset_naming, OffsetNaming::Legacy);
    assert_eq!(legacy.numeric, NumericPolicy::Exact);

    let current = config.emit_options(2);
    assert_eq!(current.offset_naming, OffsetNaming::Current);
    assert_eq!(current.numeric, NumericPolicy::Generalized);

    let forced = GeneratorConfig { legacy: true, ..GeneratorConfig::default() }.emit_options(2);
    assert_eq!(forced.offset_naming, OffsetNaming::Legacy);
    assert_eq!(forced.numeric, NumericPolicy::Generalized);
  }

  #[test]
  fn cache_properties_default_and_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cache.properties");

    std::fs::write(&path, "J9Class=true,false\nJ9Method = false , true\n").expect("write");
    let props = CacheProperties::load(&path).expect("load");
    assert_eq!(props.flags("J9Class"), CacheFlags { class: true, fields: false });
    assert_eq!(props.flags("J9Method"), CacheFlags { class: false, fields: true });
    assert_eq!(props.flags("Other"), CacheFlags::default());

    std::fs::write(&path, "J9Class=true\n").expect("write");
    assert!(matches!(
      CacheProperties::load(&path),
      Err(GenError::InvalidCacheProperties { .. })
    ));

    assert!(matches!(
      CacheProperties::load(&dir.path().join("missing.properties")),
      Err(GenError::InvalidCacheProperties { .. })
    ));
  }
}
