/* Codegen command - generate accessor modules from a structure superset */

use super::common::{CacheProperties, GeneratorConfig};
use crate::classify::TypeClassifier;
use crate::emit::{EmitOptions, EmittedStructure, emit, emit_build_flags};
use crate::error::{ERROR_THRESHOLD, GenError};
use crate::helpers::module_name;
use crate::merge::{UserRegions, assemble, extract, helper_text, write_if_changed};
use ddr_store::{AuxFieldInfo, SchemaStore, Superset, read_blob};
use ddr_types::Structure;
use serde_derive::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/* Outcome of one generator run, inspected once for the exit status */
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunSummary {
  /* Modules whose file was (re)written */
  pub generated: Vec<String>,
  /* Modules whose file already held the generated bytes */
  pub unchanged: Vec<String>,
  pub helpers: Vec<PathBuf>,
  pub mod_file_written: bool,
  /* Structures with at least one error; their other accessors are still emitted */
  pub failed_structures: Vec<String>,
  pub error_count: usize,
  #[serde(skip)]
  pub errors: Vec<GenError>,
}

impl RunSummary {
  pub fn is_success(&self) -> bool {
    self.error_count == 0
  }

  /* Log and keep a recoverable error. Fatal errors pass straight through;
     reaching the threshold ends the run. */
  fn record(&mut self, error: GenError) -> Result<(), GenError> {
    if error.is_fatal() {
      return Err(error);
    }
    error!("{}", error);
    self.error_count += 1;
    if self.error_count >= ERROR_THRESHOLD {
      error!(
        "Stopping after {} errors; failed structures: {}",
        self.error_count,
        self.failed_structures.join(", ")
      );
      return Err(GenError::TooManyErrors {
        count: self.error_count,
        failed_structures: std::mem::take(&mut self.failed_structures),
        last: Box::new(error),
      });
    }
    self.errors.push(error);
    Ok(())
  }

  fn fail_structure(&mut self, name: &str) {
    if !self.failed_structures.iter().any(|s| s == name) {
      self.failed_structures.push(name.to_string());
    }
  }
}

/* Execute the codegen command */
pub fn run(config: &GeneratorConfig) -> Result<RunSummary, GenError> {
  let mut summary = RunSummary::default();

  info!("Loading schema from {}", config.source.display());
  let (mut superset, recorded_version) = load_superset(config, &mut summary)?;
  let format_version = config.resolved_format_version(recorded_version);

  if let Some(path) = &config.aux_field_info {
    let aux = AuxFieldInfo::load(path).map_err(GenError::SchemaLoad)?;
    debug!("Applying {} auxiliary field entries from {}", aux.entries().len(), path.display());
    aux.apply(&mut superset);
  }

  let cache_properties = match (&config.cache_properties, config.user_code) {
    (Some(path), false) => Some(CacheProperties::load(path)?),
    (Some(path), true) => {
      warn!(
        "Ignoring cache properties {}: caching is read from user code",
        path.display()
      );
      None
    }
    (None, _) => None,
  };

  create_dir(&config.output_dir)?;
  if let Some(helper_dir) = &config.helper_dir {
    create_dir(helper_dir)?;
  }

  let options = config.emit_options(format_version);
  let classifier = TypeClassifier::new(superset.names(), options.numeric);

  info!(
    "Generating {} structure(s) into {} (format version {})",
    superset.len(),
    config.output_dir.display(),
    format_version
  );

  let mut modules: Vec<(String, String)> = Vec::new();
  for structure in superset.structures() {
    let generated = if config.is_flag_structure(&structure.name) {
      let emitted = emit_build_flags(structure, &options);
      write_module(config, &emitted, &UserRegions::default(), &mut summary)?
    } else {
      generate_structure(
        config,
        structure,
        &classifier,
        &options,
        cache_properties.as_ref(),
        &mut summary,
      )?
    };
    if let Some(module) = generated {
      modules.push(module);
    }
  }

  summary.mod_file_written = match generate_rust_mod_file(&config.output_dir, &mut modules) {
    Ok(written) => written,
    Err(e) => {
      summary.record(e)?;
      false
    }
  };

  info!(
    "Generated {} module(s), {} unchanged, {} error(s)",
    summary.generated.len(),
    summary.unchanged.len(),
    summary.error_count
  );
  Ok(summary)
}

/* A superset file is used as-is; a store directory is merged first */
fn load_superset(
  config: &GeneratorConfig,
  summary: &mut RunSummary,
) -> Result<(Superset, u32), GenError> {
  if config.source.is_dir() {
    let store = SchemaStore::open(&config.source, config.superset_name.as_deref())
      .map_err(GenError::SchemaLoad)?;
    let (superset, conflicts) = store.merge_report().map_err(GenError::SchemaLoad)?;
    for conflict in conflicts {
      summary.record(conflict.into())?;
    }
    let version = superset.format_version();
    Ok((superset, version))
  } else {
    let blob = read_blob(&config.source).map_err(GenError::SchemaLoad)?;
    let version = blob.format_version;
    Ok((Superset::from_blob(blob), version))
  }
}

fn generate_structure(
  config: &GeneratorConfig,
  structure: &Structure,
  classifier: &TypeClassifier,
  options: &EmitOptions,
  cache_properties: Option<&CacheProperties>,
  summary: &mut RunSummary,
) -> Result<Option<(String, String)>, GenError> {
  let module = module_name(&structure.pointer_name());
  let path = config.output_dir.join(format!("{}.rs", module));

  let regions = match read_previous(&path) {
    Ok(Some(previous)) => extract(&previous),
    Ok(None) => UserRegions::default(),
    Err(e) => {
      summary.fail_structure(&structure.name);
      summary.record(e)?;
      return Ok(None);
    }
  };

  let flags = if config.user_code {
    regions.cache_flags()
  } else {
    cache_properties.map(|p| p.flags(&structure.name)).unwrap_or_default()
  };
  if flags.class || flags.fields {
    info!("Caching enabled for {}={},{}", structure.name, flags.class, flags.fields);
  }

  let options = options.with_cache(flags.class, flags.fields);
  let mut emitted = emit(structure, classifier, &options);

  let diagnostics = std::mem::take(&mut emitted.diagnostics);
  if !diagnostics.is_empty() {
    summary.fail_structure(&structure.name);
  }
  for diagnostic in diagnostics {
    summary.record(diagnostic)?;
  }

  let generated = write_module(config, &emitted, &regions, summary)?;

  if let Some(helper_dir) = &config.helper_dir {
    if config.user_code && regions.wants_helper() {
      let helper_path = helper_dir.join(format!("{}.rs", emitted.type_name));
      match write_if_changed(&helper_path, &helper_text(&regions)) {
        Ok(_) => {
          debug!("Helper code for {} in {}", structure.name, helper_path.display());
          summary.helpers.push(helper_path);
        }
        Err(e) => summary.record(e)?,
      }
    }
  }

  Ok(generated)
}

/* Assemble and write one module; returns its (module, type) pair when on disk */
fn write_module(
  config: &GeneratorConfig,
  emitted: &EmittedStructure,
  regions: &UserRegions,
  summary: &mut RunSummary,
) -> Result<Option<(String, String)>, GenError> {
  let module = module_name(&emitted.type_name);
  let path = config.output_dir.join(format!("{}.rs", module));
  let text = assemble(emitted, regions, config.user_code);

  match write_if_changed(&path, &text) {
    Ok(true) => {
      debug!("Wrote {}", path.display());
      summary.generated.push(module.clone());
    }
    Ok(false) => {
      debug!("{} unchanged", path.display());
      summary.unchanged.push(module.clone());
    }
    Err(e) => {
      summary.fail_structure(&emitted.structure);
      summary.record(e)?;
      return Ok(None);
    }
  }
  Ok(Some((module, emitted.type_name.clone())))
}

fn read_previous(path: &Path) -> Result<Option<String>, GenError> {
  match std::fs::read_to_string(path) {
    Ok(contents) => Ok(Some(contents)),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(GenError::io(path, e)),
  }
}

fn create_dir(dir: &Path) -> Result<(), GenError> {
  std::fs::create_dir_all(dir).map_err(|e| GenError::io(dir, e))
}

/* mod.rs declaring every generated module and re-exporting its type */
fn generate_rust_mod_file(
  output_dir: &Path,
  modules: &mut [(String, String)],
) -> Result<bool, GenError> {
  modules.sort();

  let mut mod_content = String::new();
  for (module, _) in modules.iter() {
    mod_content.push_str(&format!("pub mod {};\n", module));
  }
  if !modules.is_empty() {
    mod_content.push('\n');
  }
  for (module, type_name) in modules.iter() {
    mod_content.push_str(&format!("pub use {}::{};\n", module, type_name));
  }

  let mod_path = output_dir.join("mod.rs");
  write_if_changed(&mod_path, &mod_content)
}
