use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use ddr_gen::{DEFAULT_FLAG_STRUCTURES, GenError, GeneratorConfig};
use ddr_store::{SchemaStore, Superset, read_blob};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "ddr")]
#[command(about = "Structure superset store and accessor code generator")]
#[command(version)]
struct Cli {
    /// Log per-field decisions (overridden by RUST_LOG)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the blob store and its merged superset
    Store {
        #[command(subcommand)]
        command: StoreCommands,
    },

    /// Generate accessor modules from a superset
    Codegen {
        /// Output directory for generated modules
        #[arg(short = 'o', long = "output", value_name = "DIR")]
        output_dir: PathBuf,

        /// Superset file, or a store directory to merge first
        #[arg(short = 's', long = "source", value_name = "SUPERSET")]
        source: PathBuf,

        /// Superset file name when the source is a store directory
        #[arg(long = "superset", value_name = "NAME")]
        superset: Option<String>,

        /// Schema format version (defaults to the one recorded in the superset)
        #[arg(long = "format-version", value_name = "N")]
        format_version: Option<u32>,

        /// Directory receiving copies of long user code regions
        #[arg(long = "helpers", value_name = "DIR")]
        helper_dir: Option<PathBuf>,

        /// Preserve user regions in generated modules
        #[arg(long = "user-code", value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
        user_code: bool,

        /// Per-structure cache flags, used when user code is disabled
        #[arg(long = "cache-properties", value_name = "FILE")]
        cache_properties: Option<PathBuf>,

        /// Use legacy offset naming regardless of format version
        #[arg(long = "legacy")]
        legacy: bool,

        /// Required and optional field declarations merged before generation
        #[arg(long = "aux-field-info", value_name = "FILE")]
        aux_field_info: Option<PathBuf>,

        /// Crate path the generated code imports its runtime from
        #[arg(long = "runtime-crate", value_name = "PATH", default_value = ddr_gen::emit::DEFAULT_RUNTIME_CRATE)]
        runtime_crate: String,

        /// Structures emitted as build flag modules
        #[arg(long = "flag-structure", value_name = "NAME")]
        flag_structures: Vec<String>,

        /// Print the run summary as JSON
        #[arg(long = "json")]
        json: bool,
    },
}

#[derive(Subcommand)]
enum StoreCommands {
    /// Add blobs to the store, merge and write the superset
    Add {
        /// Store directory
        #[arg(long = "store", value_name = "DIR")]
        store: PathBuf,

        /// Blob file, or a directory of blob files
        #[arg(long = "source", value_name = "FILE|DIR")]
        source: PathBuf,

        /// Key for a single blob file (defaults to its file stem)
        #[arg(long = "key", value_name = "KEY")]
        key: Option<String>,

        #[command(flatten)]
        merge: MergeArgs,
    },

    /// Re-merge every blob already in the store
    Merge {
        /// Store directory
        #[arg(long = "store", value_name = "DIR")]
        store: PathBuf,

        #[command(flatten)]
        merge: MergeArgs,
    },
}

#[derive(clap::Args)]
struct MergeArgs {
    /// Superset file name inside the store
    #[arg(long = "superset", value_name = "NAME")]
    superset: Option<String>,

    /// Properties file whose `ddr.order` key lists the merge order
    #[arg(long = "order", value_name = "FILE")]
    order: Option<PathBuf>,

    /// Older superset; only constants it also declares are kept
    #[arg(long = "limit-to", value_name = "FILE")]
    limit_to: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let success = match cli.command {
        Commands::Store { command } => match command {
            StoreCommands::Add {
                store,
                source,
                key,
                merge,
            } => run_store(store, Some((source, key)), merge)?,
            StoreCommands::Merge { store, merge } => run_store(store, None, merge)?,
        },

        Commands::Codegen {
            output_dir,
            source,
            superset,
            format_version,
            helper_dir,
            user_code,
            cache_properties,
            legacy,
            aux_field_info,
            runtime_crate,
            flag_structures,
            json,
        } => {
            let flag_structures = if flag_structures.is_empty() {
                DEFAULT_FLAG_STRUCTURES.iter().map(|s| s.to_string()).collect()
            } else {
                flag_structures
            };
            let config = GeneratorConfig {
                output_dir,
                source,
                superset_name: superset,
                format_version,
                legacy,
                helper_dir,
                user_code,
                cache_properties,
                aux_field_info,
                runtime_crate,
                flag_structures,
            };
            run_codegen(&config, json)?
        }
    };

    if success {
        println!("Processing complete");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Processing failed");
        Ok(ExitCode::FAILURE)
    }
}

/* Add (optionally), merge and persist; conflicts fail the run but the
   superset with the surviving definitions is still written */
fn run_store(
    store_dir: PathBuf,
    source: Option<(PathBuf, Option<String>)>,
    args: MergeArgs,
) -> anyhow::Result<bool> {
    let mut store = SchemaStore::open(&store_dir, args.superset.as_deref())
        .with_context(|| format!("Failed to open store {}", store_dir.display()))?;

    if let Some((source, key)) = source {
        let added = store
            .add_source(&source, key.as_deref())
            .with_context(|| format!("Failed to add {}", source.display()))?;
        info!("Added {} blob(s): {}", added.len(), added.join(", "));
    }

    if let Some(order) = &args.order {
        store.order_from_file(order)?;
    }

    let (mut superset, conflicts) = store.merge_report()?;
    for conflict in &conflicts {
        error!("{}", conflict);
    }

    if let Some(older) = &args.limit_to {
        let older = Superset::from_blob(
            read_blob(older).with_context(|| format!("Failed to read {}", older.display()))?,
        );
        superset.limit_constants(&older);
    }

    store.write_superset(&superset)?;
    Ok(conflicts.is_empty())
}

fn run_codegen(config: &GeneratorConfig, json: bool) -> anyhow::Result<bool> {
    let summary = match ddr_gen::run(config) {
        Ok(summary) => summary,
        Err(GenError::TooManyErrors {
            count,
            failed_structures,
            last,
        }) => {
            error!("Stopped after {} errors, last: {}", count, last);
            error!("Failed structures: {}", failed_structures.join(", "));
            return Ok(false);
        }
        Err(e) => {
            error!("{}", e);
            return Ok(false);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(summary.is_success())
}
