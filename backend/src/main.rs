//! Splitledger CLI - Reconstruct split transactions from report exports
//!
//! # Main Commands
//!
//! ```bash
//! splitledger reconcile report.json       # Report JSON to ledger records
//! splitledger fetch https://host/report   # Same, fetched over HTTP
//! splitledger serve                       # Start HTTP server (port 3000)
//! splitledger mapping list                # Manage column mappings
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! splitledger flatten report.json         # Just flatten to detail rows
//! splitledger project report.json         # Flatten and project, no reconstruction
//! splitledger validate records.json       # Validate records against the schema
//! splitledger example-mapping             # Show the built-in column mapping
//! ```

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use splitledger::api::logs::{set_stderr_mirror, LOG_BROADCASTER};
use splitledger::config::Settings;
use splitledger::{
    default_mapping, flatten_report, load_report_file, project_document, reconcile_report,
    validate_records, ColumnMapping, IdField, MappingRegistry, OutputFormat, ReconcileOptions,
    StrategyKind,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "splitledger")]
#[command(about = "Reconstruct split transactions from report exports", long_about = None)]
struct Cli {
    /// Silence progress output on stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by `reconcile` and `fetch`
#[derive(Args)]
struct RunArgs {
    /// Output file for flat records (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write records grouped per split transaction
    #[arg(short, long)]
    grouped: Option<PathBuf>,

    /// Output format for flat records
    #[arg(long, default_value = "json")]
    format: OutputFormat,

    /// Account inference strategy: auto, deferred or type-boundary
    #[arg(long, default_value = "auto")]
    strategy: StrategyKind,

    /// Keep single-line transactions
    #[arg(long)]
    keep_standalone: bool,

    /// Emit the identity field as `uid`
    #[arg(long)]
    uid: bool,

    /// Column mapping file or registry ID (default: built-in table)
    #[arg(short, long)]
    mapping: Option<String>,

    /// Skip validation
    #[arg(long)]
    no_validate: bool,

    /// Fail on empty reports and invalid records
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: report JSON to ledger records
    Reconcile {
        /// Input report file
        input: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Fetch a report over HTTP and reconcile it
    Fetch {
        /// Report URL
        url: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Flatten a report into detail rows
    Flatten {
        /// Input report file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Flatten and project a report without reconstruction
    Project {
        /// Input report file
        input: PathBuf,

        /// Column mapping file or registry ID (default: built-in table)
        #[arg(short, long)]
        mapping: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate JSON records against the ledger schema
    Validate {
        /// Input JSON file (array of records)
        input: PathBuf,
    },

    /// Show the built-in column mapping
    ExampleMapping,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: SPLITLEDGER_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage column mappings
    Mapping {
        #[command(subcommand)]
        action: MappingAction,
    },
}

#[derive(Subcommand)]
enum MappingAction {
    /// List all stored mappings
    List,

    /// Import a mapping JSON file
    Import {
        /// Mapping JSON file to import
        file: PathBuf,
        /// Name for the mapping
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show details of a mapping
    Show {
        /// Mapping ID
        id: String,
    },

    /// Delete a mapping
    Delete {
        /// Mapping ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let settings = Settings::from_env();
    let cli = Cli::parse();
    set_stderr_mirror(!cli.quiet);

    let result = match cli.command {
        Commands::Reconcile { input, run } => cmd_reconcile(&input, run, &settings),

        Commands::Fetch { url, run } => cmd_fetch(&url, run, &settings).await,

        Commands::Flatten { input, output } => cmd_flatten(&input, output.as_deref()),

        Commands::Project {
            input,
            mapping,
            output,
        } => cmd_project(&input, mapping.as_deref(), output.as_deref(), &settings),

        Commands::Validate { input } => cmd_validate(&input),

        Commands::ExampleMapping => cmd_example_mapping(),

        Commands::Serve { port } => cmd_serve(port.unwrap_or(settings.port)).await,

        Commands::Mapping { action } => cmd_mapping(action, &settings),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Resolve `--mapping`: an existing file, then a registry ID. Without the
/// flag the built-in table is used.
fn resolve_mapping(
    arg: Option<&str>,
    settings: &Settings,
) -> Result<ColumnMapping, Box<dyn std::error::Error>> {
    match arg {
        Some(value) if Path::new(value).is_file() => {
            let content = fs::read_to_string(value)?;
            Ok(ColumnMapping::from_json(&content)?)
        }
        Some(id) => {
            let stored = MappingRegistry::with_dir(&settings.registry_dir).get(id)?;
            progress(format!("   Mapping: {} ({})", stored.name, stored.id));
            Ok(stored.mapping)
        }
        None => Ok(default_mapping()),
    }
}

fn run_options(run: &RunArgs, mapping: ColumnMapping) -> ReconcileOptions {
    ReconcileOptions {
        strategy: run.strategy,
        keep_standalone: run.keep_standalone,
        id_field: if run.uid { IdField::Uid } else { IdField::Id },
        skip_validation: run.no_validate,
        strict: run.strict,
        mapping: Some(mapping),
    }
}

fn cmd_reconcile(
    input: &Path,
    run: RunArgs,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    progress(format!("Processing: {}", input.display()));
    let loaded = load_report_file(input)?;
    progress(format!("   Encoding: {}", loaded.encoding));
    reconcile_loaded_document(&loaded.document, &run, settings)
}

async fn cmd_fetch(
    url: &str,
    run: RunArgs,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    progress(format!("Fetching: {}", url));
    let loaded = splitledger::fetch_report(url, settings.source_token.as_deref()).await?;
    progress(format!("   Encoding: {} ({} bytes)", loaded.encoding, loaded.byte_len));
    reconcile_loaded_document(&loaded.document, &run, settings)
}

fn reconcile_loaded_document(
    document: &Value,
    run: &RunArgs,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let mapping = resolve_mapping(run.mapping.as_deref(), settings)?;
    let output = reconcile_report(document, &run_options(run, mapping))?;

    // Serialize everything before writing anything
    let flat = output.emit(run.format)?;
    let grouped = match &run.grouped {
        Some(path) => Some((path, output.emit_groups()?)),
        None => None,
    };

    write_output(&flat, run.output.as_deref())?;
    if let Some((path, content)) = grouped {
        fs::write(path, content)?;
        progress(format!("   Grouped output saved to: {}", path.display()));
    }

    progress("Done!");
    Ok(())
}

fn cmd_flatten(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    progress(format!("Flattening: {}", input.display()));

    let loaded = load_report_file(input)?;
    let flat = flatten_report(&loaded.document)?;
    progress(format!("   Columns: {}", flat.columns.join(", ")));
    progress(format!(
        "   {} detail rows in {} sections",
        flat.rows.len(),
        flat.section_count
    ));

    let json = serde_json::to_string_pretty(&flat.rows)?;
    write_output(&json, output)?;
    Ok(())
}

fn cmd_project(
    input: &Path,
    mapping: Option<&str>,
    output: Option<&Path>,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    progress(format!("Projecting: {}", input.display()));

    let loaded = load_report_file(input)?;
    let mapping = resolve_mapping(mapping, settings)?;

    let (_, rows) = project_document(&loaded.document, &mapping)?;
    progress(format!("   {} projected rows", rows.len()));

    let json = serde_json::to_string_pretty(&rows)?;
    write_output(&json, output)?;
    Ok(())
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    progress(format!("Validating: {}", input.display()));

    let content = fs::read_to_string(input)?;
    let records: Vec<Value> = serde_json::from_str(&content)?;

    let (valid, invalid, errors) = validate_records(&records);
    for (i, errs) in errors.iter().take(5) {
        eprintln!("\nRecord {} invalid:", i);
        for err in errs.iter().take(3) {
            eprintln!("   - {}", err);
        }
    }

    eprintln!("\nResults: {} valid, {} invalid", valid, invalid);

    if invalid > 0 {
        return Err(format!("{} of {} records invalid", invalid, records.len()).into());
    }

    Ok(())
}

fn cmd_example_mapping() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", default_mapping().to_json()?);
    Ok(())
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    splitledger::server::start_server(port).await
}

/// Progress line on stderr, silenced by `--quiet`
fn progress(msg: impl AsRef<str>) {
    if LOG_BROADCASTER.mirrors() {
        eprintln!("{}", msg.as_ref());
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            progress(format!("Output written to: {}", p.display()));
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn cmd_mapping(action: MappingAction, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let registry = MappingRegistry::with_dir(&settings.registry_dir);

    match action {
        MappingAction::List => {
            let mappings = registry.list()?;
            if mappings.is_empty() {
                eprintln!("No mappings stored in {}.", registry.dir().display());
                eprintln!("   Use 'splitledger mapping import <file>' to add one.");
                return Ok(());
            }

            eprintln!("Stored mappings ({}):\n", mappings.len());
            for m in mappings {
                println!("  {} ({})", m.id, m.name);
                println!("     Columns: {}", m.mapping.source_columns().join(", "));
                println!("     Saved: {}", m.saved_at);
                println!();
            }
        }

        MappingAction::Import { file, name } => {
            progress(format!("Importing mapping from: {}", file.display()));
            let stored = registry.import(&file, name.as_deref())?;
            progress(format!("Mapping saved with ID: {}", stored.id));
            progress(format!("   Use it with '--mapping {}'", stored.id));
        }

        MappingAction::Show { id } => {
            let m = registry.get(&id)?;
            println!("Mapping: {} ({})\n", m.name, m.id);
            println!("Saved: {}", m.saved_at);
            println!("\nRules:");
            println!("{}", m.mapping.to_json()?);
        }

        MappingAction::Delete { id } => {
            registry.delete(&id)?;
            progress(format!("Mapping deleted: {}", id));
        }
    }

    Ok(())
}
