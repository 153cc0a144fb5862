//! ckg: Code knowledge graph command line
//!
//! Indexes Java, Kotlin, Dart and Python projects into a graphqlite
//! database and answers structural queries against it.

mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ckg_graph::{
    Coordinator, CycleRelation, GraphBuilder, GraphStore, Namespace, QueryInterface, QueryResult,
    Schema, SearchMode,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::{CKG_DIR, CONFIG_FILE, Config, DEFAULT_CONFIG};

/// Build and query a code knowledge graph
#[derive(Parser)]
#[command(name = "ckg")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to .ckg directory (default: search for .ckg/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new .ckg directory with config file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Extract a project and merge it into the graph database
    Index {
        /// Directory to index (default: project root from config or current dir)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Output path for the graph database
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write the generated merge statements to this file
        #[arg(long)]
        statements: Option<PathBuf>,
    },

    /// Query the graph database
    Query {
        /// Graph database to read (default: from config)
        #[arg(long)]
        graph: Option<PathBuf>,

        #[command(subcommand)]
        query: QueryCommand,
    },

    /// Print or write the graph schema description as JSON
    Schema {
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum QueryCommand {
    /// Node and relationship totals by type and language
    Stats,
    /// Find declarations by name
    Search {
        pattern: String,
        #[arg(long, value_enum, default_value_t = Mode::Contains)]
        mode: Mode,
    },
    /// Callables that call the named function
    Callers { name: String },
    /// Callables called by the named function
    Callees { name: String },
    /// Import or call cycles
    Cycles {
        #[arg(long, value_enum, default_value_t = Relation::Imports)]
        relation: Relation,
    },
    /// Declarations in one file
    File {
        path: String,
        /// List types instead of callables
        #[arg(long)]
        classes: bool,
    },
    /// Type hierarchy within a language namespace
    Hierarchy {
        #[arg(value_parser = parse_namespace)]
        namespace: Namespace,
        /// Start from this type name
        #[arg(long)]
        root: Option<String>,
    },
    /// Kotlin data classes, Java records and Python dataclasses
    DataClasses {
        #[arg(long, value_parser = parse_namespace)]
        namespace: Option<Namespace>,
    },
    /// Extension functions and extensions, optionally by receiver
    Extensions {
        #[arg(long)]
        receiver: Option<String>,
    },
    /// Sealed classes with their subtypes
    Sealed,
    /// Members overriding a parent member of the given name
    Overrides {
        member: String,
        #[arg(long, value_parser = parse_namespace)]
        namespace: Option<Namespace>,
    },
    /// Run a Cypher read query
    Raw { cypher: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Contains,
    Exact,
    Regex,
}

impl From<Mode> for SearchMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Contains => SearchMode::Contains,
            Mode::Exact => SearchMode::Exact,
            Mode::Regex => SearchMode::Regex,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Relation {
    Imports,
    Calls,
}

impl From<Relation> for CycleRelation {
    fn from(relation: Relation) -> Self {
        match relation {
            Relation::Imports => CycleRelation::Imports,
            Relation::Calls => CycleRelation::Calls,
        }
    }
}

fn parse_namespace(s: &str) -> std::result::Result<Namespace, String> {
    Namespace::parse(s)
        .ok_or_else(|| format!("unknown namespace '{s}' (generic, java, kotlin, dart)"))
}

/// Initialize logging to stderr.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load config from an explicit .ckg directory or file, or by discovery.
fn load_config(override_path: Option<&PathBuf>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = override_path {
        let config_file = if path.is_dir() {
            path.join(CONFIG_FILE)
        } else {
            path.clone()
        };
        let ckg_dir = config_file.parent().unwrap_or(path).to_path_buf();
        let config = Config::from_file(&config_file)?;
        info!("Loaded config from {}", config_file.display());
        return Ok((config, Some(ckg_dir)));
    }

    match Config::find_and_load() {
        Ok(Some((config, ckg_dir))) => {
            info!("Found config at {}", ckg_dir.display());
            Ok((config, Some(ckg_dir)))
        }
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            Ok((Config::default(), None))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (config, config_dir) = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Init { force } => init(force),
        Commands::Index {
            path,
            output,
            statements,
        } => index(&config, config_dir.as_deref(), path, output, statements),
        Commands::Query { graph, query } => {
            let graph_path =
                graph.unwrap_or_else(|| config.resolve_graph_path(config_dir.as_deref()));
            if !graph_path.exists() {
                anyhow::bail!(
                    "No graph at {}. Run 'ckg index' first.",
                    graph_path.display()
                );
            }
            let store = GraphStore::open(&graph_path)
                .with_context(|| format!("Failed to open graph {}", graph_path.display()))?;
            let result = run_query(&QueryInterface::new(&store), query);
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Schema { output } => {
            let schema = Schema::global();
            match output {
                Some(path) => {
                    schema
                        .write_description(&path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Wrote schema to {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&schema.describe())?),
            }
            Ok(())
        }
    }
}

fn init(force: bool) -> Result<()> {
    let ckg_dir = PathBuf::from(CKG_DIR);
    let config_path = ckg_dir.join(CONFIG_FILE);

    if config_path.exists() && !force {
        anyhow::bail!(".ckg/config.toml already exists. Use --force to overwrite.");
    }

    if !ckg_dir.exists() {
        std::fs::create_dir_all(&ckg_dir)?;
        info!("Created {}/", ckg_dir.display());
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)?;
    info!("Created {}", config_path.display());
    info!("Next steps:");
    info!("  1. Edit .ckg/config.toml to configure your project");
    info!("  2. Run 'ckg index' to build the code graph");
    info!("  3. Run 'ckg query stats' to inspect it");
    Ok(())
}

fn index(
    config: &Config,
    config_dir: Option<&Path>,
    path: Option<PathBuf>,
    output: Option<PathBuf>,
    statements: Option<PathBuf>,
) -> Result<()> {
    let source_path = path.unwrap_or_else(|| config.resolve_project_root(config_dir));
    // Canonicalize to resolve relative paths like "." or ".."
    let source_path = source_path.canonicalize().unwrap_or(source_path);
    let graph_path = output.unwrap_or_else(|| config.resolve_graph_path(config_dir));

    info!(
        "Indexing {} -> {}",
        source_path.display(),
        graph_path.display()
    );

    let parsed = Coordinator::new(config.extraction.clone()).parse_project(&source_path);
    if let Some(error) = &parsed.enumeration_error {
        anyhow::bail!("Failed to enumerate {}: {}", source_path.display(), error);
    }
    for failure in &parsed.parse_errors {
        warn!("{}: {}", failure.file_path, failure.message);
    }

    let store = GraphStore::open(&graph_path)
        .with_context(|| format!("Failed to open graph {}", graph_path.display()))?;
    let mut build_config = config.build.clone();
    build_config.emit_statements |= statements.is_some();
    let result = GraphBuilder::new()
        .with_config(build_config)
        .build_into(&parsed, &store);

    if let Some(path) = statements {
        std::fs::write(&path, result.statements.join("\n"))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} statements to {}", result.statement_count, path.display());
    }

    for warning in &result.warnings {
        warn!("{}", warning);
    }
    if !result.success {
        anyhow::bail!("Build failed: {}", result.errors.join("; "));
    }

    let stats = store.stats()?;
    info!(
        "Indexed {} files ({} failed), {} nodes, {} relationships; graph now holds {} nodes, {} edges",
        parsed.total_files,
        parsed.parse_errors.len(),
        result.nodes_created,
        result.relationships_created,
        stats.node_count,
        stats.edge_count
    );
    Ok(())
}

fn run_query(query: &QueryInterface<'_, GraphStore>, command: QueryCommand) -> QueryResult {
    match command {
        QueryCommand::Stats => query.project_statistics(),
        QueryCommand::Search { pattern, mode } => query.search_by_name(&pattern, mode.into()),
        QueryCommand::Callers { name } => query.callers_of_function(&name),
        QueryCommand::Callees { name } => query.callees_of_function(&name),
        QueryCommand::Cycles { relation } => query.find_circular_dependencies(relation.into()),
        QueryCommand::File { path, classes } => {
            if classes {
                query.classes_in_file(&path)
            } else {
                query.functions_in_file(&path)
            }
        }
        QueryCommand::Hierarchy { namespace, root } => {
            query.inheritance_tree(namespace, root.as_deref())
        }
        QueryCommand::DataClasses { namespace } => query.find_data_classes(namespace),
        QueryCommand::Extensions { receiver } => query.find_extension_functions(receiver.as_deref()),
        QueryCommand::Sealed => query.find_sealed_hierarchies(),
        QueryCommand::Overrides { member, namespace } => query.find_overrides(&member, namespace),
        QueryCommand::Raw { cypher } => query.raw(&cypher),
    }
}
