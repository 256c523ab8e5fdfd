//! livegate CLI - refreshes live measures and quality gate status in a SQLite store

#![deny(warnings)]

// Global invariants enforced:
// - One transaction per refresh, committed only when every project succeeded
// - Deterministic output ordering

use anyhow::Context;
use clap::{Parser, Subcommand};
use livegate_core::config::{self, ResolvedConfig};
use livegate_core::metric::core_metrics;
use livegate_core::sqlite;
use livegate_core::{
    Component, IndexingCause, LiveMeasureComputer, LiveMeasureStore, ProjectIndexer,
    QualityGateChangeEvent, SqliteStore,
};
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "livegate")]
#[command(about = "Live measure and quality gate recomputation for code-quality projects")]
#[command(version = env!("LIVEGATE_VERSION"))]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and register the core metrics
    Init {
        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Recompute the projects owning the given components
    Refresh {
        /// Uuids or keys of the touched components
        #[arg(required = true)]
        components: Vec<String>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate or show the configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Indexer standing in for the search index: it only reports the projects to re-index
struct LogIndexer;

impl ProjectIndexer for LogIndexer {
    fn commit_and_index(&mut self, project: &Component, cause: IndexingCause) -> anyhow::Result<()> {
        debug!(project = %project.key, ?cause, "Project queued for indexing");
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { config: config_path } => {
            let resolved = load_config(config_path)?;
            if let Some(parent) = resolved.database.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory: {}", parent.display())
                })?;
            }
            let conn = Connection::open(&resolved.database).with_context(|| {
                format!("failed to open database: {}", resolved.database.display())
            })?;
            sqlite::create_schema(&conn)?;
            let registered = sqlite::register_metrics(&conn, &core_metrics())?;
            println!(
                "Initialized {} ({} metrics registered)",
                resolved.database.display(),
                registered
            );
        }
        Commands::Refresh {
            components,
            format,
            config: config_path,
        } => {
            let resolved = load_config(config_path)?;
            let events = refresh(resolved, &components)?;
            match format {
                OutputFormat::Text => print_text(&events),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&events)?),
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let project_root = std::env::current_dir()?;
                match config::load_and_resolve(&project_root, path.as_deref()) {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref())
                    .context("failed to load configuration")?;

                println!("Configuration:");
                if let Some(ref p) = resolved.config_path {
                    println!("  Source: {}", p.display());
                } else {
                    println!("  Source: defaults (no config file found)");
                }
                println!();
                println!("Rating grid (upper density bound):");
                for (letter, bound) in ["A", "B", "C", "D"]
                    .iter()
                    .zip(resolved.debt_rating_grid.bounds())
                {
                    println!("  {}: {}", letter, bound);
                }
                println!();
                println!("Database: {}", resolved.database.display());
            }
        },
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> anyhow::Result<ResolvedConfig> {
    let project_root = std::env::current_dir()?;
    let resolved = config::load_and_resolve(&project_root, config_path.as_deref())
        .context("failed to load configuration")?;
    if let Some(config_path) = &resolved.config_path {
        eprintln!("Using config: {}", config_path.display());
    }
    Ok(resolved)
}

fn refresh(config: ResolvedConfig, arguments: &[String]) -> anyhow::Result<Vec<QualityGateChangeEvent>> {
    if !config.database.exists() {
        anyhow::bail!(
            "Database does not exist: {} (run `livegate init` first)",
            config.database.display()
        );
    }
    let mut conn = Connection::open(&config.database)
        .with_context(|| format!("failed to open database: {}", config.database.display()))?;
    let tx = conn.transaction()?;

    let events = {
        let mut store = SqliteStore::new(&tx);
        let components = arguments
            .iter()
            .map(|argument| resolve_component(&store, argument))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let computer = LiveMeasureComputer::with_default_formulas(config);
        computer.refresh(&mut store, &mut LogIndexer, &components)?
    };

    tx.commit().context("failed to commit live measures")?;
    info!(projects = events.len(), "Refresh committed");
    Ok(events)
}

/// Looks the argument up as a uuid first, then as a key
fn resolve_component(store: &dyn LiveMeasureStore, argument: &str) -> anyhow::Result<Component> {
    let by_uuid = store
        .select_components_by_uuids(&[argument.to_string()])?
        .into_iter()
        .next();
    match by_uuid {
        Some(component) => Ok(component),
        None => store
            .select_component_by_key(argument)?
            .with_context(|| format!("Component not found: {}", argument)),
    }
}

fn print_text(events: &[QualityGateChangeEvent]) {
    if events.is_empty() {
        println!("No project refreshed (no analysis found)");
        return;
    }
    for event in events {
        let gate = &event.evaluated_gate;
        let previous = event
            .previous_status
            .map(|level| level.to_string())
            .unwrap_or_else(|| "none".to_string());
        println!(
            "{} [{}] quality gate \"{}\": {} (previous: {})",
            event.project.key, event.branch.key, gate.quality_gate.name, gate.status, previous
        );
        for evaluated in &gate.evaluated_conditions {
            let condition = &evaluated.condition;
            println!(
                "  {:<6} {}{} {} {} (actual: {})",
                evaluated.level.as_str(),
                if condition.on_leak { "new code: " } else { "" },
                condition.metric_key,
                condition.operator.db_value(),
                condition
                    .error_threshold
                    .as_deref()
                    .or(condition.warning_threshold.as_deref())
                    .unwrap_or("-"),
                evaluated.actual_value.as_deref().unwrap_or("-")
            );
        }
    }
}
