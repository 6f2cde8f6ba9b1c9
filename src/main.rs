//! kgraph - Knowledge Graph CLI
//!
//! Runs the graph engine over JSON graph files (as produced by `export`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use knowledge_graph::graph::{ClusterAlgorithm, ExportFormat, ExportOptions, Graph, LayoutType};
use knowledge_graph::{Config, GraphService};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kgraph")]
#[command(about = "Knowledge graph analytics, layout and export")]
struct Cli {
    /// YAML config file (defaults to ./kgraph.yaml when present)
    #[arg(short, long, global = true, env = "KGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print aggregate statistics
    Stats {
        /// Graph JSON file
        file: PathBuf,
    },

    /// Partition nodes into clusters
    Clusters {
        file: PathBuf,

        /// connectivity, tags or type
        #[arg(short, long, default_value = "connectivity")]
        algorithm: String,
    },

    /// Find the cheapest path between two nodes
    Path {
        file: PathBuf,
        source: String,
        target: String,
    },

    /// Free-text search over titles, content and tags
    Search { file: PathBuf, query: String },

    /// Compute node positions
    Layout {
        file: PathBuf,

        /// force, circular, grid, hierarchical or radial (config default if unset)
        #[arg(short = 't', long = "type")]
        layout_type: Option<String>,

        /// Maximum force simulation ticks
        #[arg(long)]
        iterations: Option<usize>,

        /// Write the positioned graph here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a graph to json, csv or dot
    Export {
        file: PathBuf,

        #[arg(short, long, default_value = "json")]
        format: String,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,

        /// Drop x/y coordinates
        #[arg(long)]
        no_positions: bool,
    },

    /// Build a chained graph from note ids
    ImportNotes {
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing (stderr, so stdout stays machine-readable)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,knowledge_graph=debug".into());
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config = Config::from_yaml_and_env(cli.config.as_deref())?;
    let mut service = GraphService::started(config)?;

    match cli.command {
        Commands::Stats { file } => {
            let graph = load_graph(&mut service, &file)?;
            print_json(&service.calculate_stats(&graph.id)?)
        }
        Commands::Clusters { file, algorithm } => {
            let algorithm: ClusterAlgorithm = algorithm.parse()?;
            let graph = load_graph(&mut service, &file)?;
            print_json(&service.find_clusters(&graph.id, algorithm)?)
        }
        Commands::Path {
            file,
            source,
            target,
        } => {
            let graph = load_graph(&mut service, &file)?;
            match service.find_shortest_path(&graph.id, &source, &target)? {
                Some(path) => print_json(&path),
                None => anyhow::bail!("No path from {} to {}", source, target),
            }
        }
        Commands::Search { file, query } => {
            let graph = load_graph(&mut service, &file)?;
            print_json(&service.search_nodes(&graph.id, &query)?)
        }
        Commands::Layout {
            file,
            layout_type,
            iterations,
            output,
        } => {
            let mut layout = service.default_layout_config();
            if let Some(name) = layout_type {
                layout.layout_type = name.parse::<LayoutType>()?;
            }
            if let Some(iterations) = iterations {
                layout.iterations = iterations;
            }
            let graph = load_graph(&mut service, &file)?;
            let positioned = service.layout_graph(&graph.id, &layout)?;
            let json = service.export_graph(&positioned, &ExportOptions::default())?;
            write_output(output.as_deref(), &json)
        }
        Commands::Export {
            file,
            format,
            output,
            compact,
            no_positions,
        } => {
            let options = ExportOptions {
                format: format.parse::<ExportFormat>()?,
                pretty: !compact,
                include_positions: !no_positions,
            };
            let graph = load_graph(&mut service, &file)?;
            let text = service.export_graph(&graph.data, &options)?;
            write_output(output.as_deref(), &text)
        }
        Commands::ImportNotes { ids, output } => {
            let data = service.import_from_notes(ids.as_slice())?;
            let json = service.export_graph(&data, &ExportOptions::default())?;
            write_output(output.as_deref(), &json)
        }
    }
}

/// Read a JSON graph file into the service as a new graph.
fn load_graph(service: &mut GraphService, path: &Path) -> Result<Graph> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path.file_stem().and_then(|s| s.to_str());
    let graph = service
        .import_graph(name, &json)
        .with_context(|| format!("Invalid graph file {}", path.display()))?;
    tracing::info!(
        "Loaded {}: {} nodes, {} links",
        path.display(),
        graph.data.nodes.len(),
        graph.data.links.len()
    );
    Ok(graph)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {}", path.display());
            Ok(())
        }
        None => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}
