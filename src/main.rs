use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stocknet::config::{LayoutConfig, clamp_threshold};
use stocknet::dataset::{self, Source};
use stocknet::engine::LayoutEngine;
use stocknet::filter::filter_links;
use stocknet::graph;

/// Lay out a stock relationship network with a force-directed simulation.
#[derive(Parser)]
#[command(name = "stocknet")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the layout to convergence and write node positions as JSON
    Layout(LayoutArgs),
    /// Summarize a relationship file without running the layout
    Inspect {
        /// Relationship CSV (stock1,stock2,relation_type,weight)
        #[arg(short, long)]
        input: PathBuf,

        /// Only count links at least this heavy
        #[arg(short, long, default_value = "0")]
        threshold: f64,
    },
}

#[derive(Args)]
struct LayoutArgs {
    /// Relationship CSV (stock1,stock2,relation_type,weight)
    #[arg(short, long)]
    input: PathBuf,

    /// YAML layout configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Initial placement seed
    #[arg(long)]
    seed: Option<u64>,

    /// Upper bound on simulation ticks
    #[arg(long, default_value = "1000")]
    max_steps: usize,

    /// Relatedness threshold [0, 3]
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Repulsion strength [-1000, -100]
    #[arg(long, allow_hyphen_values = true)]
    repulsion: Option<f64>,

    /// Link distance [30, 300]
    #[arg(long)]
    link_distance: Option<f64>,

    /// Write every tick as a JSON line instead of only the final layout
    #[arg(long)]
    frames: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(args: &LayoutArgs) -> anyhow::Result<LayoutConfig> {
    let mut config = match &args.config {
        Some(path) => LayoutConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => LayoutConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(threshold) = args.threshold {
        config.relation_threshold = threshold;
    }
    if let Some(repulsion) = args.repulsion {
        config.repulsion_strength = repulsion;
    }
    if let Some(distance) = args.link_distance {
        config.link_distance = distance;
    }
    Ok(config.clamped())
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create output: {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn layout(args: &LayoutArgs) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let loaded = dataset::load_or_fallback(&args.input);
    let built = graph::build(&loaded.records);
    let mut engine = LayoutEngine::new(built, config);
    let mut out = open_output(args.output.as_deref())?;

    engine.start();
    let mut steps = 0;
    while steps < args.max_steps {
        let Some(frame) = engine.step(1.0) else {
            break;
        };
        steps += 1;
        if args.frames {
            serde_json::to_writer(&mut out, &frame)?;
            writeln!(out)?;
        }
    }
    if !args.frames {
        serde_json::to_writer_pretty(&mut out, &engine.frame())?;
        writeln!(out)?;
    }
    out.flush()?;

    tracing::info!(steps, phase = ?engine.phase(), "layout finished");
    Ok(())
}

fn inspect(input: &Path, threshold: f64) {
    let threshold = clamp_threshold(threshold);
    let loaded = dataset::load_or_fallback(input);
    let built = graph::build(&loaded.records);
    let engine = LayoutEngine::new(built.clone(), LayoutConfig::default());
    let active = filter_links(built.graph.links(), threshold);

    if loaded.source == Source::Fallback {
        println!("source: built-in sample");
    } else {
        println!("source: {}", input.display());
    }
    println!("nodes: {}", built.graph.node_count());
    println!("links: {} ({} at threshold {threshold})", built.graph.links().len(), active.len());
    println!("dropped records: {}", built.dropped_records + loaded.unreadable_rows);
    println!("groups:");
    for (group, color) in engine.palette().groups() {
        println!("  {group} {color}");
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Layout(args) => layout(args)?,
        Commands::Inspect { input, threshold } => inspect(input, *threshold),
    }

    Ok(())
}
