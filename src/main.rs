use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn, LevelFilter};
use outlet_reach::persistence::LOOKUP_FILE;
use outlet_reach::pipeline;
use outlet_reach::progress::PipelineProgress;
use outlet_reach::source::HttpSource;
use outlet_reach::{Engine, PipelineConfig, PipelineContext, ReachTable};
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::macros::format_description;

#[derive(Parser)]
#[command(name = "outlet-reach")]
#[command(about = "Estimates the readership of news outlets and looks up the reach of a search-engine publisher name.")]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "INFO", global = true, help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build (or continue building) the reach lookup table.
    Create(CreateArgs),
    /// Print the estimated reach of one publisher name.
    Lookup(LookupArgs),
}

#[derive(Args)]
struct CreateArgs {
    #[arg(long, help = "Path to a pipeline configuration YAML file")]
    config: Option<PathBuf>,
    #[arg(short, long, help = "Directory for the country table, snapshots and output")]
    data_dir: Option<PathBuf>,
    #[arg(long, help = "Ignore existing snapshots and start from discovery")]
    fresh: bool,
    #[arg(short, long, help = "Maximum threads per worker pass (0 for auto)")]
    threads: Option<usize>,
}

#[derive(Args)]
struct LookupArgs {
    #[arg(short, long, help = "Publisher name as the search engine shows it")]
    name: String,
    #[arg(short, long, help = "Search engine the name came from (g, G, google, b, B, bing)")]
    engine: String,
    #[arg(short, long, default_value = "data", help = "Directory holding the lookup table")]
    data_dir: PathBuf,
}

fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = elapsed.subsec_millis();
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, millis)
    }
}

fn create(args: CreateArgs) -> Result<()> {
    let start_time = Instant::now();
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if args.fresh {
        config.fresh = true;
    }
    if let Some(threads) = args.threads {
        config.max_threads = threads;
    }
    info!("Data directory: {}", config.data_dir.display());
    info!("Per-pass thread limit: {}", config.thread_limit());

    let http = Arc::new(HttpSource::new().context("Failed to build HTTP client")?);
    let ctx = PipelineContext::load(config, http.clone(), http, PipelineProgress::new())?;
    info!("Country table loaded: {} names", ctx.countries.len());

    let report = match pipeline::run(&ctx) {
        Ok(report) => report,
        Err(e) => {
            ctx.progress.abandon("Failed");
            return Err(e);
        }
    };

    info!("-------------------- FINAL SUMMARY --------------------");
    info!("Total execution time: {}", format_elapsed(start_time.elapsed()));
    if let Some(stage) = report.resumed_from {
        info!("Resumed from snapshot {}", stage);
    }
    for sizes in &report.stages {
        info!(
            "  Stage {}: {} merged -> {} to process, {} bypassed",
            sizes.stage, sizes.merged, sizes.processed, sizes.bypassed
        );
    }
    info!("Outlets in final queue: {}", report.outlets);
    match report.paused {
        Some((engine, left)) => warn!("{} names paused with {} outlets left; lookup table not rewritten", engine, left),
        None => info!("Lookup rows written: {}", report.lookup_rows),
    }
    info!("-------------------------------------------------------");
    Ok(())
}

fn lookup(args: LookupArgs) -> Result<()> {
    let engine: Engine = args.engine.parse()?;
    let table = ReachTable::load(&args.data_dir.join(LOOKUP_FILE))?;
    info!("{} publisher names known for {}", table.len(engine), engine);
    match table.reach(&args.name, engine) {
        Some(reach) => println!("{}", reach),
        None => println!("No reach known for '{}' on {}", args.name, engine),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to INFO.", cli.log_level);
            LevelFilter::Info
        }
    };
    SimpleLogger::new()
        .with_level(log_level)
        .with_timestamp_format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .init()?;

    match cli.command {
        Command::Create(args) => create(args),
        Command::Lookup(args) => lookup(args),
    }
}
