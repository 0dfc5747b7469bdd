/// Version injected at compile time via RESYNTH_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("RESYNTH_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use resynth::config::Config;
use resynth::driver::{self, Kind};
use resynth::snapshot::Snapshot;
use resynth::synth::SynthContext;
use resynth::template::{OutputFormat, Template};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Re-create a captured cloud account inventory in another account or region
#[derive(Parser, Debug)]
#[command(name = "resynth", version = VERSION, about, long_about = None)]
struct Args {
    /// Snapshot file, or directory of JSON documents, to synthesize from
    #[arg(short, long)]
    snapshot: PathBuf,

    /// Account the snapshot was captured from
    #[arg(long)]
    origin_account: Option<String>,

    /// Account to re-create the resources in
    #[arg(long)]
    target_account: Option<String>,

    /// Region the snapshot was captured from
    #[arg(long)]
    origin_region: Option<String>,

    /// Region to re-create the resources in
    #[arg(long)]
    target_region: Option<String>,

    /// Write the template to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Template serialization format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Restrict synthesis to these kinds (comma-separated; the fixed
    /// processing order still applies)
    #[arg(long, value_delimiter = ',')]
    only: Vec<Kind>,

    /// Fail on references to resources missing from this run instead of
    /// falling back to the snapshot's raw value
    #[arg(long)]
    strict_refs: bool,

    /// Remember the resolved accounts and regions as defaults
    #[arg(long)]
    save_defaults: bool,

    /// Log level for diagnostics
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let (non_blocking, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .expect("Failed to open log file");
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .init();

    Some(guard)
}

fn run(args: Args) -> Result<()> {
    let mut config = Config::load();
    let run_config = config.resolve_run(
        args.origin_account.as_deref(),
        args.target_account.as_deref(),
        args.origin_region.as_deref(),
        args.target_region.as_deref(),
    )?;

    tracing::info!(
        "Re-targeting account {} ({}) -> {} ({})",
        run_config.origin_account,
        run_config.origin_region,
        run_config.target_account,
        run_config.target_region
    );

    let snapshot = Snapshot::load(&args.snapshot)?;

    let mut ctx = SynthContext::new(
        &run_config.origin_account,
        &run_config.target_account,
        &run_config.origin_region,
        &run_config.target_region,
        args.strict_refs,
    );
    let mut template = Template::new(format!(
        "Resources re-created from a snapshot of account {}",
        run_config.origin_account
    ));

    let summary = driver::run(&snapshot, &mut ctx, &mut template, &args.only)?;
    template.write(args.output.as_deref(), args.format)?;

    match &args.output {
        Some(path) => println!(
            "Synthesized {} template resources from {} snapshot entries to {}",
            summary.template_resources,
            summary.total_entries,
            path.display()
        ),
        None => tracing::info!(
            "Synthesized {} template resources from {} snapshot entries",
            summary.template_resources,
            summary.total_entries
        ),
    }

    if args.save_defaults {
        config.remember(&run_config)?;
        tracing::info!("Saved resolved accounts and regions as defaults");
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_deref());

    if let Err(err) = run(args) {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
