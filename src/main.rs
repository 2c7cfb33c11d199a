use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use slothwatch::config::{Config, CONFIG_FILENAME};
use slothwatch::reconstruct::{extract_container, Converter, FallbackPolicy};
use slothwatch::snapshot::read_container;

#[derive(Parser)]
#[command(
    name = "slothwatch",
    version,
    about = "Turn slothwatch snapshot archives into regression tests"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a snapshot archive into a test file and its data file
    Convert {
        /// Snapshot archive (`<snapshotId>.zip`)
        archive: PathBuf,

        /// Directory for the generated files
        #[arg(short = 'd', long = "to-dir", default_value = ".")]
        to_dir: PathBuf,

        /// Crate path the watched functions live under
        #[arg(long)]
        crate_name: Option<String>,

        /// Config file (defaults to ./slothwatch.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Fail on result types without a configured comparator
        #[arg(long)]
        strict: bool,
    },

    /// Print one line per recorded invocation
    Inspect {
        /// Snapshot archive (`<snapshotId>.zip`)
        archive: PathBuf,
    },
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::env::var_os("NO_COLOR").is_none())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Convert {
            archive,
            to_dir,
            crate_name,
            config,
            strict,
        } => convert(&archive, &to_dir, crate_name, config.as_deref(), strict),
        Commands::Inspect { archive } => inspect(&archive),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(Config::load_or_default(Path::new(CONFIG_FILENAME))?),
    }
}

fn convert(
    archive: &Path,
    to_dir: &Path,
    crate_name: Option<String>,
    config: Option<&Path>,
    strict: bool,
) -> Result<()> {
    let mut convert_config = load_config(config)?.convert;
    if crate_name.is_some() {
        convert_config.crate_name = crate_name;
    }
    if strict {
        convert_config.comparators.set_fallback(FallbackPolicy::Reject);
    }

    let output = Converter::new(convert_config)
        .convert_file(archive, to_dir)
        .with_context(|| format!("converting {}", archive.display()))?;

    println!("{}", output.test_file.display());
    println!("{}", output.data_file.display());
    Ok(())
}

fn inspect(archive: &Path) -> Result<()> {
    let root = read_container(archive).with_context(|| format!("reading {}", archive.display()))?;
    let container = extract_container(&root)?;

    println!(
        "snapshot {} (instance {}, session {}): {} records",
        container.snapshot_id,
        container.instance_id,
        container.session_id,
        container.len()
    );
    for record in &container.records {
        let target = if record.is_method() {
            format!("{}.{}", record.class_name, record.function_name)
        } else {
            record.function_name.clone()
        };
        let panicked = if record.additional_info.is_empty() {
            String::new()
        } else {
            format!(" [{}]", record.additional_info)
        };
        println!(
            "{:>4}  {}@{}  args={} results={}{}",
            record.run_id,
            target,
            record.scope_path,
            record.arguments.len(),
            record.results.len(),
            panicked
        );
    }
    Ok(())
}
