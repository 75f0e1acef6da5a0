//! `elasticrestore`: replay a backup directory into a new index.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use anyhow::Context;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use elasticbackup::{cli, logging, run_restore, Credentials, HttpStore, RestoreOptions, Verbosity};

#[derive(Parser)]
#[command(name = "elasticrestore")]
#[command(version)]
#[command(about = "Restore an Elasticsearch index from an elasticbackup directory", long_about = None)]
struct Cli {
    /// Elasticsearch host, e.g. localhost:9200
    host: String,

    /// Index to create
    index: String,

    /// Backup directory to restore from (may come from --config instead)
    #[arg(short = 'd', long = "backup-dir", value_name = "DIR", required_unless_present = "config")]
    backup_dir: Option<PathBuf>,

    /// Records per bulk request [default: 1000]
    #[arg(short = 'b', long = "batch-size", value_name = "SIZE", value_parser = cli::positive_usize)]
    batch_size: Option<usize>,

    /// Basic auth credentials as user:pass
    #[arg(short = 'u', long = "user", value_name = "USER:PASS", env = "ELASTIC_USER", hide_env_values = true, value_parser = cli::credentials)]
    credentials: Option<Credentials>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Pause after each index setup step in seconds [default: 1.0]
    #[arg(long = "settle-time", value_name = "SECS", value_parser = cli::non_negative_f64)]
    settle_time: Option<f64>,

    /// Configuration file path (YAML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,
}

impl Cli {
    fn options(&self) -> anyhow::Result<RestoreOptions> {
        let mut options = match &self.config {
            Some(path) => RestoreOptions::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => RestoreOptions::default(),
        };

        if let Some(dir) = &self.backup_dir {
            options.backup_dir = Some(dir.clone());
        }
        if let Some(size) = self.batch_size {
            options.batch_size = size;
        }
        if let Some(settle) = self.settle_time {
            options.settle_time = settle;
        }
        options.progress |= self.progress;

        options.validate()?;
        Ok(options)
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = cli.options()?;
    let store =
        HttpStore::new(&cli.host, cli.credentials.clone()).with_timeout(options.request_timeout());
    info!("Restoring {} into {}", cli.index, store.base_url());

    let report = run_restore(&store, &cli.index, &options).await?;

    println!("✅ Restore complete");
    println!("   Index:     {}", cli.index);
    println!("   Mappings:  {}", report.mappings);
    println!(
        "   Pipelines: {} registered, {} already present",
        report.pipelines.registered, report.pipelines.existing
    );
    println!("   Documents: {}", report.documents.documents);
    println!("   Batches:   {}", report.documents.batches);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(Verbosity::from_count(cli.verbose)) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    let host = cli.host.clone();
    cli::finish(run(cli).await, &host)
}
