//! `elasticbackup`: export one index to a dated backup directory.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use anyhow::Context;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use elasticbackup::{cli, logging, run_backup, BackupOptions, Credentials, HttpStore, Verbosity};

#[derive(Parser)]
#[command(name = "elasticbackup")]
#[command(version)]
#[command(about = "Back up an Elasticsearch index: settings, mappings, pipelines and documents", long_about = None)]
struct Cli {
    /// Elasticsearch host, e.g. localhost:9200
    host: String,

    /// Index to back up
    index: String,

    /// Parent directory for the backup [default: ./]
    #[arg(short = 'd', long = "backup-dir", value_name = "DIR")]
    backup_dir: Option<PathBuf>,

    /// Documents per scroll page [default: 1000]
    #[arg(short = 'b', long = "batch-size", value_name = "SIZE", value_parser = cli::positive_usize)]
    batch_size: Option<usize>,

    /// Search body selecting the documents to export, as JSON
    #[arg(short = 'q', long, value_name = "QUERY", value_parser = cli::json_object)]
    query: Option<serde_json::Value>,

    /// Pause between scroll pages in seconds [default: 1.0]
    #[arg(long = "sleep-time", value_name = "SECS", value_parser = cli::non_negative_f64)]
    sleep_time: Option<f64>,

    /// Scroll cursor lifetime in seconds [default: 600]
    #[arg(long = "scroll-time", value_name = "SECS", value_parser = cli::positive_u64)]
    scroll_time: Option<u64>,

    /// Basic auth credentials as user:pass
    #[arg(short = 'u', long = "user", value_name = "USER:PASS", env = "ELASTIC_USER", hide_env_values = true, value_parser = cli::credentials)]
    credentials: Option<Credentials>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Extra settings key to drop from settings.json (repeatable)
    #[arg(long = "strip-setting", value_name = "KEY")]
    strip_settings: Vec<String>,

    /// Configuration file path (YAML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,
}

impl Cli {
    fn options(&self) -> anyhow::Result<BackupOptions> {
        let mut options = match &self.config {
            Some(path) => BackupOptions::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => BackupOptions::default(),
        };

        if let Some(dir) = &self.backup_dir {
            options.backup_dir = dir.clone();
        }
        if let Some(size) = self.batch_size {
            options.page_size = size;
        }
        if let Some(query) = &self.query {
            options.query = Some(query.clone());
        }
        if let Some(sleep) = self.sleep_time {
            options.sleep_time = sleep;
        }
        if let Some(scroll) = self.scroll_time {
            options.scroll_time = scroll;
        }
        options.strip_settings.extend(self.strip_settings.iter().cloned());
        options.progress |= self.progress;

        options.validate()?;
        Ok(options)
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = cli.options()?;
    let store =
        HttpStore::new(&cli.host, cli.credentials.clone()).with_timeout(options.request_timeout());
    info!("Backing up {} from {}", cli.index, store.base_url());

    let today = chrono::Utc::now().date_naive();
    let report = run_backup(&store, &cli.index, &options, today).await?;

    println!("✅ Backup complete");
    println!("   Directory: {}", report.dir.display());
    println!("   Documents: {}", report.documents.documents);
    println!("   Pages:     {}", report.documents.pages);
    if report.pipelines > 0 {
        println!("   Pipelines: {}", report.pipelines);
    }
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
