mod output;
mod telemetry;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use logsift_core::config::Config;
use logsift_ingest::fetch::{FetchSettings, Fetcher, raw_file_path, start_boundary};
use logsift_ingest::{FetchOutcome, Notifier, plan_file, process_and_notify};
use logsift_store::Store;

use crate::output::{
    fetch_json, plan_json, print_fetch_human, print_plan_human, print_process_human,
    print_status_human, process_json, status_json,
};
use crate::telemetry::init_cli_tracing;

#[derive(Parser, Debug)]
#[command(name = "logsift")]
#[command(about = "Parse application logs into analytical tables")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true, help = "Emit diagnostics as JSON lines on stderr")]
    log_json: bool,

    #[arg(long, global = true)]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Pull new raw logs from the search endpoint into a file")]
    Fetch {
        #[arg(long, help = "Start boundary (UTC, e.g. 2025-02-21T00:00:00.000Z); defaults to the store watermark")]
        start: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    #[command(about = "Parse a raw log file and persist the derived tables")]
    Process { file: PathBuf },
    #[command(about = "Fetch, then process the fetched file")]
    Run {
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        raw_dir: Option<PathBuf>,
    },
    #[command(about = "Parse a raw log file and report planned row counts without saving")]
    Parse { file: PathBuf },
    #[command(about = "Show row counts and the watermark of the store")]
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.log_json);

    let mut cfg = Config::load().context("load config")?;
    if let Some(v) = cli.db_path {
        cfg.db_path = v;
    }

    match cli.command {
        Commands::Fetch { start, output } => {
            let store = open_store(&cfg)?;
            let path = output.unwrap_or_else(|| raw_file_path(&cfg));
            let outcome = fetch(&cfg, &store, start, &path).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&fetch_json(&outcome))?);
            } else {
                print_fetch_human(&outcome);
            }
            Ok(())
        }
        Commands::Process { file } => {
            let store = open_store(&cfg)?;
            process(&cfg, &store, &file, cli.json).await
        }
        Commands::Run { start, raw_dir } => {
            if let Some(v) = raw_dir {
                cfg.raw_dir = v;
            }
            let store = open_store(&cfg)?;
            let outcome = fetch(&cfg, &store, start, &raw_file_path(&cfg)).await?;
            tracing::info!(path = %outcome.path.display(), hits = outcome.hits, "fetch stage done");
            process(&cfg, &store, &outcome.path, cli.json).await
        }
        Commands::Parse { file } => {
            let plan = plan_file(&file).with_context(|| format!("parse {}", file.display()))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&plan_json(&plan))?);
            } else {
                print_plan_human(&plan);
            }
            Ok(())
        }
        Commands::Status => {
            let store = open_store(&cfg)?;
            let status = store.status().context("read store status")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status_json(&status))?);
            } else {
                print_status_human(&status);
            }
            Ok(())
        }
    }
}

fn open_store(cfg: &Config) -> anyhow::Result<Store> {
    Store::open(&cfg.db_path).with_context(|| format!("open store {}", cfg.db_path.display()))
}

async fn fetch(
    cfg: &Config,
    store: &Store,
    start: Option<String>,
    path: &Path,
) -> anyhow::Result<FetchOutcome> {
    let settings = FetchSettings::from_config(cfg)?;
    let start = start.unwrap_or_else(|| start_boundary(store, cfg));
    let fetcher = Fetcher::new(settings)?;
    Ok(fetcher.fetch_to_file(&start, path).await?)
}

async fn process(cfg: &Config, store: &Store, file: &Path, json: bool) -> anyhow::Result<()> {
    let notifier = Notifier::from_config(cfg);
    let (run_id, summary) = process_and_notify(store, file, &notifier, &cfg.notify_subject).await;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&process_json(run_id, summary.as_ref()))?
        );
    } else {
        print_process_human(run_id, summary.as_ref());
    }
    Ok(())
}
