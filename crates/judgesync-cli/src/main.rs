use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use judgesync_core::Domain;
use judgesync_crawl::{maybe_build_scheduler, orchestrator_from_config, CrawlConfig, CrawlRunSummary};
use judgesync_storage::PgStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "judgesync")]
#[command(about = "Sync problem and contest metadata from competitive programming judges")]
struct Cli {
    /// Directory holding `sources.yaml`.
    #[arg(long, global = true, default_value = ".")]
    workspace_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl every enabled judge once, or a single one.
    Crawl {
        #[arg(long)]
        source: Option<Domain>,
        /// Run sources on separate tasks instead of one after another.
        #[arg(long)]
        concurrent: bool,
    },
    /// Crawl on the configured cron schedule until interrupted.
    Schedule,
    /// Apply database migrations.
    Migrate,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(summary: &CrawlRunSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = CrawlConfig::from_env();
    config.workspace_root = cli.workspace_root;

    match cli.command.unwrap_or(Commands::Crawl {
        source: None,
        concurrent: false,
    }) {
        Commands::Crawl { source, concurrent } => {
            let orchestrator = orchestrator_from_config(&config).await?;
            let summary = match source {
                Some(domain) => orchestrator.run_source(domain).await?,
                None => orchestrator.run(concurrent || config.concurrent).await,
            };
            print_summary(&summary)?;
            let failed = summary.failed_sources();
            if !failed.is_empty() {
                anyhow::bail!("{} source(s) failed: {:?}", failed.len(), failed);
            }
        }
        Commands::Schedule => {
            config.scheduler_enabled = true;
            let orchestrator = Arc::new(orchestrator_from_config(&config).await?);
            let mut sched = maybe_build_scheduler(&config, orchestrator)
                .await?
                .context("scheduler not built")?;
            sched.start().await.context("starting scheduler")?;
            info!(cron = %config.cron, "scheduler running; press ctrl-c to stop");
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            sched.shutdown().await.context("stopping scheduler")?;
        }
        Commands::Migrate => {
            let store = PgStore::connect(&config.database_url)
                .await
                .context("connecting to database")?;
            store.migrate().await?;
        }
    }

    Ok(())
}
