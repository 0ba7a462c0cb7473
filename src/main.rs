use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use woz_sync::config;
use woz_sync::media::KarmaMediaClient;
use woz_sync::report::{ErrorSink, LogSink};
use woz_sync::source::WozClient;
use woz_sync::{cms, sync};

#[derive(Debug, Parser)]
#[command(author, version, about = "Mirror articles from the WOZ feed into the CMS store")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Re-sync articles even when the stored copy is up to date
    #[arg(long)]
    force: bool,

    /// Override the configured page size for the list endpoint
    #[arg(long)]
    limit: Option<u32>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    // The job always exits 0; failures are captured to the error sink.
    if let Err(err) = run(args).await {
        LogSink.capture(&err);
    }
}

async fn run(args: Args) -> Result<()> {
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = cfg.database_url();
    let pool = cms::init_pool(&database_url).await?;
    cms::run_migrations(&pool).await?;

    let source = WozClient::new(&cfg.source.base_url)?;
    let media = KarmaMediaClient::new(&cfg.media.server_url, cfg.media.token.clone())?;
    let sink = LogSink;

    let page_limit = args.limit.unwrap_or(cfg.source.page_limit);
    let force = args.force || cfg.app.force_update;

    info!(database_url = %database_url, page_limit, force, "starting article sync");
    let report = sync::run(&pool, &source, &media, page_limit, force, &sink).await;
    info!(
        listed = report.listed,
        synced = report.synced,
        skipped = report.skipped,
        failed = report.failed,
        "article sync finished"
    );
    Ok(())
}
