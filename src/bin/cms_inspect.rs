use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use woz_sync::cms;
use woz_sync::config;

#[derive(Parser, Debug)]
#[command(about = "List the articles currently held in the CMS store")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = config::load(Some(&args.config))?;
    let pool = cms::init_pool(&cfg.database_url()).await?;
    cms::run_migrations(&pool).await?;

    let articles = cms::list_articles(&pool).await?;
    println!("{} article(s)", articles.len());
    for article in articles {
        let published = article
            .published_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "unpublished".into());
        println!(
            "  {} [{}] wozID={} modified={} published={}",
            article.slug,
            article.id,
            article.woz_id.as_deref().unwrap_or("-"),
            article.modified_at.to_rfc3339(),
            published
        );
    }
    Ok(())
}
