use anyhow::{bail, Result};
use clap::Parser;
use commentsift::{
    ingest::{self, IngestConfig, YouTubeClient},
    logging,
};
use std::{env, path::PathBuf};
use tracing::{error, info};

const API_KEY_VAR: &str = "YOUTUBE_API_KEY";

/// Collect recent YouTube comments about a brand into an NDJSON file.
#[derive(Debug, Parser)]
#[command(name = "ingest_youtube", version)]
struct Args {
    #[arg(long, default_value = ingest::DEFAULT_BRAND)]
    brand: String,

    /// Comma-separated search keywords
    #[arg(long, default_value = ingest::DEFAULT_KEYWORDS)]
    keywords: String,

    /// Only videos published within this many days
    #[arg(long, default_value_t = ingest::DEFAULT_DAYS)]
    days: i64,

    #[arg(long, default_value_t = ingest::DEFAULT_LIMIT_VIDEOS)]
    limit_videos: usize,

    /// Per-video comment cap
    #[arg(long, default_value_t = ingest::DEFAULT_MAX_COMMENTS)]
    max_comments: usize,

    /// NDJSON file to append to
    #[arg(long, default_value = ingest::DEFAULT_OUT)]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let api_key = match env::var(API_KEY_VAR) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            error!("{} env var is not set. Aborting.", API_KEY_VAR);
            bail!("{} is not set", API_KEY_VAR);
        }
    };

    let config = IngestConfig {
        brand: args.brand,
        keywords: ingest::split_keywords(&args.keywords),
        days: args.days,
        limit_videos: args.limit_videos,
        max_comments: args.max_comments,
        out: args.out,
    };
    info!(?config, "startup");

    let client = YouTubeClient::new(api_key)?;
    let summary = ingest::run(&client, &config).await?;
    println!(
        "Wrote {} comments from {} videos to {}",
        summary.comments,
        summary.videos,
        config.out.display()
    );
    Ok(())
}
