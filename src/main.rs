use anyhow::Result;
use clap::Parser;
use commentsift::{
    logging,
    output::SecondaryArtifact,
    pipeline::{self, RunOutcome, TransformConfig, DEFAULT_INPUT_DIR, DEFAULT_OUTPUT_DIR},
};
use std::path::PathBuf;
use tracing::info;

/// NDJSON comments → cleaned CSV/Parquet with sentiment.
#[derive(Debug, Parser)]
#[command(name = "commentsift", version)]
struct Args {
    /// Directory of .ndjson input files
    #[arg(long = "in", env = "COMMENTSIFT_IN", default_value = DEFAULT_INPUT_DIR)]
    in_dir: PathBuf,

    /// Output directory
    #[arg(long = "out", env = "COMMENTSIFT_OUT", default_value = DEFAULT_OUTPUT_DIR)]
    out_dir: PathBuf,

    /// Optional brand filter
    #[arg(long, env = "COMMENTSIFT_BRAND")]
    brand: Option<String>,
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();
    info!(?args, "startup");

    let config = TransformConfig {
        input_dir: args.in_dir,
        output_dir: args.out_dir,
        brand: args.brand.filter(|b| !b.trim().is_empty()),
    };

    match pipeline::run(&config)? {
        RunOutcome::NoInput => {
            println!("No data found in {}", config.input_dir.display());
        }
        RunOutcome::Completed(report) => {
            println!("{}", report.summary_line());
            println!("CSV: {}", report.csv_path.display());
            match &report.parquet {
                SecondaryArtifact::Written(path) => println!("Parquet: {}", path.display()),
                SecondaryArtifact::Failed { path, .. } => {
                    println!("Parquet: {} (not created)", path.display())
                }
            }
            println!("Counts: {}", report.counts_path.display());
        }
    }
    Ok(())
}
