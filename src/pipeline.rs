// src/pipeline.rs

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use tracing::info;

use crate::{load, normalize, output, sentiment};

pub const DEFAULT_INPUT_DIR: &str = "../data/raw";
pub const DEFAULT_OUTPUT_DIR: &str = "../data/curated";

/// Where the transform job reads from and writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Keep only records of this brand (case-insensitive).
    pub brand: Option<String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            brand: None,
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The input directory held no usable records; nothing was written.
    NoInput,
    Completed(output::WriteReport),
}

/// Load → normalize → score → write.
pub fn run(config: &TransformConfig) -> Result<RunOutcome> {
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating output directory {}", config.output_dir.display()))?;

    let table = load::load_ndjson_dir(&config.input_dir)?;
    if table.is_empty() {
        info!(dir = %config.input_dir.display(), "no data found");
        return Ok(RunOutcome::NoInput);
    }

    let columns = table.columns.clone();
    let cleaned = normalize::clean_table(table, config.brand.as_deref());
    let scored = sentiment::score_records(cleaned);
    let report = output::write_outputs(&config.output_dir, &scored, &columns)?;

    info!("{}", report.summary_line());
    Ok(RunOutcome::Completed(report))
}
