// src/ingest/mod.rs

pub mod errors;
pub mod youtube;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::Serialize;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tokio::time::sleep;
use tracing::{info, warn};

pub use errors::{ApiError, YtErrorReason};
pub use youtube::{Comment, YouTubeClient};

pub const SOURCE: &str = "youtube";
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";
pub const PUBLISHED_AFTER_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub const DEFAULT_BRAND: &str = "verizon";
pub const DEFAULT_KEYWORDS: &str = "verizon,5g,coverage";
pub const DEFAULT_DAYS: i64 = 14;
pub const DEFAULT_LIMIT_VIDEOS: usize = 20;
pub const DEFAULT_MAX_COMMENTS: usize = 500;
pub const DEFAULT_OUT: &str = "data/raw/output.ndjson";

/// Split a comma-separated keyword list. Whitespace is removed everywhere and
/// empty entries are dropped.
pub fn split_keywords(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(|k| k.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|k| !k.is_empty())
        .collect()
}

/// `now - days`, formatted for the search endpoint's `publishedAfter`.
pub fn published_after(days: i64) -> Result<String> {
    published_after_from(Utc::now(), days)
}

/// Fails when `days` puts the cutoff outside the representable date range.
pub fn published_after_from(now: DateTime<Utc>, days: i64) -> Result<String> {
    let since = TimeDelta::try_days(days)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or_else(|| anyhow!("--days {} is out of range", days))?;
    Ok(since.format(PUBLISHED_AFTER_FORMAT).to_string())
}

/// One collected comment, as written to the NDJSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRow {
    pub post_id: String,
    pub source: String,
    pub brand: String,
    pub keywords: Vec<String>,
    pub text: String,
    pub created_utc: String,
    pub author: String,
    pub like_count: i64,
    pub video_id: String,
    pub url: String,
    pub fetched_at: String,
}

impl CommentRow {
    pub fn from_comment(
        comment: &Comment,
        video_id: &str,
        brand: &str,
        keywords: &[String],
        fetched_at: DateTime<Utc>,
    ) -> Self {
        CommentRow {
            post_id: format!("YOUTUBE_{}", comment.comment_id),
            source: SOURCE.to_string(),
            brand: brand.to_string(),
            keywords: keywords.to_vec(),
            text: comment.text.clone(),
            created_utc: comment.published_at.clone(),
            author: comment.author.clone(),
            like_count: comment.like_count,
            video_id: video_id.to_string(),
            url: format!("{}{}", WATCH_URL_PREFIX, video_id),
            fetched_at: fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Append `row` as one compact JSON line, creating parent directories as needed.
pub fn append_ndjson(row: &CommentRow, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut line = serde_json::to_string(row).context("serializing comment row")?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("appending to {}", path.display()))?;
    Ok(())
}

/// Settings for one collection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub brand: String,
    pub keywords: Vec<String>,
    pub days: i64,
    pub limit_videos: usize,
    pub max_comments: usize,
    pub out: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            brand: DEFAULT_BRAND.to_string(),
            keywords: split_keywords(DEFAULT_KEYWORDS),
            days: DEFAULT_DAYS,
            limit_videos: DEFAULT_LIMIT_VIDEOS,
            max_comments: DEFAULT_MAX_COMMENTS,
            out: PathBuf::from(DEFAULT_OUT),
        }
    }
}

impl IngestConfig {
    /// Keywords joined into a single search query.
    pub fn query(&self) -> String {
        self.keywords.join(" ")
    }
}

/// What a collection run produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub videos: usize,
    pub comments: usize,
}

/// Search for recent videos and append every top-level comment to `cfg.out`.
///
/// API failures only shorten the run; write failures abort it.
pub async fn run(client: &YouTubeClient, cfg: &IngestConfig) -> Result<IngestSummary> {
    let query = cfg.query();
    let since = published_after(cfg.days)?;
    info!("searching videos for '{}' since {}", query, since);

    let video_ids = client
        .search_video_ids(&query, &since, cfg.limit_videos)
        .await;
    let mut summary = IngestSummary {
        videos: video_ids.len(),
        comments: 0,
    };
    if video_ids.is_empty() {
        warn!("no videos found or the search request failed");
        return Ok(summary);
    }

    for video_id in &video_ids {
        let comments = client.fetch_comments(video_id, cfg.max_comments).await;
        if comments.is_empty() {
            warn!(video_id = %video_id, "no comments fetched");
            continue;
        }
        for comment in &comments {
            let row = CommentRow::from_comment(
                comment,
                video_id,
                &cfg.brand,
                &cfg.keywords,
                Utc::now(),
            );
            append_ndjson(&row, &cfg.out)?;
            summary.comments += 1;
        }
        sleep(youtube::PAGE_PAUSE).await;
    }

    info!(
        "wrote {} comments from {} videos to {}",
        summary.comments,
        summary.videos,
        cfg.out.display()
    );
    if summary.comments == 0 {
        warn!("no comments were written; API quota or rate limits may have cut the run short");
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::load_ndjson_dir;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::tempdir;

    fn comment() -> Comment {
        Comment {
            comment_id: "Ugx1".into(),
            text: "Coverage is great downtown".into(),
            author: "@ann".into(),
            like_count: 3,
            published_at: "2024-03-01T10:00:00Z".into(),
        }
    }

    #[test]
    fn keywords_split_on_commas_and_drop_whitespace() {
        assert_eq!(split_keywords("verizon, 5g ,coverage"), vec!["verizon", "5g", "coverage"]);
        assert_eq!(split_keywords(" ,, t mobile,"), vec!["tmobile"]);
        assert!(split_keywords("").is_empty());
    }

    #[test]
    fn published_after_counts_back_whole_days() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 5).unwrap();
        assert_eq!(published_after_from(now, 14).unwrap(), "2024-03-01T08:30:05Z");
        assert_eq!(published_after_from(now, 0).unwrap(), "2024-03-15T08:30:05Z");
    }

    #[test]
    fn out_of_range_days_are_an_error() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 5).unwrap();
        assert!(published_after_from(now, i64::MAX).is_err());
        assert!(published_after_from(now, i64::MIN).is_err());
        assert!(published_after_from(now, 200_000_000).is_err());
        assert!(published_after(i64::MAX).is_err());
    }

    #[test]
    fn rows_serialize_in_field_order() {
        let fetched = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let keywords = split_keywords(DEFAULT_KEYWORDS);
        let row = CommentRow::from_comment(&comment(), "vid9", "verizon", &keywords, fetched);

        assert_eq!(row.post_id, "YOUTUBE_Ugx1");
        assert_eq!(row.url, "https://www.youtube.com/watch?v=vid9");
        assert_eq!(row.fetched_at, "2024-03-02T00:00:00Z");

        let value = serde_json::to_value(&row).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "post_id", "source", "brand", "keywords", "text", "created_utc", "author",
                "like_count", "video_id", "url", "fetched_at",
            ]
        );
        assert_eq!(value["keywords"], json!(["verizon", "5g", "coverage"]));
        assert_eq!(value["source"], json!("youtube"));
    }

    #[test]
    fn appended_rows_load_back() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("raw").join("output.ndjson");
        let fetched = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();

        let mut second = comment();
        second.comment_id = "Ugx2".into();
        for c in [comment(), second] {
            let row = CommentRow::from_comment(&c, "vid9", "verizon", &["5g".to_string()], fetched);
            append_ndjson(&row, &out).unwrap();
        }

        let content = fs::read_to_string(&out).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));

        let table = load_ndjson_dir(dir.path().join("raw")).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[1].post_id, Some(json!("YOUTUBE_Ugx2")));
        assert_eq!(table.records[0].extra_value("source"), Some(&json!("youtube")));
    }

    #[test]
    fn default_config_matches_cli_defaults() {
        let cfg = IngestConfig::default();
        assert_eq!(cfg.query(), "verizon 5g coverage");
        assert_eq!(cfg.days, 14);
        assert_eq!(cfg.limit_videos, 20);
        assert_eq!(cfg.max_comments, 500);
        assert_eq!(cfg.out, PathBuf::from("data/raw/output.ndjson"));
    }
}
