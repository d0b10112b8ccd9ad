// src/output.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray},
    csv::WriterBuilder,
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, warn};

use crate::record::{value_to_string, ScoredRecord, Timestamp};
use crate::sentiment::SentimentLabel;

/// Leading output columns, in this order. Any other input columns follow.
pub const PREFERRED_COLUMNS: [&str; 14] = [
    "post_id",
    "brand",
    "video_id",
    "author",
    "text",
    "sent_label",
    "sent_compound",
    "like_count",
    "created_utc",
    "created_dt",
    "fetched_at",
    "fetched_dt",
    "keywords_str",
    "url",
];

pub const CLEAN_CSV: &str = "comments_clean.csv";
pub const CLEAN_PARQUET: &str = "comments_clean.parquet";
pub const COUNTS_CSV: &str = "sentiment_counts.csv";

/// How instants are rendered in the delimited output.
pub const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Final column order: the preferred prefix, then every other loaded column
/// in first-seen order. `keywords` always exists, even if no line had it.
pub fn column_order(raw_columns: &[String]) -> Vec<String> {
    let mut cols: Vec<String> = PREFERRED_COLUMNS.iter().map(|c| c.to_string()).collect();
    for c in raw_columns {
        if !cols.contains(c) {
            cols.push(c.clone());
        }
    }
    if !cols.iter().any(|c| c == "keywords") {
        cols.push("keywords".to_string());
    }
    cols
}

fn field_type(name: &str) -> DataType {
    match name {
        "sent_compound" => DataType::Float64,
        "like_count" => DataType::Int64,
        "created_dt" | "fetched_dt" => DataType::Timestamp(TimeUnit::Microsecond, None),
        _ => DataType::Utf8,
    }
}

fn timestamp_column(records: &[ScoredRecord], pick: fn(&ScoredRecord) -> Timestamp) -> ArrayRef {
    let values: Vec<Option<i64>> = records
        .iter()
        .map(|r| pick(r).as_datetime().map(|dt| dt.and_utc().timestamp_micros()))
        .collect();
    Arc::new(TimestampMicrosecondArray::from(values))
}

fn string_column<F>(records: &[ScoredRecord], pick: F) -> ArrayRef
where
    F: Fn(&ScoredRecord) -> Option<String>,
{
    Arc::new(records.iter().map(pick).collect::<StringArray>())
}

fn column_array(name: &str, records: &[ScoredRecord]) -> ArrayRef {
    match name {
        "sent_compound" => Arc::new(Float64Array::from_iter_values(
            records.iter().map(|r| r.sent_compound),
        )),
        "like_count" => Arc::new(Int64Array::from_iter_values(
            records
                .iter()
                .map(|r| i64::try_from(r.record.like_count).unwrap_or(i64::MAX)),
        )),
        "created_dt" => timestamp_column(records, |r| r.record.created_dt),
        "fetched_dt" => timestamp_column(records, |r| r.record.fetched_dt),
        "sent_label" => string_column(records, |r| Some(r.sent_label.as_str().to_string())),
        "text" => string_column(records, |r| r.record.text.clone()),
        "keywords_str" => string_column(records, |r| Some(r.record.keywords_str.clone())),
        "post_id" => string_column(records, |r| r.record.post_id.clone()),
        "brand" => string_column(records, |r| r.record.brand.clone()),
        "video_id" => string_column(records, |r| r.record.video_id.clone()),
        "author" => string_column(records, |r| r.record.author.clone()),
        "created_utc" => string_column(records, |r| r.record.created_utc.clone()),
        "fetched_at" => string_column(records, |r| r.record.fetched_at.clone()),
        "url" => string_column(records, |r| r.record.url.clone()),
        "keywords" => string_column(records, |r| r.record.keywords.clone()),
        _ => string_column(records, |r| {
            r.record.extra_value(name).and_then(value_to_string)
        }),
    }
}

/// Build the output table with `columns` in order.
pub fn to_record_batch(records: &[ScoredRecord], columns: &[String]) -> Result<RecordBatch> {
    let fields: Vec<Field> = columns
        .iter()
        .map(|name| Field::new(name, field_type(name), true))
        .collect();
    let arrays: Vec<ArrayRef> = columns.iter().map(|name| column_array(name, records)).collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).context("building output batch")
}

/// Rows per label. Labels with no rows are absent.
pub fn sentiment_counts(records: &[ScoredRecord]) -> BTreeMap<SentimentLabel, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        *counts.entry(r.sent_label).or_insert(0) += 1;
    }
    counts
}

/// Two-column table: `sent_label`, `count`.
pub fn counts_batch(counts: &BTreeMap<SentimentLabel, usize>) -> Result<RecordBatch> {
    let schema = Schema::new(vec![
        Field::new("sent_label", DataType::Utf8, false),
        Field::new("count", DataType::Int64, false),
    ]);
    let labels: StringArray = counts.keys().map(|l| Some(l.as_str())).collect();
    let values = Int64Array::from_iter_values(counts.values().map(|&c| c as i64));
    RecordBatch::try_new(
        Arc::new(schema),
        vec![Arc::new(labels) as ArrayRef, Arc::new(values) as ArrayRef],
    )
    .context("building counts batch")
}

/// Write `batch` as CSV with a header row.
pub fn write_csv(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .with_timestamp_format(CSV_TIMESTAMP_FORMAT.to_string())
        .build(file);
    writer
        .write(batch)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Write `batch` as a Snappy-compressed Parquet file.
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer")?;
    writer.write(batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

/// Outcome of the best-effort columnar write.
#[derive(Debug, Clone, PartialEq)]
pub enum SecondaryArtifact {
    Written(PathBuf),
    Failed { path: PathBuf, reason: String },
}

impl SecondaryArtifact {
    pub fn is_written(&self) -> bool {
        matches!(self, SecondaryArtifact::Written(_))
    }
}

/// What one transform run produced.
#[derive(Debug)]
pub struct WriteReport {
    pub rows: usize,
    pub counts: BTreeMap<SentimentLabel, usize>,
    pub csv_path: PathBuf,
    pub parquet: SecondaryArtifact,
    pub counts_path: PathBuf,
}

impl WriteReport {
    pub fn count(&self, label: SentimentLabel) -> usize {
        self.counts.get(&label).copied().unwrap_or(0)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Saved {} rows. Pos={} Neg={} Neu={}",
            self.rows,
            self.count(SentimentLabel::Positive),
            self.count(SentimentLabel::Negative),
            self.count(SentimentLabel::Neutral),
        )
    }
}

/// Write the row table (CSV, then Parquet best-effort) and the label counts.
///
/// Only the CSV outputs can fail the call; a Parquet failure is reported in
/// [`WriteReport::parquet`].
#[tracing::instrument(level = "info", skip(records, raw_columns), fields(dir = %out_dir.display(), rows = records.len()))]
pub fn write_outputs(
    out_dir: &Path,
    records: &[ScoredRecord],
    raw_columns: &[String],
) -> Result<WriteReport> {
    let columns = column_order(raw_columns);
    let batch = to_record_batch(records, &columns)?;

    let csv_path = out_dir.join(CLEAN_CSV);
    write_csv(&csv_path, &batch)?;
    info!(path = %csv_path.display(), "wrote csv");

    let parquet_path = out_dir.join(CLEAN_PARQUET);
    let parquet = match write_parquet(&parquet_path, &batch) {
        Ok(()) => {
            info!(path = %parquet_path.display(), "wrote parquet");
            SecondaryArtifact::Written(parquet_path)
        }
        Err(e) => {
            warn!(path = %parquet_path.display(), "parquet write failed: {:#}", e);
            SecondaryArtifact::Failed {
                path: parquet_path,
                reason: format!("{:#}", e),
            }
        }
    };

    let counts = sentiment_counts(records);
    let counts_path = out_dir.join(COUNTS_CSV);
    write_csv(&counts_path, &counts_batch(&counts)?)?;
    info!(path = %counts_path.display(), labels = counts.len(), "wrote counts");

    Ok(WriteReport {
        rows: records.len(),
        counts,
        csv_path,
        parquet,
        counts_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CleanRecord;
    use chrono::NaiveDateTime;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn scored(post_id: &str, text: &str, compound: f64) -> ScoredRecord {
        ScoredRecord {
            record: CleanRecord {
                post_id: Some(post_id.to_string()),
                text: Some(text.to_string()),
                author: Some("ann".into()),
                video_id: Some("v1".into()),
                brand: Some("verizon".into()),
                keywords: Some(r#"["5g","coverage"]"#.into()),
                keywords_str: "5g,coverage".into(),
                created_utc: Some("2024-03-01T10:00:00Z".into()),
                created_dt: Timestamp::At(
                    NaiveDateTime::parse_from_str("2024-03-01 10:00:00", "%Y-%m-%d %H:%M:%S")
                        .unwrap(),
                ),
                like_count: 3,
                url: None,
                fetched_at: Some("garbage".into()),
                fetched_dt: Timestamp::NotATime,
                extra: vec![("source".into(), json!("youtube"))],
            },
            sent_compound: compound,
            sent_label: SentimentLabel::from_compound(compound),
        }
    }

    #[test]
    fn column_order_puts_preferred_first() {
        let raw = vec![
            "source".to_string(),
            "text".to_string(),
            "keywords".to_string(),
            "lang".to_string(),
        ];
        let cols = column_order(&raw);
        assert_eq!(&cols[..14], &PREFERRED_COLUMNS.map(String::from)[..]);
        assert_eq!(&cols[14..], &["source", "keywords", "lang"]);

        let cols = column_order(&[]);
        assert_eq!(cols.last().map(String::as_str), Some("keywords"));
        assert_eq!(cols.len(), 15);
    }

    #[test]
    fn writes_csv_parquet_and_counts() -> Result<()> {
        let dir = tempdir()?;
        let records = vec![
            scored("p1", "great, really", 0.6),
            scored("p2", "awful", -0.4),
            scored("p3", "fine", 0.05),
        ];
        let raw = vec!["source".to_string()];
        let report = write_outputs(dir.path(), &records, &raw)?;

        assert_eq!(report.rows, 3);
        assert!(report.parquet.is_written());
        assert_eq!(report.summary_line(), "Saved 3 rows. Pos=2 Neg=1 Neu=0");

        let csv = fs::read_to_string(&report.csv_path)?;
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some(
                "post_id,brand,video_id,author,text,sent_label,sent_compound,like_count,\
                 created_utc,created_dt,fetched_at,fetched_dt,keywords_str,url,source,keywords"
            )
        );
        let first = lines.next().unwrap_or_default();
        assert!(first.starts_with("p1,verizon,v1,ann,\"great, really\",positive,0.6,3,"));
        assert!(first.contains(",2024-03-01 10:00:00,garbage,,\"5g,coverage\",,youtube,"));
        assert_eq!(csv.lines().count(), 4);

        let counts = fs::read_to_string(&report.counts_path)?;
        let counts: Vec<_> = counts.lines().collect();
        assert_eq!(counts, vec!["sent_label,count", "negative,1", "positive,2"]);

        let file = File::open(dir.path().join(CLEAN_PARQUET))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        let mut rows = 0;
        for batch in reader {
            let batch = batch?;
            assert_eq!(batch.num_columns(), 16);
            rows += batch.num_rows();
        }
        assert_eq!(rows, 3);
        Ok(())
    }

    #[test]
    fn parquet_failure_is_not_fatal() -> Result<()> {
        let dir = tempdir()?;
        // a directory where the parquet file should go makes the write fail
        fs::create_dir(dir.path().join(CLEAN_PARQUET))?;

        let report = write_outputs(dir.path(), &[scored("p1", "good", 0.44)], &[])?;
        assert!(!report.parquet.is_written());
        assert!(report.csv_path.exists());
        assert!(report.counts_path.exists());
        Ok(())
    }

    #[test]
    fn zero_rows_write_headers_only() -> Result<()> {
        let dir = tempdir()?;
        let report = write_outputs(dir.path(), &[], &[])?;

        assert_eq!(report.summary_line(), "Saved 0 rows. Pos=0 Neg=0 Neu=0");
        let csv = fs::read_to_string(&report.csv_path)?;
        assert_eq!(csv.trim_end(), column_order(&[]).join(","));
        let counts = fs::read_to_string(&report.counts_path)?;
        assert_eq!(counts.trim_end(), "sent_label,count");
        Ok(())
    }

    #[test]
    fn aggregate_counts_cover_every_row() {
        let records = vec![
            scored("a", "x", 0.9),
            scored("b", "y", 0.0),
            scored("c", "z", -0.9),
            scored("d", "w", 0.01),
        ];
        let counts = sentiment_counts(&records);
        assert_eq!(counts.values().sum::<usize>(), records.len());
        assert_eq!(counts.get(&SentimentLabel::Neutral), Some(&2));
    }
}
