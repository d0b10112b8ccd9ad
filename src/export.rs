// src/export.rs

use anyhow::{Context, Result};
use rusqlite::{types::ValueRef, Connection, OpenFlags};
use std::{fs, path::Path};
use tracing::info;

/// Columns of the `posts` table, in export order.
pub const POSTS_COLUMNS: [&str; 10] = [
    "post_id",
    "source",
    "brand",
    "created_utc",
    "text",
    "sentiment_score",
    "sentiment_label",
    "like_count",
    "video_id",
    "url",
];

const EXPORT_SQL: &str = "SELECT post_id, source, brand, created_utc, text, \
     sentiment_score, sentiment_label, like_count, video_id, url \
     FROM posts ORDER BY datetime(created_utc) ASC";

/// Render one SQLite value the way it appears in the CSV.
pub fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format_real(f),
        ValueRef::Text(b) | ValueRef::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

/// Shortest round-trip form, keeping a `.0` on integral values.
fn format_real(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

/// Dump `posts` from the SQLite database at `db_path` to `out_csv`, oldest first.
/// Returns the number of rows written.
#[tracing::instrument(level = "info", skip_all, fields(db = %db_path.as_ref().display(), out = %out_csv.as_ref().display()))]
pub fn export_posts<P: AsRef<Path>, Q: AsRef<Path>>(db_path: P, out_csv: Q) -> Result<usize> {
    let db_path = db_path.as_ref();
    let out_csv = out_csv.as_ref();

    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    let mut stmt = conn.prepare(EXPORT_SQL).context("preparing posts query")?;

    if let Some(parent) = out_csv.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut wtr = csv::Writer::from_path(out_csv)
        .with_context(|| format!("creating {}", out_csv.display()))?;
    wtr.write_record(POSTS_COLUMNS)?;

    let mut rows = stmt.query([]).context("querying posts")?;
    let mut written = 0;
    let mut fields = Vec::with_capacity(POSTS_COLUMNS.len());
    while let Some(row) = rows.next()? {
        fields.clear();
        for idx in 0..POSTS_COLUMNS.len() {
            fields.push(render_value(row.get_ref(idx)?));
        }
        wtr.write_record(&fields)?;
        written += 1;
    }
    wtr.flush()
        .with_context(|| format!("flushing {}", out_csv.display()))?;

    info!("exported {} rows", written);
    Ok(written)
}
