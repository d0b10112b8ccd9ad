// src/normalize.rs

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::record::{value_to_string, CleanRecord, RawRecord, RawTable, Timestamp};

/// Formats that carry an explicit UTC offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y/%m/%d %H:%M:%S%.f%:z",
];

/// Formats without an offset; these are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Collapse every whitespace run to one ASCII space and trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Best-effort parse into a naive UTC instant.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.naive_utc());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse an optional raw field; anything unusable becomes `NotATime`.
pub fn parse_timestamp_field(value: Option<&Value>) -> Timestamp {
    value
        .and_then(value_to_string)
        .and_then(|s| parse_timestamp(&s))
        .into()
}

/// Coerce a like count to a non-negative integer, 0 when it cannot be read.
pub fn coerce_like_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(u) = n.as_u64() {
                u
            } else if n.is_i64() {
                0
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f.trunc() as u64)
                    .unwrap_or(0)
            }
        }
        Some(Value::String(s)) => s.trim().parse::<i64>().map_or(0, |v| v.max(0) as u64),
        Some(Value::Bool(b)) => u64::from(*b),
        _ => 0,
    }
}

/// Flatten keywords into one string: lists comma-joined, scalars as-is, absent as "".
pub fn flatten_keywords(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| value_to_string(v).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(","),
        Some(v) => value_to_string(v).unwrap_or_default(),
        None => String::new(),
    }
}

/// Case-insensitive brand match. Records without a brand never match.
pub fn brand_matches(record: &RawRecord, brand: &str) -> bool {
    record
        .brand
        .as_ref()
        .and_then(value_to_string)
        .is_some_and(|b| b.to_lowercase() == brand.to_lowercase())
}

fn string_field(value: &Option<Value>) -> Option<String> {
    value.as_ref().and_then(value_to_string)
}

/// Convert one raw record, or `None` when its text is present but blank.
/// Absent or null text passes through as `None`.
fn clean_record(raw: RawRecord) -> Option<CleanRecord> {
    let text = match string_field(&raw.text) {
        Some(t) => {
            let t = collapse_whitespace(&t);
            if t.is_empty() {
                return None;
            }
            Some(t)
        }
        None => None,
    };

    Some(CleanRecord {
        post_id: string_field(&raw.post_id),
        author: string_field(&raw.author),
        video_id: string_field(&raw.video_id),
        brand: string_field(&raw.brand),
        keywords: string_field(&raw.keywords),
        keywords_str: flatten_keywords(raw.keywords.as_ref()),
        created_dt: parse_timestamp_field(raw.created_utc.as_ref()),
        created_utc: string_field(&raw.created_utc),
        like_count: coerce_like_count(raw.like_count.as_ref()),
        url: string_field(&raw.url),
        fetched_dt: parse_timestamp_field(raw.fetched_at.as_ref()),
        fetched_at: string_field(&raw.fetched_at),
        extra: raw.extra,
        text,
    })
}

/// Drop duplicates, keeping the first occurrence.
///
/// Records with a `post_id` are unique by it; records without one are unique
/// by `(video_id, author, text)`.
pub fn dedupe(records: Vec<CleanRecord>) -> Vec<CleanRecord> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_keys: HashSet<(Option<String>, Option<String>, Option<String>)> = HashSet::new();

    records
        .into_iter()
        .filter(|r| match &r.post_id {
            Some(id) => seen_ids.insert(id.clone()),
            None => {
                let (video, author, text) = r.composite_key();
                seen_keys.insert((
                    video.map(str::to_string),
                    author.map(str::to_string),
                    text.map(str::to_string),
                ))
            }
        })
        .collect()
}

/// Clean, sort and deduplicate a raw table. A blank `brand` means no filter.
///
/// Never fails on a per-row problem: bad timestamps become `NotATime`, bad
/// like counts become 0, blank texts are dropped.
#[tracing::instrument(level = "info", skip(table), fields(rows = table.len()))]
pub fn clean_table(table: RawTable, brand: Option<&str>) -> Vec<CleanRecord> {
    if table.is_empty() {
        return Vec::new();
    }

    let total = table.len();
    let brand = brand.filter(|b| !b.trim().is_empty());
    let filtered: Vec<RawRecord> = match brand {
        Some(b) => table
            .records
            .into_iter()
            .filter(|r| brand_matches(r, b))
            .collect(),
        None => table.records,
    };
    let after_brand = filtered.len();

    let mut records: Vec<CleanRecord> = filtered.into_iter().filter_map(clean_record).collect();
    let after_text = records.len();

    // stable: equal keys keep load order
    records.sort_by_key(CleanRecord::sort_key);

    let with_id = records.iter().filter(|r| r.post_id.is_some()).count();
    let records = dedupe(records);
    debug!(
        by_post_id = with_id,
        by_composite_key = after_text - with_id,
        "deduplicated"
    );

    info!(
        total,
        brand_dropped = total - after_brand,
        empty_text_dropped = after_brand - after_text,
        duplicates_dropped = after_text - records.len(),
        kept = records.len(),
        "normalized records"
    );
    records
}
