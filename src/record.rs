// src/record.rs

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::sentiment::SentimentLabel;

/// Keys the normalizer knows about. Every one of them exists as a column
/// after cleaning, whether or not any input line carried it.
pub const EXPECTED_FIELDS: [&str; 10] = [
    "post_id",
    "text",
    "author",
    "video_id",
    "brand",
    "keywords",
    "created_utc",
    "like_count",
    "url",
    "fetched_at",
];

/// One parsed NDJSON object.
///
/// Absent keys and JSON `null` both land as `None`; keys outside
/// [`EXPECTED_FIELDS`] are kept in `extra` in the order the line listed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub post_id: Option<Value>,
    pub text: Option<Value>,
    pub author: Option<Value>,
    pub video_id: Option<Value>,
    pub brand: Option<Value>,
    pub keywords: Option<Value>,
    pub created_utc: Option<Value>,
    pub like_count: Option<Value>,
    pub url: Option<Value>,
    pub fetched_at: Option<Value>,
    pub extra: Vec<(String, Value)>,
}

impl RawRecord {
    /// Split a JSON object into known fields and extras.
    pub fn from_object(obj: Map<String, Value>) -> Self {
        let mut rec = RawRecord::default();
        for (key, value) in obj {
            let value = if value.is_null() { None } else { Some(value) };
            let slot = match key.as_str() {
                "post_id" => &mut rec.post_id,
                "text" => &mut rec.text,
                "author" => &mut rec.author,
                "video_id" => &mut rec.video_id,
                "brand" => &mut rec.brand,
                "keywords" => &mut rec.keywords,
                "created_utc" => &mut rec.created_utc,
                "like_count" => &mut rec.like_count,
                "url" => &mut rec.url,
                "fetched_at" => &mut rec.fetched_at,
                _ => {
                    rec.extra.push((key, value.unwrap_or(Value::Null)));
                    continue;
                }
            };
            *slot = value;
        }
        rec
    }

    /// Value of an extra column, `None` when this record never had it.
    pub fn extra_value(&self, name: &str) -> Option<&Value> {
        lookup_extra(&self.extra, name)
    }
}

/// All records from one load, plus the union of their keys in first-seen order.
#[derive(Debug, Default)]
pub struct RawTable {
    pub records: Vec<RawRecord>,
    pub columns: Vec<String>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Append a record, registering any key not yet seen.
    pub fn push(&mut self, obj: Map<String, Value>) {
        for key in obj.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
            }
        }
        self.records.push(RawRecord::from_object(obj));
    }
}

fn lookup_extra<'a>(extra: &'a [(String, Value)], name: &str) -> Option<&'a Value> {
    extra
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v)
        .filter(|v| !v.is_null())
}

/// Render a JSON value as a flat string.
///
/// Strings come back as-is, numbers and booleans in display form, arrays
/// and objects as compact JSON. `null` has no string form.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// A parsed instant, or the explicit marker for an unparseable one.
///
/// Ordering puts `NotATime` after every real instant, so unknown timestamps
/// sort last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timestamp {
    At(NaiveDateTime),
    NotATime,
}

impl Timestamp {
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Timestamp::At(dt) => Some(*dt),
            Timestamp::NotATime => None,
        }
    }
}

impl From<Option<NaiveDateTime>> for Timestamp {
    fn from(dt: Option<NaiveDateTime>) -> Self {
        dt.map_or(Timestamp::NotATime, Timestamp::At)
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Timestamp::At(a), Timestamp::At(b)) => a.cmp(b),
            (Timestamp::At(_), Timestamp::NotATime) => Ordering::Less,
            (Timestamp::NotATime, Timestamp::At(_)) => Ordering::Greater,
            (Timestamp::NotATime, Timestamp::NotATime) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A record after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    pub post_id: Option<String>,
    /// Whitespace-collapsed and non-empty when present; `None` when the
    /// input had no text at all.
    pub text: Option<String>,
    pub author: Option<String>,
    pub video_id: Option<String>,
    pub brand: Option<String>,
    /// Raw keywords rendered as a string (JSON text for lists).
    pub keywords: Option<String>,
    pub keywords_str: String,
    pub created_utc: Option<String>,
    pub created_dt: Timestamp,
    pub like_count: u64,
    pub url: Option<String>,
    pub fetched_at: Option<String>,
    pub fetched_dt: Timestamp,
    pub extra: Vec<(String, Value)>,
}

impl CleanRecord {
    pub fn sort_key(&self) -> (Timestamp, Timestamp) {
        (self.created_dt, self.fetched_dt)
    }

    pub fn extra_value(&self, name: &str) -> Option<&Value> {
        lookup_extra(&self.extra, name)
    }

    /// Identity used when no stable `post_id` is available.
    pub fn composite_key(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        (
            self.video_id.as_deref(),
            self.author.as_deref(),
            self.text.as_deref(),
        )
    }
}

/// A cleaned record with its sentiment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: CleanRecord,
    pub sent_compound: f64,
    pub sent_label: SentimentLabel,
}
