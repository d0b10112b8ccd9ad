// src/sentiment/mod.rs

pub mod analyzer;

use rayon::prelude::*;
use std::fmt;
use tracing::info;

use crate::record::{CleanRecord, ScoredRecord};
pub use analyzer::{PolarityScores, SentimentAnalyzer};

/// Compound scores at or above this are positive.
pub const POSITIVE_THRESHOLD: f64 = 0.05;
/// Compound scores at or below this are negative.
pub const NEGATIVE_THRESHOLD: f64 = -0.05;

const ANALYZER: SentimentAnalyzer = SentimentAnalyzer;

/// Three-way label derived from a compound score.
///
/// Variant order is alphabetical so ordered maps list labels the way a
/// sorted group-by would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 3] = [
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
        SentimentLabel::Positive,
    ];

    pub fn from_compound(score: f64) -> Self {
        if score >= POSITIVE_THRESHOLD {
            SentimentLabel::Positive
        } else if score <= NEGATIVE_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Positive => "positive",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compound score for a text; absent text is neutral without running the analyzer.
pub fn score_text(text: Option<&str>) -> f64 {
    match text {
        Some(t) => ANALYZER.polarity_scores(t).compound,
        None => 0.0,
    }
}

/// Score every record. Runs in parallel; output order matches input order.
pub fn score_records(records: Vec<CleanRecord>) -> Vec<ScoredRecord> {
    let scored: Vec<ScoredRecord> = records
        .into_par_iter()
        .map(|record| {
            let sent_compound = score_text(record.text.as_deref());
            ScoredRecord {
                sent_label: SentimentLabel::from_compound(sent_compound),
                sent_compound,
                record,
            }
        })
        .collect();
    info!(rows = scored.len(), "scored sentiment");
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Timestamp;

    fn clean(text: &str) -> CleanRecord {
        CleanRecord {
            post_id: None,
            text: Some(text.to_string()),
            author: None,
            video_id: None,
            brand: None,
            keywords: None,
            keywords_str: String::new(),
            created_utc: None,
            created_dt: Timestamp::NotATime,
            like_count: 0,
            url: None,
            fetched_at: None,
            fetched_dt: Timestamp::NotATime,
            extra: Vec::new(),
        }
    }

    #[test]
    fn label_thresholds_are_inclusive_at_both_edges() {
        assert_eq!(SentimentLabel::from_compound(0.05), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_compound(0.0499), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_compound(-0.05), SentimentLabel::Negative);
        assert_eq!(SentimentLabel::from_compound(-0.0499), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_compound(0.0), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_compound(1.0), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_compound(-1.0), SentimentLabel::Negative);
    }

    #[test]
    fn thresholds_are_symmetric() {
        assert_eq!(POSITIVE_THRESHOLD, -NEGATIVE_THRESHOLD);
    }

    #[test]
    fn missing_text_scores_zero() {
        assert_eq!(score_text(None), 0.0);
        assert_eq!(SentimentLabel::from_compound(score_text(None)), SentimentLabel::Neutral);
    }

    #[test]
    fn labels_render_lowercase() {
        let names: Vec<_> = SentimentLabel::ALL.iter().map(|l| l.to_string()).collect();
        assert_eq!(names, vec!["negative", "neutral", "positive"]);
    }

    #[test]
    fn scoring_preserves_order_and_pairs_rows() {
        let texts = ["great coverage", "terrible signal", "just a phone", "love it"];
        let records: Vec<_> = texts.iter().map(|t| clean(t)).collect();
        let scored = score_records(records);

        let got: Vec<_> = scored.iter().map(|s| s.record.text.as_deref()).collect();
        assert_eq!(got, texts.map(Some));
        let labels: Vec<_> = scored.iter().map(|s| s.sent_label).collect();
        assert_eq!(
            labels,
            vec![
                SentimentLabel::Positive,
                SentimentLabel::Negative,
                SentimentLabel::Neutral,
                SentimentLabel::Positive,
            ]
        );
        for s in &scored {
            assert_eq!(s.sent_compound, score_text(s.record.text.as_deref()));
        }
    }

    #[test]
    fn records_without_text_score_neutral() {
        let mut silent = clean("placeholder");
        silent.text = None;
        let scored = score_records(vec![silent, clean("love it")]);
        assert_eq!(scored[0].sent_compound, 0.0);
        assert_eq!(scored[0].sent_label, SentimentLabel::Neutral);
        assert_eq!(scored[1].sent_label, SentimentLabel::Positive);
    }
}
