//! Polarity scoring backed by the VADER lexicon and rule set.

use vader_sentiment::SentimentIntensityAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PolarityScores {
    pub neg: f64,
    pub neu: f64,
    pub pos: f64,
    /// Normalized sum of valences in [-1, 1].
    pub compound: f64,
}

/// Handle over the VADER analyzer. The lexicon behind it is parsed once per
/// process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        SentimentAnalyzer
    }

    /// Score a text span.
    pub fn polarity_scores(&self, text: &str) -> PolarityScores {
        let analyzer = SentimentIntensityAnalyzer::new();
        let scores = analyzer.polarity_scores(text);
        let get = |key: &str| scores.get(key).copied().unwrap_or(0.0);
        PolarityScores {
            neg: get("neg"),
            neu: get("neu"),
            pos: get("pos"),
            compound: get("compound").clamp(-1.0, 1.0),
        }
    }
}
