// src/ingest/errors.rs

use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;

/// Why the YouTube Data API refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YtErrorReason {
    /// The request succeeded.
    None,
    RateLimitExceeded,
    UserRateLimitExceeded,
    QuotaExceeded,
    DailyLimitExceeded,
    Forbidden,
    Unknown,
}

impl YtErrorReason {
    /// Rate and quota refusals clear up on their own; everything else is final.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            YtErrorReason::RateLimitExceeded
                | YtErrorReason::UserRateLimitExceeded
                | YtErrorReason::QuotaExceeded
                | YtErrorReason::DailyLimitExceeded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            YtErrorReason::None => "none",
            YtErrorReason::RateLimitExceeded => "rateLimitExceeded",
            YtErrorReason::UserRateLimitExceeded => "userRateLimitExceeded",
            YtErrorReason::QuotaExceeded => "quotaExceeded",
            YtErrorReason::DailyLimitExceeded => "dailyLimitExceeded",
            YtErrorReason::Forbidden => "forbidden",
            YtErrorReason::Unknown => "unknown",
        }
    }

    fn from_reason(reason: &str) -> Option<Self> {
        match reason {
            "rateLimitExceeded" => Some(YtErrorReason::RateLimitExceeded),
            "userRateLimitExceeded" => Some(YtErrorReason::UserRateLimitExceeded),
            "quotaExceeded" => Some(YtErrorReason::QuotaExceeded),
            "dailyLimitExceeded" => Some(YtErrorReason::DailyLimitExceeded),
            _ => None,
        }
    }
}

impl fmt::Display for YtErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub reason: YtErrorReason,
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "YouTube API error ({}): {}", self.reason, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Pull the reason and message out of a Google API error body:
///
/// ```json
/// {"error": {"code": 403, "message": "...", "errors": [{"reason": "quotaExceeded"}]}}
/// ```
///
/// The first listed reason wins; a bare 403 is `Forbidden`; anything
/// else, including bodies that are not JSON, is `Unknown`.
pub fn parse_error_body(body: &str) -> ApiError {
    let unknown = |message: String| ApiError {
        reason: YtErrorReason::Unknown,
        message,
    };

    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return unknown(body.trim().to_string());
    };
    let Some(err) = json.get("error") else {
        return unknown(String::new());
    };

    let message = err
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let listed = err
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errs| errs.first())
        .and_then(|first| first.get("reason"))
        .and_then(Value::as_str)
        .and_then(YtErrorReason::from_reason);
    if let Some(reason) = listed {
        return ApiError { reason, message };
    }

    if err.get("code").and_then(Value::as_i64) == Some(403) {
        return ApiError {
            reason: YtErrorReason::Forbidden,
            message,
        };
    }
    unknown(message)
}

/// Classify a response by status, parsing the body only on failure.
pub fn classify(status: StatusCode, body: &str) -> ApiError {
    if status.is_success() {
        return ApiError {
            reason: YtErrorReason::None,
            message: String::new(),
        };
    }
    let mut err = parse_error_body(body);
    if err.reason == YtErrorReason::Unknown && status == StatusCode::FORBIDDEN {
        err.reason = YtErrorReason::Forbidden;
    }
    if err.message.is_empty() {
        err.message = status.to_string();
    }
    err
}
