// src/ingest/youtube.rs

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use url::Url;

use super::errors::{classify, ApiError, YtErrorReason};

pub const API_BASE: &str = "https://www.googleapis.com/youtube/v3/";
pub const SEARCH_PAGE_SIZE: usize = 50;
pub const COMMENTS_PAGE_SIZE: usize = 100;
pub const MAX_ATTEMPTS: u32 = 5;
pub const PAGE_PAUSE: Duration = Duration::from_millis(200);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait before retry number `attempt + 1`: one second, doubling each time.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(1000u64 << attempt.min(16))
}

/// A top-level comment as the API reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub comment_id: String,
    pub text: String,
    pub author: String,
    pub like_count: i64,
    pub published_at: String,
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

fn parse_page<T>(body: &str, item: impl Fn(&Value) -> Option<T>) -> Result<Page<T>> {
    let json: Value = serde_json::from_str(body).context("parsing API response")?;
    let items = json
        .get("items")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(&item).collect())
        .unwrap_or_default();
    let next_page_token = json
        .get("nextPageToken")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(Page {
        items,
        next_page_token,
    })
}

/// Video ids from a `search` response; results that are not videos are skipped.
pub fn parse_search_page(body: &str) -> Result<Page<String>> {
    parse_page(body, |it| {
        it.pointer("/id/videoId")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

/// Top-level comments from a `commentThreads` response.
pub fn parse_comment_page(body: &str) -> Result<Page<Comment>> {
    parse_page(body, |it| {
        let top = it.pointer("/snippet/topLevelComment")?;
        let comment_id = top.get("id")?.as_str()?.to_string();
        let s = top.get("snippet")?;
        let text_field = |key: &str| {
            s.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Some(Comment {
            comment_id,
            text: text_field("textOriginal"),
            author: text_field("authorDisplayName"),
            like_count: s.get("likeCount").and_then(Value::as_i64).unwrap_or(0),
            published_at: text_field("publishedAt"),
        })
    })
}

/// Client for the two YouTube Data API endpoints the collector needs.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    http: Client,
    api_key: String,
    base: Url,
}

impl YouTubeClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Self::with_base_url(http, api_key, API_BASE)
    }

    /// Point the client at another API root (must end with `/`).
    pub fn with_base_url(http: Client, api_key: impl Into<String>, base: &str) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("parsing API base {}", base))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base,
        })
    }

    pub fn search_url(
        &self,
        query: &str,
        published_after: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<Url> {
        let max_results = max_results.to_string();
        let mut params = vec![
            ("part", "snippet"),
            ("type", "video"),
            ("order", "date"),
            ("maxResults", max_results.as_str()),
            ("q", query),
            ("publishedAfter", published_after),
            ("key", self.api_key.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        self.endpoint("search", &params)
    }

    pub fn comments_url(
        &self,
        video_id: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<Url> {
        let max_results = max_results.to_string();
        let mut params = vec![
            ("part", "snippet"),
            ("order", "time"),
            ("maxResults", max_results.as_str()),
            ("videoId", video_id),
            ("key", self.api_key.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        self.endpoint("commentThreads", &params)
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .with_context(|| format!("joining {} onto {}", path, self.base))?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// GET a page body, retrying rate and quota refusals with exponential backoff.
    async fn get_page(&self, url: &Url) -> Result<String> {
        let mut attempt = 0;
        loop {
            let resp = self
                .http
                .get(url.clone())
                .send()
                .await
                .map_err(reqwest::Error::without_url)
                .context("sending request")?;
            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(reqwest::Error::without_url)
                .context("reading response body")?;

            let err = classify(status, &body);
            if err.reason == YtErrorReason::None {
                return Ok(body);
            }
            attempt += 1;
            if !err.reason.is_retryable() || attempt >= MAX_ATTEMPTS {
                return Err(err.into());
            }
            let delay = backoff_delay(attempt - 1);
            warn!(
                reason = %err.reason,
                attempt,
                "rate/quota error: {}. retrying in {} ms",
                err.message,
                delay.as_millis()
            );
            sleep(delay).await;
        }
    }

    /// Newest videos matching `query` published after the given instant.
    #[tracing::instrument(level = "info", skip(self), fields(found = tracing::field::Empty))]
    pub async fn search_video_ids(
        &self,
        query: &str,
        published_after: &str,
        max_results: usize,
    ) -> Vec<String> {
        let mut ids = Vec::new();
        let mut token: Option<String> = None;

        while ids.len() < max_results {
            let want = (max_results - ids.len()).min(SEARCH_PAGE_SIZE);
            let page = match self
                .fetch_search_page(query, published_after, want, token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    error!("search failed: {:#}", e);
                    break;
                }
            };
            ids.extend(page.items);
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
            sleep(PAGE_PAUSE).await;
        }

        ids.truncate(max_results);
        tracing::Span::current().record("found", ids.len());
        info!("fetched {} video ids", ids.len());
        ids
    }

    async fn fetch_search_page(
        &self,
        query: &str,
        published_after: &str,
        want: usize,
        token: Option<&str>,
    ) -> Result<Page<String>> {
        let url = self.search_url(query, published_after, want, token)?;
        let body = self.get_page(&url).await?;
        parse_search_page(&body)
    }

    /// Top-level comments on a video, newest first.
    #[tracing::instrument(level = "info", skip(self), fields(found = tracing::field::Empty))]
    pub async fn fetch_comments(&self, video_id: &str, max_results: usize) -> Vec<Comment> {
        let mut out = Vec::new();
        let mut token: Option<String> = None;

        while out.len() < max_results {
            let want = (max_results - out.len()).min(COMMENTS_PAGE_SIZE);
            let page = match self.fetch_comment_page(video_id, want, token.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    match e.downcast_ref::<ApiError>() {
                        Some(api) if api.reason == YtErrorReason::Forbidden => {
                            debug!("comments unavailable: {}", api.message)
                        }
                        _ => error!("comment fetch failed: {:#}", e),
                    }
                    break;
                }
            };
            out.extend(page.items);
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
            sleep(PAGE_PAUSE).await;
        }

        out.truncate(max_results);
        tracing::Span::current().record("found", out.len());
        info!("fetched {} comments", out.len());
        out
    }

    async fn fetch_comment_page(
        &self,
        video_id: &str,
        want: usize,
        token: Option<&str>,
    ) -> Result<Page<Comment>> {
        let url = self.comments_url(video_id, want, token)?;
        let body = self.get_page(&url).await?;
        parse_comment_page(&body)
    }
}
