//! Extraction of budget metadata from API response headers.
//!
//! The remote service publishes no static limits; the only source of truth
//! is the `x-ratelimit-*` header family attached to every response,
//! successful or not:
//! - `x-ratelimit-limit-requests` / `x-ratelimit-limit-tokens`
//! - `x-ratelimit-remaining-requests` / `x-ratelimit-remaining-tokens`
//! - `x-ratelimit-reset-requests` / `x-ratelimit-reset-tokens` (duration strings such as `6m0s`)
//!
//! A header that is missing or fails to parse is reported as unknown.

use reqwest::header::HeaderMap;
use sluice_core::RateLimitMetadata;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Detects and caches budget metadata from API response headers.
///
/// # Example
///
/// ```rust,ignore
/// use sluice_rate_limit::HeaderRateLimitDetector;
///
/// let detector = HeaderRateLimitDetector::new();
///
/// // After making an API call
/// if let Some(meta) = detector.detect_openai(response.headers()).await {
///     println!("Tokens remaining: {:?}", meta.token_remaining);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HeaderRateLimitDetector {
    /// Last metadata seen (updated on each detection)
    last_seen: Arc<RwLock<Option<RateLimitMetadata>>>,
}

impl HeaderRateLimitDetector {
    /// Create a new header detector.
    #[instrument]
    pub fn new() -> Self {
        debug!("Creating new header rate limit detector");
        Self {
            last_seen: Arc::new(RwLock::new(None)),
        }
    }

    /// Detect budget metadata from OpenAI-style response headers and cache it.
    ///
    /// Returns `None` when the response carried no rate limit header at all.
    #[instrument(skip(self, headers))]
    pub async fn detect_openai(&self, headers: &HeaderMap) -> Option<RateLimitMetadata> {
        let metadata = parse_openai_headers(headers);
        if metadata.is_empty() {
            debug!("No rate limit headers on response");
            return None;
        }

        debug!(
            token_limit = ?metadata.token_limit,
            token_remaining = ?metadata.token_remaining,
            request_limit = ?metadata.request_limit,
            request_remaining = ?metadata.request_remaining,
            "Detected rate limit headers"
        );

        *self.last_seen.write().await = Some(metadata);
        Some(metadata)
    }

    /// Last detected metadata, or `None` if nothing has been detected yet.
    #[instrument(skip(self))]
    pub async fn get_cached(&self) -> Option<RateLimitMetadata> {
        let cached = *self.last_seen.read().await;
        debug!(has_cached = cached.is_some(), "Retrieving cached rate limit metadata");
        cached
    }

    /// Forget the cached metadata.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self) {
        debug!("Clearing cached rate limit metadata");
        *self.last_seen.write().await = None;
    }
}

impl Default for HeaderRateLimitDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse every `x-ratelimit-*` header into metadata without caching.
pub fn parse_openai_headers(headers: &HeaderMap) -> RateLimitMetadata {
    RateLimitMetadata {
        token_limit: parse_header_u64(headers, "x-ratelimit-limit-tokens"),
        token_remaining: parse_header_u64(headers, "x-ratelimit-remaining-tokens"),
        token_reset_after: parse_header_duration(headers, "x-ratelimit-reset-tokens"),
        request_limit: parse_header_u64(headers, "x-ratelimit-limit-requests"),
        request_remaining: parse_header_u64(headers, "x-ratelimit-remaining-requests"),
        request_reset_after: parse_header_duration(headers, "x-ratelimit-reset-requests"),
    }
}

/// Parse a Go-style duration string as sent in reset headers.
///
/// Accepts a sequence of `<number><unit>` pairs with units `h`, `m`, `s`,
/// `ms`, `us`/`µs` and `ns`, e.g. `"6m0s"`, `"2h30m15s"`, `"20ms"`, `"0.5s"`.
/// A bare number is read as seconds.
///
/// # Example
///
/// ```
/// use sluice_rate_limit::parse_reset_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_reset_duration("6m0s"), Some(Duration::from_secs(360)));
/// assert_eq!(parse_reset_duration("20ms"), Some(Duration::from_millis(20)));
/// assert_eq!(parse_reset_duration("soon"), None);
/// ```
pub fn parse_reset_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }

    let mut total = 0.0_f64;
    let mut rest = value;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return None;
        }
        let number: f64 = rest[..number_end].parse().ok()?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 1e-3,
            "us" | "µs" => 1e-6,
            "ns" => 1e-9,
            _ => return None,
        };
        rest = &rest[unit_end..];
        total += number * scale;
    }

    Duration::try_from_secs_f64(total).ok()
}

fn parse_header_u64(headers: &HeaderMap, key: &str) -> Option<u64> {
    headers.get(key)?.to_str().ok()?.trim().parse().ok()
}

fn parse_header_duration(headers: &HeaderMap, key: &str) -> Option<Duration> {
    parse_reset_duration(headers.get(key)?.to_str().ok()?)
}
