//! OpenAI Responses API transport.

use crate::dto::{ErrorEnvelope, ResponsesRequest, ResponsesResponse};
use async_trait::async_trait;
use sluice_core::{CallFailure, Completion, CompletionTransport, RateLimitMetadata};
use sluice_error::{HttpError, RemoteError, RemoteErrorKind, SluiceResult};
use sluice_rate_limit::HeaderRateLimitDetector;
use tracing::{debug, instrument};

/// Default API root.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Request settings for [`OpenAiTransport`].
///
/// # Example
///
/// ```
/// use sluice_models::OpenAiSettingsBuilder;
///
/// let settings = OpenAiSettingsBuilder::default()
///     .model("gpt-4.1-mini")
///     .max_output_tokens(2_048u32)
///     .build()
///     .unwrap();
/// assert_eq!(settings.base_url(), "https://api.openai.com/v1");
/// ```
#[derive(Debug, Clone, PartialEq, derive_getters::Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct OpenAiSettings {
    /// Model identifier
    model: String,
    /// API root without the trailing `/responses`
    #[builder(default = "OPENAI_BASE_URL.to_string()")]
    base_url: String,
    /// Cap on generated tokens
    #[builder(default, setter(strip_option))]
    max_output_tokens: Option<u32>,
    /// Sampling temperature
    #[builder(default, setter(strip_option))]
    temperature: Option<f32>,
}

/// [`CompletionTransport`] for an OpenAI-style `POST /responses` endpoint.
///
/// Every response, successful or not, is scanned for `x-ratelimit-*`
/// headers; the metadata found is attached to the returned completion or
/// failure so the budget tracker sees it.
#[derive(Debug, Clone)]
pub struct OpenAiTransport {
    client: reqwest::Client,
    api_key: String,
    settings: OpenAiSettings,
    detector: HeaderRateLimitDetector,
}

impl OpenAiTransport {
    /// Create a transport reading the API key from `OPENAI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not set or the HTTP client cannot be built.
    #[instrument(skip_all, fields(model = %settings.model()))]
    pub fn new(settings: OpenAiSettings) -> SluiceResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|e| HttpError::new(format!("OPENAI_API_KEY not set: {}", e)))?;
        Self::with_api_key(api_key, settings)
    }

    /// Create a transport with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns error if the key is blank or the HTTP client cannot be built.
    #[instrument(skip(api_key, settings), fields(model = %settings.model()))]
    pub fn with_api_key(api_key: impl Into<String>, settings: OpenAiSettings) -> SluiceResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            Err(HttpError::new("API key is empty"))?
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| HttpError::new(format!("Failed to build HTTP client: {}", e)))?;

        debug!(base_url = %settings.base_url(), "Created OpenAI transport");
        Ok(Self {
            client,
            api_key,
            settings,
            detector: HeaderRateLimitDetector::new(),
        })
    }

    /// Request settings.
    pub fn settings(&self) -> &OpenAiSettings {
        &self.settings
    }

    /// Header detector holding the last metadata seen.
    pub fn detector(&self) -> &HeaderRateLimitDetector {
        &self.detector
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionTransport for OpenAiTransport {
    #[instrument(skip(self, prompt), fields(provider = "openai", model = %self.settings.model, prompt_len = prompt.len()))]
    async fn invoke(&self, prompt: &str) -> Result<Completion, CallFailure> {
        let body = ResponsesRequest {
            model: &self.settings.model,
            input: prompt,
            max_output_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallFailure::new(RemoteError::new(transport_error(&e))))?;

        let status = response.status();
        let metadata = self.detector.detect_openai(response.headers()).await;

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(text);
            debug!(status = status.as_u16(), %message, "Responses call rejected");
            let kind = RemoteErrorKind::from_status(status.as_u16(), message);
            return Err(with_metadata(CallFailure::new(RemoteError::new(kind)), metadata));
        }

        let parsed: ResponsesResponse = response.json().await.map_err(|e| {
            let kind = if e.is_decode() {
                RemoteErrorKind::Server {
                    status_code: status.as_u16(),
                    message: format!("Malformed response body: {}", e),
                }
            } else {
                transport_error(&e)
            };
            with_metadata(CallFailure::new(RemoteError::new(kind)), metadata)
        })?;

        let completion = Completion::new(parsed.total_tokens(), parsed.text());
        debug!(tokens = completion.tokens_used, "Responses call completed");
        Ok(match metadata {
            Some(metadata) => completion.with_rate_limit(metadata),
            None => completion,
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

fn with_metadata(failure: CallFailure, metadata: Option<RateLimitMetadata>) -> CallFailure {
    match metadata {
        Some(metadata) => failure.with_rate_limit(metadata),
        None => failure,
    }
}

fn transport_error(error: &reqwest::Error) -> RemoteErrorKind {
    if error.is_timeout() {
        RemoteErrorKind::Timeout(error.to_string())
    } else {
        RemoteErrorKind::Network(error.to_string())
    }
}
