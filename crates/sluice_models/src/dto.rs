//! Wire types for the OpenAI Responses endpoint.

use serde::{Deserialize, Serialize};

/// Body of `POST /responses`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponsesRequest<'a> {
    /// Model identifier
    pub model: &'a str,
    /// Rendered prompt
    pub input: &'a str,
    /// Cap on generated tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Successful response body (only the fields Sluice reads).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsesResponse {
    /// Convenience field some gateways return with the joined text
    #[serde(default)]
    pub output_text: Option<String>,
    /// Output items
    #[serde(default)]
    pub output: Vec<OutputItem>,
    /// Token accounting
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ResponsesResponse {
    /// All `output_text` parts joined, preferring the top-level convenience field.
    pub fn text(&self) -> String {
        if let Some(text) = &self.output_text {
            return text.clone();
        }
        self.output
            .iter()
            .flat_map(|item| item.content.iter())
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect()
    }

    /// Total tokens billed, zero if the usage block is missing.
    pub fn total_tokens(&self) -> u64 {
        self.usage.as_ref().map_or(0, |u| u.total_tokens)
    }
}

/// One output item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputItem {
    /// Item type, `message` for model text
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Content parts
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

/// One content part of an output item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentPart {
    /// Part type, `output_text` for model text
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Text of the part
    #[serde(default)]
    pub text: Option<String>,
}

/// Token usage block.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    /// Input tokens
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: u64,
    /// Input plus output tokens
    #[serde(default)]
    pub total_tokens: u64,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    /// The error detail
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    /// Human-readable message
    pub message: String,
}
