//! Remote completion transports for Sluice.
//!
//! Implementations of [`sluice_core::CompletionTransport`] that reach a real
//! completion service. Each transport performs exactly one HTTP call per
//! invocation, classifies failures into [`sluice_error::RemoteErrorKind`]
//! and attaches the budget metadata found in the response headers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dto;
mod openai;

pub use openai::{
    OPENAI_BASE_URL, OpenAiSettings, OpenAiSettingsBuilder, OpenAiSettingsBuilderError,
    OpenAiTransport,
};
