//! Error types for the Sluice library.
//!
//! This crate provides the foundation error types used throughout the Sluice workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Remote call failures ([`RemoteError`]) are never fatal to a batch; they are
//! recorded per item. Only [`MalformedInputError`] aborts a batch, and only
//! before any work has started.
//!
//! # Examples
//!
//! ```
//! use sluice_error::{MalformedInputError, MalformedInputErrorKind, SluiceResult};
//!
//! fn validate(items: &[u32]) -> SluiceResult<()> {
//!     if items.is_empty() {
//!         Err(MalformedInputError::new(MalformedInputErrorKind::EmptyBatch))?
//!     }
//!     Ok(())
//! }
//!
//! assert!(validate(&[]).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod http;
mod json;
mod malformed;
mod registry;
mod remote;

pub use config::ConfigError;
pub use error::{SluiceError, SluiceErrorKind, SluiceResult};
pub use http::HttpError;
pub use json::JsonError;
pub use malformed::{MalformedInputError, MalformedInputErrorKind};
pub use registry::{RegistryError, RegistryErrorKind};
pub use remote::{RemoteError, RemoteErrorKind, RetryableError};
