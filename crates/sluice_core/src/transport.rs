//! Interface to the remote completion service.

use crate::{CallFailure, Completion};
use async_trait::async_trait;

/// Single-call contract with the remote completion service.
///
/// Implementations perform exactly one call per `invoke`; retries, admission
/// and timeouts are applied by the caller. A failure must be classified into
/// a [`sluice_error::RemoteErrorKind`] and should carry whatever budget
/// metadata the failed response exposed.
///
/// # Example
///
/// ```rust,ignore
/// use sluice_core::{CallFailure, Completion, CompletionTransport};
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl CompletionTransport for Echo {
///     async fn invoke(&self, prompt: &str) -> Result<Completion, CallFailure> {
///         Ok(Completion::new(prompt.len() as u64, prompt))
///     }
/// }
/// ```
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Send a rendered prompt and wait for the completion.
    async fn invoke(&self, prompt: &str) -> Result<Completion, CallFailure>;

    /// Provider name used in logs and metrics labels.
    fn provider_name(&self) -> &'static str {
        "remote"
    }
}
