//! Top-level error wrapper types.

use crate::{
    ConfigError, HttpError, JsonError, MalformedInputError, RegistryError, RemoteError,
};

/// Every error condition the Sluice crates can surface.
///
/// # Examples
///
/// ```
/// use sluice_error::{SluiceError, ConfigError};
///
/// let err: SluiceError = ConfigError::new("bad threshold").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum SluiceErrorKind {
    /// Batch input rejected before any work started
    #[from(MalformedInputError)]
    MalformedInput(MalformedInputError),
    /// Remote completion call failed
    #[from(RemoteError)]
    Remote(RemoteError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Rule registry error
    #[from(RegistryError)]
    Registry(RegistryError),
    /// HTTP transport setup error
    #[from(HttpError)]
    Http(HttpError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
}

/// Sluice error with kind discrimination.
///
/// # Examples
///
/// ```
/// use sluice_error::{SluiceErrorKind, SluiceResult, MalformedInputError, MalformedInputErrorKind};
///
/// fn run() -> SluiceResult<()> {
///     Err(MalformedInputError::new(MalformedInputErrorKind::EmptyBatch))?
/// }
///
/// let err = run().unwrap_err();
/// assert!(matches!(err.kind(), SluiceErrorKind::MalformedInput(_)));
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Sluice Error: {}", _0)]
pub struct SluiceError(Box<SluiceErrorKind>);

impl SluiceError {
    /// Create a new error from a kind.
    pub fn new(kind: SluiceErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &SluiceErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to SluiceErrorKind
impl<T> From<T> for SluiceError
where
    T: Into<SluiceErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Sluice operations.
pub type SluiceResult<T> = std::result::Result<T, SluiceError>;
