//! Configuration structures for batch execution.
//!
//! This module provides TOML-based configuration for every tunable of the
//! batch layer. The configuration system supports:
//! - Bundled defaults (include_str! from sluice.toml)
//! - User overrides (~/.config/sluice/sluice.toml, then ./sluice.toml)
//! - Environment overrides (`SLUICE__<SECTION>__<KEY>`)
//!
//! Every section also implements [`Default`] with the same values as the
//! bundled file, so a config assembled in code needs no file at all.

use sluice_core::CostEstimator;
use sluice_error::{ConfigError, SluiceError, SluiceResult};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Chunking and timeout settings for a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Items sharing one concurrency decision
    pub chunk_size: usize,
    /// Upper bound on a single remote call, in seconds
    pub call_timeout_secs: u64,
    /// Upper bound on a whole batch run, in seconds
    pub batch_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            call_timeout_secs: 30,
            batch_timeout_secs: 600,
        }
    }
}

impl BatchConfig {
    /// Per-call timeout.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Overall batch timeout.
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

/// Mapping from budget fraction to admitted parallelism.
///
/// ```toml
/// [concurrency]
/// min_concurrency = 10
/// max_concurrency = 200
/// critical_concurrency = 5
/// high_threshold = 0.5
/// medium_threshold = 0.2
/// low_threshold = 0.1
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Parallelism for fractions in `[low, medium)`
    pub min_concurrency: usize,
    /// Parallelism for fractions at or above `high`
    pub max_concurrency: usize,
    /// Parallelism for fractions below `low`; never zero
    pub critical_concurrency: usize,
    /// Fraction at or above which `max_concurrency` is used
    pub high_threshold: f64,
    /// Lower edge of the interpolation band
    pub medium_threshold: f64,
    /// Fraction below which `critical_concurrency` is used
    pub low_threshold: f64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            min_concurrency: 10,
            max_concurrency: 200,
            critical_concurrency: 5,
            high_threshold: 0.5,
            medium_threshold: 0.2,
            low_threshold: 0.1,
        }
    }
}

/// Admission gate and cost estimation settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Fraction of the observed remaining tokens that may be spent
    pub safety_margin: f64,
    /// Longest single admission wait, in seconds
    pub max_wait_secs: u64,
    /// Characters per token for input cost estimation
    pub chars_per_token: usize,
    /// Fixed output cost added to every estimate
    pub output_token_ceiling: u64,
    /// Optional operator ceiling on request rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            safety_margin: 0.9,
            max_wait_secs: 60,
            chars_per_token: 4,
            output_token_ceiling: 6590,
            requests_per_minute: None,
        }
    }
}

impl AdmissionConfig {
    /// Cap on a single admission wait.
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    /// Cost estimator built from these settings.
    pub fn estimator(&self) -> CostEstimator {
        CostEstimator::new(self.chars_per_token, self.output_token_ceiling)
    }
}

/// Backoff parameters for retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Cap on the exponential part of the delay, in milliseconds
    pub max_delay_ms: u64,
    /// Upper bound of the uniform jitter added to every delay, in milliseconds
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 16000,
            jitter_ms: 1000,
        }
    }
}

/// Budget tracker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Observations closer together than this are merged conservatively
    pub observation_window_ms: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            observation_window_ms: 1000,
        }
    }
}

impl BudgetConfig {
    /// Conservative merge window.
    pub fn observation_window(&self) -> Duration {
        Duration::from_millis(self.observation_window_ms)
    }
}

/// Top-level Sluice configuration.
///
/// Loads from TOML files with a precedence system (later overrides earlier):
/// 1. Bundled defaults (include_str! from sluice.toml)
/// 2. User config in home directory (~/.config/sluice/sluice.toml)
/// 3. User config in current directory (./sluice.toml)
/// 4. Environment variables (`SLUICE__RETRY__MAX_RETRIES=5`)
///
/// # Example
///
/// ```no_run
/// use sluice_rate_limit::SluiceConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SluiceConfig::load()?;
/// println!("chunk size: {}", config.batch.chunk_size);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SluiceConfig {
    /// Chunking and timeouts
    pub batch: BatchConfig,
    /// Fraction-to-parallelism mapping
    pub concurrency: ConcurrencyConfig,
    /// Admission gate
    pub admission: AdmissionConfig,
    /// Retry backoff
    pub retry: RetryConfig,
    /// Budget tracker
    pub budget: BudgetConfig,
}

impl SluiceConfig {
    /// Load configuration from a specific file path on top of the defaults.
    ///
    /// Sections or keys missing from the file keep their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> SluiceResult<Self> {
        debug!("Loading configuration from file");

        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                SluiceError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                SluiceError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: env > current dir > home dir > bundled.
    ///
    /// User config files are optional and silently skipped if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if a present source cannot be parsed or the merged
    /// configuration fails validation.
    #[instrument]
    pub fn load() -> SluiceResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../sluice.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/sluice/sluice.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("sluice").required(false))
            .add_source(
                Environment::with_prefix("SLUICE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder
            .build()
            .map_err(|e| {
                SluiceError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                SluiceError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first violated constraint.
    pub fn validate(&self) -> SluiceResult<()> {
        let c = &self.concurrency;

        if self.batch.chunk_size == 0 {
            Err(ConfigError::new("batch.chunk_size must be at least 1"))?
        }
        if c.min_concurrency > c.max_concurrency {
            Err(ConfigError::new(format!(
                "concurrency.min_concurrency ({}) exceeds max_concurrency ({})",
                c.min_concurrency, c.max_concurrency
            )))?
        }
        if c.critical_concurrency == 0 {
            Err(ConfigError::new(
                "concurrency.critical_concurrency must be at least 1",
            ))?
        }
        if c.critical_concurrency > c.min_concurrency {
            Err(ConfigError::new(format!(
                "concurrency.critical_concurrency ({}) exceeds min_concurrency ({})",
                c.critical_concurrency, c.min_concurrency
            )))?
        }
        let ordered = 0.0 <= c.low_threshold
            && c.low_threshold <= c.medium_threshold
            && c.medium_threshold < c.high_threshold
            && c.high_threshold <= 1.0;
        if !ordered {
            Err(ConfigError::new(format!(
                "concurrency thresholds must satisfy 0 <= low <= medium < high <= 1 (got {}, {}, {})",
                c.low_threshold, c.medium_threshold, c.high_threshold
            )))?
        }
        let margin = self.admission.safety_margin;
        if !(margin > 0.0 && margin <= 1.0) {
            Err(ConfigError::new(format!(
                "admission.safety_margin must be in (0, 1] (got {})",
                margin
            )))?
        }
        if self.admission.chars_per_token == 0 {
            Err(ConfigError::new("admission.chars_per_token must be at least 1"))?
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            Err(ConfigError::new(format!(
                "retry.base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )))?
        }

        Ok(())
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> SluiceResult<String> {
        toml::to_string_pretty(self).map_err(|e| {
            SluiceError::from(ConfigError::new(format!(
                "Failed to serialize configuration: {}",
                e
            )))
        })
    }
}
