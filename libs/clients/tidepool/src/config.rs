use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_QUERY_URL: &str = "http://localhost:8080";
pub const DEFAULT_INGEST_URL: &str = "http://localhost:8081";
pub const DEFAULT_NAMESPACE: &str = "default";

/// Configuration error type
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Retry behaviour for transient failures (transport errors and HTTP 503).
///
/// The delay before retry `n` (0-based) is `min(base_delay * 2^n, max_delay)`.
/// There is no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Backoff to wait after the failed attempt `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(attempt))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Connection pool limits applied to each of the two HTTP executors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_idle_per_host: usize,
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            idle_timeout: Some(Duration::from_secs(90)),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub query_url: String,
    pub ingest_url: String,
    /// Per-request timeout handed to the executor
    pub timeout: Duration,
    /// Namespace used when an operation does not name one
    pub default_namespace: String,
    pub pool: PoolLimits,
    pub retry: RetryPolicy,
    /// Upper bound on a whole logical call, retries and backoff included
    pub call_deadline: Option<Duration>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_url(mut self, url: impl Into<String>) -> Self {
        self.query_url = url.into();
        self
    }

    pub fn with_ingest_url(mut self, url: impl Into<String>) -> Self {
        self.ingest_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    pub fn with_pool(mut self, pool: PoolLimits) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_deadline(mut self, deadline: Duration) -> Self {
        self.call_deadline = Some(deadline);
        self
    }

    /// Load configuration from `TIDEPOOL_*` environment variables.
    ///
    /// Unset variables keep their defaults; unparsable ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let retry = RetryPolicy {
            max_retries: env_parse("TIDEPOOL_MAX_RETRIES")?.unwrap_or(defaults.retry.max_retries),
            base_delay: env_parse("TIDEPOOL_BASE_DELAY_MS")?
                .map_or(defaults.retry.base_delay, Duration::from_millis),
            max_delay: env_parse("TIDEPOOL_MAX_DELAY_MS")?
                .map_or(defaults.retry.max_delay, Duration::from_millis),
        };

        Ok(Self {
            query_url: env_or_default("TIDEPOOL_QUERY_URL", DEFAULT_QUERY_URL),
            ingest_url: env_or_default("TIDEPOOL_INGEST_URL", DEFAULT_INGEST_URL),
            timeout: env_parse("TIDEPOOL_TIMEOUT_SECS")?
                .map_or(defaults.timeout, Duration::from_secs),
            default_namespace: env_or_default("TIDEPOOL_NAMESPACE", DEFAULT_NAMESPACE),
            pool: defaults.pool,
            retry,
            call_deadline: env_parse("TIDEPOOL_CALL_DEADLINE_SECS")?.map(Duration::from_secs),
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            query_url: DEFAULT_QUERY_URL.to_string(),
            ingest_url: DEFAULT_INGEST_URL.to_string(),
            timeout: Duration::from_secs(30),
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            pool: PoolLimits::default(),
            retry: RetryPolicy::default(),
            call_deadline: None,
        }
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::ParseError {
                key: key.to_string(),
                details: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
