//! Console configuration.
//!
//! # Design
//! - The base URL is fixed at build time (`DORMANT_API_URL`) and may be
//!   overridden by the embedding surface.
//! - Retry timing lives in [`RetryPolicy`] so tests can shrink the backoff.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Base URL used when neither the build nor the caller provides one.
pub const DEFAULT_API_URL: &str = match option_env!("DORMANT_API_URL") {
    Some(url) => url,
    None => "http://127.0.0.1:8080",
};

/// Request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between a successful upload and the caller's refresh.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(1500);

/// Directory name used under the platform config dir for persisted sessions.
const SESSION_DIR_NAME: &str = "dormant-console";

/// Linear backoff applied to transport-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; retry `n` waits `n * base_delay`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.max(1))
    }

    /// Policy that never retries.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Everything needed to build a [`crate::Console`].
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Backend origin; API paths are joined onto it.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Transport retry policy.
    pub retry: RetryPolicy,
    /// Directory holding the persisted session.
    pub session_dir: PathBuf,
    /// Delay before refreshing views after an upload.
    pub refresh_delay: Duration,
    /// Correlation id sent as `x-request-id` on every request.
    pub request_id: Option<String>,
}

impl ConsoleConfig {
    /// Configuration pointing at `base_url` with every other value defaulted.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            session_dir: default_session_dir(),
            refresh_delay: DEFAULT_REFRESH_DELAY,
            request_id: None,
        }
    }
}

/// Platform location for the persisted session.
#[must_use]
pub fn default_session_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(SESSION_DIR_NAME)
}
