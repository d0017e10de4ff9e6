//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Container images used by the generated workloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    /// Image of the artifact-producing job
    pub export: String,
    /// Image of the static content server
    pub downloader: String,
    /// Image of the authenticating proxy sidecar
    pub oauth_proxy: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            export: DEFAULT_EXPORT_IMAGE.to_string(),
            downloader: DEFAULT_DOWNLOADER_IMAGE.to_string(),
            oauth_proxy: DEFAULT_OAUTH_PROXY_IMAGE.to_string(),
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub images: ImageConfig,
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Delay before the next pass after a resource was created (milliseconds)
    pub create_requeue_ms: u64,
    /// Resync interval for passes that changed nothing (seconds)
    pub resync_interval_secs: u64,
    /// Fibonacci backoff lower bound for failed passes (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff upper bound for failed passes (seconds)
    pub backoff_max_secs: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Maximum concurrent reconciliations across distinct exports
    pub max_concurrent_reconciliations: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            images: ImageConfig::default(),
            metrics_port: DEFAULT_METRICS_PORT,
            create_requeue_ms: DEFAULT_CREATE_REQUEUE_MS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Unset, empty or unparsable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        use crate::constants::*;
        Self {
            images: ImageConfig {
                export: image_or_default(
                    &lookup,
                    &["ExportImageName", "EXPORT_IMAGE"],
                    DEFAULT_EXPORT_IMAGE,
                ),
                downloader: image_or_default(
                    &lookup,
                    &["DownloaderImageName", "DOWNLOADER_IMAGE"],
                    DEFAULT_DOWNLOADER_IMAGE,
                ),
                oauth_proxy: image_or_default(
                    &lookup,
                    &["OauthImageName", "OAUTH_PROXY_IMAGE"],
                    DEFAULT_OAUTH_PROXY_IMAGE,
                ),
            },
            metrics_port: parsed_or_default(&lookup, "METRICS_PORT", DEFAULT_METRICS_PORT),
            create_requeue_ms: parsed_or_default(
                &lookup,
                "CREATE_REQUEUE_MS",
                DEFAULT_CREATE_REQUEUE_MS,
            ),
            resync_interval_secs: parsed_or_default(
                &lookup,
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            ),
            backoff_min_secs: parsed_or_default(
                &lookup,
                "BACKOFF_MIN_SECS",
                DEFAULT_BACKOFF_MIN_SECS,
            ),
            backoff_max_secs: parsed_or_default(
                &lookup,
                "BACKOFF_MAX_SECS",
                DEFAULT_BACKOFF_MAX_SECS,
            ),
            watch_restart_delay_secs: parsed_or_default(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            max_concurrent_reconciliations: parsed_or_default(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
        }
    }

    /// Delay before the pass that follows a creation
    pub fn create_requeue_duration(&self) -> Duration {
        Duration::from_millis(self.create_requeue_ms)
    }

    /// Delay before a periodic resync
    pub fn resync_interval_duration(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

fn parsed_or_default<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// First non-blank value among `keys`, in order
fn image_or_default(
    lookup: &impl Fn(&str) -> Option<String>,
    keys: &[&str],
    default: &str,
) -> String {
    keys.iter()
        .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| default.to_string())
}
