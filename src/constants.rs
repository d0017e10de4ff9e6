//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Name prefix shared by every object the controller manages
pub const RESOURCE_PREFIX: &str = "primer-export";

/// Field manager / controller name used for status patches and labels
pub const CONTROLLER_NAME: &str = "export-controller";

/// Default image for the artifact-producing job
pub const DEFAULT_EXPORT_IMAGE: &str = "quay.io/konveyor/gitops-primer-export:latest";

/// Default image for the static content server in the serving deployment
pub const DEFAULT_DOWNLOADER_IMAGE: &str = "quay.io/konveyor/gitops-primer:latest";

/// Default image for the authenticating proxy sidecar
pub const DEFAULT_OAUTH_PROXY_IMAGE: &str = "quay.io/openshift/origin-oauth-proxy:4.7";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Delay before the next pass after a successful creation (milliseconds)
pub const DEFAULT_CREATE_REQUEUE_MS: u64 = 500;

/// Periodic resync interval for exports that are waiting on the job (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Fibonacci backoff bounds for failed passes (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default maximum number of passes running at once
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Port of the static content server
pub const APP_PORT: i32 = 8080;

/// Port of the authenticating proxy
pub const OAUTH_PROXY_PORT: i32 = 8888;

/// Named service port the route targets
pub const OAUTH_PROXY_PORT_NAME: &str = "oauth-proxy";

/// Key of the session token inside the credential secret
pub const SESSION_SECRET_KEY: &str = "session_secret";

/// Length of the generated session token
pub const SESSION_SECRET_LENGTH: usize = 43;

/// Requested capacity of the output volume claim
pub const OUTPUT_VOLUME_CAPACITY: &str = "1Gi";

/// Condition type written by the engine
pub const CONDITION_RECONCILED: &str = "Reconciled";

/// Condition reasons
pub const REASON_COMPLETE: &str = "Complete";
pub const REASON_ERROR: &str = "Error";

/// Label keys
pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_EXPORT_NAME: &str = "primer.gitops.io/export-name";
pub const LABEL_EXPORT_NAMESPACE: &str = "primer.gitops.io/export-namespace";

/// How long startup waits for the probe server to bind (seconds)
pub const SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Poll interval while waiting for the probe server (milliseconds)
pub const SERVER_POLL_INTERVAL_MS: u64 = 50;
