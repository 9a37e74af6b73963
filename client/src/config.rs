//! Client configuration.
//!
//! Loaded from environment variables with defaults for everything:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `TASKSYNC_BASE_URL` | `https://todos.simpleapi.dev/api` |
//! | `TASKSYNC_API_KEY` | unset |
//! | `TASKSYNC_SESSION_FILE` | `.tasksync/session.json` |
//! | `TASKSYNC_REQUEST_TIMEOUT_SECS` | `30` |
//! | `TASKSYNC_OPERATION_TIMEOUT_SECS` | `60` |
//! | `TASKSYNC_BROADCAST_CAPACITY` | `64` (at least `8`) |

use crate::client::DEFAULT_OPERATION_TIMEOUT;
use crate::http::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default session file, relative to the working directory
pub const DEFAULT_SESSION_FILE: &str = ".tasksync/session.json";

/// Default per-request HTTP timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Smallest broadcast capacity accepted from the environment
pub const MIN_BROADCAST_CAPACITY: usize = 8;

/// Settings for [`SyncClient::from_config`](crate::SyncClient::from_config).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root of the remote API, without trailing slash
    pub base_url: String,
    /// Sent as the `apikey` query parameter when set
    pub api_key: Option<String>,
    /// Where the session token is persisted
    pub session_file: PathBuf,
    /// Timeout of a single HTTP request
    pub request_timeout: Duration,
    /// How long an operation may take end to end
    pub operation_timeout: Duration,
    /// Capacity of each store's completion broadcast
    pub broadcast_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            broadcast_capacity: tasksync_runtime::store::DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map_or(default, Duration::from_secs)
        };

        Self {
            base_url: lookup("TASKSYNC_BASE_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.base_url),
            api_key: lookup("TASKSYNC_API_KEY").filter(|key| !key.is_empty()),
            session_file: lookup("TASKSYNC_SESSION_FILE")
                .map_or(defaults.session_file, PathBuf::from),
            request_timeout: secs("TASKSYNC_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            operation_timeout: secs("TASKSYNC_OPERATION_TIMEOUT_SECS", defaults.operation_timeout),
            broadcast_capacity: lookup("TASKSYNC_BROADCAST_CAPACITY")
                .and_then(|s| s.trim().parse::<usize>().ok())
                .map_or(defaults.broadcast_capacity, |c| c.max(MIN_BROADCAST_CAPACITY)),
        }
    }

    /// Sets the API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the session file
    #[must_use]
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }

    /// Sets the HTTP request timeout
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the operation timeout
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}
