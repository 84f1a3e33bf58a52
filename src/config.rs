//! Client configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Base URL of the 123pan open platform.
pub const DEFAULT_BASE_URL: &str = "https://open-api.123pan.com";

/// Default location of the persisted access token.
pub const DEFAULT_STATE_FILE: &str = ".token.json";

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a [`PanClient`](crate::PanClient) needs to talk to the API.
///
/// Each client owns its configuration, so several clients with different
/// state files can live in one process.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub state_path: PathBuf,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration with the default endpoint and state file.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            state_path: PathBuf::from(DEFAULT_STATE_FILE),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Point the client at a different API host (trailing slashes are dropped).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_state_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.state_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Absolute URL for an API path.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
