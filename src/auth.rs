//! Access token lifecycle: persistence, expiry checks and acquisition.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{PanError, Result};
use crate::models::{AccessTokenData, AccessTokenRequest, ApiResponse};

/// Token issuing endpoint.
pub const ACCESS_TOKEN_PATH: &str = "/api/v1/access_token";

/// Header every open platform request has to carry.
pub const PLATFORM_HEADER: (&str, &str) = ("Platform", "open_platform");

/// The provider issues expiry timestamps in UTC+8.
const EXPIRY_OFFSET_SECS: i32 = 8 * 3600;

fn expiry_offset() -> FixedOffset {
    FixedOffset::east_opt(EXPIRY_OFFSET_SECS).expect("UTC+8 is a valid offset")
}

/// A bearer token and the moment it stops being accepted.
///
/// `expired_at` is kept verbatim (e.g. `2024-03-22T23:54:53+08:00`) so the
/// persisted record is exactly what the endpoint returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub expired_at: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, expired_at: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expired_at: expired_at.into(),
        }
    }

    /// Expiry viewed in the fixed +08:00 offset.
    pub fn expires_at(&self) -> Result<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.expired_at)
            .map(|t| t.with_timezone(&expiry_offset()))
            .map_err(|e| {
                PanError::InvalidArgument(format!("bad expiry {:?}: {}", self.expired_at, e))
            })
    }

    /// Usable while `now < expires_at`. An unparsable expiry counts as expired.
    pub fn is_valid_at(&self, now: DateTime<FixedOffset>) -> bool {
        match self.expires_at() {
            Ok(expires_at) => now < expires_at,
            Err(_) => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now().with_timezone(&expiry_offset()))
    }
}

impl From<AccessTokenData> for Credential {
    fn from(data: AccessTokenData) -> Self {
        Self::new(data.access_token, data.expired_at)
    }
}

/// JSON file holding the last issued credential.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted credential.
    ///
    /// A missing or corrupt file means "no credential"; it is never an error.
    pub fn load(&self) -> Option<Credential> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No persisted access token");
                return None;
            }
        };

        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring malformed token state");
                None
            }
        }
    }

    /// Replace the persisted credential.
    ///
    /// Writes to a sibling temporary file and renames it over the target, so
    /// readers see either the old record or the new one.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, serde_json::to_vec(credential)?)?;
        fs::rename(&tmp_path, &self.path)?;

        info!(path = %self.path.display(), "Access token saved");
        Ok(())
    }
}

/// Hands out a live access token, fetching a new one when needed.
#[derive(Clone)]
pub struct CredentialManager {
    config: Arc<ClientConfig>,
    http: Client,
    store: CredentialStore,
    // Held across acquisition so concurrent callers wait for one refresh.
    current: Arc<Mutex<Option<Credential>>>,
}

impl CredentialManager {
    pub fn new(config: Arc<ClientConfig>, http: Client) -> Self {
        let store = CredentialStore::new(&config.state_path);
        Self {
            config,
            http,
            store,
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Return a credential that has not expired yet.
    ///
    /// The persisted state is consulted on first use. If nothing usable is
    /// found, a new token is requested once, persisted, and returned.
    pub async fn ensure_valid_credential(&self) -> Result<Credential> {
        let mut current = self.current.lock().await;

        if current.is_none() {
            *current = self.store.load();
        }

        if let Some(credential) = current.as_ref() {
            if credential.is_valid() {
                return Ok(credential.clone());
            }
            info!(expired_at = %credential.expired_at, "Access token expired");
        }

        let fresh = self.acquire().await?;
        self.store.save(&fresh)?;
        *current = Some(fresh.clone());

        Ok(fresh)
    }

    /// Access token string for the `Authorization` header.
    pub async fn access_token(&self) -> Result<String> {
        Ok(self.ensure_valid_credential().await?.access_token)
    }

    /// Forget the in-memory credential; the next call re-reads the store.
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    /// Request a new token from the issuing endpoint.
    async fn acquire(&self) -> Result<Credential> {
        info!("Requesting a new access token");

        let body = AccessTokenRequest {
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
        };

        let response = self
            .http
            .post(self.config.endpoint(ACCESS_TOKEN_PATH))
            .header(PLATFORM_HEADER.0, PLATFORM_HEADER.1)
            .json(&body)
            .send()
            .await
            .map_err(|e| PanError::CredentialAcquisition(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PanError::CredentialAcquisition(format!("read failed: {}", e)))?;

        let envelope: ApiResponse<AccessTokenData> =
            serde_json::from_str(&text).map_err(|_| {
                PanError::CredentialAcquisition(format!("Status {}: {}", status, text))
            })?;

        if !envelope.is_success() {
            return Err(PanError::CredentialAcquisition(envelope.message));
        }

        let credential: Credential = envelope
            .data
            .ok_or_else(|| PanError::CredentialAcquisition("response has no data".to_string()))?
            .into();

        credential
            .expires_at()
            .map_err(|e| PanError::CredentialAcquisition(e.to_string()))?;

        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<FixedOffset> {
        expiry_offset().with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_expiry_is_viewed_in_utc_plus_8() {
        let credential = Credential::new("token", "2024-03-22T23:54:53+08:00");
        let expires_at = credential.expires_at().unwrap();
        assert_eq!(expires_at, at(2024, 3, 22, 23, 54, 53));
        assert_eq!(expires_at.offset().local_minus_utc(), EXPIRY_OFFSET_SECS);
    }

    #[test]
    fn test_validity_boundary() {
        let credential = Credential::new("token", "2024-03-22T23:54:53+08:00");
        assert!(credential.is_valid_at(at(2024, 3, 22, 23, 54, 52)));
        assert!(!credential.is_valid_at(at(2024, 3, 22, 23, 54, 53)));
        assert!(!credential.is_valid_at(at(2024, 3, 23, 0, 0, 0)));
    }

    #[test]
    fn test_other_offsets_compare_by_instant() {
        // 15:54:53Z is the same instant as 23:54:53+08:00.
        let credential = Credential::new("token", "2024-03-22T15:54:53Z");
        assert!(credential.is_valid_at(at(2024, 3, 22, 23, 54, 52)));
        assert!(!credential.is_valid_at(at(2024, 3, 22, 23, 54, 53)));
    }

    #[test]
    fn test_unparsable_expiry_is_expired() {
        let credential = Credential::new("token", "tomorrow");
        assert!(credential.expires_at().is_err());
        assert!(!credential.is_valid());
    }

    #[test]
    fn test_credential_wire_names() {
        let credential = Credential::new("abc", "2099-01-01T00:00:00+08:00");
        let json = serde_json::to_value(&credential).unwrap();
        assert_eq!(json["accessToken"], "abc");
        assert_eq!(json["expiredAt"], "2099-01-01T00:00:00+08:00");
    }
}
