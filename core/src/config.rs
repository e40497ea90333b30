//! Core configuration loaded via OrthoConfig.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

const DEFAULT_GATEWAY_URL: &str = "http://localhost:8000/api/";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;

/// Configuration values for wiring the core to its gateway.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "KAAKAZINI")]
pub struct CoreSettings {
    /// API root of the authoritative back end.
    pub gateway_url: Option<String>,
    /// Per-request timeout in seconds. Zero falls back to the default.
    #[ortho_config(default = 30)]
    pub request_timeout_secs: u64,
    /// File holding the persisted session assertion. Memory only when unset.
    pub credential_path: Option<PathBuf>,
    /// Lifetime of sessions issued by the in-process gateway.
    #[ortho_config(default = 60)]
    pub session_ttl_minutes: i64,
}

impl CoreSettings {
    /// Return the configured gateway URL, falling back to the local default.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured value is not an absolute URL.
    pub fn gateway_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(self.gateway_url.as_deref().unwrap_or(DEFAULT_GATEWAY_URL))
    }

    /// Return the request timeout, falling back to the default.
    pub fn request_timeout(&self) -> Duration {
        match self.request_timeout_secs {
            0 => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    /// Return the credential slot path, if persistence is enabled.
    pub fn credential_path(&self) -> Option<&Path> {
        self.credential_path.as_deref()
    }

    /// Return the in-process session lifetime, falling back to the default.
    pub fn session_ttl(&self) -> TimeDelta {
        if self.session_ttl_minutes > 0 {
            TimeDelta::minutes(self.session_ttl_minutes)
        } else {
            TimeDelta::minutes(DEFAULT_SESSION_TTL_MINUTES)
        }
    }
}
