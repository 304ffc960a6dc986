use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use progress_core::{JobId, ReconcileSettings, UploadConstraints};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const UPLOAD_PATH: &str = "api/upload/video/";
const STATUS_PATH: &str = "api/progress/";
const PUSH_PATH: &str = "ws/progress/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Everything a session needs to know about the backend and its own limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub api_base_url: String,
    /// Derived from `api_base_url` (`http` → `ws`, `https` → `wss`) when unset.
    pub push_base_url: Option<String>,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    /// Upper bound on time spent monitoring one job. `None` waits forever.
    pub max_monitoring_duration: Option<Duration>,
    pub upload: UploadConstraints,
    pub reconcile: ReconcileSettings,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/".to_string(),
            push_base_url: None,
            poll_interval: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(30),
            max_monitoring_duration: Some(Duration::from_secs(30 * 60)),
            upload: UploadConstraints::default(),
            reconcile: ReconcileSettings::default(),
        }
    }
}

impl MonitorConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        let api_base = parse_base(&self.api_base_url)?;
        let push_base = match &self.push_base_url {
            Some(raw) => parse_base(raw)?,
            None => derive_push_base(&api_base)?,
        };
        Ok(Endpoints {
            api_base,
            push_base,
        })
    }
}

/// Resolved backend URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    api_base: Url,
    push_base: Url,
}

impl Endpoints {
    pub fn upload_url(&self) -> Url {
        join(&self.api_base, UPLOAD_PATH)
    }

    pub fn status_url(&self, job_id: &JobId) -> Url {
        join(&self.api_base, &format!("{STATUS_PATH}{}/", job_id.as_str()))
    }

    pub fn push_url(&self, job_id: &JobId) -> Url {
        join(&self.push_base, &format!("{PUSH_PATH}{}/", job_id.as_str()))
    }
}

fn join(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{prefix}/{path}"));
    url
}

fn parse_base(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: "not a base url".to_string(),
        });
    }
    Ok(url)
}

fn derive_push_base(api_base: &Url) -> Result<Url, ConfigError> {
    let scheme = match api_base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(ConfigError::InvalidUrl {
                url: api_base.to_string(),
                reason: format!("cannot derive a push url from scheme {other}"),
            })
        }
    };
    let mut push = api_base.clone();
    push.set_scheme(scheme).map_err(|()| ConfigError::InvalidUrl {
        url: api_base.to_string(),
        reason: format!("cannot switch scheme to {scheme}"),
    })?;
    Ok(push)
}
