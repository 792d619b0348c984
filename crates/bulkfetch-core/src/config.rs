use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Optional bound on transient retries (`[retry]` in config.toml).
/// When the section is absent, transient failures are requeued forever with no delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per file (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::bounded(
            self.max_attempts,
            Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            Duration::from_secs(self.max_delay_secs),
        )
    }
}

/// Form-login flow (`[auth]` in config.toml).
///
/// Steps: optional GET of `landing_url`, POST of the credential form to
/// `login_url`, optional relay POST of the hidden fields found in the login
/// response to `relay_url`, optional final GET of `landing_url`. The login
/// succeeds when `session_cookie` is present in the cookie jar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub landing_url: Option<String>,
    pub login_url: String,
    #[serde(default = "default_username_field")]
    pub username_field: String,
    #[serde(default = "default_password_field")]
    pub password_field: String,
    /// Additional static form fields sent with the credentials.
    #[serde(default)]
    pub extra_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

fn default_username_field() -> String {
    "login".to_string()
}

fn default_password_field() -> String {
    "password".to_string()
}

fn default_session_cookie() -> String {
    "JSESSIONID".to_string()
}

/// Global configuration loaded from `~/.config/bulkfetch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Number of parallel download workers.
    pub workers: usize,
    /// Re-download files whose destination already exists.
    pub overwrite: bool,
    /// Interval of the throughput sampler / status line renderer.
    pub progress_interval_ms: u64,
    /// Interval between forbidden-set checkpoints.
    pub checkpoint_interval_secs: u64,
    pub connect_timeout_secs: u64,
    /// Abort a transfer when throughput stays below this many bytes/s ...
    pub low_speed_limit_bytes: u32,
    /// ... for this many seconds.
    pub low_speed_time_secs: u64,
    /// Hard cap on a single transfer.
    pub transfer_timeout_secs: u64,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            overwrite: true,
            progress_interval_ms: 2000,
            checkpoint_interval_secs: 10,
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
            transfer_timeout_secs: 3600,
            retry: None,
            auth: None,
        }
    }
}

impl FetchConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_interval_secs.max(1))
    }

    /// Retry policy from the optional `[retry]` section; unbounded when absent.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryConfig::to_policy)
            .unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("bulkfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FetchConfig> {
    load_or_init_at(&config_path()?)
}

/// Like [`load_or_init`] with an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<FetchConfig> {
    if !path.exists() {
        let default_cfg = FetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write config: {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: FetchConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
