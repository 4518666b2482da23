//! Sentinel configuration.
//!
//! Read from `~/.sentinel/config.toml`. Every section and key is optional;
//! callers apply their own defaults to whatever is left unset. String values
//! support `${VAR}` expansion, and a few environment variables override the
//! file (see [`SentinelConfig::with_env_overrides`]).

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREDICT_URL: &str = "SENTINEL_PREDICT_URL";
pub const ENV_SIGNER: &str = "SENTINEL_SIGNER";
pub const ENV_LEDGER_PATH: &str = "SENTINEL_LEDGER_PATH";

const fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SentinelConfig {
    pub prediction: Option<PredictionConfig>,
    pub ledger: Option<LedgerConfig>,
    pub signer: Option<SignerConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PredictionConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    /// Absent means a single attempt per prediction.
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LedgerConfig {
    pub backend: Option<LedgerBackend>,
    pub path: Option<String>,
    /// Zero disables the limit.
    pub confirmation_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    pub account: Option<String>,
    /// Ask the operator before every signature.
    #[serde(default = "default_true")]
    pub require_approval: bool,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            account: None,
            require_approval: true,
        }
    }
}

/// Replace every `${VAR}` with the variable's value (empty if unset).
///
/// An unterminated `${` is kept literally.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Expand `${VAR}` references and a leading `~/`.
fn expand_path(raw: &str) -> PathBuf {
    let expanded = expand_env_vars(raw.trim());
    if let Some(rest) = expanded.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(expanded)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl SentinelConfig {
    /// Load from the default location. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        Self::load_from(&path)
    }

    /// Load from `path`. `Ok(None)` when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!(path = %path.display(), error = %source, "Failed to read config");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        Self::parse(&content)
            .map(Some)
            .map_err(|source| {
                tracing::warn!(path = %path.display(), error = %source, "Failed to parse config");
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Apply `SENTINEL_PREDICT_URL`, `SENTINEL_SIGNER` and
    /// `SENTINEL_LEDGER_PATH` from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Blank values are ignored.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup(ENV_PREDICT_URL).and_then(non_empty) {
            self.prediction.get_or_insert_with(Default::default).endpoint = Some(endpoint);
        }
        if let Some(account) = lookup(ENV_SIGNER).and_then(non_empty) {
            self.signer.get_or_insert_with(Default::default).account = Some(account);
        }
        if let Some(path) = lookup(ENV_LEDGER_PATH).and_then(non_empty) {
            self.ledger.get_or_insert_with(Default::default).path = Some(path);
        }
        self
    }

    #[must_use]
    pub fn prediction_endpoint(&self) -> Option<String> {
        self.prediction
            .as_ref()
            .and_then(|p| p.endpoint.as_deref())
            .map(expand_env_vars)
            .and_then(non_empty)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.prediction
            .as_ref()
            .and_then(|p| p.timeout_secs)
            .map(Duration::from_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.prediction
            .as_ref()
            .and_then(|p| p.connect_timeout_secs)
            .map(Duration::from_secs)
    }

    #[must_use]
    pub fn retry(&self) -> Option<&RetryConfig> {
        self.prediction.as_ref().and_then(|p| p.retry.as_ref())
    }

    #[must_use]
    pub fn ledger_backend(&self) -> LedgerBackend {
        self.ledger
            .as_ref()
            .and_then(|l| l.backend)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn ledger_path(&self) -> Option<PathBuf> {
        self.ledger
            .as_ref()
            .and_then(|l| l.path.as_deref())
            .filter(|p| !p.trim().is_empty())
            .map(expand_path)
    }

    #[must_use]
    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.ledger
            .as_ref()
            .and_then(|l| l.confirmation_timeout_secs)
            .map(Duration::from_secs)
    }

    /// The signing account after `${VAR}` expansion; `None` if unset or blank.
    #[must_use]
    pub fn signer_account(&self) -> Option<String> {
        self.signer
            .as_ref()
            .and_then(|s| s.account.as_deref())
            .map(expand_env_vars)
            .and_then(non_empty)
    }

    #[must_use]
    pub fn require_approval(&self) -> bool {
        self.signer.as_ref().is_none_or(|s| s.require_approval)
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".sentinel").join("config.toml"))
}
