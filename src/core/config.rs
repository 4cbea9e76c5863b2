//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{PxpError, Result};

/// Full pixelpress configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub limits: LimitsConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    pub notices: NoticesConfig,
    pub log: LogConfig,
    pub paths: PathsConfig,
}

/// Upload acceptance limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Hard ceiling on a candidate file's size in bytes.
    pub max_file_bytes: u64,
    /// Completed optimizations allowed per calendar day.
    pub daily_quota: u32,
}

/// Simulated pipeline pacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hold time per processing sub-stage in milliseconds.
    pub stage_delay_ms: u64,
}

/// Where and how saved output files are named.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for saved output; `None` means the current working directory.
    pub dir: Option<PathBuf>,
    /// Prefix prepended to the original file name.
    pub filename_prefix: String,
    /// Extension appended to the saved file name (without the dot).
    pub extension: String,
}

/// Notice stack behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NoticesConfig {
    /// Seconds before a notice auto-dismisses.
    pub auto_dismiss_secs: u64,
    /// Maximum notices visible at once; oldest evicted beyond this.
    pub max_visible: usize,
}

/// JSONL activity log controls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

/// Filesystem paths used by pixelpress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// Persisted per-day usage record.
    pub ledger_file: PathBuf,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 20 * 1024 * 1024,
            daily_quota: 5,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_delay_ms: 1_200,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            filename_prefix: "optimized-".to_string(),
            extension: "webp".to_string(),
        }
    }
}

impl Default for NoticesConfig {
    fn default() -> Self {
        Self {
            auto_dismiss_secs: 5,
            max_visible: 3,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: data_dir().join("activity.jsonl"),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: home_dir()
                .join(".config")
                .join("pixelpress")
                .join("config.toml"),
            ledger_file: data_dir().join("usage.json"),
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[PXP-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("pixelpress")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| PxpError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(PxpError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over the canonical JSON form stays stable across processes and
    /// Rust releases, unlike `DefaultHasher`.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("PXP_LIMITS_MAX_FILE_BYTES") {
            self.limits.max_file_bytes = parse_env_u64("PXP_LIMITS_MAX_FILE_BYTES", &raw)?;
        }
        if let Some(raw) = lookup("PXP_LIMITS_DAILY_QUOTA") {
            self.limits.daily_quota = parse_env_u32("PXP_LIMITS_DAILY_QUOTA", &raw)?;
        }
        if let Some(raw) = lookup("PXP_PIPELINE_STAGE_DELAY_MS") {
            self.pipeline.stage_delay_ms = parse_env_u64("PXP_PIPELINE_STAGE_DELAY_MS", &raw)?;
        }
        if let Some(raw) = lookup("PXP_OUTPUT_DIR") {
            self.output.dir = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("PXP_NOTICES_AUTO_DISMISS_SECS") {
            self.notices.auto_dismiss_secs = parse_env_u64("PXP_NOTICES_AUTO_DISMISS_SECS", &raw)?;
        }
        if let Some(raw) = lookup("PXP_NOTICES_MAX_VISIBLE") {
            self.notices.max_visible =
                usize::try_from(parse_env_u64("PXP_NOTICES_MAX_VISIBLE", &raw)?).map_err(
                    |error| PxpError::ConfigParse {
                        context: "env",
                        details: format!("PXP_NOTICES_MAX_VISIBLE={raw:?}: {error}"),
                    },
                )?;
        }
        if let Some(raw) = lookup("PXP_LOG_ENABLED") {
            self.log.enabled = parse_env_bool("PXP_LOG_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("PXP_LOG_PATH") {
            self.log.path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("PXP_LEDGER_FILE") {
            self.paths.ledger_file = PathBuf::from(raw);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.limits.max_file_bytes == 0 {
            return Err(PxpError::InvalidConfig {
                details: "limits.max_file_bytes must be > 0".to_string(),
            });
        }
        if self.limits.daily_quota == 0 {
            return Err(PxpError::InvalidConfig {
                details: "limits.daily_quota must be >= 1".to_string(),
            });
        }
        if self.pipeline.stage_delay_ms == 0 {
            return Err(PxpError::InvalidConfig {
                details: "pipeline.stage_delay_ms must be >= 1".to_string(),
            });
        }
        if self.pipeline.stage_delay_ms > 600_000 {
            return Err(PxpError::InvalidConfig {
                details: format!(
                    "pipeline.stage_delay_ms ({}) must be <= 600000 (10 minutes)",
                    self.pipeline.stage_delay_ms
                ),
            });
        }
        if self.output.filename_prefix.is_empty()
            || self.output.filename_prefix.contains(['/', '\\'])
        {
            return Err(PxpError::InvalidConfig {
                details: format!(
                    "output.filename_prefix {:?} must be a non-empty file name component",
                    self.output.filename_prefix
                ),
            });
        }
        if self.output.extension.is_empty() || self.output.extension.contains(['.', '/', '\\']) {
            return Err(PxpError::InvalidConfig {
                details: format!(
                    "output.extension {:?} must be a bare extension without dot or separators",
                    self.output.extension
                ),
            });
        }
        if self.notices.auto_dismiss_secs == 0 {
            return Err(PxpError::InvalidConfig {
                details: "notices.auto_dismiss_secs must be >= 1".to_string(),
            });
        }
        if self.notices.max_visible == 0 {
            return Err(PxpError::InvalidConfig {
                details: "notices.max_visible must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|error| PxpError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_u32(name: &str, raw: &str) -> Result<u32> {
    raw.parse::<u32>().map_err(|error| PxpError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse::<bool>().map_err(|error| PxpError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
