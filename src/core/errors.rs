//! PXP-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, PxpError>;

/// Top-level error type for pixelpress.
///
/// Covers infrastructure failures (config, persistence, IO, terminal).
/// User-input rejections inside the wizard are [`crate::validate::RejectReason`]
/// values and flow through the notice channel instead.
#[derive(Debug, Error)]
pub enum PxpError {
    #[error("[PXP-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[PXP-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[PXP-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[PXP-2001] quota ledger failure at {path}: {details}")]
    QuotaState { path: PathBuf, details: String },

    #[error("[PXP-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[PXP-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[PXP-3101] terminal failure: {details}")]
    Terminal { details: String },

    #[error("[PXP-3201] saved output at {path} does not match the source bytes")]
    OutputMismatch { path: PathBuf },

    #[error("[PXP-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl PxpError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "PXP-1001",
            Self::MissingConfig { .. } => "PXP-1002",
            Self::ConfigParse { .. } => "PXP-1003",
            Self::QuotaState { .. } => "PXP-2001",
            Self::Serialization { .. } => "PXP-2101",
            Self::Io { .. } => "PXP-3001",
            Self::Terminal { .. } => "PXP-3101",
            Self::OutputMismatch { .. } => "PXP-3201",
            Self::Runtime { .. } => "PXP-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::Terminal { .. }
                | Self::OutputMismatch { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for PxpError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for PxpError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<PxpError> {
        vec![
            PxpError::InvalidConfig {
                details: String::new(),
            },
            PxpError::MissingConfig {
                path: PathBuf::new(),
            },
            PxpError::ConfigParse {
                context: "",
                details: String::new(),
            },
            PxpError::QuotaState {
                path: PathBuf::new(),
                details: String::new(),
            },
            PxpError::Serialization {
                context: "",
                details: String::new(),
            },
            PxpError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            PxpError::Terminal {
                details: String::new(),
            },
            PxpError::OutputMismatch {
                path: PathBuf::new(),
            },
            PxpError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_pxp_prefix() {
        for err in all_variants() {
            assert!(
                err.code().starts_with("PXP-"),
                "code {} must start with PXP-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = PxpError::InvalidConfig {
            details: "bad value".to_string(),
        };
        let msg = err.to_string();
        assert!(
            msg.contains("PXP-1001"),
            "display should contain error code: {msg}"
        );
        assert!(
            msg.contains("bad value"),
            "display should contain details: {msg}"
        );
    }

    #[test]
    fn retryable_errors_are_correct() {
        assert!(
            PxpError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            }
            .is_retryable()
        );
        assert!(
            PxpError::Terminal {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            PxpError::OutputMismatch {
                path: PathBuf::new()
            }
            .is_retryable()
        );
        assert!(
            PxpError::Runtime {
                details: String::new()
            }
            .is_retryable()
        );

        assert!(
            !PxpError::InvalidConfig {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            !PxpError::MissingConfig {
                path: PathBuf::new()
            }
            .is_retryable()
        );
        assert!(
            !PxpError::QuotaState {
                path: PathBuf::new(),
                details: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = PxpError::io(
            "/tmp/missing.png",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "PXP-3001");
        assert!(err.to_string().contains("/tmp/missing.png"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: PxpError = json_err.into();
        assert_eq!(err.code(), "PXP-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: PxpError = toml_err.into();
        assert_eq!(err.code(), "PXP-1003");
    }
}
