//! Upload candidate inspection and validation.
//!
//! Acceptance is format-first: a candidate failing both checks reports
//! `UnsupportedFormat`, not `FileTooLarge`. Format detection sniffs magic
//! bytes and falls back to the file extension, which mirrors how desktop
//! environments assign image MIME types.

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Accepted image formats and their MIME types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
}

impl ImageFormat {
    /// MIME type string for this format.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    /// Detect a format from the first bytes of a file.
    ///
    /// JPEG starts with `FF D8 FF`; PNG with the fixed 8-byte signature;
    /// WebP is a RIFF container whose fourth chunk word is `WEBP`.
    #[must_use]
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if header.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        None
    }

    /// Map a file extension to a format.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// A user-supplied file awaiting validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub path: PathBuf,
    /// Final path component, lossy; may be empty for pathological paths.
    pub file_name: String,
    pub size_bytes: u64,
    /// Detected format; `None` means the file is not a recognized image.
    pub format: Option<ImageFormat>,
}

impl UploadCandidate {
    /// Inspect a file on disk: stat its size and detect its format.
    ///
    /// Reads at most 12 bytes. Returns the underlying IO error when the
    /// path is missing, unreadable, or not a regular file; callers surface
    /// that as a read failure.
    pub fn probe(path: &Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let mut header = [0_u8; 12];
        let mut file = fs::File::open(path)?;
        let mut filled = 0;
        while filled < header.len() {
            let n = file.read(&mut header[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        let format = ImageFormat::sniff(&header[..filled]).or_else(|| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .and_then(ImageFormat::from_extension)
        });

        Ok(Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_bytes: meta.len(),
            format,
        })
    }

    /// Construct a candidate from already-known attributes (tests, previews).
    #[must_use]
    pub fn from_parts(path: PathBuf, size_bytes: u64, format: Option<ImageFormat>) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            file_name,
            size_bytes,
            format,
        }
    }
}

/// Why the wizard refused an action. One taxonomy for every user-facing
/// refusal; all of them surface as destructive notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    UnsupportedFormat,
    FileTooLarge { size_bytes: u64, max_bytes: u64 },
    QuotaExceeded { used: u32, limit: u32 },
    ContextNotSelected,
    ReadFailed { details: String },
}

impl RejectReason {
    /// Short notice title.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "Unsupported format",
            Self::FileTooLarge { .. } => "File too large",
            Self::QuotaExceeded { .. } => "Daily limit reached",
            Self::ContextNotSelected => "Select a context",
            Self::ReadFailed { .. } => "Could not read file",
        }
    }

    /// One-line notice description.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::UnsupportedFormat => "Use a JPG, PNG, or WebP image.".to_string(),
            Self::FileTooLarge { max_bytes, .. } => {
                format!(
                    "Maximum size is {} MB.",
                    max_bytes / (1024 * 1024)
                )
            }
            Self::QuotaExceeded { limit, .. } => {
                format!("You already optimized {limit} images today. Come back tomorrow.")
            }
            Self::ContextNotSelected => {
                "Choose a usage context before optimizing.".to_string()
            }
            Self::ReadFailed { details } => format!("The image could not be loaded: {details}"),
        }
    }

    /// Stable snake_case name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "unsupported_format",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::ContextNotSelected => "context_not_selected",
            Self::ReadFailed { .. } => "read_failed",
        }
    }
}

/// Validate a candidate against the acceptance rules.
///
/// Pure: the verdict depends only on the candidate's attributes and the
/// size ceiling. The caller surfaces any rejection.
pub fn validate(candidate: &UploadCandidate, max_file_bytes: u64) -> Result<(), RejectReason> {
    if candidate.format.is_none() {
        return Err(RejectReason::UnsupportedFormat);
    }
    if candidate.size_bytes > max_file_bytes {
        return Err(RejectReason::FileTooLarge {
            size_bytes: candidate.size_bytes,
            max_bytes: max_file_bytes,
        });
    }
    Ok(())
}
