//! Pure presentation: pipeline stage labels, byte formatting, and the
//! before/after comparison view model.
//!
//! Everything here is a deterministic function of its inputs. The headline
//! figures (65% reduction, 98% quality, "WebP") are fixed product constants,
//! not measurements; the optimized size is derived arithmetically from the
//! original. Rendering layers consume these values as-is.

use serde::Serialize;

/// Fixed compression ratio shown on the result card, in percent.
pub const COMPRESSION_RATIO_PERCENT: u8 = 65;

/// Fixed quality figure shown on the result card, in percent.
pub const QUALITY_PERCENT: u8 = 98;

/// Fixed output format label shown on the result card.
pub const OUTPUT_FORMAT_LABEL: &str = "WebP";

/// Sub-stages of the simulated optimization pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Uploading,
    Analyzing,
    Optimizing,
    Finalizing,
}

impl ProcessingStage {
    /// All sub-stages in pipeline order.
    pub const SEQUENCE: [Self; 4] = [
        Self::Uploading,
        Self::Analyzing,
        Self::Optimizing,
        Self::Finalizing,
    ];

    /// User-facing stage label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uploading => "Uploading your image...",
            Self::Analyzing => "Analyzing context...",
            Self::Optimizing => "Optimizing image...",
            Self::Finalizing => "Finalizing...",
        }
    }

    /// Progress percentage shown while this stage runs.
    ///
    /// Tops out at 95: the gauge never reads 100 while the pipeline is
    /// alive. Completion is signaled by leaving the processing screen, not
    /// by the gauge filling.
    #[must_use]
    pub const fn progress(self) -> u8 {
        match self {
            Self::Uploading => 25,
            Self::Analyzing => 50,
            Self::Optimizing => 75,
            Self::Finalizing => 95,
        }
    }

    /// The next sub-stage, or `None` after `Finalizing`.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Uploading => Some(Self::Analyzing),
            Self::Analyzing => Some(Self::Optimizing),
            Self::Optimizing => Some(Self::Finalizing),
            Self::Finalizing => None,
        }
    }

    /// Stable snake_case name for logs and JSON output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Analyzing => "analyzing",
            Self::Optimizing => "optimizing",
            Self::Finalizing => "finalizing",
        }
    }
}

/// Optimized size derived from the original: `floor(original * 0.35)`.
#[must_use]
pub fn simulated_optimized_size(original_bytes: u64) -> u64 {
    // Exact integer form of floor(n * 0.35); the widening avoids overflow
    // for pathological inputs even though real candidates are capped.
    u64::try_from(u128::from(original_bytes) * 35 / 100).unwrap_or(u64::MAX)
}

/// Human-readable byte count: `N B` under 1 KiB, otherwise two decimals
/// with binary divisors and `KB`/`MB` labels.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        #[allow(clippy::cast_precision_loss)]
        let kb = bytes as f64 / 1024.0;
        format!("{kb:.2} KB")
    } else {
        #[allow(clippy::cast_precision_loss)]
        let mb = bytes as f64 / (1024.0 * 1024.0);
        format!("{mb:.2} MB")
    }
}

/// View model for the result card: both sizes, the savings line, and the
/// fixed quality/format figures. Built once when the pipeline finishes and
/// rendered verbatim by the terminal and JSON outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonView {
    /// Size of the uploaded file in bytes.
    pub original_size: u64,
    /// Size reported for the optimized copy in bytes.
    pub optimized_size: u64,
    /// Reduction percentage shown in the card header.
    pub ratio_percent: u8,
    /// `original_size - optimized_size`, the "Savings" metric.
    pub saved_bytes: u64,
    /// Fixed quality figure.
    pub quality_percent: u8,
    /// Fixed output format label.
    pub format_label: &'static str,
}

impl ComparisonView {
    /// Build a view from caller-supplied figures.
    #[must_use]
    pub const fn new(original_size: u64, optimized_size: u64, ratio_percent: u8) -> Self {
        Self {
            original_size,
            optimized_size,
            ratio_percent,
            saved_bytes: original_size.saturating_sub(optimized_size),
            quality_percent: QUALITY_PERCENT,
            format_label: OUTPUT_FORMAT_LABEL,
        }
    }

    /// Build the view the pipeline produces: fixed ratio, derived size.
    #[must_use]
    pub fn simulated(original_size: u64) -> Self {
        Self::new(
            original_size,
            simulated_optimized_size(original_size),
            COMPRESSION_RATIO_PERCENT,
        )
    }

    /// Formatted original size.
    #[must_use]
    pub fn original_display(&self) -> String {
        format_size(self.original_size)
    }

    /// Formatted optimized size.
    #[must_use]
    pub fn optimized_display(&self) -> String {
        format_size(self.optimized_size)
    }

    /// Formatted savings.
    #[must_use]
    pub fn savings_display(&self) -> String {
        format_size(self.saved_bytes)
    }
}
