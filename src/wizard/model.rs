//! Elm-style state model for the optimization wizard.
//!
//! All wizard state lives in [`WizardModel`]. Input and I/O-completion
//! events arrive as [`WizardMsg`] values; side-effects are represented as
//! [`WizardCmd`] values returned from the update function.
//!
//! **Design invariant:** the model is deterministic and testable — no I/O
//! happens here.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{CATALOG, ContextId};
use crate::core::config::Config;
use crate::logger::jsonl::ActivityEvent;
use crate::present::{ComparisonView, ProcessingStage};
use crate::validate::{RejectReason, UploadCandidate};

// ──────────────────── stages ────────────────────

/// Top-level wizard stages, in flow order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    /// Pick a file (typed path or terminal drop).
    #[default]
    Upload,
    /// Pick a usage context for the accepted file.
    Context,
    /// Simulated pipeline is running; input is ignored.
    Processing,
    /// Before/after comparison with download and reset actions.
    Result,
}

impl Stage {
    /// Header title for the stage's screen.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Upload => "Upload an image",
            Self::Context => "Choose a context",
            Self::Processing => "Optimizing",
            Self::Result => "Your image is ready",
        }
    }
}

// ──────────────────── image data ────────────────────

/// Opaque, cheaply clonable handle to loaded image bytes.
///
/// The pipeline never transforms these bytes: the "optimized" handle is a
/// clone of the original, and equality is byte equality.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageRef(Arc<Vec<u8>>);

impl ImageRef {
    /// Wrap freshly read bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Arc::new(bytes))
    }

    /// The underlying bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Byte length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for zero-length data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The payload can be megabytes; never dump it into debug output.
        write!(f, "ImageRef({} bytes)", self.0.len())
    }
}

// ──────────────────── notices ────────────────────

/// Visual weight of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSeverity {
    /// Informational: completion, download started.
    Neutral,
    /// A refused action or a failure.
    Destructive,
}

/// Machine-readable classification of a notice, used by non-interactive
/// drivers to tell refusals apart without parsing display strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    /// An action was refused; carries the structured reason.
    Rejected(RejectReason),
    /// The pipeline finished.
    OptimizationComplete,
    /// The optimized copy was written to disk.
    DownloadStarted,
    /// Writing the optimized copy failed.
    SaveFailed,
}

/// Non-blocking toast shown above the active screen.
///
/// At most `notices.max_visible` at once (oldest evicted); each
/// auto-dismisses after the configured interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Monotonic ID for expiry tracking.
    pub id: u64,
    /// Visual weight.
    pub severity: NoticeSeverity,
    /// Classification.
    pub kind: NoticeKind,
    /// Short title line.
    pub title: String,
    /// One-line description.
    pub body: String,
}

// ──────────────────── model ────────────────────

/// Complete wizard state.
///
/// This struct is the single source of truth for the view layer. Only
/// [`crate::wizard::update::update`] mutates it; render code reads it
/// immutably.
#[derive(Debug)]
pub struct WizardModel {
    /// Active wizard stage.
    pub stage: Stage,
    /// Current pipeline sub-stage; meaningful only while `stage` is
    /// [`Stage::Processing`].
    pub processing_stage: ProcessingStage,
    /// Accepted upload awaiting (or past) processing.
    pub candidate: Option<UploadCandidate>,
    /// Selected usage context, if any.
    pub selected_context: Option<ContextId>,
    /// Cursor position on the context screen (index into [`CATALOG`]).
    pub context_cursor: usize,
    /// Loaded bytes of the accepted file.
    pub original_ref: Option<ImageRef>,
    /// "Optimized" bytes; set when the pipeline completes, always equal to
    /// `original_ref`.
    pub optimized_ref: Option<ImageRef>,
    /// Mirror of the persisted quota ledger for the current day.
    pub daily_used: u32,
    /// Configured daily quota.
    pub daily_quota: u32,
    /// Configured upload size ceiling in bytes.
    pub max_file_bytes: u64,
    /// Configured per-sub-stage pipeline delay.
    pub stage_delay: Duration,
    /// Configured notice auto-dismiss interval.
    pub notice_ttl: Duration,
    /// Configured visible-notice cap.
    pub max_notices: usize,
    /// Path input buffer on the upload screen.
    pub input: String,
    /// Transient flag: the user is editing the path buffer. Rendering only;
    /// never consulted by validation.
    pub editing: bool,
    /// Active notices, oldest first.
    pub notices: Vec<Notice>,
    /// Monotonic counter for notice IDs.
    pub next_notice_id: u64,
    /// Current pipeline run number. Incremented on every pipeline start and
    /// on reset; stage-advance messages from older runs are stale.
    pub pipeline_run: u64,
    /// Where the last download was written, for the result screen.
    pub last_saved: Option<PathBuf>,
    /// Configured output filename prefix (`optimized-`).
    pub filename_prefix: String,
    /// Configured output filename extension (`webp`).
    pub filename_extension: String,
    /// Whether the user has requested quit.
    pub quit: bool,
}

impl WizardModel {
    /// Create a model from the effective configuration and the ledger's
    /// count for today.
    #[must_use]
    pub fn new(config: &Config, daily_used: u32) -> Self {
        Self {
            stage: Stage::default(),
            processing_stage: ProcessingStage::Uploading,
            candidate: None,
            selected_context: None,
            context_cursor: 0,
            original_ref: None,
            optimized_ref: None,
            daily_used,
            daily_quota: config.limits.daily_quota,
            max_file_bytes: config.limits.max_file_bytes,
            stage_delay: Duration::from_millis(config.pipeline.stage_delay_ms),
            notice_ttl: Duration::from_secs(config.notices.auto_dismiss_secs),
            max_notices: config.notices.max_visible,
            input: String::new(),
            editing: false,
            notices: Vec::new(),
            next_notice_id: 0,
            pipeline_run: 0,
            last_saved: None,
            filename_prefix: config.output.filename_prefix.clone(),
            filename_extension: config.output.extension.clone(),
            quit: false,
        }
    }

    /// Push a notice, evicting the oldest if at capacity.
    /// Returns the assigned notice ID.
    pub fn push_notice(
        &mut self,
        severity: NoticeSeverity,
        kind: NoticeKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> u64 {
        let id = self.next_notice_id;
        self.next_notice_id += 1;
        self.notices.push(Notice {
            id,
            severity,
            kind,
            title: title.into(),
            body: body.into(),
        });
        while self.notices.len() > self.max_notices {
            self.notices.remove(0);
        }
        id
    }

    /// Surface a refusal as a destructive notice. Returns the notice ID.
    pub fn push_reject(&mut self, reason: RejectReason) -> u64 {
        let title = reason.title();
        let body = reason.description();
        self.push_notice(
            NoticeSeverity::Destructive,
            NoticeKind::Rejected(reason),
            title,
            body,
        )
    }

    /// True once today's quota is used up.
    #[must_use]
    pub const fn quota_exhausted(&self) -> bool {
        self.daily_used >= self.daily_quota
    }

    /// Usage header line for the upload screen.
    #[must_use]
    pub fn usage_label(&self) -> String {
        format!("{}/{} images today", self.daily_used, self.daily_quota)
    }

    /// Move the context cursor up. Returns `true` if it moved.
    pub fn context_cursor_up(&mut self) -> bool {
        if self.context_cursor > 0 {
            self.context_cursor -= 1;
            true
        } else {
            false
        }
    }

    /// Move the context cursor down. Returns `true` if it moved.
    pub fn context_cursor_down(&mut self) -> bool {
        if self.context_cursor < CATALOG.len() - 1 {
            self.context_cursor += 1;
            true
        } else {
            false
        }
    }

    /// The context id under the cursor.
    #[must_use]
    pub fn cursor_context(&self) -> ContextId {
        CATALOG[self.context_cursor.min(CATALOG.len() - 1)].id
    }

    /// Clear per-session state and return to the upload stage.
    ///
    /// `daily_used` survives: resetting the session never refunds quota.
    /// Notices keep their own expiry timers and survive too.
    pub fn reset_session(&mut self) {
        self.stage = Stage::Upload;
        self.processing_stage = ProcessingStage::Uploading;
        self.candidate = None;
        self.selected_context = None;
        self.context_cursor = 0;
        self.original_ref = None;
        self.optimized_ref = None;
        self.input.clear();
        self.editing = false;
        self.last_saved = None;
    }

    /// Result-card figures, available once the pipeline has completed.
    #[must_use]
    pub fn comparison(&self) -> Option<ComparisonView> {
        if self.stage != Stage::Result {
            return None;
        }
        let candidate = self.candidate.as_ref()?;
        Some(ComparisonView::simulated(candidate.size_bytes))
    }

    /// Download filename for the current candidate.
    #[must_use]
    pub fn download_file_name(&self) -> String {
        output_file_name(
            self.candidate.as_ref().map(|c| c.file_name.as_str()),
            &self.filename_prefix,
            &self.filename_extension,
        )
    }
}

/// Build the download filename: prefix + full original name + extension.
///
/// The original name is kept whole, so `photo.jpg` becomes
/// `optimized-photo.jpg.webp`. An absent or empty name falls back to
/// `image`.
#[must_use]
pub fn output_file_name(original: Option<&str>, prefix: &str, extension: &str) -> String {
    let base = match original {
        Some(name) if !name.is_empty() => name,
        _ => "image",
    };
    format!("{prefix}{base}.{extension}")
}

// ──────────────────── messages ────────────────────

/// Events that drive state transitions in the wizard model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardMsg {
    /// A printable character typed into the path buffer.
    InputChar(char),
    /// Backspace in the path buffer.
    InputBackspace,
    /// The path buffer was submitted (Enter).
    SubmitPath,
    /// A path arrived via terminal drag-and-drop (bracketed paste); raw,
    /// possibly quoted or escaped.
    DropPath(String),
    /// The runtime inspected a submitted path (stat + magic bytes).
    FileInspected(Result<UploadCandidate, String>),
    /// The runtime finished reading the accepted file's bytes.
    FileLoaded {
        /// The path that was read, for staleness detection.
        path: PathBuf,
        /// The bytes, or an IO error rendered for display.
        result: Result<Vec<u8>, String>,
    },
    /// Move the context cursor up.
    ContextCursorUp,
    /// Move the context cursor down.
    ContextCursorDown,
    /// A context card was chosen.
    ContextChosen(ContextId),
    /// The optimize action was triggered.
    StartOptimize,
    /// A sub-stage timer elapsed for the given pipeline run.
    AdvanceProcessing {
        /// Run the timer belongs to; stale runs are ignored.
        run: u64,
    },
    /// The ledger recorded a completion; carries the persisted count.
    QuotaRecorded {
        /// Authoritative count for today.
        used: u32,
    },
    /// The download action was triggered.
    Download,
    /// The runtime finished saving the optimized copy.
    OutputSaved(Result<PathBuf, String>),
    /// A notice's auto-dismiss timer expired.
    NoticeExpired(u64),
    /// Start over from the upload stage.
    Reset,
    /// Quit the wizard.
    Quit,
}

// ──────────────────── commands ────────────────────

/// Side-effects returned by the update function for the runtime to execute.
///
/// All I/O is represented as a command — the update function never performs
/// I/O directly, keeping the state machine deterministic and testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardCmd {
    /// No side-effect.
    None,
    /// Execute multiple commands in order.
    Batch(Vec<Self>),
    /// Stat and sniff a candidate file; reply with `FileInspected`.
    InspectFile {
        /// Absolute path to inspect.
        path: PathBuf,
    },
    /// Read the accepted file's bytes; reply with `FileLoaded`.
    ReadFile {
        /// Absolute path to read.
        path: PathBuf,
    },
    /// One-shot timer for the next pipeline sub-stage.
    ScheduleAdvance {
        /// Pipeline run the timer belongs to.
        run: u64,
        /// Delay before delivering `AdvanceProcessing`.
        after: Duration,
    },
    /// Persist one completed optimization; reply with `QuotaRecorded`.
    RecordCompletion,
    /// Write the optimized bytes to the output directory; reply with
    /// `OutputSaved`.
    SaveOutput {
        /// Bytes to write.
        bytes: ImageRef,
        /// File name inside the configured output directory.
        file_name: String,
    },
    /// Schedule a notice auto-dismiss after the given duration.
    ScheduleNoticeExpiry {
        /// Notice to expire.
        id: u64,
        /// Delay before delivering `NoticeExpired`.
        after: Duration,
    },
    /// Append an event to the activity log.
    Log(ActivityEvent),
    /// Terminate the wizard event loop.
    Quit,
}

// ──────────────────── tests ────────────────────
