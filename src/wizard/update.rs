//! Pure update function for the optimization wizard.
//!
//! `update()` takes the current model and a message, mutates the model, and
//! returns a command describing any side-effects the runtime should execute.
//!
//! **Design invariant:** this module performs zero I/O. All effects are
//! described as [`WizardCmd`] values.

use crate::catalog::CATALOG;
use crate::core::paths::{clean_dropped_path, resolve_absolute_path};
use crate::logger::jsonl::ActivityEvent;
use crate::present::{COMPRESSION_RATIO_PERCENT, ProcessingStage, simulated_optimized_size};
use crate::validate::{RejectReason, UploadCandidate, validate};

use super::model::{
    ImageRef, NoticeKind, NoticeSeverity, Stage, WizardCmd, WizardModel, WizardMsg,
};

/// Apply a message to the model and return the next command for the runtime.
///
/// This is the wizard's entire state machine. Every transition goes through
/// this function, making the flow deterministic and testable.
#[allow(clippy::too_many_lines)]
pub fn update(model: &mut WizardModel, msg: WizardMsg) -> WizardCmd {
    match msg {
        WizardMsg::InputChar(c) => {
            if model.stage == Stage::Upload {
                model.input.push(c);
                model.editing = true;
            }
            WizardCmd::None
        }

        WizardMsg::InputBackspace => {
            if model.stage == Stage::Upload {
                model.input.pop();
                model.editing = true;
            }
            WizardCmd::None
        }

        WizardMsg::SubmitPath => {
            // New input is refused outside the upload screen; while the
            // pipeline runs this must not even reach the validator.
            if model.stage != Stage::Upload {
                return WizardCmd::None;
            }
            let trimmed = model.input.trim();
            if trimmed.is_empty() {
                return WizardCmd::None;
            }
            let path = resolve_absolute_path(&clean_dropped_path(trimmed));
            model.editing = false;
            WizardCmd::InspectFile { path }
        }

        WizardMsg::DropPath(raw) => {
            if model.stage != Stage::Upload {
                return WizardCmd::None;
            }
            let path = resolve_absolute_path(&clean_dropped_path(raw.trim()));
            model.input = path.display().to_string();
            model.editing = false;
            WizardCmd::InspectFile { path }
        }

        WizardMsg::FileInspected(result) => {
            if model.stage != Stage::Upload {
                return WizardCmd::None;
            }
            match result {
                Err(details) => {
                    model.candidate = None;
                    refuse_upload(model, None, RejectReason::ReadFailed { details })
                }
                Ok(candidate) => accept_or_refuse(model, candidate),
            }
        }

        WizardMsg::FileLoaded { path, result } => {
            // A read that outlived its candidate (reset or a newer submit)
            // is stale; drop it silently.
            if model.stage != Stage::Upload
                || model.candidate.as_ref().is_none_or(|c| c.path != path)
            {
                return WizardCmd::None;
            }
            match result {
                Ok(bytes) => {
                    model.original_ref = Some(ImageRef::new(bytes));
                    model.stage = Stage::Context;
                    model.context_cursor = 0;
                    WizardCmd::None
                }
                Err(details) => {
                    let shown = path.display().to_string();
                    model.candidate = None;
                    model.original_ref = None;
                    refuse_upload(model, Some(shown), RejectReason::ReadFailed { details })
                }
            }
        }

        WizardMsg::ContextCursorUp => {
            if model.stage == Stage::Context {
                model.context_cursor_up();
            }
            WizardCmd::None
        }

        WizardMsg::ContextCursorDown => {
            if model.stage == Stage::Context {
                model.context_cursor_down();
            }
            WizardCmd::None
        }

        WizardMsg::ContextChosen(id) => {
            if model.stage != Stage::Context {
                return WizardCmd::None;
            }
            // Re-selecting the same card still reports the selection.
            model.selected_context = Some(id);
            if let Some(pos) = CATALOG.iter().position(|e| e.id == id) {
                model.context_cursor = pos;
            }
            WizardCmd::Log(ActivityEvent::ContextSelected { context: id })
        }

        WizardMsg::StartOptimize => {
            if model.stage != Stage::Context {
                return WizardCmd::None;
            }
            if model.selected_context.is_none() {
                let reason = RejectReason::ContextNotSelected;
                let id = model.push_reject(reason.clone());
                return WizardCmd::Batch(vec![
                    WizardCmd::Log(ActivityEvent::OptimizeRefused { reason }),
                    expiry(model, id),
                ]);
            }
            model.pipeline_run += 1;
            model.stage = Stage::Processing;
            model.processing_stage = ProcessingStage::Uploading;
            WizardCmd::ScheduleAdvance {
                run: model.pipeline_run,
                after: model.stage_delay,
            }
        }

        WizardMsg::AdvanceProcessing { run } => {
            if model.stage != Stage::Processing || run != model.pipeline_run {
                return WizardCmd::None;
            }
            match model.processing_stage.next() {
                Some(next) => {
                    model.processing_stage = next;
                    WizardCmd::ScheduleAdvance {
                        run,
                        after: model.stage_delay,
                    }
                }
                None => complete_pipeline(model),
            }
        }

        WizardMsg::QuotaRecorded { used } => {
            model.daily_used = used;
            WizardCmd::None
        }

        WizardMsg::Download => {
            if model.stage != Stage::Result {
                return WizardCmd::None;
            }
            let Some(bytes) = model.optimized_ref.clone() else {
                return WizardCmd::None;
            };
            WizardCmd::SaveOutput {
                bytes,
                file_name: model.download_file_name(),
            }
        }

        WizardMsg::OutputSaved(result) => {
            if model.stage != Stage::Result {
                return WizardCmd::None;
            }
            let size = model.optimized_ref.as_ref().map_or(0, |r| r.len() as u64);
            match result {
                Ok(path) => {
                    let shown = path.display().to_string();
                    model.last_saved = Some(path);
                    let id = model.push_notice(
                        NoticeSeverity::Neutral,
                        NoticeKind::DownloadStarted,
                        "Download started",
                        format!("Saved to {shown}."),
                    );
                    WizardCmd::Batch(vec![
                        WizardCmd::Log(ActivityEvent::DownloadSaved {
                            path: Some(shown),
                            size,
                            ok: true,
                            details: None,
                        }),
                        expiry(model, id),
                    ])
                }
                Err(details) => {
                    let id = model.push_notice(
                        NoticeSeverity::Destructive,
                        NoticeKind::SaveFailed,
                        "Save failed",
                        details.clone(),
                    );
                    WizardCmd::Batch(vec![
                        WizardCmd::Log(ActivityEvent::DownloadSaved {
                            path: None,
                            size,
                            ok: false,
                            details: Some(details),
                        }),
                        expiry(model, id),
                    ])
                }
            }
        }

        WizardMsg::NoticeExpired(id) => {
            model.notices.retain(|n| n.id != id);
            WizardCmd::None
        }

        WizardMsg::Reset => {
            // Bumping the run number orphans any in-flight stage timers.
            model.pipeline_run += 1;
            model.reset_session();
            WizardCmd::None
        }

        WizardMsg::Quit => {
            model.quit = true;
            WizardCmd::Quit
        }
    }
}

// ──────────────────── transition helpers ────────────────────

/// Validate an inspected candidate and either start the byte read or refuse.
///
/// Order matters: format and size verdicts come from the validator first;
/// the quota guard applies only to otherwise-acceptable files.
fn accept_or_refuse(model: &mut WizardModel, candidate: UploadCandidate) -> WizardCmd {
    let shown = candidate.path.display().to_string();

    if let Err(reason) = validate(&candidate, model.max_file_bytes) {
        return refuse_upload(model, Some(shown), reason);
    }
    if model.quota_exhausted() {
        let reason = RejectReason::QuotaExceeded {
            used: model.daily_used,
            limit: model.daily_quota,
        };
        return refuse_upload(model, Some(shown), reason);
    }

    let path = candidate.path.clone();
    let size = candidate.size_bytes;
    let mime = candidate
        .format
        .map_or("application/octet-stream", |f| f.mime());
    model.candidate = Some(candidate);
    WizardCmd::Batch(vec![
        WizardCmd::Log(ActivityEvent::UploadAccepted {
            path: shown,
            size,
            mime,
        }),
        WizardCmd::ReadFile { path },
    ])
}

/// Finish the pipeline: fabricate the result figures, bump the usage
/// mirror, and hand persistence to the runtime.
fn complete_pipeline(model: &mut WizardModel) -> WizardCmd {
    let (Some(original), Some(candidate), Some(context)) = (
        model.original_ref.clone(),
        model.candidate.clone(),
        model.selected_context,
    ) else {
        // A pipeline without its inputs cannot produce a result.
        model.reset_session();
        return WizardCmd::None;
    };

    model.optimized_ref = Some(original);
    model.daily_used += 1;
    model.stage = Stage::Result;

    let id = model.push_notice(
        NoticeSeverity::Neutral,
        NoticeKind::OptimizationComplete,
        "Optimization complete!",
        "Your image was optimized successfully.",
    );
    WizardCmd::Batch(vec![
        WizardCmd::RecordCompletion,
        WizardCmd::Log(ActivityEvent::OptimizeCompleted {
            path: candidate.path.display().to_string(),
            context,
            original_size: candidate.size_bytes,
            optimized_size: simulated_optimized_size(candidate.size_bytes),
            ratio_percent: COMPRESSION_RATIO_PERCENT,
            used_today: model.daily_used,
        }),
        expiry(model, id),
    ])
}

/// Surface a refusal: destructive notice plus an activity-log line.
fn refuse_upload(model: &mut WizardModel, path: Option<String>, reason: RejectReason) -> WizardCmd {
    let id = model.push_reject(reason.clone());
    WizardCmd::Batch(vec![
        WizardCmd::Log(ActivityEvent::UploadRejected { path, reason }),
        expiry(model, id),
    ])
}

const fn expiry(model: &WizardModel, id: u64) -> WizardCmd {
    WizardCmd::ScheduleNoticeExpiry {
        id,
        after: model.notice_ttl,
    }
}

// ──────────────────── tests ────────────────────
