//! Wizard runtime: executes commands and feeds completions back as messages.
//!
//! The update function is pure; this module owns every side-effect it
//! describes. File inspection, byte reads, stage timers, ledger writes,
//! output saves and activity logging all happen here, with blocking work on
//! short-lived named threads reporting back over a bounded channel.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};
use sha2::{Digest, Sha256};

use crate::catalog::ContextId;
use crate::core::config::Config;
use crate::core::errors::{PxpError, Result};
use crate::logger::jsonl::{ActivityEvent, JsonlConfig, JsonlWriter};
use crate::present::{
    COMPRESSION_RATIO_PERCENT, OUTPUT_FORMAT_LABEL, ProcessingStage, QUALITY_PERCENT,
    simulated_optimized_size,
};
use crate::quota::QuotaLedger;
use crate::validate::{RejectReason, UploadCandidate};
use crate::wizard::model::{ImageRef, NoticeKind, Stage, WizardCmd, WizardModel, WizardMsg};
use crate::wizard::update::update;

/// Runtime → wizard message capacity. Replies are small and rare; the bound
/// only guards against a stuck consumer.
const MSG_CHANNEL_CAP: usize = 64;

// ──────────────────── runtime ────────────────────

/// Executes [`WizardCmd`] values and delivers the resulting [`WizardMsg`]
/// replies on its channel.
///
/// One instance lives for the whole session, shared between the interactive
/// front-end and the non-interactive driver.
pub struct SessionRuntime {
    msg_tx: Sender<WizardMsg>,
    msg_rx: Receiver<WizardMsg>,
    ledger: QuotaLedger,
    logger: Option<JsonlWriter>,
    output_dir: Option<PathBuf>,
    completed: u32,
}

impl SessionRuntime {
    /// Build a runtime from the effective configuration.
    ///
    /// Opens the activity log if enabled; the ledger file is only touched
    /// when a completion is recorded.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let (msg_tx, msg_rx) = bounded(MSG_CHANNEL_CAP);
        let logger = config
            .log
            .enabled
            .then(|| JsonlWriter::open(JsonlConfig::from_log_config(&config.log)));
        Self {
            msg_tx,
            msg_rx,
            ledger: QuotaLedger::new(config.paths.ledger_file.clone()),
            logger,
            output_dir: config.output.dir.clone(),
            completed: 0,
        }
    }

    /// Today's persisted completion count.
    #[must_use]
    pub fn used_today(&self) -> u32 {
        self.ledger.used_today()
    }

    /// Completions persisted by this runtime instance.
    #[must_use]
    pub const fn completed(&self) -> u32 {
        self.completed
    }

    /// Wait up to `timeout` for the next runtime message.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WizardMsg> {
        self.msg_rx.recv_timeout(timeout).ok()
    }

    /// Non-blocking receive.
    #[must_use]
    pub fn try_recv(&self) -> Option<WizardMsg> {
        self.msg_rx.try_recv().ok()
    }

    /// Append an event to the activity log, if logging is enabled.
    pub fn log(&mut self, event: &ActivityEvent) {
        if let Some(logger) = self.logger.as_mut() {
            logger.record(event);
        }
    }

    /// Execute one command. Blocking work runs on named worker threads;
    /// ledger writes and logging are immediate.
    pub fn execute(&mut self, cmd: WizardCmd) {
        match cmd {
            WizardCmd::None | WizardCmd::Quit => {}
            WizardCmd::Batch(cmds) => {
                for inner in cmds {
                    self.execute(inner);
                }
            }
            WizardCmd::InspectFile { path } => self.spawn_inspect(path),
            WizardCmd::ReadFile { path } => self.spawn_read(path),
            WizardCmd::ScheduleAdvance { run, after } => {
                self.spawn_timer("pxp-stage-timer", after, WizardMsg::AdvanceProcessing { run });
            }
            WizardCmd::ScheduleNoticeExpiry { id, after } => {
                self.spawn_timer("pxp-notice-timer", after, WizardMsg::NoticeExpired(id));
            }
            WizardCmd::RecordCompletion => self.record_completion(),
            WizardCmd::SaveOutput { bytes, file_name } => self.spawn_save(bytes, file_name),
            WizardCmd::Log(event) => self.log(&event),
        }
    }

    // ──────────────────── workers ────────────────────

    fn spawn_inspect(&self, path: PathBuf) {
        let tx = self.msg_tx.clone();
        spawn_worker("pxp-inspect", move || {
            let result = UploadCandidate::probe(&path).map_err(|e| e.to_string());
            let _ = tx.send(WizardMsg::FileInspected(result));
        });
    }

    fn spawn_read(&self, path: PathBuf) {
        let tx = self.msg_tx.clone();
        spawn_worker("pxp-read", move || {
            let result = fs::read(&path).map_err(|e| e.to_string());
            let _ = tx.send(WizardMsg::FileLoaded { path, result });
        });
    }

    fn spawn_timer(&self, name: &str, after: Duration, msg: WizardMsg) {
        let tx = self.msg_tx.clone();
        spawn_worker(name, move || {
            thread::sleep(after);
            let _ = tx.send(msg);
        });
    }

    fn spawn_save(&self, bytes: ImageRef, file_name: String) {
        let tx = self.msg_tx.clone();
        let dir = self.output_dir.clone();
        spawn_worker("pxp-save", move || {
            let result =
                save_output(dir.as_deref(), &file_name, bytes.bytes()).map_err(|e| e.to_string());
            let _ = tx.send(WizardMsg::OutputSaved(result));
        });
    }

    fn record_completion(&mut self) {
        match self.ledger.record_completion() {
            Ok(used) => {
                self.completed += 1;
                // Non-blocking: the model already advanced its own mirror.
                let _ = self.msg_tx.try_send(WizardMsg::QuotaRecorded { used });
            }
            Err(e) => {
                self.log(&ActivityEvent::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Fire-and-forget worker thread. The closure owns its reply sender; a
/// failed spawn degrades to running inline rather than losing the reply.
fn spawn_worker(name: &str, work: impl FnOnce() + Send + 'static) {
    let spawned = thread::Builder::new()
        .name(name.to_string())
        .spawn(work);
    if let Err(e) = spawned {
        eprintln!("[PXP-RUNTIME] failed to spawn {name}: {e}");
    }
}

// ──────────────────── output save ────────────────────

/// Write the output bytes into `dir` (or the current directory) and verify
/// the written copy.
///
/// Writes go through a temp file and rename so an interrupted save never
/// leaves a half-written download. The file is read back and digest-compared
/// against the source; the output is byte-identical to the input by
/// contract.
pub fn save_output(dir: Option<&Path>, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let dir = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().map_err(|source| PxpError::io(".", source))?,
    };
    fs::create_dir_all(&dir).map_err(|source| PxpError::io(&dir, source))?;

    let target = dir.join(file_name);
    let tmp = target.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|source| PxpError::io(&tmp, source))?;
    fs::rename(&tmp, &target).map_err(|source| PxpError::io(&target, source))?;

    let written = fs::read(&target).map_err(|source| PxpError::io(&target, source))?;
    if Sha256::digest(&written) != Sha256::digest(bytes) {
        return Err(PxpError::OutputMismatch { path: target });
    }
    Ok(target)
}

// ──────────────────── non-interactive driver ────────────────────

/// Outcome of a non-interactive optimize run.
#[derive(Debug)]
pub enum RunOutcome {
    /// The pipeline completed and the output file was written.
    Completed(OptimizeOutcome),
    /// The upload or the optimize action was refused.
    Refused(RejectReason),
}

/// Figures and paths from a completed run.
#[derive(Debug, Clone)]
pub struct OptimizeOutcome {
    /// Resolved source path.
    pub source: PathBuf,
    /// Context the image was optimized for.
    pub context: ContextId,
    /// Source size in bytes.
    pub original_size: u64,
    /// Reported optimized size in bytes.
    pub optimized_size: u64,
    /// Reported reduction percentage.
    pub ratio_percent: u8,
    /// Reported retained quality percentage.
    pub quality_percent: u8,
    /// Reported output format label.
    pub format_label: &'static str,
    /// Where the output file was written.
    pub output_path: PathBuf,
    /// Quota counter after this run.
    pub used_today: u32,
}

/// Drive one complete optimization without a terminal UI.
///
/// Feeds the same pure update function the interactive wizard uses, so
/// validation, quota and pipeline semantics are identical. `on_stage` fires
/// as each pipeline sub-stage begins.
///
/// # Errors
/// Infrastructure failures only (stalled runtime, failed save). A refused
/// upload is a normal [`RunOutcome::Refused`], not an error.
pub fn optimize_once(
    config: &Config,
    path: &Path,
    context: ContextId,
    mut on_stage: impl FnMut(ProcessingStage),
) -> Result<RunOutcome> {
    let mut runtime = SessionRuntime::new(config);
    let mut model = WizardModel::new(config, runtime.used_today());

    let config_hash = config
        .stable_hash()
        .unwrap_or_else(|_| "unknown".to_string());
    runtime.log(&ActivityEvent::SessionStarted {
        config_hash,
        used_today: model.daily_used,
    });

    let first = update(&mut model, WizardMsg::DropPath(path.display().to_string()));
    runtime.execute(first);

    // Generous ceiling: the longest single wait is one stage delay, plus
    // file IO on a slow disk.
    let step_timeout = model.stage_delay + Duration::from_secs(30);

    let outcome = loop {
        if let Some(reason) = first_rejection(&model) {
            break RunOutcome::Refused(reason);
        }
        match model.stage {
            Stage::Context if model.selected_context.is_none() => {
                let cmd = update(&mut model, WizardMsg::ContextChosen(context));
                runtime.execute(cmd);
                let cmd = update(&mut model, WizardMsg::StartOptimize);
                runtime.execute(cmd);
                on_stage(model.processing_stage);
                continue;
            }
            Stage::Result => {
                break drive_download(&mut model, &mut runtime, step_timeout)?;
            }
            _ => {}
        }

        let Some(msg) = runtime.recv_timeout(step_timeout) else {
            return Err(PxpError::Runtime {
                details: "wizard runtime stalled".to_string(),
            });
        };
        let before = model.processing_stage;
        let cmd = update(&mut model, msg);
        runtime.execute(cmd);
        if model.stage == Stage::Processing && model.processing_stage != before {
            on_stage(model.processing_stage);
        }
    };

    runtime.log(&ActivityEvent::SessionEnded {
        completed: runtime.completed(),
    });
    Ok(outcome)
}

/// Request the download and pump messages until the save lands.
fn drive_download(
    model: &mut WizardModel,
    runtime: &mut SessionRuntime,
    step_timeout: Duration,
) -> Result<RunOutcome> {
    let cmd = update(model, WizardMsg::Download);
    runtime.execute(cmd);

    loop {
        let Some(msg) = runtime.recv_timeout(step_timeout) else {
            return Err(PxpError::Runtime {
                details: "output save stalled".to_string(),
            });
        };
        if let WizardMsg::OutputSaved(result) = &msg {
            let result = result.clone();
            let cmd = update(model, msg);
            runtime.execute(cmd);
            return match result {
                Ok(output_path) => completed_outcome(model, output_path),
                Err(details) => Err(PxpError::Runtime {
                    details: format!("saving output failed: {details}"),
                }),
            };
        }
        // Stragglers: quota confirmations, notice expiries.
        let cmd = update(model, msg);
        runtime.execute(cmd);
    }
}

fn completed_outcome(model: &WizardModel, output_path: PathBuf) -> Result<RunOutcome> {
    let (Some(candidate), Some(context)) = (model.candidate.clone(), model.selected_context) else {
        return Err(PxpError::Runtime {
            details: "result stage without inputs".to_string(),
        });
    };
    Ok(RunOutcome::Completed(OptimizeOutcome {
        original_size: candidate.size_bytes,
        optimized_size: simulated_optimized_size(candidate.size_bytes),
        ratio_percent: COMPRESSION_RATIO_PERCENT,
        quality_percent: QUALITY_PERCENT,
        format_label: OUTPUT_FORMAT_LABEL,
        source: candidate.path,
        context,
        output_path,
        used_today: model.daily_used,
    }))
}

fn first_rejection(model: &WizardModel) -> Option<RejectReason> {
    model.notices.iter().find_map(|n| match &n.kind {
        NoticeKind::Rejected(reason) => Some(reason.clone()),
        _ => None,
    })
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// JPEG magic plus filler, enough for the sniffer.
    fn jpeg_bytes(len: usize) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.resize(len, 0xAB);
        bytes
    }

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.paths.ledger_file = dir.join("usage.json");
        config.log.enabled = false;
        config.log.path = dir.join("activity.jsonl");
        config.output.dir = Some(dir.join("out"));
        config.pipeline.stage_delay_ms = 5;
        config
    }

    #[test]
    fn save_output_writes_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = jpeg_bytes(2_048);

        let path = save_output(Some(dir.path()), "optimized-photo.jpg.webp", &bytes).unwrap();

        assert_eq!(path, dir.path().join("optimized-photo.jpg.webp"));
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn save_output_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("downloads").join("today");

        let path = save_output(Some(&nested), "out.webp", b"data").unwrap();
        assert!(path.starts_with(&nested));
        assert_eq!(fs::read(&path).unwrap(), b"data");
    }

    #[test]
    fn save_output_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        save_output(Some(dir.path()), "clean.webp", b"data").unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn inspect_command_reports_back_on_the_channel() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("photo.jpg");
        fs::write(&file, jpeg_bytes(512)).unwrap();

        let mut runtime = SessionRuntime::new(&test_config(dir.path()));
        runtime.execute(WizardCmd::InspectFile { path: file.clone() });

        let msg = runtime.recv_timeout(Duration::from_secs(5)).unwrap();
        let WizardMsg::FileInspected(Ok(candidate)) = msg else {
            panic!("expected successful inspection, got {msg:?}");
        };
        assert_eq!(candidate.path, file);
        assert_eq!(candidate.size_bytes, 512);
        assert_eq!(
            candidate.format,
            Some(crate::validate::ImageFormat::Jpeg)
        );
    }

    #[test]
    fn read_command_loads_the_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("photo.png");
        let bytes = jpeg_bytes(1_024);
        fs::write(&file, &bytes).unwrap();

        let mut runtime = SessionRuntime::new(&test_config(dir.path()));
        runtime.execute(WizardCmd::ReadFile { path: file.clone() });

        let msg = runtime.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            msg,
            WizardMsg::FileLoaded {
                path: file,
                result: Ok(bytes)
            }
        );
    }

    #[test]
    fn stage_timer_delivers_the_advance() {
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = SessionRuntime::new(&test_config(dir.path()));

        runtime.execute(WizardCmd::ScheduleAdvance {
            run: 7,
            after: Duration::from_millis(10),
        });

        let msg = runtime.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(msg, WizardMsg::AdvanceProcessing { run: 7 });
    }

    #[test]
    fn record_completion_persists_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut runtime = SessionRuntime::new(&config);

        runtime.execute(WizardCmd::RecordCompletion);

        let msg = runtime.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(msg, WizardMsg::QuotaRecorded { used: 1 });
        assert_eq!(runtime.used_today(), 1);
        assert_eq!(runtime.completed(), 1);
        assert!(config.paths.ledger_file.exists());
    }

    #[test]
    fn optimize_once_completes_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let source = dir.path().join("cat.jpg");
        let bytes = jpeg_bytes(4_000);
        fs::write(&source, &bytes).unwrap();

        let mut stages = Vec::new();
        let outcome = optimize_once(&config, &source, ContextId::Instagram, |s| stages.push(s))
            .expect("run should succeed");

        let RunOutcome::Completed(done) = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(done.original_size, 4_000);
        assert_eq!(done.optimized_size, 1_400);
        assert_eq!(done.ratio_percent, 65);
        assert_eq!(done.quality_percent, 98);
        assert_eq!(done.context, ContextId::Instagram);
        assert_eq!(done.used_today, 1);
        assert_eq!(
            done.output_path,
            dir.path().join("out").join("optimized-cat.jpg.webp")
        );

        // The output is byte-identical to the source.
        assert_eq!(fs::read(&done.output_path).unwrap(), bytes);
        // All four sub-stages were reported, in order.
        assert_eq!(stages, ProcessingStage::SEQUENCE);
        // The ledger kept the completion.
        assert_eq!(QuotaLedger::new(config.paths.ledger_file.clone()).used_today(), 1);
    }

    #[test]
    fn optimize_once_refuses_when_quota_is_spent() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let ledger = QuotaLedger::new(config.paths.ledger_file.clone());
        for _ in 0..5 {
            ledger.record_completion().unwrap();
        }

        let source = dir.path().join("cat.jpg");
        fs::write(&source, jpeg_bytes(1_000)).unwrap();

        let outcome = optimize_once(&config, &source, ContextId::Web, |_| {}).unwrap();
        let RunOutcome::Refused(reason) = outcome else {
            panic!("expected refusal, got {outcome:?}");
        };
        assert_eq!(reason, RejectReason::QuotaExceeded { used: 5, limit: 5 });

        // No quota was consumed by the refused run.
        assert_eq!(ledger.used_today(), 5);
    }

    #[test]
    fn optimize_once_rejects_non_image_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let source = dir.path().join("notes.txt");
        fs::write(&source, b"plain text, not an image").unwrap();

        let outcome = optimize_once(&config, &source, ContextId::Web, |_| {}).unwrap();
        assert!(matches!(
            outcome,
            RunOutcome::Refused(RejectReason::UnsupportedFormat)
        ));
    }
}
