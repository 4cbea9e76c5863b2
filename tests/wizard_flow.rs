//! Wizard flow scenarios driven through the library: the same pure update
//! function the terminal front-end uses, paired with a real session runtime
//! for file IO and timers.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use proptest::prelude::*;

use pixelpress::prelude::*;
use pixelpress::wizard::model::NoticeKind;

fn flow_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.pipeline.stage_delay_ms = 5;
    config.notices.auto_dismiss_secs = 1;
    config.log.enabled = false;
    config.output.dir = Some(dir.join("out"));
    config.paths.ledger_file = dir.join("usage.json");
    config
}

fn jpeg_file(dir: &Path, name: &str, len: usize) -> PathBuf {
    let mut bytes = vec![0xAB_u8; len];
    bytes[..4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    let path = dir.join(name);
    fs::write(&path, &bytes).expect("write fixture image");
    path
}

/// Pump runtime replies through the update function until `done` holds.
fn pump_until(
    model: &mut WizardModel,
    runtime: &mut SessionRuntime,
    what: &str,
    mut done: impl FnMut(&WizardModel) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(model) {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {what}; model stage: {:?}",
            model.stage
        );
        if let Some(msg) = runtime.recv_timeout(Duration::from_millis(50)) {
            let cmd = update(model, msg);
            runtime.execute(cmd);
        }
    }
}

fn feed(model: &mut WizardModel, runtime: &mut SessionRuntime, msg: WizardMsg) {
    let cmd = update(model, msg);
    runtime.execute(cmd);
}

#[test]
fn full_session_uploads_optimizes_and_downloads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = flow_config(dir.path());
    // Space in the name: dropped paths keep the full original file name.
    let source = jpeg_file(dir.path(), "cat picture.jpg", 4_096);

    let mut runtime = SessionRuntime::new(&config);
    let mut model = WizardModel::new(&config, runtime.used_today());
    assert_eq!(model.daily_used, 0);

    feed(
        &mut model,
        &mut runtime,
        WizardMsg::DropPath(source.display().to_string()),
    );
    pump_until(&mut model, &mut runtime, "context stage", |m| {
        m.stage == Stage::Context
    });

    let candidate = model.candidate.clone().expect("accepted candidate");
    assert_eq!(candidate.file_name, "cat picture.jpg");
    assert_eq!(candidate.size_bytes, 4_096);
    assert_eq!(
        model.original_ref.as_ref().map(pixelpress::wizard::model::ImageRef::len),
        Some(4_096)
    );

    feed(
        &mut model,
        &mut runtime,
        WizardMsg::ContextChosen(ContextId::Instagram),
    );
    feed(&mut model, &mut runtime, WizardMsg::StartOptimize);
    assert_eq!(model.stage, Stage::Processing);

    pump_until(&mut model, &mut runtime, "result stage", |m| {
        m.stage == Stage::Result
    });
    assert_eq!(model.daily_used, 1);
    let view = model.comparison().expect("comparison figures");
    assert_eq!(view.original_size, 4_096);
    assert_eq!(view.optimized_size, 1_433);
    assert_eq!(view.ratio_percent, 65);
    assert!(
        model
            .notices
            .iter()
            .any(|n| n.kind == NoticeKind::OptimizationComplete),
        "completion notice missing: {:?}",
        model.notices
    );

    feed(&mut model, &mut runtime, WizardMsg::Download);
    pump_until(&mut model, &mut runtime, "saved output", |m| {
        m.last_saved.is_some()
    });

    let saved_path = model.last_saved.clone().expect("saved path");
    assert_eq!(
        saved_path.file_name().and_then(|n| n.to_str()),
        Some("optimized-cat picture.jpg.webp")
    );
    let saved = fs::read(&saved_path).expect("read saved output");
    let original = fs::read(&source).expect("read source");
    assert_eq!(saved, original, "output must be byte-identical");
    assert!(
        model
            .notices
            .iter()
            .any(|n| n.kind == NoticeKind::DownloadStarted),
        "download notice missing: {:?}",
        model.notices
    );

    // The persisted ledger agrees with the model's mirror.
    assert_eq!(QuotaLedger::new(config.paths.ledger_file).used_today(), 1);
}

#[test]
fn sixth_upload_is_refused_without_reading_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = flow_config(dir.path());
    let source = jpeg_file(dir.path(), "cat.jpg", 1_024);

    let ledger = QuotaLedger::new(config.paths.ledger_file.clone());
    for _ in 0..5 {
        ledger.record_completion().expect("seed ledger");
    }

    let mut runtime = SessionRuntime::new(&config);
    let mut model = WizardModel::new(&config, runtime.used_today());
    assert_eq!(model.daily_used, 5);

    feed(
        &mut model,
        &mut runtime,
        WizardMsg::DropPath(source.display().to_string()),
    );
    pump_until(&mut model, &mut runtime, "quota refusal", |m| {
        !m.notices.is_empty()
    });

    assert!(matches!(
        model.notices[0].kind,
        NoticeKind::Rejected(RejectReason::QuotaExceeded { used: 5, limit: 5 })
    ));
    assert_eq!(model.stage, Stage::Upload);
    // Refusal happens at the inspection verdict; the bytes are never loaded.
    assert!(model.original_ref.is_none());
    assert_eq!(ledger.used_today(), 5);
}

#[test]
fn reset_mid_pipeline_ignores_stale_stage_timers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = flow_config(dir.path());
    config.pipeline.stage_delay_ms = 30;
    let source = jpeg_file(dir.path(), "cat.jpg", 1_024);

    let mut runtime = SessionRuntime::new(&config);
    let mut model = WizardModel::new(&config, runtime.used_today());

    feed(
        &mut model,
        &mut runtime,
        WizardMsg::DropPath(source.display().to_string()),
    );
    pump_until(&mut model, &mut runtime, "context stage", |m| {
        m.stage == Stage::Context
    });
    feed(
        &mut model,
        &mut runtime,
        WizardMsg::ContextChosen(ContextId::Web),
    );
    feed(&mut model, &mut runtime, WizardMsg::StartOptimize);
    assert_eq!(model.stage, Stage::Processing);

    // Cancel while the first stage timer is still in flight.
    feed(&mut model, &mut runtime, WizardMsg::Reset);
    assert_eq!(model.stage, Stage::Upload);

    // Let the orphaned timer fire and pump whatever arrives: the stale
    // advance must not move the machine.
    let settle = Instant::now() + Duration::from_millis(150);
    while Instant::now() < settle {
        if let Some(msg) = runtime.recv_timeout(Duration::from_millis(25)) {
            let cmd = update(&mut model, msg);
            runtime.execute(cmd);
        }
    }

    assert_eq!(model.stage, Stage::Upload);
    assert_eq!(model.daily_used, 0);
    assert_eq!(QuotaLedger::new(config.paths.ledger_file).used_today(), 0);
}

// ──────────────────── pure-update properties ────────────────────

/// Drive a full pipeline through the pure update function with a candidate
/// of the given size; no runtime, no sleeps.
fn drive_pure_pipeline(size: u64) -> WizardModel {
    let config = Config::default();
    let mut model = WizardModel::new(&config, 0);

    let candidate = UploadCandidate::from_parts(
        PathBuf::from("/tmp/photo.jpg"),
        size,
        Some(ImageFormat::Jpeg),
    );
    update(&mut model, WizardMsg::FileInspected(Ok(candidate)));
    update(
        &mut model,
        WizardMsg::FileLoaded {
            path: PathBuf::from("/tmp/photo.jpg"),
            result: Ok(vec![0xFF, 0xD8, 0xFF, 0xE0]),
        },
    );
    update(&mut model, WizardMsg::ContextChosen(ContextId::General));
    update(&mut model, WizardMsg::StartOptimize);
    for _ in 0..ProcessingStage::SEQUENCE.len() {
        update(&mut model, WizardMsg::AdvanceProcessing { run: 1 });
    }
    model
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn completed_pipeline_reports_exact_figures(size in 0_u64..=20 * 1024 * 1024) {
        let model = drive_pure_pipeline(size);
        prop_assert_eq!(model.stage, Stage::Result);
        prop_assert_eq!(model.daily_used, 1);

        let view = model.comparison().expect("comparison figures");
        prop_assert_eq!(view.original_size, size);
        // Independent computation of the advertised 65% reduction.
        prop_assert_eq!(u128::from(view.optimized_size), u128::from(size) * 35 / 100);
        prop_assert_eq!(view.ratio_percent, 65);
    }

    #[test]
    fn uploads_pass_while_quota_remains(used in 0_u32..5) {
        let config = Config::default();
        let mut model = WizardModel::new(&config, used);
        let candidate = UploadCandidate::from_parts(
            PathBuf::from("/tmp/photo.jpg"),
            1_000,
            Some(ImageFormat::Jpeg),
        );
        let cmd = update(&mut model, WizardMsg::FileInspected(Ok(candidate)));
        prop_assert!(model.notices.is_empty(), "no refusal below the limit");
        prop_assert!(
            matches!(cmd, WizardCmd::Batch(_)),
            "acceptance issues follow-up work"
        );
    }

    #[test]
    fn uploads_are_refused_at_or_past_the_quota(used in 5_u32..1_000) {
        let config = Config::default();
        let mut model = WizardModel::new(&config, used);
        let candidate = UploadCandidate::from_parts(
            PathBuf::from("/tmp/photo.jpg"),
            1_000,
            Some(ImageFormat::Jpeg),
        );
        update(&mut model, WizardMsg::FileInspected(Ok(candidate)));
        prop_assert!(
            matches!(
                model.notices.last().map(|n| &n.kind),
                Some(NoticeKind::Rejected(RejectReason::QuotaExceeded { .. }))
            ),
            "refusal notice expected at or past the limit"
        );
        prop_assert_eq!(model.stage, Stage::Upload);
    }
}
