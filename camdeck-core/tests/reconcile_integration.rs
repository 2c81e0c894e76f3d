//! Settings Reconciliation Integration Tests
//!
//! Runs full passes against a simulated track:
//! - Clamping and batched write-back of corrections
//! - Unsupported enum values
//! - Rejected constraints
//! - Reentrancy guard

use std::cell::Cell;

use async_trait::async_trait;
use camdeck_core::{
    CapabilityRange, ConstraintValue, DeviceCapabilities, ExposureMode, FocusMode,
    HardwareConstraint, HardwareTrack, ReconcileOutcome, ReconcileReport, SettingsPatch,
    SettingsReconciler, SettingsStore, SimulatedTrack, TrackError,
};

const DEVICE: &str = "cam-0";

/// Capabilities of a typical USB webcam.
fn webcam_caps() -> DeviceCapabilities {
    DeviceCapabilities::new()
        .with_range(
            HardwareConstraint::Brightness,
            CapabilityRange::new(0.0, 255.0, Some(1.0)),
        )
        .with_range(
            HardwareConstraint::Zoom,
            CapabilityRange::new(1.0, 4.0, Some(0.1)),
        )
        .with_range(
            HardwareConstraint::ColorTemperature,
            CapabilityRange::new(2800.0, 6500.0, Some(10.0)),
        )
        .with_options(HardwareConstraint::ExposureMode, ["continuous", "manual"])
        .with_options(HardwareConstraint::FocusMode, ["continuous"])
}

fn completed(outcome: ReconcileOutcome) -> ReconcileReport {
    match outcome {
        ReconcileOutcome::Completed(report) => report,
        ReconcileOutcome::Skipped => panic!("pass was skipped"),
    }
}

// ============================================================================
// Numeric clamping
// ============================================================================

#[tokio::test]
async fn test_in_range_zoom_applies_without_correction() {
    let store = SettingsStore::new();
    store.update(
        DEVICE,
        &SettingsPatch {
            zoom: Some(250.0),
            ..SettingsPatch::default()
        },
    );
    let revision = store.revision(DEVICE);
    let track = SimulatedTrack::new(webcam_caps());

    let report = completed(
        SettingsReconciler::new()
            .reconcile(&store, DEVICE, &track)
            .await,
    );

    assert!(report
        .applied
        .contains(&(HardwareConstraint::Zoom, ConstraintValue::Number(2.5))));
    assert!(!report.has_corrections());
    assert_eq!(store.revision(DEVICE), revision);
}

#[tokio::test]
async fn test_out_of_range_values_are_corrected_in_one_batch() {
    let store = SettingsStore::new();
    store.update(
        DEVICE,
        &SettingsPatch {
            white_balance_temperature: Some(9000.0),
            zoom: Some(100.0),
            ..SettingsPatch::default()
        },
    );
    let caps = webcam_caps().with_range(
        HardwareConstraint::Zoom,
        CapabilityRange::new(1.5, 3.0, None),
    );
    let track = SimulatedTrack::new(caps);
    let before = store.revision(DEVICE);

    let report = completed(
        SettingsReconciler::new()
            .reconcile(&store, DEVICE, &track)
            .await,
    );

    assert_eq!(report.corrections.len(), 2);
    assert_eq!(store.revision(DEVICE), before + 1);

    let settings = store.snapshot(DEVICE).expect("device");
    assert!((settings.white_balance_temperature - 6500.0).abs() < f64::EPSILON);
    assert!((settings.zoom - 150.0).abs() < 1e-9);
    assert_eq!(
        track.current(HardwareConstraint::ColorTemperature),
        Some(ConstraintValue::Number(6500.0))
    );
}

#[tokio::test]
async fn test_second_pass_is_stable() {
    let store = SettingsStore::new();
    store.update(
        DEVICE,
        &SettingsPatch {
            brightness: Some(400.0),
            ..SettingsPatch::default()
        },
    );
    let track = SimulatedTrack::new(webcam_caps());
    let reconciler = SettingsReconciler::new();

    let first = completed(reconciler.reconcile(&store, DEVICE, &track).await);
    assert!(first.has_corrections());
    let revision = store.revision(DEVICE);

    let second = completed(reconciler.reconcile(&store, DEVICE, &track).await);
    assert!(!second.has_corrections());
    assert_eq!(store.revision(DEVICE), revision);
}

#[tokio::test]
async fn test_software_only_controls_are_not_sent() {
    let store = SettingsStore::new();
    store.update(
        DEVICE,
        &SettingsPatch {
            hue: Some(90.0),
            pan: Some(45.0),
            blur: Some(5.0),
            ..SettingsPatch::default()
        },
    );
    let track = SimulatedTrack::new(webcam_caps());

    completed(
        SettingsReconciler::new()
            .reconcile(&store, DEVICE, &track)
            .await,
    );

    assert_eq!(track.apply_count(HardwareConstraint::Pan), 0);
    let settings = store.snapshot(DEVICE).expect("device");
    assert!((settings.pan - 45.0).abs() < f64::EPSILON);
}

// ============================================================================
// Enum handling
// ============================================================================

#[tokio::test]
async fn test_unsupported_enum_is_skipped_not_corrected() {
    let store = SettingsStore::new();
    store.update(
        DEVICE,
        &SettingsPatch {
            focus_mode: Some(FocusMode::Manual),
            exposure_mode: Some(ExposureMode::Manual),
            ..SettingsPatch::default()
        },
    );
    let track = SimulatedTrack::new(webcam_caps());
    let revision = store.revision(DEVICE);

    let report = completed(
        SettingsReconciler::new()
            .reconcile(&store, DEVICE, &track)
            .await,
    );

    assert_eq!(report.unsupported, vec![camdeck_core::Control::FocusMode]);
    assert_eq!(track.apply_count(HardwareConstraint::FocusMode), 0);
    assert_eq!(
        track.current(HardwareConstraint::ExposureMode),
        Some(ConstraintValue::Text("manual".into()))
    );
    assert_eq!(store.revision(DEVICE), revision);
    assert_eq!(
        store.snapshot(DEVICE).expect("device").focus_mode,
        FocusMode::Manual
    );
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_rejected_constraint_does_not_abort_pass() {
    let store = SettingsStore::new();
    store.update(
        DEVICE,
        &SettingsPatch {
            brightness: Some(300.0),
            ..SettingsPatch::default()
        },
    );
    let track = SimulatedTrack::new(webcam_caps()).rejecting(HardwareConstraint::Brightness);

    let report = completed(
        SettingsReconciler::new()
            .reconcile(&store, DEVICE, &track)
            .await,
    );

    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].constraint, HardwareConstraint::Brightness);
    assert_eq!(track.apply_count(HardwareConstraint::Zoom), 1);
    // The clamp is still written back.
    let settings = store.snapshot(DEVICE).expect("device");
    assert!((settings.brightness - 255.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_ended_track_rejects_everything() {
    let store = SettingsStore::new();
    let track = SimulatedTrack::new(webcam_caps()).ended();

    let report = completed(
        SettingsReconciler::new()
            .reconcile(&store, DEVICE, &track)
            .await,
    );

    assert!(report.applied.is_empty());
    assert_eq!(report.rejected.len(), 5);
    assert!(report.rejected.iter().all(|r| r.reason == "Track ended"));
}

#[tokio::test]
async fn test_software_only_device_is_untouched() {
    let store = SettingsStore::new();
    let track = SimulatedTrack::new(DeviceCapabilities::new());

    let report = completed(
        SettingsReconciler::new()
            .reconcile(&store, DEVICE, &track)
            .await,
    );

    assert!(report.applied.is_empty());
    assert!(track.applied().is_empty());
}

// ============================================================================
// Reentrancy
// ============================================================================

/// A track that starts a nested pass from inside its first constraint call.
struct ReentrantTrack<'a> {
    inner: SimulatedTrack,
    store: &'a SettingsStore,
    reconciler: &'a SettingsReconciler,
    nested: Cell<Option<bool>>,
}

#[async_trait(?Send)]
impl HardwareTrack for ReentrantTrack<'_> {
    fn capabilities(&self) -> DeviceCapabilities {
        self.inner.capabilities()
    }

    async fn apply_constraint(
        &self,
        constraint: HardwareConstraint,
        value: &ConstraintValue,
    ) -> Result<(), TrackError> {
        if self.nested.get().is_none() {
            let outcome = self
                .reconciler
                .reconcile(self.store, DEVICE, &self.inner)
                .await;
            self.nested
                .set(Some(matches!(outcome, ReconcileOutcome::Skipped)));
        }
        self.inner.apply_constraint(constraint, value).await
    }
}

#[tokio::test]
async fn test_overlapping_pass_is_skipped() {
    let store = SettingsStore::new();
    let reconciler = SettingsReconciler::new();
    let track = ReentrantTrack {
        inner: SimulatedTrack::new(webcam_caps()),
        store: &store,
        reconciler: &reconciler,
        nested: Cell::new(None),
    };

    completed(reconciler.reconcile(&store, DEVICE, &track).await);

    assert_eq!(track.nested.get(), Some(true));
    assert!(!reconciler.is_in_flight());
}
