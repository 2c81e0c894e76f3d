//! Settings reconciliation against hardware capabilities.
//!
//! A pass walks every control, maps it to its hardware constraint, clamps
//! numeric values into the device range and applies them to the track. When
//! clamping changes a value by more than [`CORRECTION_EPSILON`] the clamped
//! value is staged as a correction; all corrections are merged back into the
//! store in a single update at the end of the pass, so the store always
//! holds what the hardware accepted.
//!
//! Unsupported enum values are logged and skipped. They are neither applied
//! nor corrected.
//!
//! Passes do not overlap: a pass started while another is in flight returns
//! [`ReconcileOutcome::Skipped`] immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    Capability, Control, ControlValue, ConstraintValue, DeviceCapabilities, HardwareConstraint,
    HardwareTrack, SettingsPatch, SettingsStore,
};

/// Smallest UI-unit difference that counts as a hardware correction.
pub const CORRECTION_EPSILON: f64 = 0.01;

/// A constraint the device refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Refused constraint.
    pub constraint: HardwareConstraint,
    /// Driver message.
    pub reason: String,
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Constraints applied, with the hardware-native value sent.
    pub applied: Vec<(HardwareConstraint, ConstraintValue)>,
    /// Constraints the device refused.
    pub rejected: Vec<Rejection>,
    /// Enum controls whose value the device does not list.
    pub unsupported: Vec<Control>,
    /// Clamped values written back to the store.
    pub corrections: SettingsPatch,
}

impl ReconcileReport {
    /// Whether the pass wrote corrections back.
    #[must_use]
    pub fn has_corrections(&self) -> bool {
        !self.corrections.is_empty()
    }
}

/// Result of asking for a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Another pass was in flight.
    Skipped,
    /// The pass ran to completion.
    Completed(ReconcileReport),
}

/// How a single control resolves against the device.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPlan {
    /// No hardware constraint, or the device has no entry for it.
    SoftwareOnly,
    /// Apply `value`; if `correction` is set, write it back to settings.
    Apply {
        /// Target constraint.
        constraint: HardwareConstraint,
        /// Hardware-native value to send.
        value: ConstraintValue,
        /// Clamped UI value when it differs from the request.
        correction: Option<f64>,
    },
    /// Enum value not offered by the device.
    Unsupported {
        /// Target constraint.
        constraint: HardwareConstraint,
        /// Requested value.
        requested: &'static str,
    },
    /// Value kind does not match the capability kind.
    Mismatched(HardwareConstraint),
}

/// Decide what to do with one control value. Pure; no I/O.
#[must_use]
pub fn plan_control(
    control: Control,
    value: ControlValue,
    capabilities: &DeviceCapabilities,
) -> ControlPlan {
    let Some(constraint) = HardwareConstraint::for_control(control) else {
        return ControlPlan::SoftwareOnly;
    };
    let Some(capability) = capabilities.get(constraint) else {
        return ControlPlan::SoftwareOnly;
    };

    match (value, capability) {
        (ControlValue::Number(requested), Capability::Range(range)) => {
            let (native, effective_ui) = if control == Control::Zoom {
                let native = range.clamp(requested / 100.0);
                (native, native * 100.0)
            } else {
                let native = range.clamp(requested);
                (native, native)
            };
            let correction =
                ((effective_ui - requested).abs() > CORRECTION_EPSILON).then_some(effective_ui);
            ControlPlan::Apply {
                constraint,
                value: ConstraintValue::Number(native),
                correction,
            }
        }
        (ControlValue::Text(requested), Capability::Options(options)) => {
            if options.iter().any(|o| o == requested) {
                ControlPlan::Apply {
                    constraint,
                    value: ConstraintValue::Text(requested.to_string()),
                    correction: None,
                }
            } else {
                ControlPlan::Unsupported {
                    constraint,
                    requested,
                }
            }
        }
        _ => ControlPlan::Mismatched(constraint),
    }
}

/// Clears the in-flight flag when a pass ends, including on early return.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives reconciliation passes for one device track.
///
/// Clones share the in-flight flag.
#[derive(Debug, Clone, Default)]
pub struct SettingsReconciler {
    in_flight: Arc<AtomicBool>,
}

impl SettingsReconciler {
    /// Create a reconciler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a pass is running.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<PassGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard(&self.in_flight))
    }

    /// Run one pass for `device_id` against `track`.
    ///
    /// Constraint failures are logged and recorded in the report; they never
    /// abort the pass.
    pub async fn reconcile<T>(
        &self,
        store: &SettingsStore,
        device_id: &str,
        track: &T,
    ) -> ReconcileOutcome
    where
        T: HardwareTrack + ?Sized,
    {
        let Some(_guard) = self.try_begin() else {
            tracing::debug!("Reconciliation already in flight for {device_id}; skipping");
            return ReconcileOutcome::Skipped;
        };

        let settings = store.get_or_create(device_id);
        let capabilities = track.capabilities();
        let mut report = ReconcileReport::default();

        for control in Control::ALL {
            match plan_control(control, settings.value(control), &capabilities) {
                ControlPlan::SoftwareOnly => {}
                ControlPlan::Mismatched(constraint) => {
                    tracing::debug!("Capability {constraint} has a different kind than {control}");
                }
                ControlPlan::Unsupported {
                    constraint,
                    requested,
                } => {
                    tracing::warn!(
                        "Device does not support {constraint}={requested}; leaving it unchanged"
                    );
                    report.unsupported.push(control);
                }
                ControlPlan::Apply {
                    constraint,
                    value,
                    correction,
                } => {
                    if let Some(corrected) = correction {
                        tracing::debug!("Clamped {control} to {corrected} for {device_id}");
                        report.corrections.set_number(control, corrected);
                    }
                    match track.apply_constraint(constraint, &value).await {
                        Ok(()) => {
                            tracing::trace!("Applied {constraint}={value}");
                            report.applied.push((constraint, value));
                        }
                        Err(e) => {
                            tracing::warn!("Failed to apply {constraint}={value}: {e}");
                            report.rejected.push(Rejection {
                                constraint,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        if report.has_corrections() {
            store.update(device_id, &report.corrections);
            tracing::info!(
                "Wrote {} hardware correction(s) for {device_id}",
                report.corrections.len()
            );
        }

        ReconcileOutcome::Completed(report)
    }
}
