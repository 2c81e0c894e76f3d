//! The hardware camera track boundary.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Capability, DeviceCapabilities, HardwareConstraint, TrackError};

/// A value submitted as an advanced constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue {
    /// Numeric control, hardware-native units.
    Number(f64),
    /// Enumerated mode.
    Text(String),
}

impl fmt::Display for ConstraintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintValue::Number(n) => write!(f, "{n}"),
            ConstraintValue::Text(t) => f.write_str(t),
        }
    }
}

/// A live camera track that reports capabilities and accepts constraints.
///
/// Browser tracks are single-threaded, so the futures are not `Send`.
#[async_trait(?Send)]
pub trait HardwareTrack {
    /// Capabilities reported by the device right now.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Apply one advanced constraint.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError`] if the device rejects the value or the track
    /// has ended.
    async fn apply_constraint(
        &self,
        constraint: HardwareConstraint,
        value: &ConstraintValue,
    ) -> Result<(), TrackError>;
}

/// An in-memory track for headless hosts and tests.
///
/// Accepted numeric values are clamped and snapped to the reported step, the
/// way a driver truncates them.
#[derive(Debug, Default)]
pub struct SimulatedTrack {
    capabilities: DeviceCapabilities,
    rejecting: HashSet<HardwareConstraint>,
    ended: bool,
    applied: RefCell<Vec<(HardwareConstraint, ConstraintValue)>>,
    current: RefCell<HashMap<HardwareConstraint, ConstraintValue>>,
}

impl SimulatedTrack {
    /// A track reporting `capabilities`.
    #[must_use]
    pub fn new(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    /// Make the track reject every value for `constraint`.
    #[must_use]
    pub fn rejecting(mut self, constraint: HardwareConstraint) -> Self {
        self.rejecting.insert(constraint);
        self
    }

    /// Mark the track as ended.
    #[must_use]
    pub fn ended(mut self) -> Self {
        self.ended = true;
        self
    }

    /// Every constraint call that succeeded, in order.
    #[must_use]
    pub fn applied(&self) -> Vec<(HardwareConstraint, ConstraintValue)> {
        self.applied.borrow().clone()
    }

    /// Number of successful constraint calls for one constraint.
    #[must_use]
    pub fn apply_count(&self, constraint: HardwareConstraint) -> usize {
        self.applied
            .borrow()
            .iter()
            .filter(|(c, _)| *c == constraint)
            .count()
    }

    /// Value the device currently holds for a constraint.
    #[must_use]
    pub fn current(&self, constraint: HardwareConstraint) -> Option<ConstraintValue> {
        self.current.borrow().get(&constraint).cloned()
    }

    fn settle(&self, constraint: HardwareConstraint, value: &ConstraintValue) -> ConstraintValue {
        match (self.capabilities.get(constraint), value) {
            (Some(Capability::Range(range)), ConstraintValue::Number(n)) => {
                let mut v = range.clamp(*n);
                if let Some(step) = range.step.filter(|s| *s > 0.0) {
                    v = (range.min + ((v - range.min) / step).round() * step).min(range.max);
                }
                ConstraintValue::Number(v)
            }
            _ => value.clone(),
        }
    }
}

#[async_trait(?Send)]
impl HardwareTrack for SimulatedTrack {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities.clone()
    }

    async fn apply_constraint(
        &self,
        constraint: HardwareConstraint,
        value: &ConstraintValue,
    ) -> Result<(), TrackError> {
        if self.ended {
            return Err(TrackError::Ended);
        }
        if self.rejecting.contains(&constraint) {
            return Err(TrackError::ConstraintRejected {
                constraint: constraint.name().to_string(),
                reason: "OverconstrainedError".to_string(),
            });
        }
        let settled = self.settle(constraint, value);
        tracing::trace!("Simulated track accepted {constraint}={settled}");
        self.current.borrow_mut().insert(constraint, settled);
        self.applied.borrow_mut().push((constraint, value.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CapabilityRange;

    #[tokio::test]
    async fn test_simulated_track_snaps_to_step() {
        let caps = DeviceCapabilities::new().with_range(
            HardwareConstraint::Zoom,
            CapabilityRange::new(1.0, 4.0, Some(0.5)),
        );
        let track = SimulatedTrack::new(caps);
        track
            .apply_constraint(HardwareConstraint::Zoom, &ConstraintValue::Number(2.3))
            .await
            .expect("accepted");
        assert_eq!(
            track.current(HardwareConstraint::Zoom),
            Some(ConstraintValue::Number(2.5))
        );
        assert_eq!(track.apply_count(HardwareConstraint::Zoom), 1);
    }

    #[tokio::test]
    async fn test_simulated_track_rejects() {
        let track = SimulatedTrack::new(DeviceCapabilities::new()).rejecting(HardwareConstraint::Iso);
        let err = track
            .apply_constraint(HardwareConstraint::Iso, &ConstraintValue::Number(800.0))
            .await
            .expect_err("rejected");
        assert!(matches!(err, TrackError::ConstraintRejected { .. }));
        assert!(track.applied().is_empty());
    }

    #[tokio::test]
    async fn test_ended_track() {
        let track = SimulatedTrack::new(DeviceCapabilities::new()).ended();
        let err = track
            .apply_constraint(
                HardwareConstraint::FocusMode,
                &ConstraintValue::Text("manual".into()),
            )
            .await
            .expect_err("ended");
        assert_eq!(err, TrackError::Ended);
    }

    #[test]
    fn test_constraint_value_json_is_bare() {
        assert_eq!(
            serde_json::to_string(&ConstraintValue::Number(2.5)).expect("json"),
            "2.5"
        );
        assert_eq!(
            serde_json::to_string(&ConstraintValue::Text("manual".into())).expect("json"),
            "\"manual\""
        );
    }
}
