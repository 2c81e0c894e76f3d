//! `MediaStreamTrack` adapter for the reconciliation engine.

use async_trait::async_trait;
use camdeck_core::{ConstraintValue, DeviceCapabilities, HardwareConstraint, HardwareTrack, TrackError};
use js_sys::{Array, Object, Promise, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::MediaStreamTrack;

use crate::js::{call_method, error_message, from_js, has_method};

/// A live browser camera track.
pub struct DomTrack {
    track: MediaStreamTrack,
}

impl DomTrack {
    /// Wrap a video track.
    #[must_use]
    pub fn new(track: MediaStreamTrack) -> Self {
        Self { track }
    }

    fn is_ended(&self) -> bool {
        Reflect::get(&self.track, &JsValue::from_str("readyState"))
            .ok()
            .and_then(|v| v.as_string())
            .is_some_and(|state| state == "ended")
    }
}

fn constraint_js(value: &ConstraintValue) -> JsValue {
    match value {
        ConstraintValue::Number(n) => JsValue::from_f64(*n),
        ConstraintValue::Text(t) => JsValue::from_str(t),
    }
}

#[async_trait(?Send)]
impl HardwareTrack for DomTrack {
    fn capabilities(&self) -> DeviceCapabilities {
        // Some browsers ship tracks without getCapabilities.
        if !has_method(&self.track, "getCapabilities") {
            tracing::info!("Track does not report capabilities; all controls are software-only");
            return DeviceCapabilities::new();
        }
        let raw = call_method(&self.track, "getCapabilities", &[])
            .map_err(|e| error_message(&e))
            .and_then(|caps| from_js::<serde_json::Value>(&caps));
        match raw {
            Ok(value) => DeviceCapabilities::from_json_value(&value),
            Err(e) => {
                tracing::warn!("Failed to read track capabilities: {e}");
                DeviceCapabilities::new()
            }
        }
    }

    async fn apply_constraint(
        &self,
        constraint: HardwareConstraint,
        value: &ConstraintValue,
    ) -> Result<(), TrackError> {
        if self.is_ended() {
            return Err(TrackError::Ended);
        }
        let rejected = |reason: String| TrackError::ConstraintRejected {
            constraint: constraint.name().to_string(),
            reason,
        };

        let entry = Object::new();
        Reflect::set(&entry, &JsValue::from_str(constraint.name()), &constraint_js(value))
            .map_err(|e| rejected(error_message(&e)))?;
        let constraints = Object::new();
        Reflect::set(&constraints, &JsValue::from_str("advanced"), &Array::of1(&entry))
            .map_err(|e| rejected(error_message(&e)))?;

        let constraints: JsValue = constraints.into();
        let promise = call_method(&self.track, "applyConstraints", &[&constraints])
            .map_err(|e| rejected(error_message(&e)))?
            .dyn_into::<Promise>()
            .map_err(|_| rejected("applyConstraints did not return a promise".to_string()))?;
        JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|e| rejected(error_message(&e)))
    }
}
