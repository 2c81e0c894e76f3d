//! Small helpers for talking to duck-typed JavaScript objects.

use js_sys::{Function, Reflect, JSON};
use serde::de::DeserializeOwned;
use wasm_bindgen::{JsCast, JsValue};

/// Call `target[name](...args)`.
///
/// # Errors
///
/// Returns the thrown value, or an error if `name` is not a function.
pub fn call_method(target: &JsValue, name: &str, args: &[&JsValue]) -> Result<JsValue, JsValue> {
    let method = Reflect::get(target, &JsValue::from_str(name))?
        .dyn_into::<Function>()
        .map_err(|_| JsValue::from_str(&format!("'{name}' is not a function")))?;
    match args {
        [] => method.call0(target),
        [a] => method.call1(target, a),
        [a, b] => method.call2(target, a, b),
        [a, b, c] => method.call3(target, a, b, c),
        _ => {
            let array = js_sys::Array::new();
            for arg in args {
                array.push(arg);
            }
            method.apply(target, &array)
        }
    }
}

/// Whether `target` has a callable `name`.
#[must_use]
pub fn has_method(target: &JsValue, name: &str) -> bool {
    Reflect::get(target, &JsValue::from_str(name)).is_ok_and(|v| v.is_function())
}

/// Convert a plain JS object into a Rust value through JSON.
///
/// # Errors
///
/// Returns a message if the value cannot be stringified or does not match `T`.
pub fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, String> {
    let text = JSON::stringify(value).map_err(|e| error_message(&e))?;
    let text = String::from(text);
    serde_json::from_str(&text).map_err(|e| e.to_string())
}

/// Best-effort message for a thrown JS value.
#[must_use]
pub fn error_message(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        let name = String::from(error.name());
        let message = String::from(error.message());
        return if message.is_empty() {
            name
        } else {
            format!("{name}: {message}")
        };
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
