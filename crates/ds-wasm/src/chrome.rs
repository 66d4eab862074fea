//! Extension API access (`chrome.storage`, `chrome.runtime`).
//!
//! Looked up dynamically on the global object so the module also loads in
//! plain pages and test runners where `chrome` is absent.

use js_sys::{Array, Function, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Error type for extension API calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtensionError {
    #[error("Extension API not available: {0}")]
    Unavailable(&'static str),
    #[error("Extension API call failed: {0}")]
    Call(String),
}

impl From<ExtensionError> for JsValue {
    fn from(e: ExtensionError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

/// Resolve `chrome.<path>`, returning the owner object and the final member.
fn lookup(path: &'static str) -> Result<(JsValue, JsValue), ExtensionError> {
    let mut owner: JsValue = js_sys::global().into();
    let mut value = Reflect::get(&owner, &"chrome".into()).map_err(|_| ExtensionError::Unavailable(path))?;
    for key in path.split('.') {
        if value.is_undefined() || value.is_null() {
            return Err(ExtensionError::Unavailable(path));
        }
        owner = value;
        value = Reflect::get(&owner, &JsValue::from_str(key)).map_err(|_| ExtensionError::Unavailable(path))?;
    }
    if value.is_undefined() || value.is_null() {
        return Err(ExtensionError::Unavailable(path));
    }
    Ok((owner, value))
}

fn lookup_fn(path: &'static str) -> Result<(JsValue, Function), ExtensionError> {
    let (owner, value) = lookup(path)?;
    let function = value
        .dyn_into::<Function>()
        .map_err(|_| ExtensionError::Unavailable(path))?;
    Ok((owner, function))
}

/// `chrome.storage.sync.get(keys, callback)`.
pub fn storage_sync_get(keys: &[&str], callback: Closure<dyn FnMut(JsValue)>) -> Result<(), ExtensionError> {
    let (sync, get) = lookup_fn("storage.sync.get")?;
    let key_array = keys.iter().map(|k| JsValue::from_str(k)).collect::<Array>();
    get.call2(&sync, &key_array, callback.as_ref())
        .map_err(|e| ExtensionError::Call(describe(&e)))?;
    // Invoked once by the browser.
    callback.forget();
    Ok(())
}

/// `chrome.runtime.sendMessage(message)`, swallowing "no receiver" rejections.
pub fn runtime_send_message(message: &JsValue, on_reject: &Closure<dyn FnMut(JsValue)>) -> Result<(), ExtensionError> {
    let (runtime, send) = lookup_fn("runtime.sendMessage")?;
    let result = send
        .call1(&runtime, message)
        .map_err(|e| ExtensionError::Call(describe(&e)))?;
    if let Some(promise) = result.dyn_ref::<Promise>() {
        let _ = promise.catch(on_reject);
    }
    Ok(())
}

/// `chrome.runtime.onMessage.addListener(listener)`.
pub fn add_message_listener(listener: &Function) -> Result<(), ExtensionError> {
    let (on_message, add) = lookup_fn("runtime.onMessage.addListener")?;
    add.call1(&on_message, listener)
        .map_err(|e| ExtensionError::Call(describe(&e)))?;
    Ok(())
}
