//! WebAssembly content script for De-Slopify
//!
//! Binds the `ds-core` controller to the page: the live DOM, `setTimeout`,
//! a `MutationObserver` on the feed, a passive scroll listener and the
//! extension's storage and messaging APIs.

mod chrome;
mod document;
mod timers;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use ds_core::{
    controller::{Controller, CountSink},
    observer::{resolve_observation_root, MutationBatch},
    ContentRequest, CountUpdate, ScanTrigger, ScannerConfig, Settings,
};
use js_sys::{Array, Function};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{AddEventListenerOptions, MutationObserver, MutationObserverInit, MutationRecord, Node, Window};

pub use chrome::ExtensionError;
pub use document::WebDocument;
pub use timers::WebTimers;

pub type WebController = Controller<WebDocument, WebTimers, BadgeSink>;

/// Error type for content script startup.
#[derive(Debug, thiserror::Error)]
pub enum ContentScriptError {
    #[error("No window available")]
    NoWindow,
    #[error("No document available")]
    NoDocument,
    #[error("Already running. Reload the page to restart.")]
    AlreadyRunning,
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Config(#[from] ds_core::ConfigError),
    #[error(transparent)]
    Extension(#[from] ExtensionError),
    #[error("DOM call failed: {0}")]
    Dom(String),
}

impl From<ContentScriptError> for JsValue {
    fn from(e: ContentScriptError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

fn dom_error(e: JsValue) -> ContentScriptError {
    ContentScriptError::Dom(e.as_string().unwrap_or_else(|| format!("{:?}", e)))
}

/// Publishes hidden-count updates to the extension badge.
pub struct BadgeSink {
    ignore_rejection: Closure<dyn FnMut(JsValue)>,
}

impl BadgeSink {
    pub fn new() -> Self {
        Self {
            ignore_rejection: Closure::new(|_: JsValue| {}),
        }
    }
}

impl Default for BadgeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CountSink for BadgeSink {
    fn publish(&mut self, update: CountUpdate) {
        let message = match serde_wasm_bindgen::to_value(&update) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Failed to encode count update: {}", e);
                return;
            }
        };
        if let Err(e) = chrome::runtime_send_message(&message, &self.ignore_rejection) {
            log::debug!("Count update not sent: {}", e);
        }
    }
}

/// Everything that must stay alive while the script runs.
struct ContentScript {
    controller: Rc<RefCell<WebController>>,
    _observer: Option<MutationObserver>,
    _on_mutation: Closure<dyn FnMut(Array, MutationObserver)>,
    _on_scroll: Closure<dyn FnMut()>,
    _on_message: Closure<dyn FnMut(JsValue, JsValue, Function) -> JsValue>,
}

thread_local! {
    static CONTENT_SCRIPT: RefCell<Option<ContentScript>> = const { RefCell::new(None) };
    static STARTING: Cell<bool> = const { Cell::new(false) };
}

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
}

/// Start scanning the page.
///
/// `config` may be `undefined` for the built-in defaults, or a partial
/// `ScannerConfig` object.
#[wasm_bindgen]
pub fn run(config: JsValue) -> Result<(), JsValue> {
    if STARTING.with(|starting| starting.replace(true)) {
        return Err(ContentScriptError::AlreadyRunning.into());
    }

    let config = if config.is_undefined() || config.is_null() {
        ScannerConfig::default()
    } else {
        serde_wasm_bindgen::from_value::<ScannerConfig>(config)
            .map_err(|e| ContentScriptError::InvalidConfig(e.to_string()))?
    };
    config.validate().map_err(ContentScriptError::from)?;

    let window = web_sys::window().ok_or(ContentScriptError::NoWindow)?;
    let document = window.document().ok_or(ContentScriptError::NoDocument)?;

    if document.ready_state() == "loading" {
        let on_ready = Closure::once(move || load_settings(config));
        document
            .add_event_listener_with_callback("DOMContentLoaded", on_ready.as_ref().unchecked_ref())
            .map_err(dom_error)?;
        on_ready.forget();
    } else {
        load_settings(config);
    }
    Ok(())
}

fn load_settings(config: ScannerConfig) {
    let fallback = config.clone();
    let on_settings = Closure::once(move |result: JsValue| {
        let settings = serde_wasm_bindgen::from_value::<Settings>(result).unwrap_or_else(|e| {
            log::warn!("Unreadable settings, using defaults: {}", e);
            Settings::default()
        });
        boot_or_log(config, settings);
    });

    if let Err(e) = chrome::storage_sync_get(&["enabled"], on_settings) {
        log::info!("Settings unavailable ({}), using defaults", e);
        boot_or_log(fallback, Settings::default());
    }
}

fn boot_or_log(config: ScannerConfig, settings: Settings) {
    if let Err(e) = boot(config, settings) {
        log::error!("De-Slopify failed to start: {}", e);
    }
}

fn boot(config: ScannerConfig, settings: Settings) -> Result<(), ContentScriptError> {
    let window: Window = web_sys::window().ok_or(ContentScriptError::NoWindow)?;
    let document = window.document().ok_or(ContentScriptError::NoDocument)?;

    let web_document = WebDocument::new(window.clone(), document);
    let controller = Controller::new(
        config,
        settings,
        web_document,
        WebTimers::new(),
        BadgeSink::new(),
    )?;
    let shared = Rc::new(RefCell::new(controller));
    shared.borrow_mut().timers_mut().bind(Rc::downgrade(&shared));

    let root = {
        let ctl = shared.borrow();
        resolve_observation_root(ctl.document(), ctl.config())
    };

    let weak = Rc::downgrade(&shared);
    let on_mutation = Closure::<dyn FnMut(Array, MutationObserver)>::new(move |records: Array, _: MutationObserver| {
        let batch = summarize_mutations(&records);
        with_controller(&weak, |ctl| ctl.on_mutations(batch));
    });
    let observer = match root {
        Some(root) => {
            let observer = MutationObserver::new(on_mutation.as_ref().unchecked_ref()).map_err(dom_error)?;
            let init = MutationObserverInit::new();
            init.set_child_list(true);
            init.set_subtree(true);
            observer.observe_with_options(&root.element, &init).map_err(dom_error)?;
            log::info!("Observing {:?}", root.source);
            Some(observer)
        }
        None => {
            log::warn!("Nothing to observe, scanning on scroll only");
            None
        }
    };

    let weak = Rc::downgrade(&shared);
    let on_scroll = Closure::<dyn FnMut()>::new(move || {
        with_controller(&weak, |ctl| ctl.on_scroll());
    });
    let options = AddEventListenerOptions::new();
    options.set_passive(true);
    window
        .add_event_listener_with_callback_and_add_event_listener_options(
            "scroll",
            on_scroll.as_ref().unchecked_ref(),
            &options,
        )
        .map_err(dom_error)?;

    let weak = Rc::downgrade(&shared);
    let on_message = Closure::<dyn FnMut(JsValue, JsValue, Function) -> JsValue>::new(
        move |message: JsValue, _sender: JsValue, send_response: Function| {
            handle_message(&weak, message, &send_response);
            // Responses are sent synchronously.
            JsValue::FALSE
        },
    );
    if let Err(e) = chrome::add_message_listener(on_message.as_ref().unchecked_ref()) {
        log::warn!("Popup messages unavailable: {}", e);
    }

    shared.borrow_mut().start();

    CONTENT_SCRIPT.with(|cell| {
        *cell.borrow_mut() = Some(ContentScript {
            controller: shared,
            _observer: observer,
            _on_mutation: on_mutation,
            _on_scroll: on_scroll,
            _on_message: on_message,
        });
    });
    Ok(())
}

fn with_controller<R>(weak: &Weak<RefCell<WebController>>, f: impl FnOnce(&mut WebController) -> R) -> Option<R> {
    let controller = weak.upgrade()?;
    let mut controller = controller.try_borrow_mut().ok()?;
    Some(f(&mut controller))
}

fn summarize_mutations(records: &Array) -> MutationBatch {
    let mut batch = MutationBatch::default();
    for value in records.iter() {
        let record = match value.dyn_into::<MutationRecord>() {
            Ok(record) => record,
            Err(_) => continue,
        };
        batch.records += 1;
        let added = record.added_nodes();
        for i in 0..added.length() {
            if let Some(node) = added.item(i) {
                if node.node_type() == Node::ELEMENT_NODE {
                    batch.added_elements += 1;
                }
            }
        }
    }
    batch
}

/// Failure handling one popup message. Logged, never answered.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Malformed message: {0}")]
    Decode(String),
    #[error("Failed to encode response: {0}")]
    Encode(String),
    #[error("Controller busy or gone")]
    Unavailable,
    #[error("sendResponse threw: {0}")]
    Respond(String),
}

fn handle_message(weak: &Weak<RefCell<WebController>>, message: JsValue, send_response: &Function) {
    if let Err(e) = respond(weak, message, send_response) {
        match e {
            MessageError::Decode(_) => log::debug!("Ignoring message: {}", e),
            _ => log::warn!("{}", e),
        }
    }
}

fn respond(weak: &Weak<RefCell<WebController>>, message: JsValue, send_response: &Function) -> Result<(), MessageError> {
    let request: ContentRequest =
        serde_wasm_bindgen::from_value(message).map_err(|e| MessageError::Decode(e.to_string()))?;
    let response = with_controller(weak, |ctl| ctl.handle_message(request)).ok_or(MessageError::Unavailable)?;
    let value = serde_wasm_bindgen::to_value(&response).map_err(|e| MessageError::Encode(e.to_string()))?;
    send_response
        .call1(&JsValue::NULL, &value)
        .map_err(|e| MessageError::Respond(format!("{:?}", e)))?;
    Ok(())
}

fn with_running<R>(f: impl FnOnce(&mut WebController) -> R) -> Option<R> {
    CONTENT_SCRIPT.with(|cell| {
        let script = cell.borrow();
        let script = script.as_ref()?;
        let mut controller = script.controller.try_borrow_mut().ok()?;
        Some(f(&mut controller))
    })
}

#[wasm_bindgen]
pub fn is_running() -> bool {
    CONTENT_SCRIPT.with(|cell| cell.borrow().is_some())
}

#[wasm_bindgen]
pub fn hidden_count() -> u32 {
    with_running(|ctl| ctl.hidden_count()).unwrap_or(0)
}

#[wasm_bindgen]
pub fn is_enabled() -> bool {
    with_running(|ctl| ctl.is_enabled()).unwrap_or(false)
}

/// Request a scan now, subject to the usual rate limits.
#[wasm_bindgen]
pub fn scan_now() -> JsValue {
    let result = js_sys::Object::new();
    let report = with_running(|ctl| ctl.request_scan(ScanTrigger::MANUAL)).flatten();
    let _ = js_sys::Reflect::set(&result, &"ran".into(), &JsValue::from(report.is_some()));
    if let Some(report) = report {
        let _ = js_sys::Reflect::set(&result, &"eligible".into(), &JsValue::from(report.eligible as u32));
        let _ = js_sys::Reflect::set(&result, &"hidden".into(), &JsValue::from(report.hidden as u32));
        let _ = js_sys::Reflect::set(&result, &"clean".into(), &JsValue::from(report.clean as u32));
        let _ = js_sys::Reflect::set(&result, &"remaining".into(), &JsValue::from(report.remaining as u32));
    }
    result.into()
}

#[wasm_bindgen]
pub fn contains_slop_js(text: &str) -> bool {
    ds_core::contains_slop(text)
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use ds_core::timer::{TimerHost, TimerSlot};
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn observed_container() -> (web_sys::Document, web_sys::Element, MutationObserver, Closure<dyn FnMut(Array, MutationObserver)>) {
        let document = web_sys::window().unwrap().document().unwrap();
        let container = document.create_element("main").unwrap();
        document.body().unwrap().append_child(&container).unwrap();

        let callback = Closure::<dyn FnMut(Array, MutationObserver)>::new(|_: Array, _: MutationObserver| {});
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref()).unwrap();
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer.observe_with_options(&container, &init).unwrap();
        (document, container, observer, callback)
    }

    #[wasm_bindgen_test]
    fn text_only_mutations_add_no_elements() {
        let (document, container, observer, _callback) = observed_container();

        container.append_child(&document.create_text_node("just text")).unwrap();
        let batch = summarize_mutations(&observer.take_records());
        assert_eq!(batch, MutationBatch { records: 1, added_elements: 0 });
        assert!(!batch.introduces_elements());

        observer.disconnect();
        container.remove();
    }

    #[wasm_bindgen_test]
    fn element_mutations_are_counted() {
        let (document, container, observer, _callback) = observed_container();

        let post = document.create_element("div").unwrap();
        container.append_child(&post).unwrap();
        post.append_child(&document.create_element("span").unwrap()).unwrap();
        container.append_child(&document.create_text_node("more")).unwrap();

        let batch = summarize_mutations(&observer.take_records());
        assert_eq!(batch, MutationBatch { records: 3, added_elements: 2 });
        assert!(batch.introduces_elements());

        observer.disconnect();
        container.remove();
    }

    fn controller() -> Rc<RefCell<WebController>> {
        let window = web_sys::window().unwrap();
        let document = window.document().unwrap();
        let controller = Controller::new(
            ScannerConfig::default(),
            Settings { enabled: true },
            WebDocument::new(window, document),
            WebTimers::new(),
            BadgeSink::new(),
        )
        .unwrap();
        let shared = Rc::new(RefCell::new(controller));
        shared.borrow_mut().timers_mut().bind(Rc::downgrade(&shared));
        shared
    }

    /// A `sendResponse` stand-in that records every reply.
    fn recorder() -> (Array, Closure<dyn FnMut(JsValue)>) {
        let replies = Array::new();
        let sink = replies.clone();
        let callback = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            sink.push(&value);
        });
        (replies, callback)
    }

    fn message(json: &str) -> JsValue {
        js_sys::JSON::parse(json).unwrap()
    }

    fn field(value: &JsValue, name: &str) -> JsValue {
        js_sys::Reflect::get(value, &JsValue::from_str(name)).unwrap()
    }

    #[wasm_bindgen_test]
    fn answers_get_count_and_toggle() {
        let shared = controller();
        let weak = Rc::downgrade(&shared);
        let (replies, callback) = recorder();
        let send_response: &Function = callback.as_ref().unchecked_ref();

        respond(&weak, message(r#"{"action":"getCount"}"#), send_response).unwrap();
        assert_eq!(replies.length(), 1);
        assert_eq!(field(&replies.get(0), "count").as_f64(), Some(0.0));

        respond(&weak, message(r#"{"action":"toggle","enabled":false}"#), send_response).unwrap();
        assert_eq!(replies.length(), 2);
        assert_eq!(field(&replies.get(1), "success").as_bool(), Some(true));
        assert!(!shared.borrow().is_enabled());
    }

    #[wasm_bindgen_test]
    fn malformed_messages_are_not_answered() {
        let shared = controller();
        let weak = Rc::downgrade(&shared);
        let (replies, callback) = recorder();
        let send_response: &Function = callback.as_ref().unchecked_ref();

        let err = respond(&weak, message(r#"{"action":"explode"}"#), send_response).unwrap_err();
        assert!(matches!(err, MessageError::Decode(_)));
        let err = respond(&weak, JsValue::from_str("getCount"), send_response).unwrap_err();
        assert!(matches!(err, MessageError::Decode(_)));
        assert_eq!(replies.length(), 0);
        assert!(shared.borrow().is_enabled());
    }

    #[wasm_bindgen_test]
    fn gone_controller_is_not_answered() {
        let weak = Rc::downgrade(&controller());
        let (replies, callback) = recorder();
        let err = respond(&weak, message(r#"{"action":"getCount"}"#), callback.as_ref().unchecked_ref()).unwrap_err();
        assert!(matches!(err, MessageError::Unavailable));
        assert_eq!(replies.length(), 0);
    }

    #[wasm_bindgen_test]
    fn schedule_replaces_and_cancel_disarms() {
        let shared = controller();
        let mut ctl = shared.borrow_mut();
        let timers = ctl.timers_mut();
        timers.schedule(TimerSlot::Retry, 60_000);
        timers.schedule(TimerSlot::Retry, 30_000);
        assert!(timers.is_pending(TimerSlot::Retry));
        timers.cancel(TimerSlot::Retry);
        assert!(!timers.is_pending(TimerSlot::Retry));
    }
}
