//! Content-script entry point.

use crate::chrome;
use crate::dom::WebDom;
use crate::overlay::ShadowOverlay;
use crate::raster::CanvasRaster;
use kurbo::Point;
use std::cell::RefCell;
use styleprobe_core::{
    ColorRaster, ContentSession, OVERLAY_HOST_ATTR, PageEvent, ParsedColorRaster, PickHooks,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Element, KeyboardEvent, MouseEvent};

/// Set on the global object once the engine is listening.
const LOADED_FLAG: &str = "__styleprobeContent";

const CROSSHAIR_STYLE: &str = "*, *::before, *::after { cursor: crosshair !important; }";

thread_local! {
    static SESSION: RefCell<Option<ContentSession<WebDom>>> = const { RefCell::new(None) };
}

/// Run `f` against the page session, if one exists and is not busy.
fn with_session<R>(f: impl FnOnce(&mut ContentSession<WebDom>) -> R) -> Option<R> {
    SESSION.with(|session| {
        let mut session = session.try_borrow_mut().ok()?;
        session.as_mut().map(f)
    })
}

/// Start the content-side engine. Safe to call again after re-injection.
#[wasm_bindgen]
pub fn start_content_script(config: JsValue) -> Result<(), JsValue> {
    let global: JsValue = js_sys::global().into();
    if js_sys::Reflect::get(&global, &JsValue::from_str(LOADED_FLAG))?.is_truthy() {
        return Ok(());
    }
    let config = crate::init(config)?;
    let dom = WebDom::new().ok_or_else(|| JsValue::from_str("no document"))?;
    let document = dom.document().clone();

    let raster: Box<dyn ColorRaster> = match CanvasRaster::new(&document) {
        Some(raster) => Box::new(raster),
        None => {
            log::warn!("Canvas unavailable, falling back to parsed colors");
            Box::new(ParsedColorRaster)
        }
    };
    let session = ContentSession::new(
        dom,
        &config,
        raster,
        Box::new(ShadowOverlay::new(document.clone())),
        Box::new(PageHooks::new(document)),
    );
    SESSION.with(|slot| *slot.borrow_mut() = Some(session));

    let listener = Closure::<dyn FnMut(JsValue, JsValue, js_sys::Function) -> bool>::new(
        |message: JsValue, _sender: JsValue, send_response: js_sys::Function| {
            on_message(message, send_response)
        },
    );
    chrome::event(&["runtime", "onMessage"])?.add_listener(listener.as_ref().unchecked_ref());
    listener.forget();

    js_sys::Reflect::set(&global, &JsValue::from_str(LOADED_FLAG), &JsValue::TRUE)?;
    log::info!("StyleProbe content script ready");
    Ok(())
}

/// Returns `true` when the reply channel must stay open.
fn on_message(message: JsValue, send_response: js_sys::Function) -> bool {
    let value: serde_json::Value = match serde_wasm_bindgen::from_value(message) {
        Ok(value) => value,
        Err(err) => {
            log::debug!("Ignoring unreadable message: {}", err);
            return false;
        }
    };
    let Some(envelope) = with_session(|session| session.handle_json(&value)).flatten() else {
        return false;
    };
    match chrome::to_js(&envelope) {
        Ok(reply) => {
            if let Err(err) = send_response.call1(&JsValue::NULL, &reply) {
                log::debug!("Reply not delivered: {:?}", err);
            }
        }
        Err(err) => log::warn!("Failed to serialize reply: {:?}", err),
    }
    true
}

/// Forward an event to the panel. A closed panel is not an error.
fn emit(event: PageEvent) {
    let message = match chrome::to_js(&event) {
        Ok(message) => message,
        Err(err) => {
            log::warn!("Failed to serialize event: {:?}", err);
            return;
        }
    };
    match chrome::runtime_send_message(&message) {
        Ok(promise) => wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = JsFuture::from(promise).await {
                log::debug!("No panel listening: {}", chrome::error_message(&err));
            }
        }),
        Err(err) => log::debug!("sendMessage failed: {}", chrome::error_message(&err)),
    }
}

fn client_point(event: &MouseEvent) -> Point {
    Point::new(event.client_x() as f64, event.client_y() as f64)
}

/// Page listeners for pick mode.
///
/// The closures live as long as the hooks, so a handler that stops pick
/// mode can unregister itself while it runs.
struct PageHooks {
    document: Document,
    on_move: Closure<dyn FnMut(MouseEvent)>,
    on_click: Closure<dyn FnMut(MouseEvent)>,
    on_key: Closure<dyn FnMut(KeyboardEvent)>,
    cursor: Option<Element>,
}

impl PageHooks {
    fn new(document: Document) -> Self {
        let on_move = Closure::<dyn FnMut(MouseEvent)>::new(|event: MouseEvent| {
            let point = client_point(&event);
            with_session(|session| session.pointer_moved(point));
        });
        let on_click = Closure::<dyn FnMut(MouseEvent)>::new(|event: MouseEvent| {
            event.prevent_default();
            event.stop_immediate_propagation();
            let point = client_point(&event);
            if let Some(event) = with_session(|session| session.clicked(point)).flatten() {
                emit(event);
            }
        });
        let on_key = Closure::<dyn FnMut(KeyboardEvent)>::new(|event: KeyboardEvent| {
            let key = event.key();
            if with_session(|session| session.key_pressed(&key)).unwrap_or(false) {
                event.prevent_default();
            }
        });
        Self {
            document,
            on_move,
            on_click,
            on_key,
            cursor: None,
        }
    }

    fn listeners(&self) -> [(&'static str, &js_sys::Function); 3] {
        [
            ("mousemove", self.on_move.as_ref().unchecked_ref()),
            ("click", self.on_click.as_ref().unchecked_ref()),
            ("keydown", self.on_key.as_ref().unchecked_ref()),
        ]
    }

    fn crosshair(&self) -> Option<Element> {
        let style = self.document.create_element("style").ok()?;
        style.set_attribute(OVERLAY_HOST_ATTR, "").ok()?;
        style.set_text_content(Some(CROSSHAIR_STYLE));
        self.document.head()?.append_child(&style).ok()?;
        Some(style)
    }
}

impl PickHooks for PageHooks {
    fn install(&mut self) {
        for (kind, listener) in self.listeners() {
            if let Err(err) =
                self.document
                    .add_event_listener_with_callback_and_bool(kind, listener, true)
            {
                log::warn!("Failed to listen for {}: {:?}", kind, err);
            }
        }
        self.cursor = self.crosshair();
    }

    fn uninstall(&mut self) {
        for (kind, listener) in self.listeners() {
            let _ = self
                .document
                .remove_event_listener_with_callback_and_bool(kind, listener, true);
        }
        if let Some(cursor) = self.cursor.take() {
            cursor.remove();
        }
    }
}
