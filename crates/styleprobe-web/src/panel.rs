//! Panel-side entry point.
//!
//! [`PanelHandle`] wraps a [`PanelStore`] for the panel UI. Every operation
//! returns a `Promise`; browser tab events and page events are folded into
//! the store as they arrive and announced through the change callback.

use crate::chrome;
use serde::Serialize;
use std::collections::BTreeMap;
use std::rc::Rc;
use styleprobe_core::panel::{BoxFuture, ConnectionStatus, TabId, changed_properties};
use styleprobe_core::protocol::PANEL_PORT_NAME;
use styleprobe_core::{
    AssetEntry, GridTarget, PageEvent, PageOverview, PanelError, PanelStore, PanelTransport,
    ReplyEnvelope, ReplyMode, Request, StyleSnapshot, TabInfo, TransportError, View,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise};

/// `chrome.tabs` / `chrome.scripting` transport.
pub struct ChromeTransport;

fn transport_error(err: JsValue) -> TransportError {
    TransportError::from_message(&chrome::error_message(&err))
}

impl PanelTransport for ChromeTransport {
    fn send(
        &self,
        tab: TabId,
        request: &Request,
    ) -> BoxFuture<'_, Result<Option<ReplyEnvelope>, TransportError>> {
        let message = request
            .to_value()
            .map_err(TransportError::from)
            .and_then(|value| {
                chrome::to_js(&value).map_err(|e| TransportError::Serialization(chrome::error_message(&e)))
            });
        let mode = request.command.reply_mode();
        Box::pin(async move {
            let promise = chrome::tabs_send_message(tab, &message?).map_err(transport_error)?;
            let reply = match JsFuture::from(promise).await.map_err(transport_error) {
                Ok(reply) => reply,
                // Fire-and-forget commands never answer.
                Err(TransportError::Disconnected) if mode == ReplyMode::None => return Ok(None),
                Err(err) => return Err(err),
            };
            if reply.is_undefined() || reply.is_null() {
                return Ok(None);
            }
            serde_wasm_bindgen::from_value(reply)
                .map(Some)
                .map_err(|e| TransportError::Serialization(e.to_string()))
        })
    }

    fn inject(&self, tab: TabId, files: &'static [&'static str]) -> BoxFuture<'_, Result<(), TransportError>> {
        let injection = chrome::to_js(&serde_json::json!({
            "target": { "tabId": tab },
            "files": files,
        }));
        Box::pin(async move {
            let injection =
                injection.map_err(|e| TransportError::Serialization(chrome::error_message(&e)))?;
            let promise = chrome::execute_script(&injection)
                .map_err(|e| TransportError::Injection(chrome::error_message(&e)))?;
            JsFuture::from(promise)
                .await
                .map_err(|e| TransportError::Injection(chrome::error_message(&e)))?;
            Ok(())
        })
    }
}

/// What the panel UI renders.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PanelSnapshot<'a> {
    tab: Option<&'a TabInfo>,
    selected: Option<&'a StyleSnapshot>,
    changed_styles: BTreeMap<String, String>,
    picking: bool,
    view: View,
    status: &'a ConnectionStatus,
    overview: Option<&'a PageOverview>,
    assets: Option<&'a [AssetEntry]>,
    has_pending: bool,
}

fn panel_error(err: PanelError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn tab_info(tab: &JsValue) -> Option<TabInfo> {
    let id = chrome::get_path(tab, &["id"]).as_f64()? as TabId;
    let url = chrome::get_path(tab, &["url"]).as_string().unwrap_or_default();
    Some(TabInfo { id, url })
}

type Store = PanelStore<ChromeTransport>;

#[wasm_bindgen]
pub struct PanelHandle {
    store: Rc<Store>,
    on_change: Rc<Option<js_sys::Function>>,
    _port: chrome::Port,
}

fn notify(on_change: &Option<js_sys::Function>) {
    if let Some(callback) = on_change {
        if let Err(err) = callback.call0(&JsValue::NULL) {
            log::warn!("Change callback failed: {:?}", err);
        }
    }
}

#[wasm_bindgen]
impl PanelHandle {
    /// Connect to the background, watch tab events and pick up the
    /// active tab. `on_change` is called whenever state changes outside a
    /// returned promise.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue, on_change: Option<js_sys::Function>) -> Result<PanelHandle, JsValue> {
        crate::init(config)?;
        let store = Rc::new(PanelStore::new(ChromeTransport));
        let on_change = Rc::new(on_change);
        let port = chrome::runtime_connect(&chrome::to_js(&serde_json::json!({ "name": PANEL_PORT_NAME }))?)?;

        let activated = {
            let store = store.clone();
            let on_change = on_change.clone();
            Closure::<dyn FnMut(JsValue)>::new(move |info: JsValue| {
                let Some(tab_id) = chrome::get_path(&info, &["tabId"]).as_f64() else {
                    return;
                };
                let store = store.clone();
                let on_change = on_change.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    if let Some(tab) = fetch_tab(tab_id as TabId).await {
                        store.on_tab_activated(tab).await;
                        notify(&on_change);
                    }
                });
            })
        };
        chrome::event(&["tabs", "onActivated"])?.add_listener(activated.as_ref().unchecked_ref());
        activated.forget();

        let updated = {
            let store = store.clone();
            let on_change = on_change.clone();
            Closure::<dyn FnMut(JsValue, JsValue)>::new(move |tab_id: JsValue, change: JsValue| {
                let Some(tab_id) = tab_id.as_f64() else {
                    return;
                };
                let url = chrome::get_path(&change, &["url"]).as_string();
                let complete = chrome::get_path(&change, &["status"]).as_string().as_deref()
                    == Some("complete");
                if store.on_tab_updated(tab_id as TabId, url.as_deref(), complete) {
                    notify(&on_change);
                }
            })
        };
        chrome::event(&["tabs", "onUpdated"])?.add_listener(updated.as_ref().unchecked_ref());
        updated.forget();

        let message = {
            let store = store.clone();
            let on_change = on_change.clone();
            Closure::<dyn FnMut(JsValue, JsValue) -> bool>::new(move |message: JsValue, sender: JsValue| {
                let sender_tab = chrome::get_path(&sender, &["tab", "id"]).as_f64();
                let watched = store.state().tab().map(|tab| tab.id as f64);
                if sender_tab.is_none() || sender_tab != watched {
                    return false;
                }
                match serde_wasm_bindgen::from_value::<PageEvent>(message) {
                    Ok(event) => {
                        store.on_page_event(event);
                        notify(&on_change);
                    }
                    Err(err) => log::debug!("Ignoring message: {}", err),
                }
                false
            })
        };
        chrome::event(&["runtime", "onMessage"])?.add_listener(message.as_ref().unchecked_ref());
        message.forget();

        {
            let store = store.clone();
            let on_change = on_change.clone();
            wasm_bindgen_futures::spawn_local(async move {
                if let Some(tab) = active_tab().await {
                    store.on_tab_activated(tab).await;
                    notify(&on_change);
                }
            });
        }

        Ok(PanelHandle {
            store,
            on_change,
            _port: port,
        })
    }

    /// Current state as a plain object.
    pub fn state(&self) -> Result<JsValue, JsValue> {
        let state = self.store.state();
        let snapshot = PanelSnapshot {
            tab: state.tab(),
            selected: state.selected(),
            changed_styles: state.selected().map(changed_properties).unwrap_or_default(),
            picking: state.is_picking(),
            view: state.view(),
            status: state.status(),
            overview: state.overview(),
            assets: state.assets(),
            has_pending: state.has_pending(),
        };
        chrome::to_js(&snapshot)
    }

    #[wasm_bindgen(js_name = setView)]
    pub fn set_view(&self, view: JsValue) -> Result<(), JsValue> {
        let view: View = serde_wasm_bindgen::from_value(view)?;
        self.store.set_view(view);
        notify(&self.on_change);
        Ok(())
    }

    #[wasm_bindgen(js_name = isChanged)]
    pub fn is_changed(&self, property: &str) -> bool {
        self.store.state().is_changed(property)
    }

    /// Whether an edit of `property` is still awaiting the page's reply.
    #[wasm_bindgen(js_name = isPending)]
    pub fn is_pending(&self, property: &str) -> bool {
        self.store.state().is_pending(property)
    }

    #[wasm_bindgen(js_name = scanPage)]
    pub fn scan_page(&self) -> js_sys::Promise {
        let store = self.store.clone();
        future_to_promise(async move { chrome::to_js(&store.scan_page().await.map_err(panel_error)?) })
    }

    #[wasm_bindgen(js_name = scanAssets)]
    pub fn scan_assets(&self) -> js_sys::Promise {
        let store = self.store.clone();
        future_to_promise(async move { chrome::to_js(&store.scan_assets().await.map_err(panel_error)?) })
    }

    #[wasm_bindgen(js_name = startPicking)]
    pub fn start_picking(&self) -> js_sys::Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store.start_picking().await.map_err(panel_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = stopPicking)]
    pub fn stop_picking(&self) -> js_sys::Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store.stop_picking().await.map_err(panel_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Resolves with the new picking flag.
    #[wasm_bindgen(js_name = togglePicking)]
    pub fn toggle_picking(&self) -> js_sys::Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let picking = store.toggle_picking().await.map_err(panel_error)?;
            Ok(JsValue::from_bool(picking))
        })
    }

    #[wasm_bindgen(js_name = selectNode)]
    pub fn select_node(&self, token: String) -> js_sys::Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            chrome::to_js(&store.select_node(&token).await.map_err(panel_error)?)
        })
    }

    #[wasm_bindgen(js_name = highlightNode)]
    pub fn highlight_node(&self, token: String, no_scroll: bool) -> js_sys::Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store.highlight_node(&token, no_scroll).await.map_err(panel_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = clearHighlight)]
    pub fn clear_highlight(&self) -> js_sys::Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store.clear_highlight().await.map_err(panel_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// `styles` maps property names to strings, numbers or `null`.
    #[wasm_bindgen(js_name = updateStyle)]
    pub fn update_style(&self, token: String, styles: JsValue) -> js_sys::Promise {
        let store = self.store.clone();
        let on_change = self.on_change.clone();
        future_to_promise(async move {
            let styles: BTreeMap<String, serde_json::Value> = serde_wasm_bindgen::from_value(styles)?;
            let result = store.update_style(&token, styles).await;
            // A rollback changes state even when the promise rejects.
            notify(&on_change);
            chrome::to_js(&result.map_err(panel_error)?)
        })
    }

    #[wasm_bindgen(js_name = revertStyle)]
    pub fn revert_style(&self, token: String, property: Option<String>) -> js_sys::Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let snapshot = store
                .revert_style(&token, property.as_deref())
                .await
                .map_err(panel_error)?;
            chrome::to_js(&snapshot)
        })
    }

    /// `area` is `{type: "cell", col, row}` or `{type: "item", index}`.
    #[wasm_bindgen(js_name = highlightGridArea)]
    pub fn highlight_grid_area(&self, token: String, area: JsValue) -> js_sys::Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let area: GridTarget = serde_wasm_bindgen::from_value(area)?;
            store.highlight_grid_area(&token, area).await.map_err(panel_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = clearGridArea)]
    pub fn clear_grid_area(&self, token: String) -> js_sys::Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store.clear_grid_area(&token).await.map_err(panel_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }
}

async fn fetch_tab(tab_id: TabId) -> Option<TabInfo> {
    let promise = chrome::tabs_get(tab_id).ok()?;
    let tab = JsFuture::from(promise).await.ok()?;
    tab_info(&tab)
}

async fn active_tab() -> Option<TabInfo> {
    let query = chrome::to_js(&serde_json::json!({ "active": true, "currentWindow": true })).ok()?;
    let tabs = JsFuture::from(chrome::tabs_query(&query).ok()?).await.ok()?;
    tab_info(&chrome::get_path(&tabs, &["0"]))
}
