//! Background service worker entry point.
//!
//! Panels connect a named port on open. When the last one disconnects and
//! none reconnects within the grace delay, pick mode is stopped on the
//! active tab.

use crate::chrome::{self, Port};
use std::cell::{Cell, RefCell};
use styleprobe_core::protocol::PANEL_PORT_NAME;
use styleprobe_core::session::StopTicket;
use styleprobe_core::{Command, Request, SessionCoordinator};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_time::Instant;

thread_local! {
    static COORDINATOR: RefCell<SessionCoordinator> = RefCell::new(SessionCoordinator::default());
    static NEXT_PORT: Cell<u64> = const { Cell::new(1) };
}

#[wasm_bindgen]
pub fn start_background(config: JsValue) -> Result<(), JsValue> {
    let config = crate::init(config)?;
    COORDINATOR.with(|c| *c.borrow_mut() = SessionCoordinator::new(config.detach_grace()));

    let on_connect = Closure::<dyn FnMut(Port)>::new(on_connect);
    chrome::event(&["runtime", "onConnect"])?.add_listener(on_connect.as_ref().unchecked_ref());
    on_connect.forget();
    log::info!("StyleProbe background ready");
    Ok(())
}

fn on_connect(port: Port) {
    if port.name() != PANEL_PORT_NAME {
        return;
    }
    let id = NEXT_PORT.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    });
    COORDINATOR.with(|c| c.borrow_mut().attach(id));

    let listener = Closure::once_into_js(move |_port: JsValue| on_disconnect(id));
    port.on_disconnect().add_listener(listener.unchecked_ref());
}

fn on_disconnect(id: u64) {
    let Some(ticket) = COORDINATOR.with(|c| c.borrow_mut().detach(id, Instant::now())) else {
        return;
    };
    let callback = Closure::once_into_js(move || fire(ticket));
    // Timers may be clamped a hair short of the requested delay.
    let delay = ticket.delay.as_millis() as i32 + 1;
    chrome::set_timeout(callback.unchecked_ref(), delay);
}

fn fire(ticket: StopTicket) {
    if !COORDINATOR.with(|c| c.borrow().fire(ticket, Instant::now())) {
        return;
    }
    log::debug!("Last panel closed, stopping pick mode");
    wasm_bindgen_futures::spawn_local(async {
        if let Err(err) = stop_active_tab().await {
            log::debug!("Could not stop picking: {}", chrome::error_message(&err));
        }
    });
}

async fn stop_active_tab() -> Result<(), JsValue> {
    let query = chrome::to_js(&serde_json::json!({ "active": true, "lastFocusedWindow": true }))?;
    let tabs = JsFuture::from(chrome::tabs_query(&query)?).await?;
    let Some(tab_id) = chrome::get_path(&tabs, &["0", "id"]).as_f64() else {
        return Ok(());
    };
    let message = Request {
        request_id: None,
        command: Command::StopPicking,
    }
    .to_value()
    .map_err(|e| JsValue::from_str(&e.to_string()))?;
    JsFuture::from(chrome::tabs_send_message(tab_id as i32, &chrome::to_js(&message)?)?).await?;
    Ok(())
}
