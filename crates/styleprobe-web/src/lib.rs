//! StyleProbe browser bindings.
//!
//! Three entry points, one per extension context:
//! - [`start_content_script`]: the page engine, injected into inspected tabs
//! - [`start_background`]: panel attachment tracking in the service worker
//! - [`PanelHandle`]: the panel-side store, driven by the panel UI
//!
//! Everything here is `wasm32`-only; native builds compile an empty crate.

#[cfg(target_arch = "wasm32")]
mod background;
#[cfg(target_arch = "wasm32")]
mod chrome;
#[cfg(target_arch = "wasm32")]
mod content;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod overlay;
#[cfg(target_arch = "wasm32")]
mod panel;
#[cfg(target_arch = "wasm32")]
mod raster;

#[cfg(target_arch = "wasm32")]
pub use background::start_background;
#[cfg(target_arch = "wasm32")]
pub use content::start_content_script;
#[cfg(target_arch = "wasm32")]
pub use dom::WebDom;
#[cfg(target_arch = "wasm32")]
pub use panel::PanelHandle;

#[cfg(target_arch = "wasm32")]
use styleprobe_core::ProbeConfig;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

/// Read an optional JS config object and install console logging.
#[cfg(target_arch = "wasm32")]
fn init(config: JsValue) -> Result<ProbeConfig, JsValue> {
    console_error_panic_hook::set_once();
    let config: ProbeConfig = if config.is_undefined() || config.is_null() {
        ProbeConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config)?
    };
    // A second entry point in the same context keeps the first logger.
    let _ = console_log::init_with_level(config.log_level());
    Ok(config)
}
