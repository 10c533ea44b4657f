//! Shadow-DOM overlay surface.
//!
//! The host element carries the overlay marker attribute so scans and
//! picking skip it. Its shadow root keeps page styles out, and the host never
//! receives pointer events.

use kurbo::Rect;
use styleprobe_core::overlay::HighlightFrame;
use styleprobe_core::{OVERLAY_HOST_ATTR, OverlaySurface};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, ShadowRootInit, ShadowRootMode};

const HOST_STYLE: &str = "all: initial; position: fixed; top: 0; left: 0; width: 0; height: 0; \
     pointer-events: none; z-index: 2147483647;";

const SHADOW_STYLE: &str = "
.box, .cell, .label { position: fixed; display: none; box-sizing: border-box; pointer-events: none; }
.box { border: 2px solid #3b82f6; background: rgba(59, 130, 246, 0.12); }
.cell { border: 2px dashed #a855f7; background: rgba(168, 85, 247, 0.18); }
.label { height: 22px; padding: 3px 6px; border-radius: 4px; background: #1e293b; color: #f8fafc;
         font: 500 11px/16px ui-monospace, SFMono-Regular, Menlo, monospace; white-space: nowrap; }
.badge { margin-left: 6px; padding: 0 4px; border-radius: 3px; background: #3b82f6; }
";

struct Parts {
    host: Element,
    highlight: HtmlElement,
    label: HtmlElement,
    cell: HtmlElement,
}

pub struct ShadowOverlay {
    document: Document,
    parts: Option<Parts>,
}

impl ShadowOverlay {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            parts: None,
        }
    }

    fn build(&self) -> Result<Parts, wasm_bindgen::JsValue> {
        let host = self.document.create_element("div")?;
        host.set_attribute(OVERLAY_HOST_ATTR, "")?;
        host.set_attribute("style", HOST_STYLE)?;
        let root = host.attach_shadow(&ShadowRootInit::new(ShadowRootMode::Closed))?;

        let style = self.document.create_element("style")?;
        style.set_text_content(Some(SHADOW_STYLE));
        root.append_child(&style)?;

        let part = |class: &str| -> Result<HtmlElement, wasm_bindgen::JsValue> {
            let element = self.document.create_element("div")?;
            element.set_class_name(class);
            root.append_child(&element)?;
            Ok(element.unchecked_into())
        };
        let highlight = part("box")?;
        let cell = part("cell")?;
        let label = part("label")?;

        self.document
            .document_element()
            .ok_or_else(|| wasm_bindgen::JsValue::from_str("no document element"))?
            .append_child(&host)?;
        Ok(Parts {
            host,
            highlight,
            label,
            cell,
        })
    }
}

fn set(element: &HtmlElement, property: &str, value: &str) {
    let _ = element.style().set_property(property, value);
}

fn place(element: &HtmlElement, rect: Rect) {
    set(element, "left", &format!("{}px", rect.x0));
    set(element, "top", &format!("{}px", rect.y0));
    set(element, "width", &format!("{}px", rect.width()));
    set(element, "height", &format!("{}px", rect.height()));
    set(element, "display", "block");
}

fn label_markup(document: &Document, label: &HtmlElement, frame: &HighlightFrame) {
    label.set_text_content(Some(&format!("{}  {}", frame.tag, frame.dimensions)));
    if let Some(badge) = frame.badge {
        if let Ok(span) = document.create_element("span") {
            span.set_class_name("badge");
            span.set_text_content(Some(badge.label()));
            let _ = label.append_child(&span);
        }
    }
}

impl OverlaySurface for ShadowOverlay {
    fn mount(&mut self) {
        if self.parts.is_some() {
            return;
        }
        match self.build() {
            Ok(parts) => self.parts = Some(parts),
            Err(err) => log::warn!("Failed to mount overlay: {:?}", err),
        }
    }

    fn unmount(&mut self) {
        if let Some(parts) = self.parts.take() {
            parts.host.remove();
        }
    }

    fn draw_highlight(&mut self, frame: &HighlightFrame) {
        let Some(parts) = &self.parts else {
            return;
        };
        place(&parts.highlight, frame.rect);
        label_markup(&self.document, &parts.label, frame);
        set(&parts.label, "left", &format!("{}px", frame.label_origin.x));
        set(&parts.label, "top", &format!("{}px", frame.label_origin.y));
        set(&parts.label, "display", "block");
    }

    fn hide_highlight(&mut self) {
        if let Some(parts) = &self.parts {
            set(&parts.highlight, "display", "none");
            set(&parts.label, "display", "none");
        }
    }

    fn draw_grid_cell(&mut self, rect: Rect) {
        if let Some(parts) = &self.parts {
            place(&parts.cell, rect);
        }
    }

    fn hide_grid_cell(&mut self) {
        if let Some(parts) = &self.parts {
            set(&parts.cell, "display", "none");
        }
    }
}
