//! Canvas-backed color rasterization.

use styleprobe_core::ColorRaster;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement};

const PROBE_DARK: &str = "#000000";
const PROBE_LIGHT: &str = "#ffffff";

/// Paints a color onto a 1×1 canvas and reads the pixel back.
///
/// Resolves every syntax the browser accepts (named colors, `hsl()`,
/// `color-mix()`, ...). Alpha is whatever the canvas stores.
pub struct CanvasRaster {
    context: CanvasRenderingContext2d,
}

impl CanvasRaster {
    pub fn new(document: &Document) -> Option<Self> {
        let canvas: HtmlCanvasElement = document.create_element("canvas").ok()?.dyn_into().ok()?;
        canvas.set_width(1);
        canvas.set_height(1);
        let context = canvas
            .get_context("2d")
            .ok()??
            .dyn_into::<CanvasRenderingContext2d>()
            .ok()?;
        Some(Self { context })
    }

    /// The fill style the context ends up with after assigning `css`
    /// on top of `probe`. An invalid color leaves `probe` in place.
    fn resolved_fill(&self, probe: &str, css: &str) -> Option<String> {
        self.context.set_fill_style_str(probe);
        self.context.set_fill_style_str(css);
        self.context.fill_style().as_string()
    }
}

impl ColorRaster for CanvasRaster {
    fn rasterize(&self, css: &str) -> Option<[u8; 4]> {
        if self.resolved_fill(PROBE_DARK, css)? != self.resolved_fill(PROBE_LIGHT, css)? {
            return None;
        }
        self.context.clear_rect(0.0, 0.0, 1.0, 1.0);
        self.context.fill_rect(0.0, 0.0, 1.0, 1.0);
        let data = self.context.get_image_data(0.0, 0.0, 1.0, 1.0).ok()?.data();
        match data.0.as_slice() {
            [r, g, b, a, ..] => Some([*r, *g, *b, *a]),
            _ => None,
        }
    }
}
