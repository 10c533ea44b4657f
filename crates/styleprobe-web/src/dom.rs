//! `web_sys` implementation of [`Dom`].

use kurbo::{Point, Rect, Size};
use styleprobe_core::Dom;
use wasm_bindgen::JsCast;
use web_sys::{
    CssStyleDeclaration, Document, Element, HtmlCollection, HtmlElement, HtmlImageElement,
    ScrollBehavior, ScrollIntoViewOptions, ScrollLogicalPosition, SvgElement, Window,
};

/// The live document of the hosting page.
#[derive(Debug, Clone)]
pub struct WebDom {
    window: Window,
    document: Document,
    /// Live `getElementsByTagName("*")` collection.
    elements: HtmlCollection,
}

impl WebDom {
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        let elements = document.get_elements_by_tag_name("*");
        Some(Self {
            window,
            document,
            elements,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn inline_declaration(&self, element: &Element) -> Option<CssStyleDeclaration> {
        if let Some(html) = element.dyn_ref::<HtmlElement>() {
            return Some(html.style());
        }
        element.dyn_ref::<SvgElement>().map(|svg| svg.style())
    }
}

fn collect(collection: &HtmlCollection) -> Vec<Element> {
    (0..collection.length())
        .filter_map(|index| collection.item(index))
        .collect()
}

fn attribute_selector(name: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{}=\"{}\"]", name, escaped)
}

impl Dom for WebDom {
    type Element = Element;

    fn document_element(&self) -> Option<Element> {
        self.document.document_element()
    }

    fn body(&self) -> Option<Element> {
        self.document.body().map(Element::from)
    }

    fn all_elements(&self) -> Vec<Element> {
        collect(&self.elements)
    }

    fn element_count(&self) -> usize {
        self.elements.length() as usize
    }

    fn element_at(&self, index: usize) -> Option<Element> {
        self.elements.item(u32::try_from(index).ok()?)
    }

    fn element_from_point(&self, point: Point) -> Option<Element> {
        self.document
            .element_from_point(point.x as f32, point.y as f32)
    }

    fn find_by_attribute(&self, name: &str, value: &str) -> Option<Element> {
        self.document
            .query_selector(&attribute_selector(name, value))
            .ok()
            .flatten()
    }

    fn viewport(&self) -> Size {
        let dimension = |value: Result<wasm_bindgen::JsValue, wasm_bindgen::JsValue>| {
            value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
        };
        Size::new(
            dimension(self.window.inner_width()),
            dimension(self.window.inner_height()),
        )
    }

    fn title(&self) -> String {
        self.document.title()
    }

    fn url(&self) -> String {
        self.document.url().unwrap_or_default()
    }

    fn is_connected(&self, element: &Element) -> bool {
        element.is_connected()
    }

    fn tag_name(&self, element: &Element) -> String {
        element.local_name().to_ascii_lowercase()
    }

    fn attribute(&self, element: &Element, name: &str) -> Option<String> {
        element.get_attribute(name)
    }

    fn set_attribute(&self, element: &Element, name: &str, value: &str) {
        if let Err(err) = element.set_attribute(name, value) {
            log::warn!("Failed to set {}: {:?}", name, err);
        }
    }

    fn parent(&self, element: &Element) -> Option<Element> {
        element.parent_element()
    }

    fn children(&self, element: &Element) -> Vec<Element> {
        collect(&element.children())
    }

    fn bounding_rect(&self, element: &Element) -> Rect {
        let rect = element.get_bounding_client_rect();
        Rect::new(rect.left(), rect.top(), rect.right(), rect.bottom())
    }

    fn computed_style(&self, element: &Element, property: &str) -> String {
        self.window
            .get_computed_style(element)
            .ok()
            .flatten()
            .and_then(|style| style.get_property_value(property).ok())
            .unwrap_or_default()
    }

    fn inline_style(&self, element: &Element, property: &str) -> String {
        self.inline_declaration(element)
            .and_then(|style| style.get_property_value(property).ok())
            .unwrap_or_default()
    }

    fn inline_priority(&self, element: &Element, property: &str) -> String {
        self.inline_declaration(element)
            .map(|style| style.get_property_priority(property))
            .unwrap_or_default()
    }

    fn set_inline_style(&self, element: &Element, property: &str, value: &str, priority: &str) {
        let Some(style) = self.inline_declaration(element) else {
            return;
        };
        if let Err(err) = style.set_property_with_priority(property, value, priority) {
            log::warn!("Failed to set {}: {:?}", property, err);
        }
    }

    fn remove_inline_style(&self, element: &Element, property: &str) {
        if let Some(style) = self.inline_declaration(element) {
            let _ = style.remove_property(property);
        }
    }

    fn flush_layout(&self, element: &Element) {
        // Reading a layout property forces the pending reflow.
        match element.dyn_ref::<HtmlElement>() {
            Some(html) => {
                let _ = html.offset_height();
            }
            None => {
                let _ = element.get_bounding_client_rect();
            }
        }
    }

    fn outer_html(&self, element: &Element) -> String {
        element.outer_html()
    }

    fn image_source(&self, element: &Element) -> Option<String> {
        let image = element.dyn_ref::<HtmlImageElement>()?;
        [image.current_src(), image.src()]
            .into_iter()
            .find(|src| !src.is_empty())
    }

    fn natural_size(&self, element: &Element) -> Option<Size> {
        let image = element.dyn_ref::<HtmlImageElement>()?;
        let (width, height) = (image.natural_width(), image.natural_height());
        (width > 0 && height > 0).then(|| Size::new(width as f64, height as f64))
    }

    fn scroll_into_view(&self, element: &Element) {
        let options = ScrollIntoViewOptions::new();
        options.set_behavior(ScrollBehavior::Smooth);
        options.set_block(ScrollLogicalPosition::Center);
        element.scroll_into_view_with_scroll_into_view_options(&options);
    }
}
