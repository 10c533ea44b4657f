//! Page access abstraction.

mod memory;

pub use memory::{MemoryDom, NodeId};

use kurbo::{Point, Rect, Size};
use std::fmt;

/// Attribute marking the overlay host element. Elements carrying it are
/// never picked, scanned or inspected.
pub const OVERLAY_HOST_ATTR: &str = "data-styleprobe-overlay";

/// Inline style priority used for every tracked write.
pub const IMPORTANT: &str = "important";

/// Read/write access to the inspected document.
///
/// Implementations exist for the browser (`web_sys`) and for memory
/// (tests, headless use). Methods take `&self`: DOM handles are shared and
/// mutation goes through the platform, the same way `web_sys` exposes it.
///
/// All geometry is viewport-relative CSS pixels. Tag names are lower-case.
pub trait Dom {
    /// Handle to a live element.
    type Element: Clone + PartialEq + fmt::Debug;

    /// The `<html>` element.
    fn document_element(&self) -> Option<Self::Element>;

    /// The `<body>` element.
    fn body(&self) -> Option<Self::Element>;

    /// Every element in document order.
    fn all_elements(&self) -> Vec<Self::Element>;

    /// Number of elements in the document.
    fn element_count(&self) -> usize;

    /// The element at `index` in document order.
    fn element_at(&self, index: usize) -> Option<Self::Element>;

    /// Top-most element under a viewport point.
    fn element_from_point(&self, point: Point) -> Option<Self::Element>;

    /// First element whose attribute `name` equals `value`.
    fn find_by_attribute(&self, name: &str, value: &str) -> Option<Self::Element>;

    /// Viewport size.
    fn viewport(&self) -> Size;

    /// Document title.
    fn title(&self) -> String;

    /// Document URL.
    fn url(&self) -> String;

    fn is_connected(&self, element: &Self::Element) -> bool;

    fn tag_name(&self, element: &Self::Element) -> String;

    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;

    fn set_attribute(&self, element: &Self::Element, name: &str, value: &str);

    fn parent(&self, element: &Self::Element) -> Option<Self::Element>;

    fn children(&self, element: &Self::Element) -> Vec<Self::Element>;

    /// Border-box rectangle relative to the viewport.
    fn bounding_rect(&self, element: &Self::Element) -> Rect;

    /// Resolved value of a kebab-case property.
    fn computed_style(&self, element: &Self::Element, property: &str) -> String;

    /// Inline value of a kebab-case property, empty when unset.
    fn inline_style(&self, element: &Self::Element, property: &str) -> String;

    /// Inline priority of a property: `"important"` or empty.
    fn inline_priority(&self, element: &Self::Element, property: &str) -> String;

    fn set_inline_style(&self, element: &Self::Element, property: &str, value: &str, priority: &str);

    fn remove_inline_style(&self, element: &Self::Element, property: &str);

    /// Force a synchronous layout pass for the element.
    fn flush_layout(&self, element: &Self::Element);

    fn outer_html(&self, element: &Self::Element) -> String;

    /// Resolved source of an image element (`currentSrc`, then `src`).
    fn image_source(&self, element: &Self::Element) -> Option<String>;

    /// Intrinsic bitmap size of an image element, once decoded.
    fn natural_size(&self, element: &Self::Element) -> Option<Size>;

    fn scroll_into_view(&self, element: &Self::Element);
}

/// Whether an element belongs to the overlay.
pub fn is_overlay<D: Dom>(dom: &D, element: &D::Element) -> bool {
    dom.attribute(element, OVERLAY_HOST_ATTR).is_some()
}

/// Non-empty `id` attribute.
pub fn element_id<D: Dom>(dom: &D, element: &D::Element) -> Option<String> {
    dom.attribute(element, "id").filter(|id| !id.trim().is_empty())
}

/// Whitespace-separated `class` attribute entries.
pub fn class_list<D: Dom>(dom: &D, element: &D::Element) -> Vec<String> {
    dom.attribute(element, "class")
        .map(|classes| classes.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Parse a CSS pixel length such as `"12.5px"`. Keywords yield `None`.
pub fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value);
    number.trim().parse::<f64>().ok()
}
