//! In-memory DOM implementation.

use super::Dom;
use kurbo::{Point, Rect, Size};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Handle to a node of a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct MemoryNode {
    tag: String,
    attributes: Vec<(String, String)>,
    /// Inline declarations in insertion order: (property, value, priority).
    inline: Vec<(String, String, String)>,
    computed: HashMap<String, String>,
    rect: Rect,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    natural_size: Option<Size>,
    connected: bool,
}

impl MemoryNode {
    fn new(tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            inline: Vec::new(),
            computed: HashMap::new(),
            rect: Rect::ZERO,
            parent,
            children: Vec::new(),
            natural_size: None,
            connected: true,
        }
    }
}

/// In-memory document for tests and headless use.
///
/// There is no cascade and no layout: computed style is the inline value if
/// one is set, then any value registered with [`MemoryDom::set_computed`],
/// then a small table of initial values. Rectangles are whatever the test
/// assigns.
#[derive(Debug)]
pub struct MemoryDom {
    nodes: RefCell<Vec<MemoryNode>>,
    viewport: Cell<Size>,
    title: RefCell<String>,
    url: RefCell<String>,
    layout_flushes: Cell<usize>,
    element_reads: Cell<usize>,
    scrolled: RefCell<Vec<NodeId>>,
}

impl MemoryDom {
    /// Create a document containing `<html><body></body></html>`.
    pub fn new() -> Self {
        let html = MemoryNode::new("html", None);
        let mut body = MemoryNode::new("body", Some(NodeId(0)));
        body.rect = Rect::new(0.0, 0.0, 1280.0, 800.0);
        let mut nodes = vec![html, body];
        nodes[0].children.push(NodeId(1));
        nodes[0].rect = Rect::new(0.0, 0.0, 1280.0, 800.0);
        Self {
            nodes: RefCell::new(nodes),
            viewport: Cell::new(Size::new(1280.0, 800.0)),
            title: RefCell::new(String::new()),
            url: RefCell::new("https://example.com/".to_string()),
            layout_flushes: Cell::new(0),
            element_reads: Cell::new(0),
            scrolled: RefCell::new(Vec::new()),
        }
    }

    /// Append a new element under `parent`.
    pub fn create_element(&self, parent: NodeId, tag: &str) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(MemoryNode::new(tag, Some(parent)));
        nodes[parent.0].children.push(id);
        id
    }

    /// Remove an element and its subtree from the document.
    pub fn detach(&self, id: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[id.0].parent.take() {
            nodes[parent.0].children.retain(|child| *child != id);
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            nodes[next.0].connected = false;
            stack.extend(nodes[next.0].children.iter().copied());
        }
    }

    pub fn set_rect(&self, id: NodeId, rect: Rect) {
        self.nodes.borrow_mut()[id.0].rect = rect;
    }

    /// Register a computed value that applies when no inline value is set.
    pub fn set_computed(&self, id: NodeId, property: &str, value: &str) {
        self.nodes.borrow_mut()[id.0]
            .computed
            .insert(property.to_string(), value.to_string());
    }

    pub fn set_natural_size(&self, id: NodeId, size: Size) {
        self.nodes.borrow_mut()[id.0].natural_size = Some(size);
    }

    pub fn set_viewport(&self, size: Size) {
        self.viewport.set(size);
    }

    pub fn set_title(&self, title: &str) {
        *self.title.borrow_mut() = title.to_string();
    }

    /// Number of forced layout passes so far.
    pub fn layout_flushes(&self) -> usize {
        self.layout_flushes.get()
    }

    /// Elements handed out by `all_elements` and `element_at` so far.
    pub fn element_reads(&self) -> usize {
        self.element_reads.get()
    }

    /// Elements scrolled into view so far, in order.
    pub fn scrolled(&self) -> Vec<NodeId> {
        self.scrolled.borrow().clone()
    }

    fn document_order(&self) -> Vec<NodeId> {
        let nodes = self.nodes.borrow();
        let mut order = Vec::with_capacity(nodes.len());
        let mut stack = vec![NodeId(0)];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(nodes[id.0].children.iter().rev().copied());
        }
        order
    }

    fn initial_value(tag: &str, property: &str) -> &'static str {
        match property {
            "display" => match tag {
                "span" | "a" | "img" | "svg" | "strong" | "em" | "button" | "input" => "inline",
                "head" | "script" | "style" => "none",
                _ => "block",
            },
            "color" => "rgb(0, 0, 0)",
            "background-color" => "rgba(0, 0, 0, 0)",
            "background-image" => "none",
            "background-size" => "auto",
            "background-position" => "0% 0%",
            "background-repeat" => "repeat",
            "border-top-color" | "border-right-color" | "border-bottom-color"
            | "border-left-color" => "rgb(0, 0, 0)",
            "border-top-style" | "border-right-style" | "border-bottom-style"
            | "border-left-style" => "none",
            "font-family" => "\"Times New Roman\"",
            "font-size" => "16px",
            "font-weight" => "400",
            "line-height" | "letter-spacing" => "normal",
            "text-align" => "start",
            "position" => "static",
            "top" | "right" | "bottom" | "left" | "z-index" => "auto",
            "opacity" => "1",
            "overflow" => "visible",
            "object-fit" => "fill",
            "object-position" => "50% 50%",
            "flex-direction" => "row",
            "flex-wrap" => "nowrap",
            "justify-content" | "align-items" | "gap" | "row-gap" | "column-gap" => "normal",
            "grid-template-columns" | "grid-template-rows" | "grid-template-areas" => "none",
            "grid-column" | "grid-row" | "grid-area" => "auto",
            property if property.ends_with("-width") && property.starts_with("border") => "0px",
            property if property.starts_with("padding") || property.starts_with("margin") => "0px",
            property if property.ends_with("-radius") => "0px",
            _ => "",
        }
    }
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom for MemoryDom {
    type Element = NodeId;

    fn document_element(&self) -> Option<NodeId> {
        Some(NodeId(0))
    }

    fn body(&self) -> Option<NodeId> {
        Some(NodeId(1))
    }

    fn all_elements(&self) -> Vec<NodeId> {
        let order = self.document_order();
        self.element_reads.set(self.element_reads.get() + order.len());
        order
    }

    fn element_count(&self) -> usize {
        self.document_order().len()
    }

    fn element_at(&self, index: usize) -> Option<NodeId> {
        self.element_reads.set(self.element_reads.get() + 1);
        self.document_order().get(index).copied()
    }

    fn element_from_point(&self, point: Point) -> Option<NodeId> {
        let order = self.document_order();
        let nodes = self.nodes.borrow();
        order
            .into_iter()
            .rev()
            .find(|id| nodes[id.0].rect.contains(point))
    }

    fn find_by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        self.document_order()
            .into_iter()
            .find(|id| self.attribute(id, name).as_deref() == Some(value))
    }

    fn viewport(&self) -> Size {
        self.viewport.get()
    }

    fn title(&self) -> String {
        self.title.borrow().clone()
    }

    fn url(&self) -> String {
        self.url.borrow().clone()
    }

    fn is_connected(&self, element: &NodeId) -> bool {
        self.nodes.borrow()[element.0].connected
    }

    fn tag_name(&self, element: &NodeId) -> String {
        self.nodes.borrow()[element.0].tag.clone()
    }

    fn attribute(&self, element: &NodeId, name: &str) -> Option<String> {
        self.nodes.borrow()[element.0]
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn set_attribute(&self, element: &NodeId, name: &str, value: &str) {
        let mut nodes = self.nodes.borrow_mut();
        let attributes = &mut nodes[element.0].attributes;
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn parent(&self, element: &NodeId) -> Option<NodeId> {
        self.nodes.borrow()[element.0].parent
    }

    fn children(&self, element: &NodeId) -> Vec<NodeId> {
        self.nodes.borrow()[element.0].children.clone()
    }

    fn bounding_rect(&self, element: &NodeId) -> Rect {
        self.nodes.borrow()[element.0].rect
    }

    fn computed_style(&self, element: &NodeId, property: &str) -> String {
        let nodes = self.nodes.borrow();
        let node = &nodes[element.0];
        if let Some((_, value, _)) = node.inline.iter().find(|(key, _, _)| key == property) {
            return value.clone();
        }
        if let Some(value) = node.computed.get(property) {
            return value.clone();
        }
        Self::initial_value(&node.tag, property).to_string()
    }

    fn inline_style(&self, element: &NodeId, property: &str) -> String {
        self.nodes.borrow()[element.0]
            .inline
            .iter()
            .find(|(key, _, _)| key == property)
            .map(|(_, value, _)| value.clone())
            .unwrap_or_default()
    }

    fn inline_priority(&self, element: &NodeId, property: &str) -> String {
        self.nodes.borrow()[element.0]
            .inline
            .iter()
            .find(|(key, _, _)| key == property)
            .map(|(_, _, priority)| priority.clone())
            .unwrap_or_default()
    }

    fn set_inline_style(&self, element: &NodeId, property: &str, value: &str, priority: &str) {
        let mut nodes = self.nodes.borrow_mut();
        let inline = &mut nodes[element.0].inline;
        match inline.iter_mut().find(|(key, _, _)| key == property) {
            Some(entry) => {
                entry.1 = value.to_string();
                entry.2 = priority.to_string();
            }
            None => inline.push((property.to_string(), value.to_string(), priority.to_string())),
        }
    }

    fn remove_inline_style(&self, element: &NodeId, property: &str) {
        self.nodes.borrow_mut()[element.0]
            .inline
            .retain(|(key, _, _)| key != property);
    }

    fn flush_layout(&self, _element: &NodeId) {
        self.layout_flushes.set(self.layout_flushes.get() + 1);
    }

    fn outer_html(&self, element: &NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        write_html(&nodes, *element, &mut out);
        out
    }

    fn image_source(&self, element: &NodeId) -> Option<String> {
        if self.tag_name(element) != "img" {
            return None;
        }
        self.attribute(element, "src").filter(|src| !src.is_empty())
    }

    fn natural_size(&self, element: &NodeId) -> Option<Size> {
        self.nodes.borrow()[element.0].natural_size
    }

    fn scroll_into_view(&self, element: &NodeId) {
        self.scrolled.borrow_mut().push(*element);
    }
}

fn write_html(nodes: &[MemoryNode], id: NodeId, out: &mut String) {
    let node = &nodes[id.0];
    out.push('<');
    out.push_str(&node.tag);
    for (key, value) in &node.attributes {
        out.push_str(&format!(" {}=\"{}\"", key, value));
    }
    if !node.inline.is_empty() {
        let style: Vec<String> = node
            .inline
            .iter()
            .map(|(key, value, priority)| {
                if priority.is_empty() {
                    format!("{}: {};", key, value)
                } else {
                    format!("{}: {} !{};", key, value, priority)
                }
            })
            .collect();
        out.push_str(&format!(" style=\"{}\"", style.join(" ")));
    }
    out.push('>');
    if node.tag == "img" {
        return;
    }
    for child in &node.children {
        write_html(nodes, *child, out);
    }
    out.push_str(&format!("</{}>", node.tag));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_order() {
        let dom = MemoryDom::new();
        let body = dom.body().unwrap();
        let a = dom.create_element(body, "div");
        let a1 = dom.create_element(a, "span");
        let b = dom.create_element(body, "p");

        assert_eq!(dom.all_elements(), vec![NodeId(0), body, a, a1, b]);
        assert_eq!(dom.element_count(), 5);
        assert_eq!(dom.element_at(3), Some(a1));
        assert_eq!(dom.element_at(5), None);
    }

    #[test]
    fn test_computed_prefers_inline() {
        let dom = MemoryDom::new();
        let div = dom.create_element(dom.body().unwrap(), "div");
        assert_eq!(dom.computed_style(&div, "display"), "block");

        dom.set_computed(div, "display", "flex");
        assert_eq!(dom.computed_style(&div, "display"), "flex");

        dom.set_inline_style(&div, "display", "grid", "important");
        assert_eq!(dom.computed_style(&div, "display"), "grid");
        assert_eq!(dom.inline_priority(&div, "display"), "important");

        dom.remove_inline_style(&div, "display");
        assert_eq!(dom.computed_style(&div, "display"), "flex");
    }

    #[test]
    fn test_element_from_point_topmost() {
        let dom = MemoryDom::new();
        let outer = dom.create_element(dom.body().unwrap(), "div");
        let inner = dom.create_element(outer, "span");
        dom.set_rect(outer, Rect::new(0.0, 0.0, 200.0, 200.0));
        dom.set_rect(inner, Rect::new(10.0, 10.0, 50.0, 50.0));

        assert_eq!(dom.element_from_point(Point::new(20.0, 20.0)), Some(inner));
        assert_eq!(dom.element_from_point(Point::new(100.0, 100.0)), Some(outer));
    }

    #[test]
    fn test_detach_subtree() {
        let dom = MemoryDom::new();
        let outer = dom.create_element(dom.body().unwrap(), "div");
        let inner = dom.create_element(outer, "span");
        dom.detach(outer);

        assert!(!dom.is_connected(&outer));
        assert!(!dom.is_connected(&inner));
        assert!(!dom.all_elements().contains(&inner));
    }

    #[test]
    fn test_outer_html() {
        let dom = MemoryDom::new();
        let div = dom.create_element(dom.body().unwrap(), "div");
        dom.set_attribute(&div, "id", "card");
        dom.set_inline_style(&div, "color", "red", "");
        let img = dom.create_element(div, "img");
        dom.set_attribute(&img, "src", "a.png");

        assert_eq!(
            dom.outer_html(&div),
            "<div id=\"card\" style=\"color: red;\"><img src=\"a.png\"></div>"
        );
    }
}
