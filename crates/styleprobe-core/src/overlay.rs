//! Visual overlay.
//!
//! Geometry is computed here from live DOM rectangles on every call and
//! handed to an [`OverlaySurface`] that does the actual drawing. Nothing is
//! cached, so the overlay follows scrolling and reflow without listeners.

use crate::dom::{Dom, parse_px};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Height reserved for the label tag.
pub const LABEL_HEIGHT: f64 = 22.0;
/// Gap between the highlight box and its label.
pub const LABEL_GAP: f64 = 4.0;

/// Where the label sits relative to the highlight box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPlacement {
    Above,
    Below,
}

/// Layout mode shown as a badge on the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutBadge {
    Flex,
    Grid,
}

impl LayoutBadge {
    pub fn from_display(display: &str) -> Option<Self> {
        if display.contains("grid") {
            Some(Self::Grid)
        } else if display.contains("flex") {
            Some(Self::Flex)
        } else {
            None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Flex => "Flex",
            Self::Grid => "Grid",
        }
    }
}

/// Everything a surface needs to draw one highlight.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightFrame {
    pub rect: Rect,
    pub tag: String,
    /// Rendered size, e.g. `"120 × 40"`.
    pub dimensions: String,
    pub badge: Option<LayoutBadge>,
    pub placement: LabelPlacement,
    /// Top-left corner of the label.
    pub label_origin: Point,
}

/// A grid location to highlight inside a grid container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GridTarget {
    /// Track intersection, 1-based.
    Cell { col: usize, row: usize },
    /// The nth child, 0-based.
    Item { index: usize },
}

/// Drawing backend for the overlay.
///
/// Implementations render into a layer isolated from page styles that never
/// intercepts pointer input and stacks above page content.
pub trait OverlaySurface {
    fn mount(&mut self);
    fn unmount(&mut self);
    fn draw_highlight(&mut self, frame: &HighlightFrame);
    fn hide_highlight(&mut self);
    fn draw_grid_cell(&mut self, rect: Rect);
    fn hide_grid_cell(&mut self);
}

/// Keeps the overlay surface in sync with requested highlights.
pub struct OverlayRenderer {
    surface: Box<dyn OverlaySurface>,
    mounted: bool,
}

impl OverlayRenderer {
    pub fn new(surface: Box<dyn OverlaySurface>) -> Self {
        Self {
            surface,
            mounted: false,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Mount the surface if it is not mounted yet.
    pub fn ensure_mounted(&mut self) {
        if !self.mounted {
            self.surface.mount();
            self.mounted = true;
        }
    }

    /// Draw the highlight box and label over `element`.
    pub fn highlight<D: Dom>(&mut self, dom: &D, element: &D::Element) -> Option<HighlightFrame> {
        if !dom.is_connected(element) {
            self.clear_highlight();
            return None;
        }
        self.ensure_mounted();
        let frame = highlight_frame(dom, element);
        self.surface.draw_highlight(&frame);
        Some(frame)
    }

    /// Highlight a cell or item of a grid container.
    ///
    /// Clears the cell highlight when the target does not exist.
    pub fn highlight_grid_cell<D: Dom>(
        &mut self,
        dom: &D,
        container: &D::Element,
        target: GridTarget,
    ) -> Option<Rect> {
        self.ensure_mounted();
        match grid_target_rect(dom, container, target) {
            Some(rect) => {
                self.surface.draw_grid_cell(rect);
                Some(rect)
            }
            None => {
                self.surface.hide_grid_cell();
                None
            }
        }
    }

    pub fn clear_grid_cell(&mut self) {
        if self.mounted {
            self.surface.hide_grid_cell();
        }
    }

    pub fn clear_highlight(&mut self) {
        if self.mounted {
            self.surface.hide_highlight();
            self.surface.hide_grid_cell();
        }
    }

    pub fn unmount(&mut self) {
        if self.mounted {
            self.surface.unmount();
            self.mounted = false;
        }
    }
}

/// Compute the highlight frame for an element from its live rectangle.
pub fn highlight_frame<D: Dom>(dom: &D, element: &D::Element) -> HighlightFrame {
    let rect = dom.bounding_rect(element);
    let display = dom.computed_style(element, "display");
    let placement = if rect.y0 - LABEL_HEIGHT - LABEL_GAP < 0.0 {
        LabelPlacement::Below
    } else {
        LabelPlacement::Above
    };
    let label_y = match placement {
        LabelPlacement::Above => rect.y0 - LABEL_HEIGHT - LABEL_GAP,
        LabelPlacement::Below => rect.y1 + LABEL_GAP,
    };
    HighlightFrame {
        rect,
        tag: dom.tag_name(element),
        dimensions: format!("{} × {}", rect.width().round(), rect.height().round()),
        badge: LayoutBadge::from_display(&display),
        placement,
        label_origin: Point::new(rect.x0.max(0.0), label_y),
    }
}

/// Viewport rectangle of a grid target, `None` if it does not exist.
pub fn grid_target_rect<D: Dom>(dom: &D, container: &D::Element, target: GridTarget) -> Option<Rect> {
    match target {
        GridTarget::Item { index } => dom
            .children(container)
            .get(index)
            .map(|child| dom.bounding_rect(child)),
        GridTarget::Cell { col, row } => grid_cell_rect(dom, container, col, row),
    }
}

fn grid_cell_rect<D: Dom>(dom: &D, container: &D::Element, col: usize, row: usize) -> Option<Rect> {
    if col == 0 || row == 0 {
        return None;
    }
    let px = |property: &str| parse_px(&dom.computed_style(container, property)).unwrap_or(0.0);
    let rect = dom.bounding_rect(container);

    let content_left = rect.x0 + px("border-left-width") + px("padding-left");
    let content_top = rect.y0 + px("border-top-width") + px("padding-top");
    let content_height = rect.height()
        - px("border-top-width")
        - px("border-bottom-width")
        - px("padding-top")
        - px("padding-bottom");

    let columns = parse_track_list(&dom.computed_style(container, "grid-template-columns"));
    let mut rows = parse_track_list(&dom.computed_style(container, "grid-template-rows"));
    if rows.is_empty() {
        rows.push(content_height.max(0.0));
    }
    let column_gap = px("column-gap");
    let row_gap = px("row-gap");

    let (x, width) = track_span(&columns, column_gap, col)?;
    let (y, height) = track_span(&rows, row_gap, row)?;
    Some(Rect::new(
        content_left + x,
        content_top + y,
        content_left + x + width,
        content_top + y + height,
    ))
}

/// Offset and size of the 1-based track `index`.
fn track_span(tracks: &[f64], gap: f64, index: usize) -> Option<(f64, f64)> {
    let size = *tracks.get(index.checked_sub(1)?)?;
    let offset: f64 = tracks[..index - 1].iter().map(|track| track + gap).sum();
    Some((offset, size))
}

/// Parse a resolved track list such as `"[a] 100px 50.5px [b]"` into sizes.
pub fn parse_track_list(value: &str) -> Vec<f64> {
    let mut tracks = Vec::new();
    let mut in_names = false;
    for token in value.split_whitespace() {
        if token.starts_with('[') {
            in_names = true;
        }
        if in_names {
            if token.ends_with(']') {
                in_names = false;
            }
            continue;
        }
        if let Some(size) = token.strip_suffix("px").and_then(|n| n.parse::<f64>().ok()) {
            tracks.push(size);
        }
    }
    tracks
}
