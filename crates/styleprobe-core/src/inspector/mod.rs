//! Element inspection.
//!
//! Builds a [`StyleSnapshot`] from computed and inline style. The only side
//! effect is token assignment on the element and its hierarchy neighbours.

mod asset;
mod snapshot;

pub use asset::{detect_asset, extract_css_url};
pub use snapshot::{
    AssetInfo, AssetKind, AssetSize, AssetStyle, BoxModel, ColorInfo, Corners, ElementRect,
    GridItem, HierarchyNode, LayoutInfo, Positioning, Relation, Sides, StyleSnapshot, Typography,
};

use crate::color::ColorNormalizer;
use crate::config::ProbeConfig;
use crate::dom::{Dom, class_list, element_id, is_overlay};
use crate::identity::IdentityRegistry;
use crate::tracker::ChangeTracker;
use std::collections::BTreeMap;

/// Properties mirrored into `inlineStyles` when set inline.
pub const INSPECTED_PROPERTIES: &[&str] = &[
    "color",
    "background-color",
    "background-image",
    "border-color",
    "font-family",
    "font-size",
    "font-weight",
    "line-height",
    "letter-spacing",
    "text-align",
    "width",
    "height",
    "padding",
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
    "margin",
    "margin-top",
    "margin-right",
    "margin-bottom",
    "margin-left",
    "border-radius",
    "border-top-left-radius",
    "border-top-right-radius",
    "border-bottom-right-radius",
    "border-bottom-left-radius",
    "border-width",
    "border-style",
    "display",
    "position",
    "top",
    "right",
    "bottom",
    "left",
    "z-index",
    "flex-direction",
    "flex-wrap",
    "justify-content",
    "align-items",
    "gap",
    "row-gap",
    "column-gap",
    "grid-template-columns",
    "grid-template-rows",
    "grid-column",
    "grid-row",
    "grid-area",
    "object-fit",
    "object-position",
    "background-size",
    "background-position",
    "background-repeat",
    "overflow",
    "opacity",
];

const MAX_SELECTOR_DEPTH: usize = 3;
const MAX_SELECTOR_CLASSES: usize = 2;

/// Produces style snapshots.
#[derive(Debug, Clone)]
pub struct Inspector {
    hierarchy_depth: usize,
    hierarchy_children: usize,
    outer_html_limit: usize,
}

impl Inspector {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            hierarchy_depth: config.hierarchy_depth,
            hierarchy_children: config.hierarchy_children,
            outer_html_limit: config.outer_html_limit,
        }
    }

    /// Snapshot `element` as it is right now.
    pub fn inspect<D: Dom>(
        &self,
        dom: &D,
        element: &D::Element,
        registry: &mut IdentityRegistry,
        colors: &mut ColorNormalizer,
        tracker: &ChangeTracker,
    ) -> StyleSnapshot {
        let css = |property: &str| dom.computed_style(element, property);
        let id = registry.id_of(dom, element);
        let rect = dom.bounding_rect(element);
        let display = css("display");

        let background_image = css("background-image");
        let color_info = ColorInfo {
            text: colors.normalize(&css("color")),
            background: colors.normalize(&css("background-color")),
            border: colors.normalize(&css("border-top-color")),
            background_image: match background_image.trim() {
                "" | "none" => None,
                other => Some(other.to_string()),
            },
        };

        let layout = LayoutInfo {
            flex_direction: css("flex-direction"),
            flex_wrap: css("flex-wrap"),
            justify_content: css("justify-content"),
            align_items: css("align-items"),
            gap: css("gap"),
            row_gap: css("row-gap"),
            column_gap: css("column-gap"),
            grid_template_columns: css("grid-template-columns"),
            grid_template_rows: css("grid-template-rows"),
            grid_items: if display.contains("grid") {
                self.grid_items(dom, element, registry)
            } else {
                Vec::new()
            },
        };

        StyleSnapshot {
            selector: build_selector(dom, element),
            outer_html: truncate_chars(&dom.outer_html(element), self.outer_html_limit),
            tag_name: dom.tag_name(element),
            rect: ElementRect {
                width: rect.width(),
                height: rect.height(),
                top: rect.y0,
                left: rect.x0,
            },
            colors: color_info,
            typography: Typography {
                font_family: css("font-family"),
                font_size: css("font-size"),
                font_weight: css("font-weight"),
                line_height: css("line-height"),
                letter_spacing: css("letter-spacing"),
                text_align: css("text-align"),
            },
            box_model: BoxModel {
                padding: sides(dom, element, "padding"),
                margin: sides(dom, element, "margin"),
                border_radius: Corners {
                    top_left: css("border-top-left-radius"),
                    top_right: css("border-top-right-radius"),
                    bottom_right: css("border-bottom-right-radius"),
                    bottom_left: css("border-bottom-left-radius"),
                },
                border_width: css("border-top-width"),
                border_style: css("border-top-style"),
                display,
            },
            position: Positioning {
                position: css("position"),
                top: css("top"),
                right: css("right"),
                bottom: css("bottom"),
                left: css("left"),
                z_index: css("z-index"),
            },
            layout,
            inline_styles: inline_mirror(dom, element),
            asset: detect_asset(dom, element),
            hierarchy: self.hierarchy(dom, element, registry),
            original_styles: tracker.originals(&id),
            id,
        }
    }

    fn grid_items<D: Dom>(
        &self,
        dom: &D,
        container: &D::Element,
        registry: &mut IdentityRegistry,
    ) -> Vec<GridItem> {
        dom.children(container)
            .iter()
            .filter(|child| !is_overlay(dom, child))
            .map(|child| GridItem {
                id: registry.id_of(dom, child),
                column: dom.computed_style(child, "grid-column"),
                row: dom.computed_style(child, "grid-row"),
                area: dom.computed_style(child, "grid-area"),
            })
            .collect()
    }

    /// Ancestors (outermost first), the element itself, then its first children.
    fn hierarchy<D: Dom>(
        &self,
        dom: &D,
        element: &D::Element,
        registry: &mut IdentityRegistry,
    ) -> Vec<HierarchyNode> {
        let mut ancestors = Vec::new();
        let mut current = dom.parent(element);
        while let Some(node) = current {
            if ancestors.len() >= self.hierarchy_depth || is_root_container(dom, &node) {
                break;
            }
            current = dom.parent(&node);
            ancestors.push(node);
        }
        ancestors.reverse();

        let own_depth = ancestors.len();
        let mut nodes: Vec<HierarchyNode> = ancestors
            .iter()
            .enumerate()
            .map(|(depth, node)| hierarchy_node(dom, node, registry, Relation::Ancestor, depth))
            .collect();
        nodes.push(hierarchy_node(dom, element, registry, Relation::Current, own_depth));
        nodes.extend(
            dom.children(element)
                .iter()
                .filter(|child| !is_overlay(dom, child))
                .take(self.hierarchy_children)
                .map(|child| hierarchy_node(dom, child, registry, Relation::Child, own_depth + 1)),
        );
        nodes
    }
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new(&ProbeConfig::default())
    }
}

fn is_root_container<D: Dom>(dom: &D, element: &D::Element) -> bool {
    matches!(dom.tag_name(element).as_str(), "body" | "html")
}

fn hierarchy_node<D: Dom>(
    dom: &D,
    element: &D::Element,
    registry: &mut IdentityRegistry,
    relation: Relation,
    depth: usize,
) -> HierarchyNode {
    let label = element_id(dom, element)
        .map(|id| format!("#{}", id))
        .or_else(|| class_list(dom, element).first().map(|c| format!(".{}", c)))
        .unwrap_or_default();
    HierarchyNode {
        id: registry.id_of(dom, element),
        tag_name: dom.tag_name(element),
        label,
        relation,
        depth,
    }
}

fn sides<D: Dom>(dom: &D, element: &D::Element, prefix: &str) -> Sides {
    let side = |name: &str| dom.computed_style(element, &format!("{}-{}", prefix, name));
    Sides {
        top: side("top"),
        right: side("right"),
        bottom: side("bottom"),
        left: side("left"),
    }
}

fn inline_mirror<D: Dom>(dom: &D, element: &D::Element) -> BTreeMap<String, String> {
    INSPECTED_PROPERTIES
        .iter()
        .filter_map(|property| {
            let value = dom.inline_style(element, property);
            (!value.is_empty()).then(|| (property.to_string(), value))
        })
        .collect()
}

/// Best-effort selector: `#id` anchors, otherwise `tag.class` steps joined
/// with ` > ` up to three levels.
pub fn build_selector<D: Dom>(dom: &D, element: &D::Element) -> String {
    let mut steps = Vec::new();
    let mut current = Some(element.clone());
    while let Some(node) = current {
        if let Some(id) = element_id(dom, &node) {
            steps.push(format!("#{}", css_escape(&id)));
            break;
        }
        let tag = dom.tag_name(&node);
        if is_root_container(dom, &node) {
            if steps.is_empty() {
                steps.push(tag);
            }
            break;
        }
        let mut step = tag;
        for class in class_list(dom, &node).iter().take(MAX_SELECTOR_CLASSES) {
            step.push('.');
            step.push_str(&css_escape(class));
        }
        steps.push(step);
        if steps.len() >= MAX_SELECTOR_DEPTH {
            break;
        }
        current = dom.parent(&node);
    }
    steps.reverse();
    steps.join(" > ")
}

/// Escape characters that are not valid in a bare CSS identifier.
fn css_escape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    for (i, ch) in ident.chars().enumerate() {
        let plain = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii();
        if plain && !(i == 0 && ch.is_ascii_digit()) {
            out.push(ch);
        } else if ch.is_ascii_digit() {
            out.push_str(&format!("\\3{} ", ch));
        } else {
            out.push('\\');
            out.push(ch);
        }
    }
    out
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
