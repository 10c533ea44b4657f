//! Asset detection.

use super::snapshot::{AssetInfo, AssetKind, AssetSize, AssetStyle};
use crate::dom::Dom;

/// Classify an element as an asset.
///
/// Precedence: `<img>` with a source, then a `url()` background image,
/// then an inline `<svg>` root.
pub fn detect_asset<D: Dom>(dom: &D, element: &D::Element) -> Option<AssetInfo> {
    let tag = dom.tag_name(element);
    let (kind, url) = if let Some(src) = dom.image_source(element).filter(|_| tag == "img") {
        (AssetKind::Image, Some(src))
    } else if let Some(url) = extract_css_url(&dom.computed_style(element, "background-image")) {
        (AssetKind::Background, Some(url))
    } else if tag == "svg" && is_svg_root(dom, element) {
        (AssetKind::Svg, None)
    } else {
        return None;
    };

    let rect = dom.bounding_rect(element);
    let natural_size = match kind {
        AssetKind::Image => dom
            .natural_size(element)
            .filter(|size| size.width > 0.0 && size.height > 0.0)
            .map(|size| AssetSize {
                width: size.width,
                height: size.height,
            }),
        _ => None,
    };
    Some(AssetInfo {
        kind,
        url,
        natural_size,
        rendered_size: AssetSize {
            width: rect.width(),
            height: rect.height(),
        },
        style: asset_style(dom, element),
    })
}

fn asset_style<D: Dom>(dom: &D, element: &D::Element) -> AssetStyle {
    let css = |property: &str| dom.computed_style(element, property);
    AssetStyle {
        object_fit: css("object-fit"),
        object_position: css("object-position"),
        background_size: css("background-size"),
        background_position: css("background-position"),
        background_repeat: css("background-repeat"),
        overflow: css("overflow"),
        opacity: css("opacity"),
        border_radius: css("border-top-left-radius"),
        z_index: css("z-index"),
        position: css("position"),
    }
}

/// An `<svg>` not nested inside another `<svg>`.
fn is_svg_root<D: Dom>(dom: &D, element: &D::Element) -> bool {
    let mut current = dom.parent(element);
    while let Some(node) = current {
        if dom.tag_name(&node) == "svg" {
            return false;
        }
        current = dom.parent(&node);
    }
    true
}

/// First URL of a CSS image value, tolerating quoted and bare forms.
///
/// `url("a.png")`, `url('a.png')` and `url(a.png)` all yield `a.png`;
/// `none` and gradients yield `None`.
pub fn extract_css_url(value: &str) -> Option<String> {
    let lower = value.to_ascii_lowercase();
    let start = lower.find("url(")? + 4;
    let end = start + value[start..].find(')')?;
    let url = value[start..end]
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}
