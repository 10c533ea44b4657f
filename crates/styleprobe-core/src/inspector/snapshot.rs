//! Style snapshot wire types.
//!
//! A snapshot is built fresh for every reply and never mutated in the
//! content script. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSnapshot {
    /// Element token.
    pub id: String,
    pub tag_name: String,
    pub selector: String,
    /// Truncated outerHTML preview.
    pub outer_html: String,
    pub rect: ElementRect,
    pub colors: ColorInfo,
    pub typography: Typography,
    pub box_model: BoxModel,
    pub position: Positioning,
    pub layout: LayoutInfo,
    pub inline_styles: BTreeMap<String, String>,
    pub asset: Option<AssetInfo>,
    pub hierarchy: Vec<HierarchyNode>,
    pub original_styles: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementRect {
    pub width: f64,
    pub height: f64,
    pub top: f64,
    pub left: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorInfo {
    pub text: String,
    pub background: String,
    pub border: String,
    pub background_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typography {
    pub font_family: String,
    pub font_size: String,
    pub font_weight: String,
    pub line_height: String,
    pub letter_spacing: String,
    pub text_align: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sides {
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Corners {
    pub top_left: String,
    pub top_right: String,
    pub bottom_right: String,
    pub bottom_left: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxModel {
    pub padding: Sides,
    pub margin: Sides,
    pub border_radius: Corners,
    pub border_width: String,
    pub border_style: String,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Positioning {
    pub position: String,
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
    pub z_index: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutInfo {
    pub flex_direction: String,
    pub flex_wrap: String,
    pub justify_content: String,
    pub align_items: String,
    pub gap: String,
    pub row_gap: String,
    pub column_gap: String,
    pub grid_template_columns: String,
    pub grid_template_rows: String,
    pub grid_items: Vec<GridItem>,
}

/// Placement of one child of a grid container.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridItem {
    pub id: String,
    pub column: String,
    pub row: String,
    pub area: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Image,
    Background,
    #[serde(rename = "SVG")]
    Svg,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub kind: AssetKind,
    pub url: Option<String>,
    pub natural_size: Option<AssetSize>,
    pub rendered_size: AssetSize,
    pub style: AssetStyle,
}

/// Style properties relevant to how an asset is presented.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetStyle {
    pub object_fit: String,
    pub object_position: String,
    pub background_size: String,
    pub background_position: String,
    pub background_repeat: String,
    pub overflow: String,
    pub opacity: String,
    pub border_radius: String,
    pub z_index: String,
    pub position: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    #[serde(rename = "self")]
    Current,
    Ancestor,
    Child,
}

/// One row of the shallow hierarchy tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    pub id: String,
    pub tag_name: String,
    /// `#id` or `.first-class`, empty when neither exists.
    pub label: String,
    pub relation: Relation,
    /// Indentation level, 0 for the outermost ancestor.
    pub depth: usize,
}
