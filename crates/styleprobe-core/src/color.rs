//! Color normalization.
//!
//! Every color that reaches the panel is either `#RRGGBB` or the literal
//! `transparent`. Resolution is delegated to a [`ColorRaster`]: paint the
//! color into a single pixel and read the pixel back, so whatever syntax the
//! platform understands is understood here. Partial alpha is dropped; only a
//! fully transparent pixel maps to `transparent`.

use peniko::color::{Srgb, parse_color};
use std::collections::HashMap;

/// Sentinel for fully transparent colors.
pub const TRANSPARENT: &str = "transparent";

/// Paints a CSS color into one pixel and reads it back as RGBA.
pub trait ColorRaster {
    /// `None` when the platform cannot resolve the color.
    fn rasterize(&self, css: &str) -> Option<[u8; 4]>;
}

/// Rasterizer backed by the `peniko` color parser.
///
/// Used headless and as a fallback when no drawing surface is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParsedColorRaster;

impl ColorRaster for ParsedColorRaster {
    fn rasterize(&self, css: &str) -> Option<[u8; 4]> {
        let parsed = parse_color(&css.trim().to_ascii_lowercase()).ok()?;
        let rgba = parsed.to_alpha_color::<Srgb>().to_rgba8();
        Some([rgba.r, rgba.g, rgba.b, rgba.a])
    }
}

/// Normalizes CSS colors to canonical hex, memoizing per input string.
pub struct ColorNormalizer {
    raster: Box<dyn ColorRaster>,
    cache: HashMap<String, Option<String>>,
}

impl ColorNormalizer {
    pub fn new(raster: Box<dyn ColorRaster>) -> Self {
        Self {
            raster,
            cache: HashMap::new(),
        }
    }

    /// Canonical `#RRGGBB` (upper-case) or `transparent`.
    pub fn normalize(&mut self, css: &str) -> String {
        self.resolve(css).unwrap_or_else(|| TRANSPARENT.to_string())
    }

    /// Like [`normalize`](Self::normalize), but `None` when the raster
    /// cannot resolve the color.
    pub fn resolve(&mut self, css: &str) -> Option<String> {
        let css = css.trim();
        if is_trivially_transparent(css) {
            return Some(TRANSPARENT.to_string());
        }
        if let Some(hit) = self.cache.get(css) {
            return hit.clone();
        }
        let resolved = self.raster.rasterize(css).map(|pixel| match pixel {
            [_, _, _, 0] => TRANSPARENT.to_string(),
            [r, g, b, _] => format!("#{:02X}{:02X}{:02X}", r, g, b),
        });
        self.cache.insert(css.to_string(), resolved.clone());
        resolved
    }
}

impl Default for ColorNormalizer {
    fn default() -> Self {
        Self::new(Box::new(ParsedColorRaster))
    }
}

impl std::fmt::Debug for ColorNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorNormalizer")
            .field("cached", &self.cache.len())
            .finish()
    }
}

/// Empty, `transparent`, or a functional form with a zero alpha channel.
fn is_trivially_transparent(css: &str) -> bool {
    if css.is_empty() || css.eq_ignore_ascii_case(TRANSPARENT) {
        return true;
    }
    let lower = css.to_ascii_lowercase();
    let Some(open) = lower.find('(') else {
        return false;
    };
    let name = &lower[..open];
    if !matches!(name, "rgba" | "rgb" | "hsla" | "hsl") || !lower.ends_with(')') {
        return false;
    }
    let args = &lower[open + 1..lower.len() - 1];
    let parts: Vec<&str> = args
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();
    if parts.len() != 4 {
        return false;
    }
    let alpha = parts[3].trim_end_matches('%');
    alpha.parse::<f64>().map(|a| a == 0.0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingRaster {
        calls: Rc<Cell<usize>>,
        pixel: Option<[u8; 4]>,
    }

    impl ColorRaster for CountingRaster {
        fn rasterize(&self, _css: &str) -> Option<[u8; 4]> {
            self.calls.set(self.calls.get() + 1);
            self.pixel
        }
    }

    #[test]
    fn test_named_color() {
        let mut normalizer = ColorNormalizer::default();
        assert_eq!(normalizer.normalize("red"), "#FF0000");
        assert_eq!(normalizer.normalize("White"), "#FFFFFF");
    }

    #[test]
    fn test_functional_forms() {
        let mut normalizer = ColorNormalizer::default();
        assert_eq!(normalizer.normalize("rgb(17, 34, 51)"), "#112233");
        assert_eq!(normalizer.normalize("#112233"), "#112233");
        assert_eq!(normalizer.normalize("#abc"), "#AABBCC");
    }

    #[test]
    fn test_transparent_forms() {
        let mut normalizer = ColorNormalizer::default();
        assert_eq!(normalizer.normalize("transparent"), TRANSPARENT);
        assert_eq!(normalizer.normalize("rgba(0,0,0,0)"), TRANSPARENT);
        assert_eq!(normalizer.normalize("rgba(0, 0, 0, 0)"), TRANSPARENT);
        assert_eq!(normalizer.normalize("rgb(10 20 30 / 0)"), TRANSPARENT);
        assert_eq!(normalizer.normalize(""), TRANSPARENT);
        assert_eq!(normalizer.normalize("   "), TRANSPARENT);
    }

    #[test]
    fn test_partial_alpha_is_dropped() {
        let mut normalizer = ColorNormalizer::default();
        assert_eq!(normalizer.normalize("rgba(255, 0, 0, 0.5)"), "#FF0000");
    }

    #[test]
    fn test_unresolvable_is_transparent() {
        let mut normalizer = ColorNormalizer::default();
        assert_eq!(normalizer.normalize("not-a-color"), TRANSPARENT);
        assert_eq!(normalizer.resolve("not-a-color"), None);
        assert_eq!(normalizer.resolve("var(--brand)"), None);
        assert_eq!(normalizer.resolve("red").as_deref(), Some("#FF0000"));
    }

    #[test]
    fn test_results_are_memoized() {
        let calls = Rc::new(Cell::new(0));
        let mut normalizer = ColorNormalizer::new(Box::new(CountingRaster {
            calls: calls.clone(),
            pixel: Some([1, 2, 3, 255]),
        }));

        assert_eq!(normalizer.normalize("papayawhip"), "#010203");
        assert_eq!(normalizer.normalize("papayawhip"), "#010203");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_zero_alpha_pixel_is_transparent() {
        let calls = Rc::new(Cell::new(0));
        let mut normalizer = ColorNormalizer::new(Box::new(CountingRaster {
            calls,
            pixel: Some([9, 9, 9, 0]),
        }));
        assert_eq!(normalizer.normalize("color(srgb 0 0 0 / 0)"), TRANSPARENT);
    }
}
