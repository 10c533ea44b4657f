//! Inline style mutation with a write-once ledger of original values.

use crate::dom::{Dom, IMPORTANT};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Inline value and priority a property had before its first tracked write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OriginalValue {
    pub value: String,
    pub priority: String,
}

/// A batch of property edits. `None` removes the inline property.
///
/// Property names are normalized to kebab-case on construction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyleEdits {
    entries: Vec<(String, Option<String>)>,
}

impl StyleEdits {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single property edit.
    pub fn single(property: &str, value: Option<&str>) -> Self {
        let mut edits = Self::new();
        edits.push(property, value.map(str::to_string));
        edits
    }

    /// Edits from a wire map. Strings pass through, numbers and booleans are
    /// stringified, `null` removes the property.
    pub fn from_json_map(map: &BTreeMap<String, Value>) -> Self {
        let mut edits = Self::new();
        for (property, value) in map {
            let value = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(number_to_css(n)),
                other => Some(other.to_string()),
            };
            edits.push(property, value);
        }
        edits
    }

    /// Append an edit; a later edit of the same property replaces the earlier.
    pub fn push(&mut self, property: &str, value: Option<String>) {
        let property = to_kebab_case(property);
        if property.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|(key, _)| *key == property) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((property, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for StyleEdits {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut edits = Self::new();
        for (key, value) in iter {
            edits.push(key.as_ref(), Some(value.as_ref().to_string()));
        }
        edits
    }
}

/// Per-element ledger of original inline values, keyed by element token.
///
/// The ledger lives as long as the page; entries are never evicted.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    ledger: HashMap<String, BTreeMap<String, OriginalValue>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `edits` as `!important` inline styles.
    ///
    /// The first write of each property records its prior inline value.
    /// Returns `false` without touching anything if the element is detached.
    pub fn apply_change<D: Dom>(
        &mut self,
        dom: &D,
        element: &D::Element,
        token: &str,
        edits: &StyleEdits,
    ) -> bool {
        if !dom.is_connected(element) {
            log::debug!("Ignoring style change on detached element {}", token);
            return false;
        }
        let originals = self.ledger.entry(token.to_string()).or_default();
        for (property, value) in edits.iter() {
            originals
                .entry(property.to_string())
                .or_insert_with(|| OriginalValue {
                    value: dom.inline_style(element, property),
                    priority: dom.inline_priority(element, property),
                });

            match value.map(strip_important).filter(|v| !v.is_empty()) {
                Some(value) => dom.set_inline_style(element, property, value, IMPORTANT),
                None => dom.remove_inline_style(element, property),
            }
            if affects_layout(property) {
                dom.flush_layout(element);
            }
        }
        true
    }

    /// Restore the recorded original of one property.
    ///
    /// The original stays recorded, so apply/revert can alternate freely.
    /// Returns `false` if the element is detached or the property was never
    /// changed.
    pub fn revert_change<D: Dom>(
        &self,
        dom: &D,
        element: &D::Element,
        token: &str,
        property: &str,
    ) -> bool {
        if !dom.is_connected(element) {
            return false;
        }
        let property = to_kebab_case(property);
        let Some(original) = self.ledger.get(token).and_then(|o| o.get(&property)) else {
            return false;
        };
        restore(dom, element, &property, original);
        true
    }

    /// Restore every recorded property of an element.
    pub fn revert_all<D: Dom>(&self, dom: &D, element: &D::Element, token: &str) -> bool {
        if !dom.is_connected(element) {
            return false;
        }
        let Some(originals) = self.ledger.get(token) else {
            return false;
        };
        for (property, original) in originals {
            restore(dom, element, property, original);
        }
        true
    }

    /// Original values of every property changed on an element.
    pub fn originals(&self, token: &str) -> BTreeMap<String, String> {
        self.ledger
            .get(token)
            .map(|originals| {
                originals
                    .iter()
                    .map(|(key, original)| (key.clone(), original.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of elements with at least one tracked property.
    pub fn tracked_elements(&self) -> usize {
        self.ledger.len()
    }
}

fn restore<D: Dom>(dom: &D, element: &D::Element, property: &str, original: &OriginalValue) {
    if original.value.is_empty() {
        dom.remove_inline_style(element, property);
    } else {
        dom.set_inline_style(element, property, &original.value, &original.priority);
    }
    if affects_layout(property) {
        dom.flush_layout(element);
    }
}

/// Properties whose change may not be repainted until layout is read.
fn affects_layout(property: &str) -> bool {
    property == "display"
        || property.starts_with("grid")
        || property.starts_with("flex")
        || property.ends_with("gap")
}

/// `8.0` arriving from JS is still the integer `8`.
fn number_to_css(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

fn strip_important(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_suffix("!important")
        .map(str::trim_end)
        .unwrap_or(value)
}

/// Vendor prefixes CSSOM also accepts in lower camelCase.
const VENDOR_PREFIXES: [&str; 3] = ["webkit-", "moz-", "ms-"];

/// Normalize a property name to lower kebab-case.
///
/// `backgroundColor` → `background-color`, `WebkitTransform` and
/// `webkitTransform` → `-webkit-transform`, `msFlex` → `-ms-flex`. Custom
/// properties are kept verbatim.
pub fn to_kebab_case(name: &str) -> String {
    let name = name.trim();
    if name.starts_with("--") {
        return name.to_string();
    }
    if !name.chars().any(|c| c.is_ascii_lowercase()) {
        return name.to_ascii_lowercase();
    }
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    if VENDOR_PREFIXES.iter().any(|prefix| out.starts_with(prefix)) {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;

    fn setup() -> (MemoryDom, crate::dom::NodeId) {
        let dom = MemoryDom::new();
        let div = dom.create_element(dom.body().unwrap(), "div");
        (dom, div)
    }

    #[test]
    fn test_kebab_case() {
        assert_eq!(to_kebab_case("backgroundColor"), "background-color");
        assert_eq!(to_kebab_case("background-color"), "background-color");
        assert_eq!(to_kebab_case("WebkitTransform"), "-webkit-transform");
        assert_eq!(to_kebab_case("msFlex"), "-ms-flex");
        assert_eq!(to_kebab_case("webkitTransform"), "-webkit-transform");
        assert_eq!(to_kebab_case("mozAppearance"), "-moz-appearance");
        assert_eq!(to_kebab_case("MozAppearance"), "-moz-appearance");
        assert_eq!(to_kebab_case("-webkit-line-clamp"), "-webkit-line-clamp");
        assert_eq!(to_kebab_case("--brandColor"), "--brandColor");
        assert_eq!(to_kebab_case("COLOR"), "color");
        assert_eq!(to_kebab_case("someFutureProp"), "some-future-prop");
    }

    #[test]
    fn test_apply_sets_important_inline() {
        let (dom, div) = setup();
        let mut tracker = ChangeTracker::new();

        assert!(tracker.apply_change(&dom, &div, "t1", &StyleEdits::single("backgroundColor", Some("#112233"))));

        assert_eq!(dom.inline_style(&div, "background-color"), "#112233");
        assert_eq!(dom.inline_priority(&div, "background-color"), "important");
    }

    #[test]
    fn test_revert_round_trip() {
        let (dom, div) = setup();
        dom.set_inline_style(&div, "color", "rgb(1, 2, 3)", "");
        let mut tracker = ChangeTracker::new();

        tracker.apply_change(&dom, &div, "t1", &StyleEdits::single("color", Some("red")));
        assert_eq!(dom.inline_style(&div, "color"), "red");

        assert!(tracker.revert_change(&dom, &div, "t1", "color"));
        assert_eq!(dom.inline_style(&div, "color"), "rgb(1, 2, 3)");
        assert_eq!(dom.inline_priority(&div, "color"), "");
    }

    #[test]
    fn test_revert_removes_when_original_empty() {
        let (dom, div) = setup();
        let mut tracker = ChangeTracker::new();

        tracker.apply_change(&dom, &div, "t1", &StyleEdits::single("margin-top", Some("4px")));
        tracker.revert_change(&dom, &div, "t1", "marginTop");

        assert_eq!(dom.inline_style(&div, "margin-top"), "");
    }

    #[test]
    fn test_original_written_once() {
        let (dom, div) = setup();
        dom.set_inline_style(&div, "width", "10px", "");
        let mut tracker = ChangeTracker::new();

        tracker.apply_change(&dom, &div, "t1", &StyleEdits::single("width", Some("20px")));
        tracker.apply_change(&dom, &div, "t1", &StyleEdits::single("width", Some("30px")));

        assert_eq!(tracker.originals("t1").get("width").map(String::as_str), Some("10px"));
        assert_eq!(dom.inline_style(&div, "width"), "30px");
    }

    #[test]
    fn test_repeated_toggles_stay_correct() {
        let (dom, div) = setup();
        dom.set_inline_style(&div, "opacity", "0.5", "");
        let mut tracker = ChangeTracker::new();

        for value in ["1", "0.2", "0.8"] {
            tracker.apply_change(&dom, &div, "t1", &StyleEdits::single("opacity", Some(value)));
            tracker.revert_change(&dom, &div, "t1", "opacity");
            assert_eq!(dom.inline_style(&div, "opacity"), "0.5");
        }
    }

    #[test]
    fn test_empty_value_removes_property() {
        let (dom, div) = setup();
        dom.set_inline_style(&div, "color", "blue", "");
        let mut tracker = ChangeTracker::new();

        tracker.apply_change(&dom, &div, "t1", &StyleEdits::single("color", Some("")));
        assert_eq!(dom.inline_style(&div, "color"), "");

        // The recorded original is still the pre-edit value.
        assert_eq!(tracker.originals("t1").get("color").map(String::as_str), Some("blue"));
    }

    #[test]
    fn test_layout_properties_flush() {
        let (dom, div) = setup();
        let mut tracker = ChangeTracker::new();
        let edits: StyleEdits = [("gridTemplateColumns", "1fr 1fr"), ("color", "red"), ("gap", "4px")]
            .into_iter()
            .collect();

        tracker.apply_change(&dom, &div, "t1", &edits);
        assert_eq!(dom.layout_flushes(), 2);
    }

    #[test]
    fn test_important_suffix_is_stripped() {
        let (dom, div) = setup();
        let mut tracker = ChangeTracker::new();
        tracker.apply_change(&dom, &div, "t1", &StyleEdits::single("color", Some("red !important")));
        assert_eq!(dom.inline_style(&div, "color"), "red");
    }

    #[test]
    fn test_detached_is_noop() {
        let (dom, div) = setup();
        dom.detach(div);
        let mut tracker = ChangeTracker::new();

        assert!(!tracker.apply_change(&dom, &div, "t1", &StyleEdits::single("color", Some("red"))));
        assert!(!tracker.revert_change(&dom, &div, "t1", "color"));
        assert!(tracker.originals("t1").is_empty());
    }

    #[test]
    fn test_revert_untracked_property() {
        let (dom, div) = setup();
        let tracker = ChangeTracker::new();
        assert!(!tracker.revert_change(&dom, &div, "t1", "color"));
        assert!(!tracker.revert_all(&dom, &div, "t1"));
    }

    #[test]
    fn test_revert_all() {
        let (dom, div) = setup();
        dom.set_inline_style(&div, "color", "green", "important");
        let mut tracker = ChangeTracker::new();
        let edits: StyleEdits = [("color", "red"), ("paddingLeft", "8px")].into_iter().collect();
        tracker.apply_change(&dom, &div, "t1", &edits);

        assert!(tracker.revert_all(&dom, &div, "t1"));
        assert_eq!(dom.inline_style(&div, "color"), "green");
        assert_eq!(dom.inline_priority(&div, "color"), "important");
        assert_eq!(dom.inline_style(&div, "padding-left"), "");
    }

    #[test]
    fn test_json_map_values() {
        let mut map = BTreeMap::new();
        map.insert("zIndex".to_string(), serde_json::json!(10));
        map.insert("color".to_string(), serde_json::json!("red"));
        map.insert("margin".to_string(), Value::Null);
        map.insert("opacity".to_string(), serde_json::json!(0.5));
        map.insert("order".to_string(), serde_json::json!(2.0));

        let edits = StyleEdits::from_json_map(&map);
        let collected: Vec<_> = edits.iter().collect();
        assert_eq!(
            collected,
            vec![
                ("color", Some("red")),
                ("margin", None),
                ("opacity", Some("0.5")),
                ("order", Some("2")),
                ("z-index", Some("10")),
            ]
        );
    }
}
