//! Page-wide scans: typography and color usage, asset gallery.

use crate::color::{ColorNormalizer, TRANSPARENT};
use crate::config::ProbeConfig;
use crate::dom::{Dom, is_overlay};
use crate::identity::IdentityRegistry;
use crate::inspector::{AssetKind, AssetSize, detect_asset};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How often a value occurs on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub title: String,
    pub url: String,
    pub total_elements: usize,
    pub sampled_elements: usize,
}

/// Aggregate font and color usage, most frequent first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOverview {
    pub fonts: Vec<UsageCount>,
    pub bg_colors: Vec<UsageCount>,
    pub text_colors: Vec<UsageCount>,
    pub meta: PageMeta,
}

/// One gallery entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    /// Element token.
    pub id: String,
    pub kind: AssetKind,
    pub url: Option<String>,
    pub natural_size: Option<AssetSize>,
    pub rendered_size: AssetSize,
    /// Markup of inline SVGs, for download.
    pub markup: Option<String>,
}

/// Frequency counter preserving first-seen order for ties.
#[derive(Default)]
struct Tally {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Tally {
    fn add(&mut self, value: String) {
        if value.is_empty() {
            return;
        }
        match self.counts.get_mut(&value) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(value.clone(), 1);
                self.order.push(value);
            }
        }
    }

    fn into_sorted(mut self) -> Vec<UsageCount> {
        let mut usage: Vec<UsageCount> = self
            .order
            .into_iter()
            .map(|value| {
                let count = self.counts.remove(&value).unwrap_or(0);
                UsageCount { value, count }
            })
            .collect();
        // Stable sort keeps first-seen order among equal counts.
        usage.sort_by(|a, b| b.count.cmp(&a.count));
        usage
    }
}

/// Runs page scans with the configured limits.
#[derive(Debug, Clone)]
pub struct Scanner {
    sample_limit: usize,
    min_asset_size: f64,
}

impl Scanner {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            sample_limit: config.scan_sample_limit,
            min_asset_size: config.min_asset_size,
        }
    }

    /// Tally fonts and colors over a prefix of the document.
    ///
    /// Elements are fetched one at a time and the walk stops after
    /// `sample_limit` non-overlay elements, so large pages cost no more than
    /// small ones. `totalElements` is the document's element count.
    pub fn scan_overview<D: Dom>(&self, dom: &D, colors: &mut ColorNormalizer) -> PageOverview {
        let total = dom.element_count();
        let mut fonts = Tally::default();
        let mut backgrounds = Tally::default();
        let mut texts = Tally::default();
        let mut sampled = 0;

        let samples = (0..total)
            .map_while(|index| dom.element_at(index))
            .filter(|element| !is_overlay(dom, element))
            .take(self.sample_limit);
        for element in samples {
            sampled += 1;
            fonts.add(primary_font(&dom.computed_style(&element, "font-family")));

            let background = colors.normalize(&dom.computed_style(&element, "background-color"));
            if background != TRANSPARENT {
                backgrounds.add(background);
            }
            let text = colors.normalize(&dom.computed_style(&element, "color"));
            if text != TRANSPARENT {
                texts.add(text);
            }
        }

        log::debug!("Overview scan sampled {} of {} elements", sampled, total);
        PageOverview {
            fonts: fonts.into_sorted(),
            bg_colors: backgrounds.into_sorted(),
            text_colors: texts.into_sorted(),
            meta: PageMeta {
                title: dom.title(),
                url: dom.url(),
                total_elements: total,
                sampled_elements: sampled,
            },
        }
    }

    /// Every visible asset on the page.
    ///
    /// Images and backgrounds are de-duplicated by URL; inline SVGs are
    /// always distinct. Elements smaller than the minimum size are skipped.
    pub fn scan_assets<D: Dom>(&self, dom: &D, registry: &mut IdentityRegistry) -> Vec<AssetEntry> {
        let mut seen_urls = HashSet::new();
        let mut entries = Vec::new();

        for element in dom.all_elements() {
            if is_overlay(dom, &element) {
                continue;
            }
            let Some(asset) = detect_asset(dom, &element) else {
                continue;
            };
            if asset.rendered_size.width < self.min_asset_size
                || asset.rendered_size.height < self.min_asset_size
            {
                continue;
            }
            if let Some(url) = &asset.url {
                if asset.kind != AssetKind::Svg && !seen_urls.insert(url.clone()) {
                    continue;
                }
            }
            let markup = (asset.kind == AssetKind::Svg).then(|| dom.outer_html(&element));
            entries.push(AssetEntry {
                id: registry.id_of(dom, &element),
                kind: asset.kind,
                url: asset.url,
                natural_size: asset.natural_size,
                rendered_size: asset.rendered_size,
                markup,
            });
        }
        log::debug!("Asset scan found {} entries", entries.len());
        entries
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(&ProbeConfig::default())
    }
}

/// First family of a `font-family` list, unquoted.
fn primary_font(families: &str) -> String {
    families
        .split(',')
        .next()
        .map(|family| family.trim().trim_matches(|c| c == '"' || c == '\'').trim())
        .unwrap_or_default()
        .to_string()
}
