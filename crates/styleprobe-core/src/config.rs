//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object (or no object at all)
//! yields the stock behaviour. The browser entry points deserialize this
//! from an optional JS object passed by the bootstrap script.

use serde::{Deserialize, Serialize};

#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

#[cfg(target_arch = "wasm32")]
use web_time::Duration;

/// Default number of elements sampled by the page overview scan.
pub const DEFAULT_SCAN_SAMPLE_LIMIT: usize = 800;
/// Default number of ancestors included in a snapshot hierarchy.
pub const DEFAULT_HIERARCHY_DEPTH: usize = 5;
/// Default number of direct children included in a snapshot hierarchy.
pub const DEFAULT_HIERARCHY_CHILDREN: usize = 5;
/// Default minimum rendered width and height of a reported asset.
pub const DEFAULT_MIN_ASSET_SIZE: f64 = 10.0;
/// Default outerHTML preview length, in characters.
pub const DEFAULT_OUTER_HTML_LIMIT: usize = 200;
/// Default grace delay before the last detaching panel stops picking.
pub const DEFAULT_DETACH_GRACE_MS: u64 = 150;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeConfig {
    pub scan_sample_limit: usize,
    pub hierarchy_depth: usize,
    pub hierarchy_children: usize,
    pub min_asset_size: f64,
    pub outer_html_limit: usize,
    pub detach_grace_ms: u64,
    /// `log` level name used by the browser entry points.
    pub log_level: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            scan_sample_limit: DEFAULT_SCAN_SAMPLE_LIMIT,
            hierarchy_depth: DEFAULT_HIERARCHY_DEPTH,
            hierarchy_children: DEFAULT_HIERARCHY_CHILDREN,
            min_asset_size: DEFAULT_MIN_ASSET_SIZE,
            outer_html_limit: DEFAULT_OUTER_HTML_LIMIT,
            detach_grace_ms: DEFAULT_DETACH_GRACE_MS,
            log_level: "info".to_string(),
        }
    }
}

impl ProbeConfig {
    /// Grace delay as a [`Duration`].
    pub fn detach_grace(&self) -> Duration {
        Duration::from_millis(self.detach_grace_ms)
    }

    /// Parsed log level, falling back to `Info` for unknown names.
    pub fn log_level(&self) -> log::Level {
        self.log_level.parse().unwrap_or(log::Level::Info)
    }
}
