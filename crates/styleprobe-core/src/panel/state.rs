//! Panel tool state.
//!
//! A synchronous reducer: replies and browser events go in, the cached view
//! of the inspected page comes out. All I/O lives in [`super::PanelStore`].

use crate::color::ColorNormalizer;
use crate::inspector::{ColorInfo, StyleSnapshot};
use crate::protocol::{Command, PageEvent};
use crate::scanner::{AssetEntry, PageOverview};
use crate::tracker::{StyleEdits, to_kebab_case};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Browser tab id.
pub type TabId = i32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

/// Panel tool view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Inspect,
    Assets,
    Overview,
    Export,
}

/// Connection to the watched tab's content script.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Connected,
    Restricted,
    Failed(String),
}

/// An optimistic edit awaiting its authoritative snapshot.
#[derive(Debug, Clone)]
struct PendingEdit {
    id: u64,
    token: String,
    edits: StyleEdits,
    /// Inline values before the edit, `None` when unset.
    inline_before: Vec<(String, Option<String>)>,
    colors_before: ColorInfo,
}

#[derive(Debug, Default)]
pub struct PanelState {
    tab: Option<TabInfo>,
    selected: Option<StyleSnapshot>,
    pending: Vec<PendingEdit>,
    picking: bool,
    view: View,
    status: ConnectionStatus,
    overview: Option<PageOverview>,
    assets: Option<Vec<AssetEntry>>,
    next_edit: u64,
    /// Bumped on every reset; replies from an older epoch are stale.
    epoch: u64,
    /// Canonicalizes optimistic color edits.
    normalizer: ColorNormalizer,
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tab(&self) -> Option<&TabInfo> {
        self.tab.as_ref()
    }

    pub fn selected(&self) -> Option<&StyleSnapshot> {
        self.selected.as_ref()
    }

    pub fn selected_token(&self) -> Option<&str> {
        self.selected.as_ref().map(|snapshot| snapshot.id.as_str())
    }

    pub fn is_picking(&self) -> bool {
        self.picking
    }

    pub fn set_picking(&mut self, picking: bool) {
        self.picking = picking;
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    pub fn overview(&self) -> Option<&PageOverview> {
        self.overview.as_ref()
    }

    pub fn set_overview(&mut self, overview: PageOverview) {
        self.overview = Some(overview);
    }

    pub fn assets(&self) -> Option<&[AssetEntry]> {
        self.assets.as_deref()
    }

    pub fn set_assets(&mut self, assets: Vec<AssetEntry>) {
        self.assets = Some(assets);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Replace the selection with an authoritative snapshot.
    ///
    /// Clears pending edits for the previous selection.
    pub fn select(&mut self, snapshot: Option<StyleSnapshot>) {
        self.pending.clear();
        self.selected = snapshot;
    }

    /// Drop everything tied to the page currently shown.
    pub fn reset(&mut self) {
        self.selected = None;
        self.pending.clear();
        self.picking = false;
        self.overview = None;
        self.assets = None;
        self.status = ConnectionStatus::Unknown;
        self.epoch += 1;
    }

    /// The user switched tabs.
    ///
    /// Returns a `STOP_PICKING` addressed to the previous tab when pick mode
    /// was active there. Nothing is ever addressed to the new tab.
    pub fn on_tab_activated(&mut self, tab: TabInfo) -> Option<(TabInfo, Command)> {
        if self.tab.as_ref().is_some_and(|current| current.id == tab.id) {
            self.tab = Some(tab);
            return None;
        }
        let was_picking = self.picking;
        let previous = self.tab.replace(tab);
        self.reset();
        log::debug!("Tab switch from {:?}", previous.as_ref().map(|t| t.id));
        previous
            .filter(|_| was_picking)
            .map(|previous| (previous, Command::StopPicking))
    }

    /// A tab changed. Resets when the watched tab finished loading.
    ///
    /// Returns `true` when the state was reset.
    pub fn on_tab_updated(&mut self, id: TabId, url: Option<&str>, complete: bool) -> bool {
        let Some(tab) = self.tab.as_mut().filter(|tab| tab.id == id) else {
            return false;
        };
        if let Some(url) = url {
            tab.url = url.to_string();
        }
        if complete {
            self.reset();
        }
        complete
    }

    /// Unsolicited event from the content script.
    pub fn on_page_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::ElementSelected { snapshot } => {
                self.select(Some(*snapshot));
                self.picking = false;
                self.view = View::Inspect;
            }
        }
    }

    /// Merge edits into the cached snapshot ahead of the reply.
    ///
    /// Returns the pending edit id, or `None` when `token` is not the
    /// current selection.
    pub fn apply_optimistic(&mut self, token: &str, edits: &StyleEdits) -> Option<u64> {
        let snapshot = self.selected.as_mut().filter(|s| s.id == token)?;
        let colors_before = snapshot.colors.clone();
        let inline_before = edits
            .iter()
            .map(|(property, _)| {
                (property.to_string(), snapshot.inline_styles.get(property).cloned())
            })
            .collect();
        merge_edits(snapshot, edits, &mut self.normalizer);

        self.next_edit += 1;
        let id = self.next_edit;
        self.pending.push(PendingEdit {
            id,
            token: token.to_string(),
            edits: edits.clone(),
            inline_before,
            colors_before,
        });
        Some(id)
    }

    /// Settle a pending edit with the snapshot from its reply.
    ///
    /// `None` (element gone) rolls the edit back. Edits still in flight are
    /// re-applied over the new snapshot.
    pub fn reconcile(&mut self, edit: u64, snapshot: Option<StyleSnapshot>) {
        let Some(snapshot) = snapshot else {
            self.rollback(edit);
            return;
        };
        self.pending.retain(|pending| pending.id != edit);
        if self.selected_token() != Some(snapshot.id.as_str()) {
            return;
        }
        let mut snapshot = snapshot;
        let token = snapshot.id.clone();
        for pending in self.pending.iter().filter(|p| p.token == token) {
            merge_edits(&mut snapshot, &pending.edits, &mut self.normalizer);
        }
        self.selected = Some(snapshot);
    }

    /// Undo a failed optimistic edit.
    pub fn rollback(&mut self, edit: u64) {
        let Some(index) = self.pending.iter().position(|pending| pending.id == edit) else {
            return;
        };
        let pending = self.pending.remove(index);
        let Some(snapshot) = self.selected.as_mut().filter(|s| s.id == pending.token) else {
            return;
        };
        for (property, before) in pending.inline_before {
            match before {
                Some(value) => snapshot.inline_styles.insert(property, value),
                None => snapshot.inline_styles.remove(&property),
            };
        }
        snapshot.colors = pending.colors_before;
        log::debug!("Rolled back edit {} on {}", edit, pending.token);
    }

    /// Whether an edit of `property` is still awaiting its reply.
    ///
    /// While pending, the cached value is provisional; a mirrored color
    /// field may lag behind when the edit removed the property or used a
    /// value that only the page can resolve.
    pub fn is_pending(&self, property: &str) -> bool {
        let property = to_kebab_case(property);
        self.pending
            .iter()
            .any(|pending| pending.edits.iter().any(|(name, _)| name == property))
    }

    /// Whether `property` differs from the value it had before editing.
    pub fn is_changed(&self, property: &str) -> bool {
        let Some(snapshot) = &self.selected else {
            return false;
        };
        let property = to_kebab_case(property);
        match snapshot.original_styles.get(&property) {
            Some(original) => {
                let current = snapshot.inline_styles.get(&property).map_or("", String::as_str);
                current != original
            }
            None => false,
        }
    }
}

/// Apply edits to a snapshot's inline mirror and color fields.
///
/// Color fields only ever take canonical values. A removal or a color the
/// parser cannot resolve leaves the field for the reply to settle.
fn merge_edits(snapshot: &mut StyleSnapshot, edits: &StyleEdits, normalizer: &mut ColorNormalizer) {
    for (property, value) in edits.iter() {
        match value.filter(|value| !value.trim().is_empty()) {
            Some(value) => {
                snapshot
                    .inline_styles
                    .insert(property.to_string(), value.to_string());
                if let Some(slot) = color_slot(&mut snapshot.colors, property) {
                    if let Some(canonical) = normalizer.resolve(value) {
                        *slot = canonical;
                    }
                }
            }
            None => {
                snapshot.inline_styles.remove(property);
            }
        }
    }
}

fn color_slot<'a>(colors: &'a mut ColorInfo, property: &str) -> Option<&'a mut String> {
    match property {
        "color" => Some(&mut colors.text),
        "background-color" => Some(&mut colors.background),
        "border-color" | "border-top-color" => Some(&mut colors.border),
        _ => None,
    }
}

/// Current inline values of every property that differs from its original.
pub fn changed_properties(snapshot: &StyleSnapshot) -> BTreeMap<String, String> {
    snapshot
        .original_styles
        .keys()
        .filter_map(|property| {
            let current = snapshot.inline_styles.get(property)?;
            (snapshot.original_styles.get(property) != Some(current))
                .then(|| (property.clone(), current.clone()))
        })
        .collect()
}
