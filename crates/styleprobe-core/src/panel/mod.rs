//! Panel-side state store.
//!
//! [`PanelState`] caches what the panel shows; [`CommandClient`] delivers
//! commands to the content script; [`PanelStore`] ties the two together
//! and is what the panel UI calls.
//!
//! All store methods take `&self` and never hold a state borrow across an
//! `.await`, so the store can be shared as `Rc<PanelStore<_>>` between
//! browser callbacks.

mod state;
mod transport;

pub use state::{ConnectionStatus, PanelState, TabId, TabInfo, View, changed_properties};
pub use transport::{
    BoxFuture, CommandClient, PanelError, PanelResult, PanelTransport, TransportError,
    is_restricted_url,
};

use crate::inspector::StyleSnapshot;
use crate::overlay::GridTarget;
use crate::protocol::{Command, PageEvent, Reply};
use crate::scanner::{AssetEntry, PageOverview};
use crate::tracker::StyleEdits;
use serde_json::Value;
use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;

/// How a reply relates to the current state.
enum Delivery {
    Current(Option<Reply>),
    /// The state was reset by a tab switch or navigation while the command
    /// was in flight.
    Stale,
}

impl Delivery {
    fn into_reply(self) -> Option<Reply> {
        match self {
            Delivery::Current(reply) => reply,
            Delivery::Stale => None,
        }
    }
}

/// Panel state plus the client used to reach the page.
pub struct PanelStore<T: PanelTransport> {
    client: CommandClient<T>,
    state: RefCell<PanelState>,
}

impl<T: PanelTransport> PanelStore<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: CommandClient::new(transport),
            state: RefCell::new(PanelState::new()),
        }
    }

    /// Read access to the cached state.
    pub fn state(&self) -> Ref<'_, PanelState> {
        self.state.borrow()
    }

    pub fn transport(&self) -> &T {
        self.client.transport()
    }

    pub fn set_view(&self, view: View) {
        self.state.borrow_mut().set_view(view);
    }

    /// Send a command to the watched tab.
    ///
    /// Outcomes that arrive after a reset are [`Delivery::Stale`] and must
    /// not touch the state.
    async fn send(&self, command: Command) -> PanelResult<Delivery> {
        let (tab, epoch) = {
            let state = self.state.borrow();
            let tab = state.tab().cloned().ok_or(PanelError::NoActiveTab)?;
            (tab, state.epoch())
        };
        let result = self.client.request(&tab, command).await;

        let mut state = self.state.borrow_mut();
        if state.epoch() != epoch {
            log::debug!("Discarding reply from tab {} after reset", tab.id);
            return Ok(Delivery::Stale);
        }
        match &result {
            Ok(_) => state.set_status(ConnectionStatus::Connected),
            Err(PanelError::RestrictedPage(_)) => state.set_status(ConnectionStatus::Restricted),
            Err(err) => state.set_status(ConnectionStatus::Failed(err.to_string())),
        }
        result.map(Delivery::Current)
    }

    pub async fn scan_page(&self) -> PanelResult<Option<PageOverview>> {
        match self.send(Command::ScanPage).await?.into_reply() {
            Some(Reply::Overview(overview)) => {
                self.state.borrow_mut().set_overview(overview.clone());
                Ok(Some(overview))
            }
            _ => Ok(None),
        }
    }

    pub async fn scan_assets(&self) -> PanelResult<Option<Vec<AssetEntry>>> {
        match self.send(Command::ScanAssets).await?.into_reply() {
            Some(Reply::Assets(assets)) => {
                self.state.borrow_mut().set_assets(assets.clone());
                Ok(Some(assets))
            }
            _ => Ok(None),
        }
    }

    pub async fn start_picking(&self) -> PanelResult<()> {
        if let Delivery::Current(_) = self.send(Command::StartPicking).await? {
            self.state.borrow_mut().set_picking(true);
        }
        Ok(())
    }

    pub async fn stop_picking(&self) -> PanelResult<()> {
        self.state.borrow_mut().set_picking(false);
        self.send(Command::StopPicking).await?;
        Ok(())
    }

    /// Flip pick mode. Returns the new picking flag.
    pub async fn toggle_picking(&self) -> PanelResult<bool> {
        let picking = self.state.borrow().is_picking();
        if picking {
            self.stop_picking().await?;
        } else {
            self.start_picking().await?;
        }
        Ok(!picking)
    }

    /// Select by token. An unresolved token clears the selection.
    pub async fn select_node(&self, token: &str) -> PanelResult<Option<StyleSnapshot>> {
        let delivery = self
            .send(Command::SelectNode {
                token: token.to_string(),
            })
            .await?;
        let Delivery::Current(reply) = delivery else {
            return Ok(None);
        };
        let snapshot = match reply {
            Some(Reply::Snapshot(snapshot)) => snapshot.map(|s| *s),
            _ => None,
        };
        self.state.borrow_mut().select(snapshot.clone());
        Ok(snapshot)
    }

    pub async fn highlight_node(&self, token: &str, no_scroll: bool) -> PanelResult<()> {
        self.send(Command::HighlightNode {
            token: token.to_string(),
            no_scroll,
        })
        .await?;
        Ok(())
    }

    pub async fn clear_highlight(&self) -> PanelResult<()> {
        self.send(Command::ClearHighlight).await?;
        Ok(())
    }

    /// Edit styles with an optimistic local update.
    ///
    /// The cached snapshot changes immediately; the reply replaces it, and
    /// a failure rolls the local change back.
    pub async fn update_style(
        &self,
        token: &str,
        styles: BTreeMap<String, Value>,
    ) -> PanelResult<Option<StyleSnapshot>> {
        let edits = StyleEdits::from_json_map(&styles);
        let edit = self.state.borrow_mut().apply_optimistic(token, &edits);
        let result = self
            .send(Command::UpdateStyle {
                token: token.to_string(),
                styles,
            })
            .await;

        let snapshot = match result {
            // The reset already dropped the pending edit.
            Ok(Delivery::Stale) => return Ok(None),
            Ok(Delivery::Current(Some(Reply::Snapshot(snapshot)))) => snapshot.map(|s| *s),
            Ok(Delivery::Current(_)) => None,
            Err(err) => {
                if let Some(edit) = edit {
                    self.state.borrow_mut().rollback(edit);
                }
                return Err(err);
            }
        };
        if let Some(edit) = edit {
            self.state.borrow_mut().reconcile(edit, snapshot.clone());
        }
        Ok(snapshot)
    }

    /// Revert one property, or all of them when `property` is `None`.
    pub async fn revert_style(
        &self,
        token: &str,
        property: Option<&str>,
    ) -> PanelResult<Option<StyleSnapshot>> {
        let reply = self
            .send(Command::RevertStyle {
                token: token.to_string(),
                property: property.map(str::to_string),
            })
            .await?
            .into_reply();
        let snapshot = match reply {
            Some(Reply::Snapshot(snapshot)) => snapshot.map(|s| *s),
            _ => None,
        };
        let mut state = self.state.borrow_mut();
        if snapshot.is_some() && state.selected_token() == Some(token) {
            state.select(snapshot.clone());
        }
        Ok(snapshot)
    }

    pub async fn highlight_grid_area(&self, token: &str, area: GridTarget) -> PanelResult<()> {
        self.send(Command::HighlightGridArea {
            token: token.to_string(),
            area,
        })
        .await?;
        Ok(())
    }

    pub async fn clear_grid_area(&self, token: &str) -> PanelResult<()> {
        self.send(Command::ClearGridArea {
            token: token.to_string(),
        })
        .await?;
        Ok(())
    }

    /// The browser activated another tab.
    ///
    /// Stops picking on the previous tab if it was active there; nothing is
    /// sent to the new tab.
    pub async fn on_tab_activated(&self, tab: TabInfo) {
        let stop = self.state.borrow_mut().on_tab_activated(tab);
        if let Some((previous, command)) = stop {
            if let Err(err) = self.client.request(&previous, command).await {
                log::debug!("Could not stop picking on tab {}: {}", previous.id, err);
            }
        }
    }

    pub fn on_tab_updated(&self, id: TabId, url: Option<&str>, complete: bool) -> bool {
        self.state.borrow_mut().on_tab_updated(id, url, complete)
    }

    pub fn on_page_event(&self, event: PageEvent) {
        self.state.borrow_mut().on_page_event(event);
    }
}
