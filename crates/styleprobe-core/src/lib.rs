//! StyleProbe Core Library
//!
//! Platform-agnostic inspection and editing engine. The page is reached
//! through the [`Dom`] trait so the same code runs inside the browser
//! content script and against the in-memory DOM used by tests.

pub mod color;
pub mod config;
pub mod dom;
pub mod error;
pub mod identity;
pub mod inspector;
pub mod overlay;
pub mod panel;
pub mod picker;
pub mod protocol;
pub mod router;
pub mod scanner;
pub mod session;
pub mod tracker;

pub use color::{ColorNormalizer, ColorRaster, ParsedColorRaster, TRANSPARENT};
pub use config::ProbeConfig;
pub use dom::{Dom, MemoryDom, NodeId, OVERLAY_HOST_ATTR};
pub use error::{ProbeError, ProbeResult};
pub use identity::{IdentityRegistry, TOKEN_ATTR};
pub use inspector::{AssetInfo, AssetKind, Inspector, StyleSnapshot};
pub use overlay::{GridTarget, HighlightFrame, LabelPlacement, OverlayRenderer, OverlaySurface};
pub use panel::{
    CommandClient, PanelError, PanelResult, PanelState, PanelStore, PanelTransport, TabInfo,
    TransportError, View,
};
pub use picker::{PickHooks, PickState, Picker};
pub use protocol::{Command, PageEvent, Reply, ReplyEnvelope, ReplyMode, Request};
pub use router::{ContentSession, Dispatch};
pub use scanner::{AssetEntry, PageOverview, Scanner};
pub use session::{SessionCoordinator, StopTicket};
pub use tracker::{ChangeTracker, StyleEdits};
