//! Wire protocol between the panel and the content script.
//!
//! ## Commands
//!
//! Commands are JSON objects discriminated by `type`:
//! ```json
//! { "type": "SELECT_NODE", "token": "sp-1a2b3c4d5e", "requestId": 7 }
//! { "type": "UPDATE_STYLE", "token": "sp-1a2b3c4d5e", "styles": { "backgroundColor": "#112233" } }
//! { "type": "HIGHLIGHT_GRID_AREA", "token": "sp-1a2b3c4d5e", "area": { "type": "cell", "col": 2, "row": 1 } }
//! ```
//!
//! ## Replies
//!
//! Commands whose [`ReplyMode`] is `Deferred` are answered with a
//! [`ReplyEnvelope`] echoing the request id. The transport must keep the
//! reply channel open until that envelope is sent; commands with
//! `ReplyMode::None` release it immediately.

use crate::inspector::StyleSnapshot;
use crate::overlay::GridTarget;
use crate::scanner::{AssetEntry, PageOverview};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Port name used by panels to announce themselves to the background.
pub const PANEL_PORT_NAME: &str = "styleprobe-panel";

/// Content script bundle, in injection order: the wasm-bindgen glue must
/// load before the bootstrap that instantiates the engine.
pub const CONTENT_SCRIPT_FILES: &[&str] = &["pkg/styleprobe_web.js", "content/bootstrap.js"];

/// Inbound command for the content script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    ScanPage,
    ScanAssets,
    StartPicking,
    StopPicking,
    SelectNode {
        token: String,
    },
    HighlightNode {
        token: String,
        #[serde(default, rename = "noScroll")]
        no_scroll: bool,
    },
    ClearHighlight,
    UpdateStyle {
        token: String,
        styles: BTreeMap<String, Value>,
    },
    /// Revert one property, or every tracked property when absent.
    RevertStyle {
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property: Option<String>,
    },
    HighlightGridArea {
        token: String,
        area: GridTarget,
    },
    ClearGridArea {
        token: String,
    },
    /// Any command this build does not know. Ignored.
    #[serde(other)]
    Unknown,
}

/// Whether the transport must hold the reply channel open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// No reply; release the channel.
    None,
    /// A reply follows; keep the channel open until it is sent.
    Deferred,
}

impl Command {
    pub fn reply_mode(&self) -> ReplyMode {
        match self {
            Command::ScanPage
            | Command::ScanAssets
            | Command::SelectNode { .. }
            | Command::UpdateStyle { .. }
            | Command::RevertStyle { .. } => ReplyMode::Deferred,
            _ => ReplyMode::None,
        }
    }

    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::ScanPage => "SCAN_PAGE",
            Command::ScanAssets => "SCAN_ASSETS",
            Command::StartPicking => "START_PICKING",
            Command::StopPicking => "STOP_PICKING",
            Command::SelectNode { .. } => "SELECT_NODE",
            Command::HighlightNode { .. } => "HIGHLIGHT_NODE",
            Command::ClearHighlight => "CLEAR_HIGHLIGHT",
            Command::UpdateStyle { .. } => "UPDATE_STYLE",
            Command::RevertStyle { .. } => "REVERT_STYLE",
            Command::HighlightGridArea { .. } => "HIGHLIGHT_GRID_AREA",
            Command::ClearGridArea { .. } => "CLEAR_GRID_AREA",
            Command::Unknown => "UNKNOWN",
        }
    }
}

/// A command with its correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub request_id: Option<u64>,
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id: Some(request_id),
            command,
        }
    }

    /// Parse a raw message. The id travels next to the `type` tag.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let request_id = value.get("requestId").and_then(as_request_id);
        let command = serde_json::from_value(value)?;
        Ok(Self {
            request_id,
            command,
        })
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(&self.command)?;
        if let (Some(id), Value::Object(map)) = (self.request_id, &mut value) {
            map.insert("requestId".to_string(), Value::from(id));
        }
        Ok(value)
    }
}

/// Ids cross JS, where every number is a double.
fn as_request_id(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|id| *id >= 0.0 && id.fract() == 0.0)
            .map(|id| id as u64)
    })
}

/// Payload of a deferred reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum Reply {
    Overview(PageOverview),
    Assets(Vec<AssetEntry>),
    /// `None` when the token no longer resolves.
    Snapshot(Option<Box<StyleSnapshot>>),
}

/// Reply sent back on the held-open channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
    pub reply: Option<Reply>,
}

/// Unsolicited event from the content script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageEvent {
    ElementSelected { snapshot: Box<StyleSnapshot> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_names() {
        let cmd: Command = serde_json::from_value(json!({"type": "SCAN_PAGE"})).unwrap();
        assert_eq!(cmd, Command::ScanPage);

        let cmd: Command =
            serde_json::from_value(json!({"type": "HIGHLIGHT_NODE", "token": "sp-1", "noScroll": true}))
                .unwrap();
        assert_eq!(cmd, Command::HighlightNode { token: "sp-1".into(), no_scroll: true });

        let cmd: Command =
            serde_json::from_value(json!({"type": "HIGHLIGHT_NODE", "token": "sp-1"})).unwrap();
        assert_eq!(cmd, Command::HighlightNode { token: "sp-1".into(), no_scroll: false });
    }

    #[test]
    fn test_unknown_command_type() {
        let cmd: Command = serde_json::from_value(json!({"type": "EXPORT_FIGMA", "x": 1})).unwrap();
        assert_eq!(cmd, Command::Unknown);
        assert_eq!(cmd.reply_mode(), ReplyMode::None);
    }

    #[test]
    fn test_grid_area_payload() {
        let cmd: Command = serde_json::from_value(json!({
            "type": "HIGHLIGHT_GRID_AREA",
            "token": "sp-1",
            "area": {"type": "cell", "col": 2, "row": 1}
        }))
        .unwrap();
        assert_eq!(
            cmd,
            Command::HighlightGridArea { token: "sp-1".into(), area: GridTarget::Cell { col: 2, row: 1 } }
        );
    }

    #[test]
    fn test_reply_modes() {
        assert_eq!(Command::ScanPage.reply_mode(), ReplyMode::Deferred);
        assert_eq!(Command::SelectNode { token: "a".into() }.reply_mode(), ReplyMode::Deferred);
        assert_eq!(Command::StartPicking.reply_mode(), ReplyMode::None);
        assert_eq!(Command::ClearGridArea { token: "a".into() }.reply_mode(), ReplyMode::None);
    }

    #[test]
    fn test_request_id_travels_with_command() {
        let request = Request::new(7, Command::SelectNode { token: "sp-1".into() });
        let value = request.to_value().unwrap();
        assert_eq!(value, json!({"type": "SELECT_NODE", "token": "sp-1", "requestId": 7}));

        let parsed = Request::from_value(value).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_request_without_id() {
        let parsed = Request::from_value(json!({"type": "STOP_PICKING"})).unwrap();
        assert_eq!(parsed.request_id, None);
        assert_eq!(parsed.command.name(), "STOP_PICKING");
    }

    #[test]
    fn test_request_id_from_double() {
        let parsed = Request::from_value(json!({"type": "SCAN_PAGE", "requestId": 4.0})).unwrap();
        assert_eq!(parsed.request_id, Some(4));
    }

    #[test]
    fn test_malformed_payload_is_error() {
        assert!(Request::from_value(json!({"type": "SELECT_NODE"})).is_err());
        assert!(Request::from_value(json!("SCAN_PAGE")).is_err());
    }
}
