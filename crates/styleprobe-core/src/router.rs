//! Content-script command dispatch.
//!
//! One [`ContentSession`] exists per page. It owns everything the content
//! script keeps between messages: token registry, color cache, change
//! ledger, overlay and picker. DOM writes happen first; overlay refresh and
//! reply snapshot come after, so replies always reflect settled style.

use crate::color::{ColorNormalizer, ColorRaster};
use crate::config::ProbeConfig;
use crate::dom::Dom;
use crate::error::{ProbeError, ProbeResult};
use crate::identity::IdentityRegistry;
use crate::inspector::{Inspector, StyleSnapshot};
use crate::overlay::{GridTarget, OverlayRenderer, OverlaySurface};
use crate::picker::{PickHooks, Picker};
use crate::protocol::{Command, PageEvent, Reply, ReplyEnvelope, ReplyMode, Request};
use crate::scanner::Scanner;
use crate::tracker::{ChangeTracker, StyleEdits};
use kurbo::Point;
use serde_json::Value;

/// Outcome of one command.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub reply: Option<Reply>,
    pub mode: ReplyMode,
}

/// Per-page engine state.
pub struct ContentSession<D: Dom> {
    dom: D,
    registry: IdentityRegistry,
    colors: ColorNormalizer,
    tracker: ChangeTracker,
    overlay: OverlayRenderer,
    picker: Picker<D::Element>,
    inspector: Inspector,
    scanner: Scanner,
}

impl<D: Dom> ContentSession<D> {
    pub fn new(
        dom: D,
        config: &ProbeConfig,
        raster: Box<dyn ColorRaster>,
        surface: Box<dyn OverlaySurface>,
        hooks: Box<dyn PickHooks>,
    ) -> Self {
        Self {
            dom,
            registry: IdentityRegistry::new(),
            colors: ColorNormalizer::new(raster),
            tracker: ChangeTracker::new(),
            overlay: OverlayRenderer::new(surface),
            picker: Picker::new(hooks),
            inspector: Inspector::new(config),
            scanner: Scanner::new(config),
        }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn is_picking(&self) -> bool {
        self.picker.is_picking()
    }

    /// Parse and run a raw message.
    ///
    /// Returns the envelope to send back for deferred commands, `None` for
    /// fire-and-forget commands and for payloads that do not parse.
    pub fn handle_json(&mut self, message: &Value) -> Option<ReplyEnvelope> {
        match Request::from_value(message.clone()) {
            Ok(request) => self.handle_request(request),
            Err(err) => {
                log::debug!("Ignoring malformed message: {}", err);
                None
            }
        }
    }

    pub fn handle_request(&mut self, request: Request) -> Option<ReplyEnvelope> {
        let dispatch = self.handle(request.command);
        match dispatch.mode {
            ReplyMode::Deferred => Some(ReplyEnvelope {
                request_id: request.request_id,
                reply: dispatch.reply,
            }),
            ReplyMode::None => None,
        }
    }

    /// Run one command.
    ///
    /// Failures never escape: snapshot commands answer with an empty
    /// snapshot, the rest are dropped with a debug log.
    pub fn handle(&mut self, command: Command) -> Dispatch {
        let mode = command.reply_mode();
        let name = command.name();
        let reply = match self.execute(command) {
            Ok(reply) => reply,
            Err(err) => {
                log::debug!("{} failed: {}", name, err);
                match mode {
                    ReplyMode::Deferred => Some(Reply::Snapshot(None)),
                    ReplyMode::None => None,
                }
            }
        };
        Dispatch { reply, mode }
    }

    fn execute(&mut self, command: Command) -> ProbeResult<Option<Reply>> {
        match command {
            Command::ScanPage => Ok(Some(Reply::Overview(
                self.scanner.scan_overview(&self.dom, &mut self.colors),
            ))),
            Command::ScanAssets => Ok(Some(Reply::Assets(
                self.scanner.scan_assets(&self.dom, &mut self.registry),
            ))),
            Command::StartPicking => {
                self.picker.start(&mut self.overlay);
                Ok(None)
            }
            Command::StopPicking => {
                self.picker.stop(&mut self.overlay);
                self.overlay.unmount();
                Ok(None)
            }
            Command::SelectNode { token } => {
                let element = self.resolve(&token)?;
                let snapshot = self.snapshot(&element, &token);
                self.overlay.highlight(&self.dom, &element);
                Ok(Some(Reply::Snapshot(Some(Box::new(snapshot)))))
            }
            Command::HighlightNode { token, no_scroll } => {
                let element = self.resolve(&token)?;
                if !no_scroll {
                    self.dom.scroll_into_view(&element);
                }
                self.overlay.highlight(&self.dom, &element);
                Ok(None)
            }
            Command::ClearHighlight => {
                self.overlay.clear_highlight();
                Ok(None)
            }
            Command::UpdateStyle { token, styles } => {
                let element = self.resolve(&token)?;
                let edits = StyleEdits::from_json_map(&styles);
                if !self.tracker.apply_change(&self.dom, &element, &token, &edits) {
                    return Err(ProbeError::Detached);
                }
                self.settled_reply(&element, &token)
            }
            Command::RevertStyle { token, property } => {
                let element = self.resolve(&token)?;
                let reverted = match property.as_deref() {
                    Some(property) => {
                        self.tracker.revert_change(&self.dom, &element, &token, property)
                    }
                    None => self.tracker.revert_all(&self.dom, &element, &token),
                };
                if !reverted {
                    log::debug!("Nothing to revert on {}", token);
                }
                self.settled_reply(&element, &token)
            }
            Command::HighlightGridArea { token, area } => {
                let element = self.resolve(&token)?;
                self.highlight_grid_area(&element, area);
                Ok(None)
            }
            Command::ClearGridArea { token } => {
                log::debug!("Clearing grid highlight for {}", token);
                self.overlay.clear_grid_cell();
                Ok(None)
            }
            Command::Unknown => {
                log::debug!("Ignoring unknown command");
                Ok(None)
            }
        }
    }

    /// Snapshot then re-highlight, both after every write.
    fn settled_reply(&mut self, element: &D::Element, token: &str) -> ProbeResult<Option<Reply>> {
        let snapshot = self.snapshot(element, token);
        self.overlay.highlight(&self.dom, element);
        Ok(Some(Reply::Snapshot(Some(Box::new(snapshot)))))
    }

    fn highlight_grid_area(&mut self, container: &D::Element, area: GridTarget) {
        if self.overlay.highlight_grid_cell(&self.dom, container, area).is_none() {
            log::debug!("Grid target {:?} does not exist", area);
        }
    }

    fn resolve(&self, token: &str) -> ProbeResult<D::Element> {
        self.registry
            .resolve(&self.dom, token)
            .ok_or_else(|| ProbeError::UnknownToken(token.to_string()))
    }

    fn snapshot(&mut self, element: &D::Element, token: &str) -> StyleSnapshot {
        log::debug!("Inspecting {}", token);
        self.inspector.inspect(
            &self.dom,
            element,
            &mut self.registry,
            &mut self.colors,
            &self.tracker,
        )
    }

    /// Snapshot of a live element by token.
    pub fn inspect_token(&mut self, token: &str) -> ProbeResult<StyleSnapshot> {
        let element = self.resolve(token)?;
        Ok(self.snapshot(&element, token))
    }

    pub fn pointer_moved(&mut self, point: Point) -> bool {
        self.picker.pointer_moved(&self.dom, &mut self.overlay, point)
    }

    /// Commit a pick. Returns the event to forward to the panel.
    pub fn clicked(&mut self, point: Point) -> Option<PageEvent> {
        let element = self.picker.clicked(&self.dom, &mut self.overlay, point)?;
        let token = self.registry.id_of(&self.dom, &element);
        let snapshot = self.snapshot(&element, &token);
        log::info!("Selected <{}> {}", snapshot.tag_name, snapshot.selector);
        Some(PageEvent::ElementSelected {
            snapshot: Box::new(snapshot),
        })
    }

    pub fn key_pressed(&mut self, key: &str) -> bool {
        self.picker.key_pressed(key, &mut self.overlay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ParsedColorRaster;
    use crate::dom::{MemoryDom, NodeId};
    use crate::overlay::tests::{RecordingSurface, SurfaceCall};
    use crate::picker::tests::CountingHooks;
    use kurbo::Rect;
    use serde_json::json;

    struct Fixture {
        session: ContentSession<MemoryDom>,
        calls: RecordingSurface,
        hooks: CountingHooks,
        card: NodeId,
    }

    fn fixture() -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let dom = MemoryDom::new();
        let card = dom.create_element(dom.body().unwrap(), "div");
        dom.set_attribute(&card, "id", "card");
        dom.set_rect(card, Rect::new(20.0, 40.0, 220.0, 140.0));
        dom.set_computed(card, "display", "flex");

        let calls = RecordingSurface::default();
        let hooks = CountingHooks::default();
        let session = ContentSession::new(
            dom,
            &ProbeConfig::default(),
            Box::new(ParsedColorRaster),
            Box::new(calls.clone()),
            Box::new(hooks.clone()),
        );
        Fixture {
            session,
            calls,
            hooks,
            card,
        }
    }

    fn pick(session: &mut ContentSession<MemoryDom>) -> Box<StyleSnapshot> {
        session.handle(Command::StartPicking);
        session.pointer_moved(Point::new(50.0, 60.0));
        let Some(PageEvent::ElementSelected { snapshot }) = session.clicked(Point::new(50.0, 60.0))
        else {
            panic!("click produced no selection");
        };
        snapshot
    }

    fn snapshot_of(dispatch: Dispatch) -> Option<Box<StyleSnapshot>> {
        match dispatch.reply {
            Some(Reply::Snapshot(snapshot)) => snapshot,
            other => panic!("expected snapshot reply, got {:?}", other),
        }
    }

    #[test]
    fn test_pick_and_edit() {
        let mut fx = fixture();

        let picked = pick(&mut fx.session);
        assert_eq!(picked.tag_name, "div");
        assert_eq!(picked.box_model.display, "flex");
        assert_eq!(picked.selector, "#card");
        assert!(!fx.session.is_picking());
        assert_eq!(fx.hooks.active.get(), 0);

        let dispatch = fx.session.handle(Command::UpdateStyle {
            token: picked.id.clone(),
            styles: [("backgroundColor".to_string(), json!("#112233"))].into(),
        });
        assert_eq!(dispatch.mode, ReplyMode::Deferred);
        let updated = snapshot_of(dispatch).unwrap();
        assert_eq!(updated.colors.background, "#112233");
        assert_eq!(updated.original_styles.get("background-color").map(String::as_str), Some(""));
        assert_eq!(
            fx.session.dom().inline_priority(&fx.card, "background-color"),
            "important"
        );
    }

    #[test]
    fn test_update_rehighlights_after_write() {
        let mut fx = fixture();
        let token = pick(&mut fx.session).id;
        fx.calls.calls.borrow_mut().clear();

        fx.session.handle(Command::UpdateStyle {
            token,
            styles: [("width".to_string(), json!("300px"))].into(),
        });
        let calls = fx.calls.calls.borrow();
        assert!(matches!(calls.last(), Some(SurfaceCall::Highlight(_))));
    }

    #[test]
    fn test_revert_all_restores_inline_style() {
        let mut fx = fixture();
        let token = pick(&mut fx.session).id;
        fx.session
            .dom()
            .set_inline_style(&fx.card, "color", "blue", "");

        fx.session.handle(Command::UpdateStyle {
            token: token.clone(),
            styles: [
                ("color".to_string(), json!("red")),
                ("marginTop".to_string(), json!(8)),
            ]
            .into(),
        });
        let dispatch = fx.session.handle(Command::RevertStyle {
            token,
            property: None,
        });

        assert!(snapshot_of(dispatch).is_some());
        let dom = fx.session.dom();
        assert_eq!(dom.inline_style(&fx.card, "color"), "blue");
        assert_eq!(dom.inline_priority(&fx.card, "color"), "");
        assert_eq!(dom.inline_style(&fx.card, "margin-top"), "");
    }

    #[test]
    fn test_unresolved_token_gets_empty_snapshot() {
        let mut fx = fixture();
        let dispatch = fx.session.handle(Command::SelectNode {
            token: "sp-missing".into(),
        });
        assert_eq!(dispatch.mode, ReplyMode::Deferred);
        assert_eq!(snapshot_of(dispatch), None);

        let dispatch = fx.session.handle(Command::HighlightNode {
            token: "sp-missing".into(),
            no_scroll: false,
        });
        assert_eq!(dispatch, Dispatch { reply: None, mode: ReplyMode::None });
    }

    #[test]
    fn test_detached_element_is_not_edited() {
        let mut fx = fixture();
        let token = pick(&mut fx.session).id;
        fx.session.dom().detach(fx.card);

        let dispatch = fx.session.handle(Command::UpdateStyle {
            token,
            styles: [("color".to_string(), json!("red"))].into(),
        });
        assert_eq!(snapshot_of(dispatch), None);
    }

    #[test]
    fn test_highlight_node_scroll_flag() {
        let mut fx = fixture();
        let token = pick(&mut fx.session).id;

        fx.session.handle(Command::HighlightNode {
            token: token.clone(),
            no_scroll: true,
        });
        assert!(fx.session.dom().scrolled().is_empty());

        fx.session.handle(Command::HighlightNode {
            token,
            no_scroll: false,
        });
        assert_eq!(fx.session.dom().scrolled(), vec![fx.card]);
    }

    #[test]
    fn test_grid_area_highlight() {
        let mut fx = fixture();
        let token = pick(&mut fx.session).id;
        let dom = fx.session.dom();
        dom.set_computed(fx.card, "display", "grid");
        dom.set_computed(fx.card, "grid-template-columns", "100px 100px");
        dom.set_computed(fx.card, "grid-template-rows", "100px");
        dom.set_computed(fx.card, "column-gap", "0px");

        fx.session.handle(Command::HighlightGridArea {
            token: token.clone(),
            area: GridTarget::Cell { col: 2, row: 1 },
        });
        assert_eq!(
            fx.calls.calls.borrow().last(),
            Some(&SurfaceCall::Cell(Rect::new(120.0, 40.0, 220.0, 140.0)))
        );

        fx.session.handle(Command::ClearGridArea { token });
        assert_eq!(fx.calls.calls.borrow().last(), Some(&SurfaceCall::HideCell));
    }

    #[test]
    fn test_json_reply_envelope() {
        let mut fx = fixture();

        let envelope = fx
            .session
            .handle_json(&json!({"type": "SCAN_PAGE", "requestId": 3}))
            .unwrap();
        assert_eq!(envelope.request_id, Some(3));
        let Some(Reply::Overview(overview)) = envelope.reply else {
            panic!("expected overview");
        };
        assert_eq!(overview.meta.total_elements, 3);

        assert_eq!(fx.session.handle_json(&json!({"type": "START_PICKING"})), None);
        assert!(fx.session.is_picking());
    }

    #[test]
    fn test_unknown_and_malformed_ignored() {
        let mut fx = fixture();
        assert_eq!(fx.session.handle_json(&json!({"type": "FROM_THE_FUTURE"})), None);
        assert_eq!(fx.session.handle_json(&json!({"type": "SELECT_NODE"})), None);
        assert_eq!(fx.session.handle_json(&json!(42)), None);
        assert!(fx.calls.calls.borrow().is_empty());
    }

    #[test]
    fn test_escape_cancels_pick() {
        let mut fx = fixture();
        fx.session.handle(Command::StartPicking);
        assert!(fx.session.key_pressed("Escape"));
        assert!(!fx.session.is_picking());
        assert_eq!(fx.session.clicked(Point::new(50.0, 60.0)), None);
    }

    #[test]
    fn test_stop_picking_removes_overlay() {
        let mut fx = fixture();
        let token = pick(&mut fx.session).id;
        fx.session.handle(Command::HighlightNode {
            token,
            no_scroll: true,
        });
        fx.session.handle(Command::StopPicking);
        assert_eq!(fx.calls.calls.borrow().last(), Some(&SurfaceCall::Unmount));
    }
}
