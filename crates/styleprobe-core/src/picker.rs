//! Pick mode state machine.

use crate::dom::{Dom, is_overlay};
use crate::overlay::OverlayRenderer;
use kurbo::Point;

/// Pick mode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PickState {
    #[default]
    Idle,
    Picking,
}

/// Page-level side effects of pick mode.
///
/// `install` attaches the pointer-move, click (capturing, default action
/// suppressed) and key listeners and forces a crosshair cursor; `uninstall`
/// reverses exactly that. The picker guarantees the two alternate.
pub trait PickHooks {
    fn install(&mut self);
    fn uninstall(&mut self);
}

/// Hover-highlight and click-to-select.
pub struct Picker<E> {
    state: PickState,
    hovered: Option<E>,
    hooks: Box<dyn PickHooks>,
}

impl<E: Clone + PartialEq> Picker<E> {
    pub fn new(hooks: Box<dyn PickHooks>) -> Self {
        Self {
            state: PickState::Idle,
            hovered: None,
            hooks,
        }
    }

    pub fn state(&self) -> PickState {
        self.state
    }

    pub fn is_picking(&self) -> bool {
        self.state == PickState::Picking
    }

    /// Element currently under the pointer, if any.
    pub fn hovered(&self) -> Option<&E> {
        self.hovered.as_ref()
    }

    /// Idle → Picking. Returns `false` if already picking.
    pub fn start(&mut self, overlay: &mut OverlayRenderer) -> bool {
        if self.is_picking() {
            return false;
        }
        overlay.ensure_mounted();
        self.hooks.install();
        self.state = PickState::Picking;
        log::debug!("Pick mode started");
        true
    }

    /// Picking → Idle. Returns `false` if already idle.
    pub fn stop(&mut self, overlay: &mut OverlayRenderer) -> bool {
        if !self.is_picking() {
            return false;
        }
        self.hooks.uninstall();
        overlay.unmount();
        self.hovered = None;
        self.state = PickState::Idle;
        log::debug!("Pick mode stopped");
        true
    }

    /// Re-highlight when the element under the pointer changes.
    ///
    /// Returns `true` when the highlight moved.
    pub fn pointer_moved<D: Dom<Element = E>>(
        &mut self,
        dom: &D,
        overlay: &mut OverlayRenderer,
        point: Point,
    ) -> bool {
        if !self.is_picking() {
            return false;
        }
        let Some(target) = pick_target(dom, point) else {
            return false;
        };
        if self.hovered.as_ref() == Some(&target) {
            return false;
        }
        overlay.highlight(dom, &target);
        self.hovered = Some(target);
        true
    }

    /// Commit the selection and return to idle.
    ///
    /// Uses the last hovered element, falling back to the element under the
    /// click. With nothing to select the picker stays active.
    pub fn clicked<D: Dom<Element = E>>(
        &mut self,
        dom: &D,
        overlay: &mut OverlayRenderer,
        point: Point,
    ) -> Option<E> {
        if !self.is_picking() {
            return None;
        }
        let target = self
            .hovered
            .clone()
            .filter(|el| dom.is_connected(el))
            .or_else(|| pick_target(dom, point))?;
        self.stop(overlay);
        Some(target)
    }

    /// `Escape` cancels pick mode without a selection.
    pub fn key_pressed(&mut self, key: &str, overlay: &mut OverlayRenderer) -> bool {
        if key == "Escape" {
            return self.stop(overlay);
        }
        false
    }
}

fn pick_target<D: Dom>(dom: &D, point: Point) -> Option<D::Element> {
    dom.element_from_point(point)
        .filter(|element| !is_overlay(dom, element))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dom::{MemoryDom, OVERLAY_HOST_ATTR};
    use crate::overlay::tests::RecordingSurface;
    use kurbo::Rect;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Hooks tracking how many listener sets are currently installed.
    #[derive(Clone, Default)]
    pub struct CountingHooks {
        pub active: Rc<Cell<i32>>,
        pub installs: Rc<Cell<usize>>,
    }

    impl PickHooks for CountingHooks {
        fn install(&mut self) {
            self.active.set(self.active.get() + 1);
            self.installs.set(self.installs.get() + 1);
        }
        fn uninstall(&mut self) {
            self.active.set(self.active.get() - 1);
        }
    }

    fn setup() -> (MemoryDom, OverlayRenderer, Picker<crate::dom::NodeId>, CountingHooks) {
        let dom = MemoryDom::new();
        let overlay = OverlayRenderer::new(Box::new(RecordingSurface::default()));
        let hooks = CountingHooks::default();
        let picker = Picker::new(Box::new(hooks.clone()));
        (dom, overlay, picker, hooks)
    }

    #[test]
    fn test_start_twice_installs_once() {
        let (_dom, mut overlay, mut picker, hooks) = setup();

        assert!(picker.start(&mut overlay));
        assert!(!picker.start(&mut overlay));

        assert_eq!(hooks.active.get(), 1);
        assert_eq!(hooks.installs.get(), 1);
        assert!(overlay.is_mounted());
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (_dom, mut overlay, mut picker, hooks) = setup();
        assert!(!picker.stop(&mut overlay));
        assert_eq!(hooks.active.get(), 0);
    }

    #[test]
    fn test_cycles_do_not_leak_listeners() {
        let (_dom, mut overlay, mut picker, hooks) = setup();
        for _ in 0..5 {
            picker.start(&mut overlay);
            picker.start(&mut overlay);
            picker.stop(&mut overlay);
            picker.stop(&mut overlay);
        }
        assert_eq!(hooks.active.get(), 0);
        assert_eq!(hooks.installs.get(), 5);
        assert!(!overlay.is_mounted());
    }

    #[test]
    fn test_pointer_move_highlights_changes_only() {
        let (dom, mut overlay, mut picker, _) = setup();
        let a = dom.create_element(dom.body().unwrap(), "div");
        let b = dom.create_element(dom.body().unwrap(), "div");
        dom.set_rect(a, Rect::new(0.0, 0.0, 100.0, 100.0));
        dom.set_rect(b, Rect::new(200.0, 0.0, 300.0, 100.0));
        picker.start(&mut overlay);

        assert!(picker.pointer_moved(&dom, &mut overlay, Point::new(10.0, 10.0)));
        assert!(!picker.pointer_moved(&dom, &mut overlay, Point::new(20.0, 20.0)));
        assert!(picker.pointer_moved(&dom, &mut overlay, Point::new(210.0, 10.0)));
        assert_eq!(picker.hovered(), Some(&b));
    }

    #[test]
    fn test_pointer_move_ignored_when_idle() {
        let (dom, mut overlay, mut picker, _) = setup();
        assert!(!picker.pointer_moved(&dom, &mut overlay, Point::new(10.0, 10.0)));
        assert!(picker.hovered().is_none());
    }

    #[test]
    fn test_overlay_host_is_never_picked() {
        let (dom, mut overlay, mut picker, _) = setup();
        let host = dom.create_element(dom.document_element().unwrap(), "styleprobe-overlay");
        dom.set_attribute(&host, OVERLAY_HOST_ATTR, "");
        dom.set_rect(host, Rect::new(0.0, 0.0, 1280.0, 800.0));
        picker.start(&mut overlay);

        assert!(!picker.pointer_moved(&dom, &mut overlay, Point::new(10.0, 10.0)));
        assert!(picker.hovered().is_none());
    }

    #[test]
    fn test_click_selects_hovered_and_stops() {
        let (dom, mut overlay, mut picker, hooks) = setup();
        let card = dom.create_element(dom.body().unwrap(), "div");
        dom.set_rect(card, Rect::new(0.0, 0.0, 100.0, 100.0));
        picker.start(&mut overlay);
        picker.pointer_moved(&dom, &mut overlay, Point::new(5.0, 5.0));

        let selected = picker.clicked(&dom, &mut overlay, Point::new(5.0, 5.0));

        assert_eq!(selected, Some(card));
        assert_eq!(picker.state(), PickState::Idle);
        assert_eq!(hooks.active.get(), 0);
    }

    #[test]
    fn test_click_without_hover_uses_point() {
        let (dom, mut overlay, mut picker, _) = setup();
        let card = dom.create_element(dom.body().unwrap(), "div");
        dom.set_rect(card, Rect::new(0.0, 0.0, 100.0, 100.0));
        picker.start(&mut overlay);

        assert_eq!(picker.clicked(&dom, &mut overlay, Point::new(5.0, 5.0)), Some(card));
    }

    #[test]
    fn test_escape_cancels() {
        let (_dom, mut overlay, mut picker, hooks) = setup();
        picker.start(&mut overlay);
        assert!(!picker.key_pressed("Enter", &mut overlay));
        assert!(picker.key_pressed("Escape", &mut overlay));
        assert_eq!(hooks.active.get(), 0);
    }
}
