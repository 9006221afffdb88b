//! Virtual controller layer.
//!
//! An on-screen d-pad, face buttons and Start/Select pills for touch
//! devices. The controller is active only while the host is fullscreen,
//! touch is available, and the active mode is fullscreen-capable. Layout
//! is a pure function of the viewport and is recomputed on every resize
//! or orientation change without touching pressed state.
//!
//! Releases are tracked per pointer. Whatever path a pointer takes to end
//! (up outside the button, cancel, focus loss), the button it held is
//! released exactly once.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use rustico_types::error::{Result, ShellError};
use rustico_types::input::{PointerId, Viewport, VirtualButton};

use crate::mode::ModeChange;

/// Derived from the viewport aspect; square counts as horizontal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn of(viewport: Viewport) -> Self {
        if viewport.width >= viewport.height {
            Self::Horizontal
        } else {
            Self::Vertical
        }
    }
}

/// Axis-aligned hit region in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x
            && py >= self.y
            && i64::from(px) < i64::from(self.x) + i64::from(self.w)
            && i64::from(py) < i64::from(self.y) + i64::from(self.h)
    }
}

/// Where the Start/Select pill row sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PillArea {
    TopLeft,
    BottomCenter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPlacement {
    pub button: VirtualButton,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerLayout {
    pub viewport: Viewport,
    pub orientation: Orientation,
    pub pill_area: PillArea,
    pub placements: Vec<ButtonPlacement>,
}

impl ControllerLayout {
    pub fn placement(&self, button: VirtualButton) -> Option<&ButtonPlacement> {
        self.placements.iter().find(|p| p.button == button)
    }

    /// Button under a viewport point.
    pub fn hit(&self, x: i32, y: i32) -> Option<VirtualButton> {
        self.placements
            .iter()
            .find(|p| p.rect.contains(x, y))
            .map(|p| p.button)
    }
}

/// Button sizes, configurable under `[controller]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ControllerMetrics {
    /// Distance from the viewport edges.
    pub margin: u32,
    /// Gap between neighbouring buttons.
    pub gap: u32,
    /// Side of one d-pad arm.
    pub dpad_arm: u32,
    pub round: u32,
    pub round_small: u32,
    pub pill_width: u32,
    pub pill_height: u32,
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self {
            margin: 16,
            gap: 12,
            dpad_arm: 48,
            round: 64,
            round_small: 40,
            pill_width: 72,
            pill_height: 28,
        }
    }
}

/// Upper bound for every controller metric, in CSS pixels.
pub const MAX_METRIC: u32 = 4096;

impl ControllerMetrics {
    /// Sizes must be in `1..=MAX_METRIC`; margin and gap in `0..=MAX_METRIC`.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("dpad_arm", self.dpad_arm),
            ("round", self.round),
            ("round_small", self.round_small),
            ("pill_width", self.pill_width),
            ("pill_height", self.pill_height),
        ];
        for (name, value) in sizes {
            if !(1..=MAX_METRIC).contains(&value) {
                return Err(ShellError::Configuration(format!(
                    "controller.{name} must be in 1..={MAX_METRIC}, got {value}"
                )));
            }
        }
        for (name, value) in [("margin", self.margin), ("gap", self.gap)] {
            if value > MAX_METRIC {
                return Err(ShellError::Configuration(format!(
                    "controller.{name} must be at most {MAX_METRIC}, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Compute the layout for a viewport.
///
/// Metrics are expected to have passed [`ControllerMetrics::validate`].
///
/// Horizontal: d-pad bottom-left, round buttons bottom-right, pills
/// top-left. Vertical: the same clusters lifted above a bottom-center pill
/// row.
pub fn compute_layout(viewport: Viewport, m: &ControllerMetrics) -> ControllerLayout {
    let orientation = Orientation::of(viewport);
    let vw = i32::try_from(viewport.width).unwrap_or(i32::MAX);
    let vh = i32::try_from(viewport.height).unwrap_or(i32::MAX);
    let margin = m.margin as i32;
    let gap = m.gap as i32;
    let arm = m.dpad_arm as i32;
    let round = m.round as i32;
    let small = m.round_small as i32;
    let pill_w = m.pill_width as i32;
    let pill_h = m.pill_height as i32;

    let (pill_area, pill_x, pill_y, bottom) = match orientation {
        Orientation::Horizontal => (PillArea::TopLeft, margin, margin, vh - margin),
        Orientation::Vertical => {
            let row = 2 * pill_w + gap;
            let y = vh - margin - pill_h;
            (PillArea::BottomCenter, (vw - row) / 2, y, y - gap)
        },
    };

    let mut placements = Vec::with_capacity(VirtualButton::ALL.len());
    let mut place = |button, x: i32, y: i32, w: i32, h: i32| {
        placements.push(ButtonPlacement {
            button,
            rect: Rect::new(x, y, w.max(0) as u32, h.max(0) as u32),
        });
    };

    // D-pad: a 3x3 cross anchored bottom-left.
    let dx = margin;
    let dy = bottom - 3 * arm;
    place(VirtualButton::DpadUp, dx + arm, dy, arm, arm);
    place(VirtualButton::DpadLeft, dx, dy + arm, arm, arm);
    place(VirtualButton::DpadRight, dx + 2 * arm, dy + arm, arm, arm);
    place(VirtualButton::DpadDown, dx + arm, dy + 2 * arm, arm, arm);

    // Round buttons anchored bottom-right, A to the right of B and raised.
    let ax = vw - margin - round;
    let ay = bottom - round - round / 3;
    let bx = ax - gap - round;
    let by = bottom - round;
    place(VirtualButton::RoundA, ax, ay, round, round);
    place(VirtualButton::RoundB, bx, by, round, round);
    let inset = (round - small) / 2;
    place(VirtualButton::RoundSmallA, ax + inset, ay - gap - small, small, small);
    place(VirtualButton::RoundSmallB, bx + inset, by - gap - small, small, small);

    place(VirtualButton::PillSelect, pill_x, pill_y, pill_w, pill_h);
    place(VirtualButton::PillStart, pill_x + pill_w + gap, pill_y, pill_w, pill_h);

    ControllerLayout {
        viewport,
        orientation,
        pill_area,
        placements,
    }
}

/// A press or release to forward to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEdge {
    pub button: VirtualButton,
    pub pressed: bool,
}

impl InputEdge {
    pub const fn down(button: VirtualButton) -> Self {
        Self {
            button,
            pressed: true,
        }
    }

    pub const fn up(button: VirtualButton) -> Self {
        Self {
            button,
            pressed: false,
        }
    }
}

#[derive(Debug)]
pub struct VirtualController {
    metrics: ControllerMetrics,
    layout: ControllerLayout,
    fullscreen: bool,
    touch_capable: bool,
    bound: bool,
    /// Pressed buttons and the pointer holding each.
    held: BTreeMap<VirtualButton, PointerId>,
    /// Pointers that went down while active and have not ended yet.
    pointers: BTreeSet<PointerId>,
}

impl VirtualController {
    pub fn new(metrics: ControllerMetrics, viewport: Viewport) -> Self {
        Self {
            layout: compute_layout(viewport, &metrics),
            metrics,
            fullscreen: false,
            touch_capable: false,
            bound: false,
            held: BTreeMap::new(),
            pointers: BTreeSet::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.fullscreen && self.touch_capable && self.bound
    }

    pub fn layout(&self) -> &ControllerLayout {
        &self.layout
    }

    pub fn orientation(&self) -> Orientation {
        self.layout.orientation
    }

    pub fn is_pressed(&self, button: VirtualButton) -> bool {
        self.held.contains_key(&button)
    }

    pub fn pressed(&self) -> Vec<VirtualButton> {
        self.held.keys().copied().collect()
    }

    /// Recompute the layout. Pressed state is untouched.
    pub fn relayout(&mut self, viewport: Viewport) -> &ControllerLayout {
        self.layout = compute_layout(viewport, &self.metrics);
        &self.layout
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) -> Vec<InputEdge> {
        self.fullscreen = fullscreen;
        self.release_if_inactive()
    }

    pub fn set_touch_capable(&mut self, touch: bool) -> Vec<InputEdge> {
        self.touch_capable = touch;
        self.release_if_inactive()
    }

    /// Bind to the mode's fullscreen capability.
    pub fn bind(&mut self, mode_capable: bool) -> Vec<InputEdge> {
        self.bound = mode_capable;
        self.release_if_inactive()
    }

    pub fn on_mode_changed(&mut self, change: &ModeChange) -> Vec<InputEdge> {
        self.bind(change.to.fullscreen_capable())
    }

    /// A pointer went down. Ignored while inactive or off every button.
    pub fn pointer_down(&mut self, id: PointerId, x: i32, y: i32) -> Vec<InputEdge> {
        if !self.is_active() {
            return Vec::new();
        }
        self.pointers.insert(id);
        match self.layout.hit(x, y) {
            Some(button) if !self.held.contains_key(&button) => {
                self.held.insert(button, id);
                vec![InputEdge::down(button)]
            },
            _ => Vec::new(),
        }
    }

    /// A pointer was lifted anywhere. Releases what it held; once no tracked
    /// pointer remains, anything still held is released too.
    pub fn pointer_up(&mut self, id: PointerId) -> Vec<InputEdge> {
        self.pointers.remove(&id);
        let mut edges: Vec<InputEdge> = Vec::new();
        self.held.retain(|&button, &mut owner| {
            let release = owner == id;
            if release {
                edges.push(InputEdge::up(button));
            }
            !release
        });
        if self.pointers.is_empty() {
            edges.extend(self.release_all());
        }
        edges
    }

    /// The platform cancelled a pointer: everything is released.
    pub fn pointer_cancel(&mut self, id: PointerId) -> Vec<InputEdge> {
        log::debug!("pointer {id} cancelled, releasing all buttons");
        self.release_all()
    }

    pub fn release_all(&mut self) -> Vec<InputEdge> {
        self.pointers.clear();
        std::mem::take(&mut self.held)
            .into_keys()
            .map(InputEdge::up)
            .collect()
    }

    fn release_if_inactive(&mut self) -> Vec<InputEdge> {
        if self.is_active() {
            Vec::new()
        } else {
            self.release_all()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use proptest::prelude::*;

    const LANDSCAPE: Viewport = Viewport::new(1280, 720);
    const PORTRAIT: Viewport = Viewport::new(390, 844);

    fn active() -> VirtualController {
        let mut vc = VirtualController::new(ControllerMetrics::default(), LANDSCAPE);
        vc.set_fullscreen(true);
        vc.set_touch_capable(true);
        vc.bind(true);
        vc
    }

    fn center(vc: &VirtualController, b: VirtualButton) -> (i32, i32) {
        let r = vc.layout().placement(b).unwrap().rect;
        (r.x + r.w as i32 / 2, r.y + r.h as i32 / 2)
    }

    #[test]
    fn orientation_from_viewport() {
        assert_eq!(Orientation::of(LANDSCAPE), Orientation::Horizontal);
        assert_eq!(Orientation::of(PORTRAIT), Orientation::Vertical);
        assert_eq!(Orientation::of(Viewport::new(500, 500)), Orientation::Horizontal);
    }

    #[test]
    fn horizontal_layout_regions() {
        let layout = compute_layout(LANDSCAPE, &ControllerMetrics::default());
        assert_eq!(layout.pill_area, PillArea::TopLeft);
        let start = layout.placement(VirtualButton::PillStart).unwrap().rect;
        assert!(start.y < 100 && start.x < 640);
        let left = layout.placement(VirtualButton::DpadLeft).unwrap().rect;
        assert!(left.x < 640 && left.y > 360);
        let a = layout.placement(VirtualButton::RoundA).unwrap().rect;
        assert!(a.x > 640 && a.y > 360);
    }

    #[test]
    fn extreme_metrics_and_viewports_lay_out() {
        let max = ControllerMetrics {
            margin: MAX_METRIC,
            gap: MAX_METRIC,
            dpad_arm: MAX_METRIC,
            round: MAX_METRIC,
            round_small: MAX_METRIC,
            pill_width: MAX_METRIC,
            pill_height: MAX_METRIC,
        };
        assert!(max.validate().is_ok());
        for viewport in [
            Viewport::new(1, 1),
            Viewport::new(1, u32::MAX),
            Viewport::new(u32::MAX, 1),
        ] {
            let layout = compute_layout(viewport, &max);
            assert_eq!(layout.placements.len(), VirtualButton::ALL.len());
        }
        let too_wide = ControllerMetrics {
            pill_width: 2_000_000_000,
            ..ControllerMetrics::default()
        };
        assert!(too_wide.validate().is_err());
    }

    #[test]
    fn vertical_layout_puts_pills_bottom_center() {
        let layout = compute_layout(PORTRAIT, &ControllerMetrics::default());
        assert_eq!(layout.pill_area, PillArea::BottomCenter);
        let select = layout.placement(VirtualButton::PillSelect).unwrap().rect;
        let start = layout.placement(VirtualButton::PillStart).unwrap().rect;
        let row_mid = (select.x + start.x + start.w as i32) / 2;
        assert!((row_mid - 195).abs() <= 1);
        // Clusters sit above the pill row.
        let down = layout.placement(VirtualButton::DpadDown).unwrap().rect;
        assert!(down.y + (down.h as i32) <= select.y);
    }

    #[test]
    fn layout_has_every_button_without_overlap() {
        for vp in [LANDSCAPE, PORTRAIT] {
            let layout = compute_layout(vp, &ControllerMetrics::default());
            assert_eq!(layout.placements.len(), VirtualButton::ALL.len());
            for (i, a) in layout.placements.iter().enumerate() {
                for b in &layout.placements[i + 1..] {
                    let (ra, rb) = (a.rect, b.rect);
                    let overlap = ra.x < rb.x + rb.w as i32
                        && rb.x < ra.x + ra.w as i32
                        && ra.y < rb.y + rb.h as i32
                        && rb.y < ra.y + ra.h as i32;
                    assert!(!overlap, "{:?} overlaps {:?} in {vp:?}", a.button, b.button);
                }
            }
        }
    }

    #[test]
    fn relayout_is_idempotent_and_keeps_presses() {
        let mut vc = active();
        let (x, y) = center(&vc, VirtualButton::RoundA);
        vc.pointer_down(1, x, y);
        let first = vc.relayout(PORTRAIT).clone();
        let second = vc.relayout(PORTRAIT).clone();
        assert_eq!(first, second);
        assert!(vc.is_pressed(VirtualButton::RoundA));
    }

    #[test]
    fn inactive_ignores_presses() {
        let mut vc = VirtualController::new(ControllerMetrics::default(), LANDSCAPE);
        vc.set_touch_capable(true);
        vc.bind(true);
        let (x, y) = center(&vc, VirtualButton::RoundA);
        assert!(vc.pointer_down(1, x, y).is_empty());
    }

    #[test]
    fn release_outside_button_still_releases() {
        let mut vc = active();
        let (x, y) = center(&vc, VirtualButton::RoundB);
        assert_eq!(vc.pointer_down(7, x, y), vec![InputEdge::down(VirtualButton::RoundB)]);
        // The pointer slid off the button and lifted elsewhere.
        assert_eq!(vc.pointer_up(7), vec![InputEdge::up(VirtualButton::RoundB)]);
        assert!(vc.pressed().is_empty());
        // A second release is a no-op.
        assert!(vc.pointer_up(7).is_empty());
    }

    #[test]
    fn multi_touch_tracks_pointers_independently() {
        let mut vc = active();
        let (ax, ay) = center(&vc, VirtualButton::RoundA);
        let (lx, ly) = center(&vc, VirtualButton::DpadLeft);
        vc.pointer_down(1, ax, ay);
        vc.pointer_down(2, lx, ly);
        assert_eq!(vc.pointer_up(1), vec![InputEdge::up(VirtualButton::RoundA)]);
        assert!(vc.is_pressed(VirtualButton::DpadLeft));
        assert_eq!(vc.pointer_up(2), vec![InputEdge::up(VirtualButton::DpadLeft)]);
    }

    #[test]
    fn cancel_releases_everything() {
        let mut vc = active();
        let (ax, ay) = center(&vc, VirtualButton::RoundA);
        let (sx, sy) = center(&vc, VirtualButton::PillStart);
        vc.pointer_down(1, ax, ay);
        vc.pointer_down(2, sx, sy);
        let edges = vc.pointer_cancel(2);
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| !e.pressed));
        assert!(vc.pressed().is_empty());
    }

    #[test]
    fn leaving_fullscreen_releases() {
        let mut vc = active();
        let (x, y) = center(&vc, VirtualButton::DpadUp);
        vc.pointer_down(3, x, y);
        assert_eq!(vc.set_fullscreen(false), vec![InputEdge::up(VirtualButton::DpadUp)]);
        assert!(!vc.is_active());
    }

    #[test]
    fn unbinding_on_mode_change() {
        let mut vc = active();
        let (x, y) = center(&vc, VirtualButton::RoundA);
        vc.pointer_down(1, x, y);
        let edges = vc.on_mode_changed(&ModeChange {
            from: Mode::Playfield,
            to: Mode::ConfigureInput,
        });
        assert_eq!(edges, vec![InputEdge::up(VirtualButton::RoundA)]);
        assert!(!vc.is_active());
        vc.on_mode_changed(&ModeChange {
            from: Mode::ConfigureInput,
            to: Mode::Jam,
        });
        assert!(vc.is_active());
    }

    #[test]
    fn same_button_two_pointers_held_once() {
        let mut vc = active();
        let (x, y) = center(&vc, VirtualButton::RoundA);
        assert_eq!(vc.pointer_down(1, x, y).len(), 1);
        assert!(vc.pointer_down(2, x, y).is_empty());
        // Pointer 2 never owned the button; lifting it leaves pointer 1's hold.
        assert!(vc.pointer_up(2).is_empty());
        assert!(vc.is_pressed(VirtualButton::RoundA));
    }

    proptest! {
        #[test]
        fn cancel_always_clears(downs in prop::collection::vec((0i32..4, 0i32..1280, 0i32..720), 0..20)) {
            let mut vc = active();
            let mut pressed = 0usize;
            for (id, x, y) in downs {
                pressed += vc.pointer_down(id, x, y).len();
            }
            let released = vc.pointer_cancel(0);
            prop_assert_eq!(released.len(), pressed);
            prop_assert!(vc.pressed().is_empty());
        }

        #[test]
        fn layout_fits_viewport(w in 320u32..3000, h in 320u32..3000) {
            let layout = compute_layout(Viewport::new(w, h), &ControllerMetrics::default());
            for p in &layout.placements {
                prop_assert!(p.rect.x >= 0 && p.rect.y >= 0);
                prop_assert!(p.rect.x + p.rect.w as i32 <= w as i32);
                prop_assert!(p.rect.y + p.rect.h as i32 <= h as i32);
            }
        }
    }
}
