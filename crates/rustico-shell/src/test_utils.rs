//! Shared test helpers: a recording host and a scriptable core.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;

use rustico_types::error::{Result, ShellError};
use rustico_types::frame::FrameBuffer;
use rustico_types::input::VirtualButton;

use crate::backend::{ChromeBackend, EmulatorCore, FrameHandle, FrameScheduler, SurfaceBackend};
use crate::banner::Banner;
use crate::controller::ControllerLayout;
use crate::keymap::BindingRow;
use crate::power::{IndicatorLook, PowerState};
use crate::surface::{SurfaceId, SurfaceSpec};

/// One recorded host call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Allocate(SurfaceId),
    Release(SurfaceId),
    Visible(SurfaceId, bool),
    DisplaySize(SurfaceId, u32, u32),
    Blit(SurfaceId),
    Indicator(IndicatorLook),
    Banner(Option<Banner>),
    Debug(String, bool),
    Controller(Option<ControllerLayout>),
    ButtonPressed(VirtualButton, bool),
    Panel(String, bool),
    Bindings(Vec<BindingRow>, Option<VirtualButton>),
    Fullscreen(bool),
    RequestFrame(FrameHandle),
    CancelFrame(FrameHandle),
}

/// Host that records every call and tracks the resulting DOM-ish state.
#[derive(Debug, Default)]
pub struct MockHost {
    pub calls: Vec<HostCall>,
    /// Blits that hit a hidden or unallocated surface.
    pub hidden_blits: usize,
    /// Make `set_panel_visible` fail for this panel.
    pub fail_panel: Option<&'static str>,
    /// Number of upcoming `request_frame` calls that fail.
    pub fail_frame_requests: usize,
    next_handle: i32,
    outstanding: Vec<FrameHandle>,
    allocated: BTreeSet<SurfaceId>,
    visible: BTreeSet<SurfaceId>,
    panels: BTreeMap<String, bool>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn position(&self, pred: impl Fn(&HostCall) -> bool) -> Option<usize> {
        self.calls.iter().position(pred)
    }

    pub fn blits(&self, id: SurfaceId) -> usize {
        self.count(|c| *c == HostCall::Blit(id))
    }

    pub fn outstanding_frames(&self) -> Vec<FrameHandle> {
        self.outstanding.clone()
    }

    /// Fire the oldest pending display-refresh callback.
    pub fn fire(&mut self) -> Option<FrameHandle> {
        if self.outstanding.is_empty() {
            None
        } else {
            Some(self.outstanding.remove(0))
        }
    }

    pub fn panel_visible(&self, panel: &str) -> bool {
        self.panels.get(panel).copied().unwrap_or(false)
    }

    pub fn is_visible(&self, id: SurfaceId) -> bool {
        self.visible.contains(&id)
    }

    pub fn last_banner(&self) -> Option<Banner> {
        self.calls.iter().rev().find_map(|c| match c {
            HostCall::Banner(b) => Some(b.clone()),
            _ => None,
        })?
    }

    pub fn last_indicator(&self) -> Option<IndicatorLook> {
        self.calls.iter().rev().find_map(|c| match c {
            HostCall::Indicator(look) => Some(*look),
            _ => None,
        })
    }

    /// Whether the controller is currently shown.
    pub fn controller_shown(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                HostCall::Controller(layout) => Some(layout.is_some()),
                _ => None,
            })
            .unwrap_or(false)
    }
}

impl SurfaceBackend for MockHost {
    fn allocate(&mut self, spec: &SurfaceSpec) -> Result<()> {
        self.calls.push(HostCall::Allocate(spec.id));
        self.allocated.insert(spec.id);
        Ok(())
    }

    fn release(&mut self, id: SurfaceId) -> Result<()> {
        self.calls.push(HostCall::Release(id));
        self.allocated.remove(&id);
        Ok(())
    }

    fn set_visible(&mut self, id: SurfaceId, visible: bool) -> Result<()> {
        self.calls.push(HostCall::Visible(id, visible));
        if visible {
            self.visible.insert(id);
        } else {
            self.visible.remove(&id);
        }
        Ok(())
    }

    fn set_display_size(&mut self, id: SurfaceId, width: u32, height: u32) -> Result<()> {
        self.calls.push(HostCall::DisplaySize(id, width, height));
        Ok(())
    }

    fn blit(&mut self, id: SurfaceId, _frame: &FrameBuffer) -> Result<()> {
        self.calls.push(HostCall::Blit(id));
        if !self.visible.contains(&id) || !self.allocated.contains(&id) {
            self.hidden_blits += 1;
        }
        Ok(())
    }
}

impl ChromeBackend for MockHost {
    fn set_indicator(&mut self, look: &IndicatorLook) -> Result<()> {
        self.calls.push(HostCall::Indicator(*look));
        Ok(())
    }

    fn set_banner(&mut self, banner: Option<&Banner>) -> Result<()> {
        self.calls.push(HostCall::Banner(banner.cloned()));
        Ok(())
    }

    fn set_debug(&mut self, text: &str, visible: bool) -> Result<()> {
        self.calls.push(HostCall::Debug(text.to_string(), visible));
        Ok(())
    }

    fn set_controller(&mut self, layout: Option<&ControllerLayout>) -> Result<()> {
        self.calls.push(HostCall::Controller(layout.cloned()));
        Ok(())
    }

    fn set_button_pressed(&mut self, button: VirtualButton, pressed: bool) -> Result<()> {
        self.calls.push(HostCall::ButtonPressed(button, pressed));
        Ok(())
    }

    fn set_panel_visible(&mut self, panel: &str, visible: bool) -> Result<()> {
        self.calls.push(HostCall::Panel(panel.to_string(), visible));
        if self.fail_panel == Some(panel) {
            return Err(ShellError::Backend(format!("no element #{panel}")));
        }
        self.panels.insert(panel.to_string(), visible);
        Ok(())
    }

    fn set_bindings(&mut self, rows: &[BindingRow], capturing: Option<VirtualButton>) -> Result<()> {
        self.calls.push(HostCall::Bindings(rows.to_vec(), capturing));
        Ok(())
    }

    fn request_fullscreen(&mut self, enter: bool) -> Result<()> {
        self.calls.push(HostCall::Fullscreen(enter));
        Ok(())
    }
}

impl FrameScheduler for MockHost {
    fn request_frame(&mut self) -> Result<FrameHandle> {
        if self.fail_frame_requests > 0 {
            self.fail_frame_requests -= 1;
            return Err(ShellError::Backend("requestAnimationFrame refused".into()));
        }
        self.next_handle += 1;
        let handle = FrameHandle(self.next_handle);
        self.calls.push(HostCall::RequestFrame(handle));
        self.outstanding.push(handle);
        Ok(handle)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.calls.push(HostCall::CancelFrame(handle));
        self.outstanding.retain(|h| *h != handle);
    }
}

#[derive(Debug, Default)]
pub struct CoreScript {
    pub power: PowerState,
    pub frames: VecDeque<FrameBuffer>,
    /// Produce a blank 256x240 frame whenever the queue is empty.
    pub auto_frames: bool,
    pub inputs: Vec<(VirtualButton, bool)>,
    pub debug: Option<String>,
    pub polls: usize,
}

/// Core whose behaviour is driven through a shared [`CoreControl`].
#[derive(Debug)]
pub struct ScriptedCore {
    state: Rc<RefCell<CoreScript>>,
}

#[derive(Debug, Clone)]
pub struct CoreControl {
    state: Rc<RefCell<CoreScript>>,
}

impl ScriptedCore {
    pub fn new() -> (Self, CoreControl) {
        let state = Rc::new(RefCell::new(CoreScript::default()));
        let control = CoreControl {
            state: Rc::clone(&state),
        };
        (Self { state }, control)
    }

    /// A powered core that always has a fresh frame.
    pub fn running() -> (Self, CoreControl) {
        let (core, ctl) = Self::new();
        ctl.set_power(PowerState::On);
        ctl.set_auto_frames(true);
        (core, ctl)
    }
}

impl CoreControl {
    pub fn set_power(&self, power: PowerState) {
        self.state.borrow_mut().power = power;
    }

    pub fn push_frame(&self, frame: FrameBuffer) {
        self.state.borrow_mut().frames.push_back(frame);
    }

    pub fn set_auto_frames(&self, on: bool) {
        self.state.borrow_mut().auto_frames = on;
    }

    pub fn set_debug(&self, text: Option<&str>) {
        self.state.borrow_mut().debug = text.map(str::to_string);
    }

    pub fn inputs(&self) -> Vec<(VirtualButton, bool)> {
        self.state.borrow().inputs.clone()
    }

    pub fn polls(&self) -> usize {
        self.state.borrow().polls
    }
}

impl EmulatorCore for ScriptedCore {
    fn poll_frame(&mut self) -> Option<FrameBuffer> {
        let mut s = self.state.borrow_mut();
        s.polls += 1;
        match s.frames.pop_front() {
            Some(frame) => Some(frame),
            None if s.auto_frames => Some(FrameBuffer::blank(256, 240)),
            None => None,
        }
    }

    fn power_state(&self) -> PowerState {
        self.state.borrow().power
    }

    fn send_input(&mut self, button: VirtualButton, pressed: bool) {
        self.state.borrow_mut().inputs.push((button, pressed));
    }

    fn debug_text(&self) -> Option<String> {
        self.state.borrow().debug.clone()
    }
}
