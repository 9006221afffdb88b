//! Backend trait definitions.
//!
//! The shell never touches the DOM or the emulation core directly. Every
//! host implements these traits and the shell dispatches all I/O through
//! them: the browser host in `rustico-web`, the software host in
//! `rustico-app`, and the recording mock used by the tests.

use rustico_types::error::Result;
use rustico_types::frame::FrameBuffer;
use rustico_types::input::VirtualButton;

use crate::banner::Banner;
use crate::controller::ControllerLayout;
use crate::keymap::BindingRow;
use crate::power::{IndicatorLook, PowerState};
use crate::surface::{SurfaceId, SurfaceSpec};

/// The emulation core as seen by the shell.
///
/// The shell is a consumer only: it pulls frames, reads the power signal,
/// and forwards controller edges. It never drives emulation timing.
pub trait EmulatorCore {
    /// Take the most recent completed frame, if one is ready. Must not block.
    fn poll_frame(&mut self) -> Option<FrameBuffer>;

    /// Current power signal.
    fn power_state(&self) -> PowerState;

    /// Forward a button edge to the core's input state.
    fn send_input(&mut self, button: VirtualButton, pressed: bool);

    /// Raw diagnostic text, if the core has any to report.
    fn debug_text(&self) -> Option<String>;
}

/// Owner of the drawable canvases behind each surface.
pub trait SurfaceBackend {
    /// Create the drawable for a surface at its logical resolution.
    fn allocate(&mut self, spec: &SurfaceSpec) -> Result<()>;

    /// Free the drawable. The next `allocate` starts from a blank canvas.
    fn release(&mut self, id: SurfaceId) -> Result<()>;

    fn set_visible(&mut self, id: SurfaceId, visible: bool) -> Result<()>;

    /// Displayed size in CSS pixels. Scaling is nearest-neighbor.
    fn set_display_size(&mut self, id: SurfaceId, width: u32, height: u32) -> Result<()>;

    /// Draw a frame at the surface's logical resolution.
    fn blit(&mut self, id: SurfaceId, frame: &FrameBuffer) -> Result<()>;
}

/// Status chrome: indicator, banner, debug block, controller, mode panels.
pub trait ChromeBackend {
    fn set_indicator(&mut self, look: &IndicatorLook) -> Result<()>;

    /// Show the given banner, or hide the banner element when `None`.
    fn set_banner(&mut self, banner: Option<&Banner>) -> Result<()>;

    /// Update the debug block. The block stays mounted when hidden.
    fn set_debug(&mut self, text: &str, visible: bool) -> Result<()>;

    /// Position and show the controller, or hide it when `None`.
    fn set_controller(&mut self, layout: Option<&ControllerLayout>) -> Result<()>;

    /// Visual pressed feedback for one on-screen button.
    fn set_button_pressed(&mut self, button: VirtualButton, pressed: bool) -> Result<()>;

    /// Show or hide a mode's control panel.
    fn set_panel_visible(&mut self, panel: &str, visible: bool) -> Result<()>;

    /// Refresh the key binding table of the input configuration panel.
    fn set_bindings(&mut self, rows: &[BindingRow], capturing: Option<VirtualButton>) -> Result<()>;

    /// Ask the host to enter or leave fullscreen. The outcome comes back as
    /// a `FullscreenChanged` event.
    fn request_fullscreen(&mut self, enter: bool) -> Result<()>;
}

/// Opaque handle of a scheduled display-refresh callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub i32);

/// Display-refresh callback scheduling (`requestAnimationFrame`).
pub trait FrameScheduler {
    fn request_frame(&mut self) -> Result<FrameHandle>;

    /// Cancel a pending callback. Cancelling a handle that already fired is
    /// a no-op.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Everything the shell needs from its host.
pub trait ShellHost: SurfaceBackend + ChromeBackend + FrameScheduler {}

impl<T: SurfaceBackend + ChromeBackend + FrameScheduler> ShellHost for T {}
