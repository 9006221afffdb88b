//! Platform-agnostic host input types.
//!
//! Every host (browser DOM, native harness) maps its native events to
//! [`HostEvent`]. The shell never sees raw DOM events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ShellError;

/// Identifier of an active pointer (DOM `PointerEvent.pointerId`).
pub type PointerId = i32;

/// Viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A platform-agnostic host event.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A pointer went down at viewport coordinates.
    PointerDown { id: PointerId, x: i32, y: i32 },
    /// A pointer was lifted. Delivered by the global (document level) listener.
    PointerUp { id: PointerId },
    /// The platform took the pointer away (gesture, palm rejection, ...).
    PointerCancel { id: PointerId },
    /// The viewport was resized.
    Resize(Viewport),
    /// The device orientation changed; carries the post-rotation viewport.
    OrientationChange(Viewport),
    /// The host entered or left fullscreen.
    FullscreenChanged(bool),
    /// Touch capability was detected or lost (e.g. a touch screen attached).
    TouchCapability(bool),
    /// A physical key went down (`KeyboardEvent.code`, browser auto-repeat flag).
    KeyDown { code: String, repeat: bool },
    /// A physical key was released.
    KeyUp { code: String },
    /// The page lost focus or became hidden.
    FocusLost,
}

/// Shape class of a virtual button; drives styling and hit-region size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonShape {
    /// One arm of the d-pad cross.
    Dpad,
    /// Large round face button.
    Round,
    /// Small round face button (turbo row).
    RoundSmall,
    /// Pill-shaped Start / Select button.
    Pill,
}

impl ButtonShape {
    /// CSS class applied to the button element.
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Dpad => "dpad",
            Self::Round => "round",
            Self::RoundSmall => "round-small",
            Self::Pill => "pill",
        }
    }
}

/// Logical buttons of the on-screen controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VirtualButton {
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    RoundA,
    RoundB,
    RoundSmallA,
    RoundSmallB,
    PillStart,
    PillSelect,
}

impl VirtualButton {
    /// All buttons in layout order.
    pub const ALL: [VirtualButton; 10] = [
        VirtualButton::DpadUp,
        VirtualButton::DpadDown,
        VirtualButton::DpadLeft,
        VirtualButton::DpadRight,
        VirtualButton::RoundA,
        VirtualButton::RoundB,
        VirtualButton::RoundSmallA,
        VirtualButton::RoundSmallB,
        VirtualButton::PillStart,
        VirtualButton::PillSelect,
    ];

    /// Stable identifier, also used as the DOM element id suffix.
    pub fn id(self) -> &'static str {
        match self {
            Self::DpadUp => "dpad-up",
            Self::DpadDown => "dpad-down",
            Self::DpadLeft => "dpad-left",
            Self::DpadRight => "dpad-right",
            Self::RoundA => "round-a",
            Self::RoundB => "round-b",
            Self::RoundSmallA => "round-small-a",
            Self::RoundSmallB => "round-small-b",
            Self::PillStart => "pill-start",
            Self::PillSelect => "pill-select",
        }
    }

    pub fn shape(self) -> ButtonShape {
        match self {
            Self::DpadUp | Self::DpadDown | Self::DpadLeft | Self::DpadRight => ButtonShape::Dpad,
            Self::RoundA | Self::RoundB => ButtonShape::Round,
            Self::RoundSmallA | Self::RoundSmallB => ButtonShape::RoundSmall,
            Self::PillStart | Self::PillSelect => ButtonShape::Pill,
        }
    }
}

impl fmt::Display for VirtualButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for VirtualButton {
    type Err = ShellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.id() == s)
            .ok_or_else(|| ShellError::Configuration(format!("unknown button {s:?}")))
    }
}

impl TryFrom<String> for VirtualButton {
    type Error = ShellError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VirtualButton> for String {
    fn from(b: VirtualButton) -> Self {
        b.id().to_string()
    }
}
