//! Page contract and DOM-free rendering helpers.
//!
//! Everything here is plain string/enum mapping so it runs under the native
//! test harness. The wasm-only modules feed these strings into `web-sys`.

use rustico_shell::banner::Banner;
use rustico_shell::controller::{ControllerLayout, Orientation, Rect};
use rustico_shell::input::VirtualButton;
use rustico_shell::keymap::BindingRow;
use rustico_shell::power::IndicatorLook;
use rustico_shell::subscription::Topic;

/// Element ids the host page must provide.
pub const INDICATOR_ID: &str = "power-indicator";
pub const BANNER_ID: &str = "banner";
pub const BANNER_TEXT_ID: &str = "banner-text";
pub const DEBUG_ID: &str = "debug-output";
pub const CONTROLLER_ID: &str = "virtual-controller";
pub const BINDINGS_ID: &str = "key-bindings";

/// Class toggled on pressed controller buttons.
pub const PRESSED_CLASS: &str = "pressed";

/// Where a native listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenTarget {
    Window,
    Document,
    /// The controller overlay element.
    Controller,
}

/// Native DOM events backing a shell topic.
///
/// `AnimationFrame` has no DOM event; it is driven by the frame scheduler.
pub fn dom_events(topic: Topic) -> &'static [(ListenTarget, &'static str)] {
    match topic {
        Topic::PointerPress => &[(ListenTarget::Controller, "pointerdown")],
        Topic::PointerRelease => &[
            (ListenTarget::Document, "pointerup"),
            (ListenTarget::Document, "pointercancel"),
        ],
        Topic::Viewport => &[
            (ListenTarget::Window, "resize"),
            (ListenTarget::Window, "orientationchange"),
        ],
        Topic::Fullscreen => &[(ListenTarget::Document, "fullscreenchange")],
        Topic::Keyboard => &[
            (ListenTarget::Window, "keydown"),
            (ListenTarget::Window, "keyup"),
        ],
        Topic::Focus => &[
            (ListenTarget::Window, "blur"),
            (ListenTarget::Document, "visibilitychange"),
        ],
        Topic::AnimationFrame => &[],
    }
}

/// Element id of a controller button.
pub fn button_element_id(button: VirtualButton) -> String {
    format!("vc-{}", button.id())
}

/// Class list of a controller button element.
pub fn button_classes(button: VirtualButton, pressed: bool) -> String {
    let mut classes = format!("vc-button {}", button.shape().css_class());
    if pressed {
        classes.push(' ');
        classes.push_str(PRESSED_CLASS);
    }
    classes
}

/// Classes for a button after a relayout. The pressed class in `current`
/// survives while the controller stays shown.
pub fn relayout_button_classes(button: VirtualButton, shown: bool, current: &str) -> String {
    let pressed = shown && current.split_whitespace().any(|c| c == PRESSED_CLASS);
    button_classes(button, pressed)
}

/// Inline style placing an absolutely positioned element.
pub fn rect_style(rect: &Rect) -> String {
    format!(
        "left: {}px; top: {}px; width: {}px; height: {}px;",
        rect.x, rect.y, rect.w, rect.h
    )
}

/// Class list of the controller overlay.
pub fn controller_classes(layout: Option<&ControllerLayout>) -> &'static str {
    match layout.map(|l| l.orientation) {
        None => "virtual-controller hidden",
        Some(Orientation::Horizontal) => "virtual-controller horizontal",
        Some(Orientation::Vertical) => "virtual-controller vertical",
    }
}

/// Inline style of the power indicator.
pub fn indicator_style(look: &IndicatorLook) -> String {
    let mut style = format!("background-color: {};", look.color.to_css());
    match look.glow {
        Some(glow) => style.push_str(&format!(" box-shadow: 0 0 8px 2px {};", glow.to_css())),
        None => style.push_str(" box-shadow: none;"),
    }
    style
}

pub fn indicator_classes(look: &IndicatorLook) -> String {
    if look.powered {
        format!("power-indicator powered {}", look.state.id())
    } else {
        format!("power-indicator {}", look.state.id())
    }
}

pub fn banner_classes(banner: Option<&Banner>) -> String {
    match banner {
        Some(b) => format!("banner {}", b.kind.css_class()),
        None => "banner hidden".to_string(),
    }
}

/// CSS `display` value for a visibility flag.
pub fn display_value(visible: bool) -> &'static str {
    if visible { "" } else { "none" }
}

/// CSS properties of a surface element at its display size. Pixels stay
/// square and sharp at every integer scale.
pub fn canvas_size_properties(width: u32, height: u32) -> [(&'static str, String); 3] {
    [
        ("width", format!("{width}px")),
        ("height", format!("{height}px")),
        ("image-rendering", "pixelated".to_string()),
    ]
}

/// Table rows for the key-binding panel.
pub fn bindings_html(rows: &[BindingRow], capturing: Option<VirtualButton>) -> String {
    let mut html = String::new();
    for (button, key) in rows {
        let listening = capturing == Some(*button);
        let key_text = match (listening, key) {
            (true, _) => "press a key\u{2026}".to_string(),
            (false, Some(code)) => escape_html(code),
            (false, None) => "unbound".to_string(),
        };
        let class = if listening { " class=\"capturing\"" } else { "" };
        html.push_str(&format!(
            "<tr data-button=\"{id}\"{class}><td>{id}</td><td>{key_text}</td></tr>",
            id = button.id(),
        ));
    }
    html
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Viewport dimension from a `window.innerWidth`-style float.
pub fn css_px(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}
