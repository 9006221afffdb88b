//! Banner and debug channels.
//!
//! The banner is a single dismissible slot for user-facing messages; a new
//! banner replaces the current one. The debug channel holds raw diagnostic
//! text and is only shown while debug output is enabled.

/// Severity of a banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Info,
    Error,
}

impl BannerKind {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Info => "banner-info",
            Self::Error => "banner-error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
}

/// Single-slot banner.
#[derive(Debug, Default)]
pub struct BannerChannel {
    slot: Option<Banner>,
}

impl BannerChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever banner is showing.
    pub fn show(&mut self, kind: BannerKind, message: impl Into<String>) -> &Banner {
        self.slot.insert(Banner {
            kind,
            message: message.into(),
        })
    }

    /// Hide the banner. Returns whether one was visible.
    pub fn dismiss(&mut self) -> bool {
        self.slot.take().is_some()
    }

    /// The banner currently on screen.
    pub fn current(&self) -> Option<&Banner> {
        self.slot.as_ref()
    }

    /// Whether `message` is already on screen with the given kind.
    pub fn is_showing(&self, kind: BannerKind, message: &str) -> bool {
        self.current()
            .is_some_and(|b| b.kind == kind && b.message == message)
    }
}

/// Raw diagnostic output.
#[derive(Debug, Default)]
pub struct DebugChannel {
    text: String,
    enabled: bool,
}

impl DebugChannel {
    pub fn new(enabled: bool) -> Self {
        Self {
            text: String::new(),
            enabled,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Replace the dump. Returns whether the text changed.
    pub fn record(&mut self, text: &str) -> bool {
        if self.text == text {
            return false;
        }
        self.text.clear();
        self.text.push_str(text);
        true
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The block is visible only when enabled and non-empty.
    pub fn visible(&self) -> bool {
        self.enabled && !self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_banner_replaces_previous() {
        let mut ch = BannerChannel::new();
        ch.show(BannerKind::Info, "loading");
        ch.show(BannerKind::Error, "failed");
        let b = ch.current().unwrap();
        assert_eq!(b.kind, BannerKind::Error);
        assert_eq!(b.message, "failed");
    }

    #[test]
    fn dismiss_hides() {
        let mut ch = BannerChannel::new();
        assert!(!ch.dismiss());
        ch.show(BannerKind::Error, "x");
        assert!(ch.dismiss());
        assert!(ch.current().is_none());
        assert!(!ch.dismiss());
    }

    #[test]
    fn show_after_dismiss_is_visible_again() {
        let mut ch = BannerChannel::new();
        ch.show(BannerKind::Info, "a");
        ch.dismiss();
        ch.show(BannerKind::Info, "a");
        assert!(ch.is_showing(BannerKind::Info, "a"));
        assert!(!ch.is_showing(BannerKind::Error, "a"));
    }

    #[test]
    fn debug_visible_only_when_enabled() {
        let mut dbg = DebugChannel::new(false);
        assert!(dbg.record("pc=8000"));
        assert!(!dbg.visible());
        dbg.set_enabled(true);
        assert!(dbg.visible());
        assert_eq!(dbg.text(), "pc=8000");
        assert!(!dbg.record("pc=8000"));
        assert!(dbg.record(""));
        assert!(!dbg.visible());
    }

    #[test]
    fn css_classes() {
        assert_eq!(BannerKind::Error.css_class(), "banner-error");
        assert_eq!(BannerKind::Info.css_class(), "banner-info");
    }
}
