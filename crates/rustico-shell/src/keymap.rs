//! Physical keyboard bindings.
//!
//! Keys are identified by `KeyboardEvent.code` strings ("KeyX", "Enter").
//! Each button has at most one key. Bindings are edited from the
//! ConfigureInput panel by capturing the next key press and are persisted
//! as JSON in the settings store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rustico_types::error::Result;
use rustico_types::input::VirtualButton;

use crate::controller::InputEdge;
use crate::settings::{self, SettingsStore};

/// Key that aborts a capture instead of being bound.
pub const CANCEL_CAPTURE_KEY: &str = "Escape";

/// One row of the binding table: a button and its key, if bound.
pub type BindingRow = (VirtualButton, Option<String>);

/// Key code to button map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMap {
    bindings: BTreeMap<String, VirtualButton>,
}

impl Default for KeyMap {
    fn default() -> Self {
        let mut map = Self::empty();
        for (code, button) in [
            ("KeyX", VirtualButton::RoundA),
            ("KeyZ", VirtualButton::RoundB),
            ("KeyS", VirtualButton::RoundSmallA),
            ("KeyA", VirtualButton::RoundSmallB),
            ("Enter", VirtualButton::PillStart),
            ("Backspace", VirtualButton::PillSelect),
            ("ArrowUp", VirtualButton::DpadUp),
            ("ArrowDown", VirtualButton::DpadDown),
            ("ArrowLeft", VirtualButton::DpadLeft),
            ("ArrowRight", VirtualButton::DpadRight),
        ] {
            map.bind(code, button);
        }
        map
    }
}

impl KeyMap {
    pub fn empty() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }

    /// Build from a `[keys]` table (`code = "button-id"`), on top of the
    /// defaults.
    pub fn from_table(table: &BTreeMap<String, String>) -> Result<Self> {
        let mut map = Self::default();
        for (code, id) in table {
            map.bind(code, id.parse()?);
        }
        Ok(map)
    }

    /// Restore from the settings store. Falls back to `fallback` when the
    /// stored value is missing or unreadable.
    pub fn load(store: &dyn SettingsStore, fallback: KeyMap) -> KeyMap {
        let Some(raw) = store.get(settings::KEYMAP) else {
            return fallback;
        };
        match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                log::warn!("ignoring stored key bindings: {e}");
                fallback
            },
        }
    }

    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<()> {
        store.set(settings::KEYMAP, serde_json::to_string(self)?)
    }

    pub fn button_for(&self, code: &str) -> Option<VirtualButton> {
        self.bindings.get(code).copied()
    }

    pub fn key_for(&self, button: VirtualButton) -> Option<&str> {
        self.bindings
            .iter()
            .find(|&(_, &b)| b == button)
            .map(|(code, _)| code.as_str())
    }

    /// Bind `code` to `button`, dropping any previous key of that button and
    /// any previous button of that key.
    pub fn bind(&mut self, code: &str, button: VirtualButton) {
        self.bindings.retain(|_, b| *b != button);
        self.bindings.insert(code.to_string(), button);
    }

    /// Binding table in button order.
    pub fn rows(&self) -> Vec<BindingRow> {
        VirtualButton::ALL
            .into_iter()
            .map(|b| (b, self.key_for(b).map(str::to_string)))
            .collect()
    }
}

/// Held physical keys. Produces one edge per press and per release,
/// ignoring auto-repeat.
#[derive(Debug, Default)]
pub struct KeyboardState {
    held: BTreeMap<String, VirtualButton>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&mut self, code: &str, repeat: bool, map: &KeyMap) -> Option<InputEdge> {
        if repeat || self.held.contains_key(code) {
            return None;
        }
        let button = map.button_for(code)?;
        self.held.insert(code.to_string(), button);
        Some(InputEdge::down(button))
    }

    /// Releases the button the key pressed, even if it was rebound since.
    pub fn key_up(&mut self, code: &str) -> Option<InputEdge> {
        self.held.remove(code).map(InputEdge::up)
    }

    pub fn release_all(&mut self) -> Vec<InputEdge> {
        std::mem::take(&mut self.held)
            .into_values()
            .map(InputEdge::up)
            .collect()
    }
}

/// Outcome of a key press while capturing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureResult {
    Bound { button: VirtualButton, code: String },
    Cancelled(VirtualButton),
}

/// "Press a key for ..." state of the input configuration panel.
#[derive(Debug, Default)]
pub struct InputCapture {
    target: Option<VirtualButton>,
}

impl InputCapture {
    pub fn begin(&mut self, button: VirtualButton) {
        self.target = Some(button);
    }

    pub fn cancel(&mut self) -> Option<VirtualButton> {
        self.target.take()
    }

    pub fn target(&self) -> Option<VirtualButton> {
        self.target
    }

    /// Consume a key press. Returns `None` when not capturing.
    pub fn capture(&mut self, code: &str, map: &mut KeyMap) -> Option<CaptureResult> {
        let button = self.target.take()?;
        if code == CANCEL_CAPTURE_KEY {
            return Some(CaptureResult::Cancelled(button));
        }
        map.bind(code, button);
        Some(CaptureResult::Bound {
            button,
            code: code.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;

    #[test]
    fn default_bindings() {
        let map = KeyMap::default();
        assert_eq!(map.button_for("KeyX"), Some(VirtualButton::RoundA));
        assert_eq!(map.button_for("KeyZ"), Some(VirtualButton::RoundB));
        assert_eq!(map.button_for("Enter"), Some(VirtualButton::PillStart));
        assert_eq!(map.button_for("Backspace"), Some(VirtualButton::PillSelect));
        assert_eq!(map.button_for("ArrowLeft"), Some(VirtualButton::DpadLeft));
        assert_eq!(map.button_for("KeyQ"), None);
        assert!(map.rows().iter().all(|(_, key)| key.is_some()));
    }

    #[test]
    fn bind_keeps_one_key_per_button() {
        let mut map = KeyMap::default();
        map.bind("KeyK", VirtualButton::RoundA);
        assert_eq!(map.button_for("KeyX"), None);
        assert_eq!(map.key_for(VirtualButton::RoundA), Some("KeyK"));
        // Stealing a key from another button unbinds that button.
        map.bind("KeyZ", VirtualButton::RoundA);
        assert_eq!(map.key_for(VirtualButton::RoundB), None);
    }

    #[test]
    fn table_overrides_defaults() {
        let mut table = BTreeMap::new();
        table.insert("KeyJ".to_string(), "round-b".to_string());
        let map = KeyMap::from_table(&table).unwrap();
        assert_eq!(map.button_for("KeyJ"), Some(VirtualButton::RoundB));
        assert_eq!(map.button_for("KeyZ"), None);

        table.insert("KeyL".to_string(), "turbo".to_string());
        assert!(KeyMap::from_table(&table).is_err());
    }

    #[test]
    fn save_and_load() {
        let mut store = MemorySettings::new();
        let mut map = KeyMap::default();
        map.bind("KeyP", VirtualButton::PillStart);
        map.save(&mut store).unwrap();
        let loaded = KeyMap::load(&store, KeyMap::empty());
        assert_eq!(loaded, map);
    }

    #[test]
    fn corrupt_store_falls_back() {
        let mut store = MemorySettings::new();
        store.set(settings::KEYMAP, "{not json".to_string()).unwrap();
        assert_eq!(KeyMap::load(&store, KeyMap::default()), KeyMap::default());
    }

    #[test]
    fn keyboard_ignores_repeat() {
        let map = KeyMap::default();
        let mut kb = KeyboardState::new();
        assert_eq!(
            kb.key_down("KeyX", false, &map),
            Some(InputEdge::down(VirtualButton::RoundA))
        );
        assert_eq!(kb.key_down("KeyX", true, &map), None);
        assert_eq!(kb.key_down("KeyX", false, &map), None);
        assert_eq!(kb.key_up("KeyX"), Some(InputEdge::up(VirtualButton::RoundA)));
        assert_eq!(kb.key_up("KeyX"), None);
    }

    #[test]
    fn unbound_keys_are_ignored() {
        let mut kb = KeyboardState::new();
        assert_eq!(kb.key_down("F5", false, &KeyMap::default()), None);
        assert!(kb.held.is_empty());
    }

    #[test]
    fn key_up_after_rebind_releases_original_button() {
        let mut map = KeyMap::default();
        let mut kb = KeyboardState::new();
        kb.key_down("KeyX", false, &map);
        map.bind("KeyX", VirtualButton::RoundB);
        assert_eq!(kb.key_up("KeyX"), Some(InputEdge::up(VirtualButton::RoundA)));
    }

    #[test]
    fn capture_binds_next_key() {
        let mut map = KeyMap::default();
        let mut cap = InputCapture::default();
        assert_eq!(cap.capture("KeyQ", &mut map), None);
        cap.begin(VirtualButton::RoundSmallA);
        assert_eq!(
            cap.capture("KeyQ", &mut map),
            Some(CaptureResult::Bound {
                button: VirtualButton::RoundSmallA,
                code: "KeyQ".to_string()
            })
        );
        assert_eq!(cap.target(), None);
        assert_eq!(map.button_for("KeyQ"), Some(VirtualButton::RoundSmallA));
    }

    #[test]
    fn escape_cancels_capture() {
        let mut map = KeyMap::default();
        let mut cap = InputCapture::default();
        cap.begin(VirtualButton::RoundA);
        assert_eq!(
            cap.capture(CANCEL_CAPTURE_KEY, &mut map),
            Some(CaptureResult::Cancelled(VirtualButton::RoundA))
        );
        assert_eq!(map, KeyMap::default());
    }
}
