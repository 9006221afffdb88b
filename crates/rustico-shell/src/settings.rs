//! Persistent user settings.
//!
//! A flat string key/value store. The browser host backs it with
//! `localStorage`; tests and the native harness use [`MemorySettings`].

use std::collections::BTreeMap;

use rustico_types::error::Result;

use crate::mode::Mode;

/// Serialized [`KeyMap`](crate::keymap::KeyMap).
pub const KEYMAP: &str = "input.keymap";
/// `"true"` / `"false"`.
pub const DEBUG: &str = "debug.enabled";

/// Key of a mode's windowed scale factor.
pub fn scale_key(mode: Mode) -> String {
    format!("video.scale.{}", mode.id())
}

pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemorySettings {
    values: BTreeMap<String, String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Read a `bool` setting; unreadable values are ignored.
pub fn get_bool(store: &dyn SettingsStore, key: &str) -> Option<bool> {
    store.get(key).and_then(|v| v.parse().ok())
}

/// Read a `u32` setting; unreadable values are ignored.
pub fn get_u32(store: &dyn SettingsStore, key: &str) -> Option<u32> {
    store.get(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_round_trip() {
        let mut s = MemorySettings::new();
        assert_eq!(s.get(DEBUG), None);
        s.set(DEBUG, "true".into()).unwrap();
        assert_eq!(get_bool(&s, DEBUG), Some(true));
    }

    #[test]
    fn scale_keys_per_mode() {
        assert_eq!(scale_key(Mode::Playfield), "video.scale.playfield");
        assert_eq!(scale_key(Mode::ConfigureInput), "video.scale.configure-input");
    }

    #[test]
    fn garbage_values_are_none() {
        let mut s = MemorySettings::new();
        s.set("video.scale.jam", "huge".into()).unwrap();
        assert_eq!(get_u32(&s, "video.scale.jam"), None);
        s.set(DEBUG, "yes".into()).unwrap();
        assert_eq!(get_bool(&s, DEBUG), None);
    }
}
