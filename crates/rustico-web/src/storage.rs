//! Persistent settings layered over an in-memory session.
//!
//! In the browser the backing store is `localStorage`. When it is missing
//! (private browsing, sandboxed iframes) settings live for the session only.
//! Writes always land in memory first so a rejected write still takes effect
//! for the session.

use rustico_shell::error::Result;
use rustico_shell::settings::{MemorySettings, SettingsStore};

/// Key prefix inside the backing store.
const PREFIX: &str = "rustico.";

/// Durable key/value storage.
pub trait Persistence {
    fn load(&self, key: &str) -> Option<String>;
    fn store(&self, key: &str, value: &str) -> Result<()>;
}

pub struct LayeredSettings<P> {
    backing: Option<P>,
    session: MemorySettings,
}

impl<P: Persistence> LayeredSettings<P> {
    pub fn new(backing: Option<P>) -> Self {
        Self {
            backing,
            session: MemorySettings::new(),
        }
    }
}

impl<P: Persistence> SettingsStore for LayeredSettings<P> {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.session.get(key) {
            return Some(value);
        }
        self.backing.as_ref()?.load(&format!("{PREFIX}{key}"))
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        let stored = match &self.backing {
            Some(backing) => backing.store(&format!("{PREFIX}{key}"), &value),
            None => Ok(()),
        };
        self.session.set(key, value)?;
        stored
    }
}

#[cfg(target_arch = "wasm32")]
pub use local::LocalSettings;

#[cfg(target_arch = "wasm32")]
mod local {
    use web_sys::{Storage, Window};

    use rustico_shell::error::Result;

    use super::{LayeredSettings, Persistence};
    use crate::js_error;

    pub type LocalSettings = LayeredSettings<Storage>;

    impl Persistence for Storage {
        fn load(&self, key: &str) -> Option<String> {
            self.get_item(key).ok().flatten()
        }

        fn store(&self, key: &str, value: &str) -> Result<()> {
            self.set_item(key, value)
                .map_err(|e| js_error("localStorage.setItem", e))
        }
    }

    impl LayeredSettings<Storage> {
        pub fn open(window: &Window) -> Self {
            let storage = match window.local_storage() {
                Ok(Some(storage)) => Some(storage),
                Ok(None) => {
                    log::warn!("localStorage unavailable, settings will not persist");
                    None
                },
                Err(e) => {
                    log::warn!("localStorage blocked ({e:?}), settings will not persist");
                    None
                },
            };
            Self::new(storage)
        }
    }
}
