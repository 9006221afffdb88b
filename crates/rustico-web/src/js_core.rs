//! Adapter for the JS-side emulation core.
//!
//! The page's loader resolves to an object with this surface:
//!
//! ```js
//! {
//!   pollFrame()  -> Uint8Array | null   // 256x240, RGBA or RGB
//!   powerState() -> "off" | "on" | "error"
//!   sendInput(buttonId, pressed)
//!   debugText()  -> string | null
//! }
//! ```

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use rustico_shell::EmulatorCore;
use rustico_shell::error::{Result, ShellError};
use rustico_shell::frame::FrameBuffer;
use rustico_shell::input::VirtualButton;
use rustico_shell::power::PowerState;

use crate::core_health::{CoreHealth, decode_frame};

#[wasm_bindgen]
extern "C" {
    pub type JsCore;

    #[wasm_bindgen(method, catch, js_name = pollFrame)]
    fn poll_frame(this: &JsCore) -> std::result::Result<Option<Vec<u8>>, JsValue>;

    #[wasm_bindgen(method, catch, js_name = powerState)]
    fn power_state(this: &JsCore) -> std::result::Result<String, JsValue>;

    #[wasm_bindgen(method, catch, js_name = sendInput)]
    fn send_input(this: &JsCore, button: &str, pressed: bool) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = debugText)]
    fn debug_text(this: &JsCore) -> std::result::Result<Option<String>, JsValue>;
}

const REQUIRED_METHODS: [&str; 4] = ["pollFrame", "powerState", "sendInput", "debugText"];

pub struct JsCoreAdapter {
    inner: JsCore,
    health: CoreHealth,
}

impl JsCoreAdapter {
    /// Check the loader's result exposes the core interface.
    pub fn from_js(value: JsValue) -> Result<Self> {
        if !value.is_object() {
            return Err(ShellError::Load("core loader did not resolve to an object".into()));
        }
        for method in REQUIRED_METHODS {
            let has = js_sys::Reflect::get(&value, &JsValue::from_str(method))
                .map(|f| f.is_function())
                .unwrap_or(false);
            if !has {
                return Err(ShellError::Load(format!("core object has no {method}()")));
            }
        }
        Ok(Self {
            inner: value.unchecked_into(),
            health: CoreHealth::new(),
        })
    }

    fn record_fault(&mut self, call: &str, err: JsValue) {
        let detail = err
            .dyn_ref::<js_sys::Error>()
            .map(|e| String::from(e.message()))
            .or_else(|| err.as_string())
            .unwrap_or_else(|| format!("{err:?}"));
        self.health.record(call, detail);
    }
}

impl EmulatorCore for JsCoreAdapter {
    fn poll_frame(&mut self) -> Option<FrameBuffer> {
        if self.health.fault().is_some() {
            return None;
        }
        match self.inner.poll_frame() {
            Ok(pixels) => decode_frame(pixels?),
            Err(e) => {
                self.record_fault("pollFrame", e);
                None
            },
        }
    }

    fn power_state(&self) -> PowerState {
        let reported = self.inner.power_state().ok();
        self.health.power(reported.as_deref())
    }

    fn send_input(&mut self, button: VirtualButton, pressed: bool) {
        if let Err(e) = self.inner.send_input(button.id(), pressed) {
            self.record_fault("sendInput", e);
        }
    }

    fn debug_text(&self) -> Option<String> {
        if let Some(fault) = self.health.fault() {
            return Some(fault.to_string());
        }
        self.inner.debug_text().ok().flatten()
    }
}
