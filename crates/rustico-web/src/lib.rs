//! Browser host for the rustico shell.
//!
//! Implements the shell's backend traits on top of `web-sys`: one 2D canvas
//! per surface, DOM chrome for the indicator, banner, debug block and
//! on-screen controller, `requestAnimationFrame` scheduling, `localStorage`
//! settings and an adapter for the JS-side emulation core. The page-level
//! entry point is [`WebShell`](app::WebShell).
//!
//! The page contract and the host-independent pieces ([`dom`],
//! [`core_health`], [`frames`], [`storage`]) build natively; the rest is
//! compiled for `wasm32` only.

pub mod core_health;
pub mod dom;
pub mod frames;
pub mod storage;

#[cfg(target_arch = "wasm32")]
mod app;
#[cfg(target_arch = "wasm32")]
mod canvas;
#[cfg(target_arch = "wasm32")]
mod chrome;
#[cfg(target_arch = "wasm32")]
mod js_core;
#[cfg(target_arch = "wasm32")]
mod listeners;
#[cfg(target_arch = "wasm32")]
mod scheduler;

#[cfg(target_arch = "wasm32")]
pub use app::WebShell;

/// Convert a thrown JS value into a backend error.
#[cfg(target_arch = "wasm32")]
pub(crate) fn js_error(context: &str, err: wasm_bindgen::JsValue) -> rustico_shell::error::ShellError {
    let detail = err.as_string().unwrap_or_else(|| format!("{err:?}"));
    rustico_shell::error::ShellError::Backend(format!("{context}: {detail}"))
}
