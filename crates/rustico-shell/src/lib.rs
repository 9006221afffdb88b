//! rustico web shell.
//!
//! Platform-agnostic orchestration layer that hosts an emulation core in
//! several mutually-exclusive modes. It owns the mode state machine, the
//! per-mode rendering surfaces and their frame loops, the power indicator,
//! the banner and debug channels, and the virtual on-screen controller.
//! All host I/O goes through the traits in [`backend`]; this crate has no
//! platform dependencies.

// Re-exports from rustico-types (foundation types).
pub use rustico_types::color;
pub use rustico_types::error;
pub use rustico_types::frame;
pub use rustico_types::input;

pub mod backend;
pub mod banner;
pub mod config;
pub mod controller;
pub mod keymap;
pub mod latch;
pub mod mode;
pub mod power;
pub mod render_loop;
pub mod settings;
pub mod shell;
pub mod subscription;
pub mod surface;

#[cfg(test)]
pub(crate) mod test_utils;

pub use backend::{ChromeBackend, EmulatorCore, FrameHandle, FrameScheduler, ShellHost, SurfaceBackend};
pub use config::ShellConfig;
pub use mode::Mode;
pub use power::PowerState;
pub use shell::Shell;
