//! Foundation types for the rustico web shell.
//!
//! This crate contains the platform-agnostic types shared by every shell
//! crate: colors, host input events, the virtual button set, frame buffers
//! handed over by the emulation core, and the error type.

pub mod color;
pub mod error;
pub mod frame;
pub mod input;
