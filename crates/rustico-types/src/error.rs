//! Error types for the rustico web shell.

use std::io;

/// Errors produced by the shell.
///
/// Every variant is recovered at the shell boundary; none of them tear down
/// the UI. `Configuration` is a programmer error that fails only the call that
/// raised it.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// Invalid mode, button, surface or setting identifier.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The emulation core module failed to load.
    #[error("load error: {0}")]
    Load(String),

    /// The emulation core reported an error or handed over a malformed frame.
    #[error("core error: {0}")]
    Core(String),

    /// The host (DOM, software canvas) rejected an operation.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ShellError>;
