//! Shell configuration (`rustico.toml`).
//!
//! Every field is optional. An empty document yields the built-in defaults.
//!
//! ```toml
//! debug = false
//! default_mode = "playfield"
//! frame_pacing = "core-rate"
//! core_frame_rate = 60.0988
//!
//! [scale]
//! playfield = 3
//! jam = 2
//! configure_input = 1
//!
//! [indicator]
//! on = "#e02020"
//!
//! [keys]
//! KeyJ = "round-b"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use rustico_types::error::{Result, ShellError};

use crate::controller::ControllerMetrics;
use crate::keymap::KeyMap;
use crate::mode::Mode;
use crate::power::IndicatorColors;
use crate::render_loop::{FramePacing, NES_FRAME_RATE};
use crate::surface::{SurfaceSpec, check_scale, default_surfaces};

/// Windowed scale factor per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScaleConfig {
    #[serde(default = "default_playfield_scale")]
    pub playfield: u32,
    #[serde(default = "default_jam_scale")]
    pub jam: u32,
    #[serde(default = "default_input_scale")]
    pub configure_input: u32,
}

fn default_playfield_scale() -> u32 {
    3
}
fn default_jam_scale() -> u32 {
    2
}
fn default_input_scale() -> u32 {
    1
}
fn default_frame_rate() -> f64 {
    NES_FRAME_RATE
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            playfield: default_playfield_scale(),
            jam: default_jam_scale(),
            configure_input: default_input_scale(),
        }
    }
}

impl ScaleConfig {
    pub fn get(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Playfield => self.playfield,
            Mode::Jam => self.jam,
            Mode::ConfigureInput => self.configure_input,
        }
    }

    pub fn set(&mut self, mode: Mode, scale: u32) {
        match mode {
            Mode::Playfield => self.playfield = scale,
            Mode::Jam => self.jam = scale,
            Mode::ConfigureInput => self.configure_input = scale,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    /// Show the debug block from startup.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub default_mode: Mode,
    #[serde(default)]
    pub frame_pacing: FramePacing,
    /// Core frames per second, used by `core-rate` pacing.
    #[serde(default = "default_frame_rate")]
    pub core_frame_rate: f64,
    #[serde(default)]
    pub scale: ScaleConfig,
    #[serde(default)]
    pub indicator: IndicatorColors,
    #[serde(default)]
    pub controller: ControllerMetrics,
    /// Key code to button id overrides.
    #[serde(default)]
    pub keys: BTreeMap<String, String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            debug: false,
            default_mode: Mode::default(),
            frame_pacing: FramePacing::default(),
            core_frame_rate: NES_FRAME_RATE,
            scale: ScaleConfig::default(),
            indicator: IndicatorColors::default(),
            controller: ControllerMetrics::default(),
            keys: BTreeMap::new(),
        }
    }
}

impl ShellConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| ShellError::Configuration(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        for mode in Mode::ALL {
            check_scale(self.scale.get(mode))?;
        }
        if !self.core_frame_rate.is_finite() || self.core_frame_rate <= 0.0 {
            return Err(ShellError::Configuration(format!(
                "core_frame_rate must be positive, got {}",
                self.core_frame_rate
            )));
        }
        self.controller.validate()?;
        self.keymap()?;
        Ok(())
    }

    /// Surface set with the configured scales applied.
    pub fn surfaces(&self) -> Vec<SurfaceSpec> {
        let mut specs = default_surfaces();
        for spec in &mut specs {
            spec.scale = self.scale.get(spec.mode);
        }
        specs
    }

    pub fn keymap(&self) -> Result<KeyMap> {
        KeyMap::from_table(&self.keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustico_types::color::Color;
    use rustico_types::input::VirtualButton;
    use crate::surface::SurfaceId;

    #[test]
    fn empty_document_is_default() {
        let c = ShellConfig::from_toml("").unwrap();
        assert!(!c.debug);
        assert_eq!(c.default_mode, Mode::Playfield);
        assert_eq!(c.frame_pacing, FramePacing::CoreRate);
        assert_eq!(c.scale, ScaleConfig::default());
        assert!((c.core_frame_rate - NES_FRAME_RATE).abs() < f64::EPSILON);
    }

    #[test]
    fn full_document() {
        let c = ShellConfig::from_toml(
            r##"
debug = true
default_mode = "jam"
frame_pacing = "every-tick"
core_frame_rate = 50.007

[scale]
jam = 4

[indicator]
on = "#00ff00"

[controller]
margin = 24

[keys]
KeyJ = "round-b"
"##,
        )
        .unwrap();
        assert!(c.debug);
        assert_eq!(c.default_mode, Mode::Jam);
        assert_eq!(c.frame_pacing, FramePacing::EveryTick);
        assert_eq!(c.scale.jam, 4);
        assert_eq!(c.scale.playfield, 3);
        assert_eq!(c.indicator.on, Color::rgb(0, 255, 0));
        assert_eq!(c.controller.margin, 24);
        assert_eq!(c.controller.gap, ControllerMetrics::default().gap);
        assert_eq!(c.keymap().unwrap().button_for("KeyJ"), Some(VirtualButton::RoundB));
    }

    #[test]
    fn surfaces_use_configured_scale() {
        let c = ShellConfig::from_toml("[scale]\nplayfield = 5").unwrap();
        let specs = c.surfaces();
        let pf = specs.iter().find(|s| s.id == SurfaceId::PLAYFIELD).unwrap();
        assert_eq!(pf.display_size(None), (1280, 1200));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ShellConfig::from_toml("default_mode = \"arcade\"").is_err());
        assert!(ShellConfig::from_toml("[scale]\njam = 0").is_err());
        assert!(ShellConfig::from_toml("[scale]\njam = 12").is_err());
        assert!(ShellConfig::from_toml("core_frame_rate = 0.0").is_err());
        assert!(ShellConfig::from_toml("[keys]\nKeyJ = \"turbo\"").is_err());
        assert!(ShellConfig::from_toml("frame_pacing = \"vsync\"").is_err());
    }

    #[test]
    fn rejects_out_of_range_controller_metrics() {
        let err = ShellConfig::from_toml("[controller]\npill_width = 2000000000").unwrap_err();
        assert!(matches!(err, ShellError::Configuration(_)));
        assert!(err.to_string().contains("pill_width"));
        assert!(ShellConfig::from_toml("[controller]\nround = 0").is_err());
        assert!(ShellConfig::from_toml("[controller]\ngap = 5000").is_err());
        let c = ShellConfig::from_toml("[controller]\nmargin = 0\ndpad_arm = 4096").unwrap();
        assert_eq!(c.controller.margin, 0);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = ShellConfig::load(Path::new("/nonexistent/rustico.toml")).unwrap_err();
        assert!(matches!(err, ShellError::Io(_)));
    }
}
