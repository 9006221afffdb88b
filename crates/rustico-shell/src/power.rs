//! Power/status indicator.
//!
//! Mirrors the core's power signal onto a visual indicator. The indicator
//! is derived state: [`PowerIndicator::sync`] is the only way it changes.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use rustico_types::color::Color;
use rustico_types::error::ShellError;

use crate::backend::EmulatorCore;

/// Power signal reported by the emulation core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    #[default]
    Off,
    On,
    Error,
}

impl PowerState {
    pub fn id(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for PowerState {
    type Err = ShellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "on" => Ok(Self::On),
            "error" => Ok(Self::Error),
            _ => Err(ShellError::Core(format!("unknown power state {s:?}"))),
        }
    }
}

/// Indicator palette, configurable under `[indicator]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndicatorColors {
    /// Neutral lamp color when unpowered.
    pub off: Color,
    /// Lamp color when powered.
    pub on: Color,
    /// Glow drawn around the lamp when powered.
    pub glow: Color,
}

impl Default for IndicatorColors {
    fn default() -> Self {
        Self {
            off: Color::rgb(0x3a, 0x3a, 0x3a),
            on: Color::rgb(0xe0, 0x20, 0x20),
            glow: Color::rgba(0xff, 0x50, 0x50, 0x80),
        }
    }
}

/// What the indicator element should look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorLook {
    pub state: PowerState,
    /// Highlighted styling (the `powered` class).
    pub powered: bool,
    pub color: Color,
    pub glow: Option<Color>,
}

/// A change of the mirrored power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerTransition {
    pub from: PowerState,
    pub to: PowerState,
}

#[derive(Debug)]
pub struct PowerIndicator {
    state: PowerState,
    colors: IndicatorColors,
}

impl PowerIndicator {
    pub fn new(colors: IndicatorColors) -> Self {
        Self {
            state: PowerState::Off,
            colors,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Re-read the core's power signal. With no core loaded the indicator
    /// reads `Off`. Returns the transition when the state changed.
    pub fn sync(&mut self, core: Option<&dyn EmulatorCore>) -> Option<PowerTransition> {
        let next = core.map_or(PowerState::Off, |c| c.power_state());
        if next == self.state {
            return None;
        }
        let transition = PowerTransition {
            from: self.state,
            to: next,
        };
        log::debug!("power indicator: {} -> {}", transition.from, transition.to);
        self.state = next;
        Some(transition)
    }

    /// Errors read as unpowered.
    pub fn look(&self) -> IndicatorLook {
        match self.state {
            PowerState::On => IndicatorLook {
                state: self.state,
                powered: true,
                color: self.colors.on,
                glow: Some(self.colors.glow),
            },
            PowerState::Off | PowerState::Error => IndicatorLook {
                state: self.state,
                powered: false,
                color: self.colors.off,
                glow: None,
            },
        }
    }
}
