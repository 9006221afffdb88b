//! Mode state machine.
//!
//! Exactly one mode is active at any time. Switching is a single
//! synchronous step: the outgoing mode's render loop is stopped, its
//! subscriptions released, its surfaces and panel hidden, and only then is
//! the incoming mode brought up. No display refresh can observe two modes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use rustico_types::error::{Result, ShellError};

use crate::backend::ShellHost;
use crate::render_loop::{FramePacer, FramePacing, RenderLoopAdapter};
use crate::subscription::{Owner, Subscriptions, Topic};
use crate::surface::{SurfaceId, SurfaceRegistry};

/// Presentation modes of the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Mode {
    /// The game screen, with the virtual controller in fullscreen.
    #[default]
    Playfield,
    /// Game screen plus audio/visual jam panel.
    Jam,
    /// Key binding editor with a small live preview.
    ConfigureInput,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Playfield, Mode::Jam, Mode::ConfigureInput];

    pub fn id(self) -> &'static str {
        match self {
            Self::Playfield => "playfield",
            Self::Jam => "jam",
            Self::ConfigureInput => "configure-input",
        }
    }

    /// Modes that may go fullscreen and therefore host the virtual
    /// controller.
    pub fn fullscreen_capable(self) -> bool {
        matches!(self, Self::Playfield | Self::Jam)
    }

    /// Id of the mode's control panel element.
    pub fn panel(self) -> &'static str {
        match self {
            Self::Playfield => "playfield-panel",
            Self::Jam => "jam-panel",
            Self::ConfigureInput => "input-panel",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Mode {
    type Err = ShellError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.id() == s)
            .ok_or_else(|| ShellError::Configuration(format!("unknown mode {s:?}")))
    }
}

impl TryFrom<String> for Mode {
    type Error = ShellError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Notification emitted after a successful switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub from: Mode,
    pub to: Mode,
}

#[derive(Debug)]
pub struct ModeManager {
    active: Mode,
    surfaces: SurfaceRegistry,
    loops: BTreeMap<Mode, RenderLoopAdapter>,
    subscriptions: Subscriptions,
}

impl ModeManager {
    /// One render loop per mode, drawing into the mode's primary surface.
    pub fn new(
        initial: Mode,
        surfaces: SurfaceRegistry,
        pacing: FramePacing,
        core_frame_rate: f64,
    ) -> Result<Self> {
        let mut loops = BTreeMap::new();
        for mode in Mode::ALL {
            let spec = surfaces.primary(mode)?;
            let pacer = FramePacer::new(pacing, core_frame_rate);
            loops.insert(mode, RenderLoopAdapter::new(spec, pacer));
        }
        Ok(Self {
            active: initial,
            surfaces,
            loops,
            subscriptions: Subscriptions::new(),
        })
    }

    pub fn active(&self) -> Mode {
        self.active
    }

    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    pub fn surfaces_mut(&mut self) -> &mut SurfaceRegistry {
        &mut self.surfaces
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn subscriptions_mut(&mut self) -> &mut Subscriptions {
        &mut self.subscriptions
    }

    pub fn render_loop(&self, mode: Mode) -> Option<&RenderLoopAdapter> {
        self.loops.get(&mode)
    }

    pub fn render_loop_mut(&mut self, mode: Mode) -> Option<&mut RenderLoopAdapter> {
        self.loops.get_mut(&mode)
    }

    /// Modes whose render loop is running. Never more than one.
    pub fn running_loops(&self) -> Vec<Mode> {
        self.loops
            .iter()
            .filter(|(_, rla)| rla.is_running())
            .map(|(&m, _)| m)
            .collect()
    }

    /// Bring up the initial mode's surfaces and panel, hiding every other
    /// panel. The render loop waits for a core.
    pub fn mount<H: ShellHost>(&mut self, host: &mut H) -> Result<()> {
        for mode in Mode::ALL {
            host.set_panel_visible(mode.panel(), mode == self.active)?;
        }
        let fresh = self.surfaces.show_mode(self.active, host)?;
        self.mark_fresh(&fresh);
        log::info!("mounted in {} mode", self.active);
        Ok(())
    }

    /// Start the active mode's render loop.
    pub fn start_active<H: ShellHost>(&mut self, host: &mut H) -> Result<()> {
        let mode = self.active;
        if let Some(rla) = self.loops.get_mut(&mode) {
            rla.start(host)?;
            self.subscriptions
                .ensure(Owner::Mode(mode), Topic::AnimationFrame);
        }
        Ok(())
    }

    /// Switch to `mode`. Re-activating the active mode is a no-op.
    ///
    /// `core_ready` controls whether the incoming mode's render loop is
    /// started. Backend failures during the switch are reported after the
    /// switch completes; the new mode is active either way.
    pub fn activate<H: ShellHost>(
        &mut self,
        mode: Mode,
        core_ready: bool,
        host: &mut H,
    ) -> Result<Option<ModeChange>> {
        let from = self.active;
        if mode == from {
            return Ok(None);
        }
        let mut first_err = None;

        if let Some(rla) = self.loops.get_mut(&from) {
            rla.stop(host);
        }
        let released = self.subscriptions.release(Owner::Mode(from));
        log::debug!("released {released} subscriptions of {from}");
        keep(&mut first_err, self.surfaces.hide_mode(from, host));
        keep(&mut first_err, host.set_panel_visible(from.panel(), false));

        self.active = mode;
        match self.surfaces.show_mode(mode, host) {
            Ok(fresh) => self.mark_fresh(&fresh),
            Err(e) => keep(&mut first_err, Err(e)),
        }
        keep(&mut first_err, host.set_panel_visible(mode.panel(), true));
        if core_ready {
            keep(&mut first_err, self.start_active(host));
        }

        log::info!("mode {from} -> {mode}");
        match first_err {
            Some(e) => Err(e),
            None => Ok(Some(ModeChange { from, to: mode })),
        }
    }

    /// Release hidden surfaces under memory pressure. Their loops redraw the
    /// last frame once the surface comes back.
    pub fn reclaim<H: ShellHost>(&mut self, host: &mut H) -> Result<Vec<SurfaceId>> {
        let released = self.surfaces.release_hidden(host)?;
        self.mark_fresh(&released);
        Ok(released)
    }

    fn mark_fresh(&mut self, ids: &[SurfaceId]) {
        for rla in self.loops.values_mut() {
            if ids.contains(&rla.surface()) {
                rla.mark_reallocated();
            }
        }
    }
}

fn keep(slot: &mut Option<ShellError>, result: Result<()>) {
    if let Err(e) = result {
        log::warn!("mode switch: {e}");
        slot.get_or_insert(e);
    }
}
