//! The shell facade.
//!
//! [`Shell`] wires the mode manager, indicator, banner and debug channels,
//! virtual controller and key bindings together and is the single entry
//! point for host events. Errors raised while handling host events are
//! recovered here: they are logged, shown as a dismissible banner, and the
//! UI keeps running.

use std::collections::BTreeSet;

use rustico_types::error::{Result, ShellError};
use rustico_types::input::{HostEvent, Viewport, VirtualButton};

use crate::backend::{EmulatorCore, FrameHandle, ShellHost};
use crate::banner::{Banner, BannerChannel, BannerKind, DebugChannel};
use crate::config::ShellConfig;
use crate::controller::{InputEdge, VirtualController};
use crate::keymap::{CaptureResult, InputCapture, KeyMap, KeyboardState};
use crate::latch::{InputLatch, InputSource};
use crate::mode::{Mode, ModeChange, ModeManager};
use crate::power::{PowerIndicator, PowerState};
use crate::render_loop::TickOutcome;
use crate::settings::{self, SettingsStore};
use crate::subscription::{Owner, Topic};
use crate::surface::{SurfaceRegistry, check_scale};

/// Banner shown when the core module cannot be loaded.
pub const LOAD_FAILED_MESSAGE: &str = "The emulator could not be loaded.";

/// Banner shown when the core faults without diagnostic text.
pub const CORE_FAULT_MESSAGE: &str = "The emulator stopped with an error.";

/// Topics the shell listens to for its whole lifetime.
const SHELL_TOPICS: [Topic; 5] = [
    Topic::PointerRelease,
    Topic::Viewport,
    Topic::Fullscreen,
    Topic::Keyboard,
    Topic::Focus,
];

/// Banner text for a core fault: the first non-empty line of the core's
/// diagnostic text.
pub fn core_error_message(debug_text: Option<&str>) -> String {
    debug_text
        .and_then(|t| t.lines().map(str::trim).find(|l| !l.is_empty()))
        .map_or_else(|| CORE_FAULT_MESSAGE.to_string(), |l| format!("Emulator error: {l}"))
}

pub struct Shell {
    modes: ModeManager,
    power: PowerIndicator,
    banner: BannerChannel,
    debug: DebugChannel,
    controller: VirtualController,
    keymap: KeyMap,
    keyboard: KeyboardState,
    capture: InputCapture,
    latch: InputLatch,
    settings: Box<dyn SettingsStore>,
    core: Option<Box<dyn EmulatorCore>>,
    viewport: Viewport,
    fullscreen: bool,
}

impl Shell {
    /// Build the shell. Stored settings (key bindings, scale factors, debug
    /// flag) take precedence over the configuration file.
    pub fn new(
        mut config: ShellConfig,
        settings: Box<dyn SettingsStore>,
        viewport: Viewport,
    ) -> Result<Self> {
        config.validate()?;
        let store = settings.as_ref();
        let keymap = KeyMap::load(store, config.keymap()?);
        let debug = settings::get_bool(store, settings::DEBUG).unwrap_or(config.debug);
        for mode in Mode::ALL {
            let Some(stored) = settings::get_u32(store, &settings::scale_key(mode)) else {
                continue;
            };
            match check_scale(stored) {
                Ok(scale) => config.scale.set(mode, scale),
                Err(e) => log::warn!("ignoring stored scale for {mode}: {e}"),
            }
        }

        let surfaces = SurfaceRegistry::new(config.surfaces())?;
        let mut modes = ModeManager::new(
            config.default_mode,
            surfaces,
            config.frame_pacing,
            config.core_frame_rate,
        )?;
        for topic in SHELL_TOPICS {
            modes.subscriptions_mut().ensure(Owner::Shell, topic);
        }

        let mut controller = VirtualController::new(config.controller, viewport);
        controller.bind(config.default_mode.fullscreen_capable());

        Ok(Self {
            modes,
            power: PowerIndicator::new(config.indicator),
            banner: BannerChannel::new(),
            debug: DebugChannel::new(debug),
            controller,
            keymap,
            keyboard: KeyboardState::new(),
            capture: InputCapture::default(),
            latch: InputLatch::new(),
            settings,
            core: None,
            viewport,
            fullscreen: false,
        })
    }

    /// Push the initial UI state to the host.
    pub fn mount<H: ShellHost>(&mut self, host: &mut H) -> Result<()> {
        self.modes.mount(host)?;
        host.set_indicator(&self.power.look())?;
        host.set_banner(self.banner.current())?;
        host.set_debug(self.debug.text(), self.debug.visible())?;
        host.set_controller(None)?;
        host.set_bindings(&self.keymap.rows(), None)?;
        Ok(())
    }

    /// Hand over the outcome of the one-time core module load.
    ///
    /// On failure the shell stays on its current mode with an error banner
    /// and never starts a render loop.
    pub fn attach_core<H: ShellHost>(
        &mut self,
        loaded: Result<Box<dyn EmulatorCore>>,
        host: &mut H,
    ) {
        match loaded {
            Ok(core) => {
                log::info!("emulation core loaded");
                self.core = Some(core);
                self.sync_power(host);
                if let Err(e) = self.modes.start_active(host) {
                    self.report(e, host);
                }
            },
            Err(e) => {
                log::error!("emulation core failed to load: {e}");
                self.debug.record(&e.to_string());
                self.show_banner(BannerKind::Error, LOAD_FAILED_MESSAGE, host);
                self.push_debug(host);
            },
        }
    }

    pub fn active_mode(&self) -> Mode {
        self.modes.active()
    }

    pub fn modes(&self) -> &ModeManager {
        &self.modes
    }

    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.current()
    }

    pub fn debug(&self) -> &DebugChannel {
        &self.debug
    }

    pub fn controller(&self) -> &VirtualController {
        &self.controller
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    pub fn capture_target(&self) -> Option<VirtualButton> {
        self.capture.target()
    }

    pub fn core_loaded(&self) -> bool {
        self.core.is_some()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Host event sources that currently need a native listener.
    pub fn live_topics(&self) -> BTreeSet<Topic> {
        self.modes.subscriptions().live_topics()
    }

    /// Switch modes. Re-activating the active mode is a no-op.
    pub fn activate<H: ShellHost>(&mut self, mode: Mode, host: &mut H) -> Result<()> {
        let from = self.modes.active();
        let result = self.modes.activate(mode, self.core.is_some(), host);
        let to = self.modes.active();
        if to != from {
            self.on_mode_changed(ModeChange { from, to }, host);
        }
        result.map(|_| ())
    }

    /// Switch modes by id. Unknown ids are a `Configuration` error and leave
    /// the active mode untouched.
    pub fn activate_id<H: ShellHost>(&mut self, id: &str, host: &mut H) -> Result<()> {
        let mode: Mode = id.parse()?;
        self.activate(mode, host)
    }

    /// Dispatch a host event. Never fails; problems end up in the banner.
    pub fn handle_event<H: ShellHost>(&mut self, event: HostEvent, host: &mut H) {
        match event {
            HostEvent::PointerDown { id, x, y } => {
                if self
                    .modes
                    .subscriptions()
                    .holds(Owner::Controller, Topic::PointerPress)
                {
                    let edges = self.controller.pointer_down(id, x, y);
                    self.forward(InputSource::Touch, edges, host);
                }
            },
            HostEvent::PointerUp { id } => {
                let edges = self.controller.pointer_up(id);
                self.forward(InputSource::Touch, edges, host);
            },
            HostEvent::PointerCancel { id } => {
                let edges = self.controller.pointer_cancel(id);
                self.forward(InputSource::Touch, edges, host);
            },
            HostEvent::Resize(viewport) | HostEvent::OrientationChange(viewport) => {
                self.on_viewport(viewport, host);
            },
            HostEvent::FullscreenChanged(on) => self.on_fullscreen(on, host),
            HostEvent::TouchCapability(touch) => {
                let edges = self.controller.set_touch_capable(touch);
                self.forward(InputSource::Touch, edges, host);
                self.refresh_controller(host);
            },
            HostEvent::KeyDown { code, repeat } => self.on_key_down(&code, repeat, host),
            HostEvent::KeyUp { code } => {
                let edges: Vec<InputEdge> = self.keyboard.key_up(&code).into_iter().collect();
                self.forward(InputSource::Keyboard, edges, host);
            },
            HostEvent::FocusLost => {
                log::debug!("focus lost, releasing all input");
                let touch = self.controller.release_all();
                self.forward(InputSource::Touch, touch, host);
                let keys = self.keyboard.release_all();
                self.forward(InputSource::Keyboard, keys, host);
            },
        }
        self.resume_stalled_loop(host);
    }

    /// Restart the active loop if it stopped because the host refused to
    /// schedule a callback.
    fn resume_stalled_loop<H: ShellHost>(&mut self, host: &mut H) {
        if self.core.is_none() {
            return;
        }
        let stalled = self
            .modes
            .render_loop(self.modes.active())
            .is_some_and(|rla| !rla.is_running());
        if !stalled {
            return;
        }
        log::info!("restarting stalled render loop");
        if let Err(e) = self.modes.start_active(host) {
            self.report(e, host);
        }
        self.sync_power(host);
    }

    /// Display-refresh callback. Stale handles draw nothing.
    pub fn on_animation_frame<H: ShellHost>(
        &mut self,
        handle: FrameHandle,
        now_ms: f64,
        host: &mut H,
    ) -> TickOutcome {
        let mode = self.modes.active();
        let Some(core) = self.core.as_deref_mut() else {
            return TickOutcome::Stale;
        };
        let Some(rla) = self.modes.render_loop_mut(mode) else {
            return TickOutcome::Stale;
        };
        let outcome = match rla.tick(handle, now_ms, core, host) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.report(e, host);
                TickOutcome::Repeated
            },
        };
        if outcome != TickOutcome::Stale {
            self.sync_power(host);
            self.refresh_debug(host);
        }
        outcome
    }

    /// Re-read the core's power signal and update the indicator. A fault
    /// raises an error banner with the core's message.
    pub fn sync_power<H: ShellHost>(&mut self, host: &mut H) {
        let Some(transition) = self.power.sync(self.core.as_deref()) else {
            return;
        };
        if let Err(e) = host.set_indicator(&self.power.look()) {
            log::warn!("indicator update failed: {e}");
        }
        if transition.to == PowerState::Error {
            let text = self.core.as_deref().and_then(|c| c.debug_text());
            let message = core_error_message(text.as_deref());
            log::error!("emulation core fault: {message}");
            if let Some(text) = &text {
                self.debug.record(text);
            }
            self.show_banner(BannerKind::Error, message, host);
            self.push_debug(host);
        }
    }

    /// Show a banner, replacing the current one.
    pub fn show_banner<H: ShellHost>(
        &mut self,
        kind: BannerKind,
        message: impl Into<String>,
        host: &mut H,
    ) {
        let message = message.into();
        if self.banner.is_showing(kind, &message) {
            return;
        }
        let banner = self.banner.show(kind, message);
        if let Err(e) = host.set_banner(Some(banner)) {
            log::warn!("banner update failed: {e}");
        }
    }

    pub fn dismiss_banner<H: ShellHost>(&mut self, host: &mut H) {
        if self.banner.dismiss() {
            if let Err(e) = host.set_banner(None) {
                log::warn!("banner update failed: {e}");
            }
        }
    }

    /// Toggle the debug block. The choice is persisted.
    pub fn set_debug_enabled<H: ShellHost>(&mut self, enabled: bool, host: &mut H) {
        self.debug.set_enabled(enabled);
        if let Err(e) = self.settings.set(settings::DEBUG, enabled.to_string()) {
            log::warn!("could not persist debug flag: {e}");
        }
        self.refresh_debug(host);
        self.push_debug(host);
    }

    /// Change a mode's windowed display scale. The choice is persisted.
    pub fn set_scale<H: ShellHost>(&mut self, mode: Mode, factor: u32, host: &mut H) -> Result<()> {
        let factor = check_scale(factor)?;
        let id = self.modes.surfaces().primary(mode)?.id;
        self.modes.surfaces_mut().set_scale(id, factor, host)?;
        self.settings
            .set(&settings::scale_key(mode), factor.to_string())?;
        log::info!("{mode} scale set to {factor}x");
        Ok(())
    }

    /// Ask the host to enter or leave fullscreen. Only fullscreen-capable
    /// modes may enter it.
    pub fn request_fullscreen<H: ShellHost>(&mut self, enter: bool, host: &mut H) -> Result<()> {
        let mode = self.modes.active();
        if enter && !mode.fullscreen_capable() {
            return Err(ShellError::Configuration(format!(
                "mode {mode} cannot go fullscreen"
            )));
        }
        host.request_fullscreen(enter)
    }

    /// Wait for the next key press and bind it to `button`. Only available
    /// in `ConfigureInput` mode.
    pub fn begin_capture<H: ShellHost>(&mut self, button: VirtualButton, host: &mut H) -> Result<()> {
        if self.modes.active() != Mode::ConfigureInput {
            return Err(ShellError::Configuration(format!(
                "key capture needs {} mode",
                Mode::ConfigureInput
            )));
        }
        self.capture.begin(button);
        self.push_bindings(host);
        Ok(())
    }

    pub fn begin_capture_id<H: ShellHost>(&mut self, id: &str, host: &mut H) -> Result<()> {
        let button: VirtualButton = id.parse()?;
        self.begin_capture(button, host)
    }

    pub fn cancel_capture<H: ShellHost>(&mut self, host: &mut H) {
        if self.capture.cancel().is_some() {
            self.push_bindings(host);
        }
    }

    /// Restore the configured default bindings.
    pub fn reset_bindings<H: ShellHost>(&mut self, host: &mut H) -> Result<()> {
        self.keymap = KeyMap::default();
        self.capture.cancel();
        self.keymap.save(self.settings.as_mut())?;
        self.push_bindings(host);
        Ok(())
    }

    /// Release hidden surfaces (memory pressure). Returns how many were freed.
    pub fn reclaim_surfaces<H: ShellHost>(&mut self, host: &mut H) -> Result<usize> {
        Ok(self.modes.reclaim(host)?.len())
    }

    fn on_mode_changed<H: ShellHost>(&mut self, change: ModeChange, host: &mut H) {
        let edges = self.controller.on_mode_changed(&change);
        self.forward(InputSource::Touch, edges, host);
        if change.from == Mode::ConfigureInput {
            self.capture.cancel();
        }
        if self.fullscreen && !change.to.fullscreen_capable() {
            if let Err(e) = host.request_fullscreen(false) {
                self.report(e, host);
            }
        }
        self.refresh_controller(host);
    }

    fn on_viewport<H: ShellHost>(&mut self, viewport: Viewport, host: &mut H) {
        self.viewport = viewport;
        let layout = self.controller.relayout(viewport);
        log::debug!(
            "viewport {}x{}, controller {:?}",
            viewport.width,
            viewport.height,
            layout.orientation
        );
        if self.fullscreen {
            if let Err(e) = self
                .modes
                .surfaces_mut()
                .set_fullscreen(Some(viewport), host)
            {
                self.report(e, host);
            }
        }
        self.refresh_controller(host);
    }

    fn on_fullscreen<H: ShellHost>(&mut self, on: bool, host: &mut H) {
        self.fullscreen = on;
        let edges = self.controller.set_fullscreen(on);
        self.forward(InputSource::Touch, edges, host);
        let viewport = on.then_some(self.viewport);
        if let Err(e) = self.modes.surfaces_mut().set_fullscreen(viewport, host) {
            self.report(e, host);
        }
        self.refresh_controller(host);
    }

    fn on_key_down<H: ShellHost>(&mut self, code: &str, repeat: bool, host: &mut H) {
        if repeat {
            return;
        }
        if self.modes.active() == Mode::ConfigureInput {
            if let Some(result) = self.capture.capture(code, &mut self.keymap) {
                if let CaptureResult::Bound { button, code } = &result {
                    log::info!("bound {code} to {button}");
                    if let Err(e) = self.keymap.save(self.settings.as_mut()) {
                        self.report(e, host);
                    }
                }
                self.push_bindings(host);
                return;
            }
        }
        let edges: Vec<InputEdge> = self
            .keyboard
            .key_down(code, repeat, &self.keymap)
            .into_iter()
            .collect();
        self.forward(InputSource::Keyboard, edges, host);
    }

    /// Forward edges to the core, merging sources. Touch edges also drive
    /// the on-screen pressed styling.
    fn forward<H: ShellHost>(&mut self, source: InputSource, edges: Vec<InputEdge>, host: &mut H) {
        for edge in edges {
            if source == InputSource::Touch {
                if let Err(e) = host.set_button_pressed(edge.button, edge.pressed) {
                    log::warn!("button feedback failed: {e}");
                }
            }
            let Some(edge) = self.latch.apply(source, edge) else {
                continue;
            };
            if let Some(core) = self.core.as_deref_mut() {
                core.send_input(edge.button, edge.pressed);
            }
        }
    }

    /// Show or hide the controller and its press subscription.
    fn refresh_controller<H: ShellHost>(&mut self, host: &mut H) {
        let active = self.controller.is_active();
        let subs = self.modes.subscriptions_mut();
        if active {
            subs.ensure(Owner::Controller, Topic::PointerPress);
        } else {
            subs.release(Owner::Controller);
        }
        let result = host.set_controller(active.then(|| self.controller.layout()));
        if let Err(e) = result {
            self.report(e, host);
        }
    }

    fn refresh_debug<H: ShellHost>(&mut self, host: &mut H) {
        if !self.debug.enabled() {
            return;
        }
        let Some(text) = self.core.as_deref().and_then(|c| c.debug_text()) else {
            return;
        };
        if self.debug.record(&text) {
            self.push_debug(host);
        }
    }

    fn push_debug<H: ShellHost>(&mut self, host: &mut H) {
        if let Err(e) = host.set_debug(self.debug.text(), self.debug.visible()) {
            log::warn!("debug block update failed: {e}");
        }
    }

    fn push_bindings<H: ShellHost>(&mut self, host: &mut H) {
        if let Err(e) = host.set_bindings(&self.keymap.rows(), self.capture.target()) {
            log::warn!("binding table update failed: {e}");
        }
    }

    /// Recover an error at the shell boundary.
    fn report<H: ShellHost>(&mut self, err: ShellError, host: &mut H) {
        let message = err.to_string();
        if self.banner.is_showing(BannerKind::Error, &message) {
            return;
        }
        log::warn!("{message}");
        if self.debug.enabled() {
            self.debug.record(&message);
            self.push_debug(host);
        }
        self.show_banner(BannerKind::Error, message, host);
    }
}
