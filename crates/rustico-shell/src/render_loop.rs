//! Render loop adapter.
//!
//! Pulls frames from the core on display-refresh callbacks and draws them
//! into the active mode's primary surface. At most one callback is pending
//! per adapter; stopping cancels it and any callback that still arrives
//! afterwards is recognised as stale and draws nothing.

use serde::Deserialize;

use rustico_types::error::{Result, ShellError};
use rustico_types::frame::FrameBuffer;

use crate::backend::{EmulatorCore, FrameHandle, FrameScheduler, SurfaceBackend};
use crate::power::PowerState;
use crate::surface::{SurfaceId, SurfaceSpec};

/// NTSC NES frame rate.
pub const NES_FRAME_RATE: f64 = 60.0988;

/// Accumulated time never exceeds this many core periods, so a long pause
/// (hidden tab) does not turn into a burst of pulls.
const MAX_DEBT_PERIODS: f64 = 2.0;

/// Slack when comparing accumulated time to one period, in milliseconds.
const PACING_SLACK_MS: f64 = 1.0;

/// How often frames are pulled relative to display refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FramePacing {
    /// Pull at most once per core frame period.
    #[default]
    CoreRate,
    /// Pull on every display refresh.
    EveryTick,
}

/// Decides on which display ticks a frame is pulled.
#[derive(Debug, Clone)]
pub struct FramePacer {
    pacing: FramePacing,
    period_ms: f64,
    debt_ms: f64,
    last_ms: Option<f64>,
}

impl FramePacer {
    pub fn new(pacing: FramePacing, core_frame_rate: f64) -> Self {
        Self {
            pacing,
            period_ms: 1000.0 / core_frame_rate,
            debt_ms: 0.0,
            last_ms: None,
        }
    }

    pub fn reset(&mut self) {
        self.debt_ms = 0.0;
        self.last_ms = None;
    }

    /// Whether the tick at `now_ms` should pull a frame. The first tick
    /// after a reset always pulls.
    pub fn should_pull(&mut self, now_ms: f64) -> bool {
        if self.pacing == FramePacing::EveryTick {
            return true;
        }
        let Some(last) = self.last_ms.replace(now_ms) else {
            return true;
        };
        let elapsed = (now_ms - last).max(0.0);
        self.debt_ms = (self.debt_ms + elapsed).min(self.period_ms * MAX_DEBT_PERIODS);
        if self.debt_ms + PACING_SLACK_MS >= self.period_ms {
            self.debt_ms = (self.debt_ms - self.period_ms).max(0.0);
            true
        } else {
            false
        }
    }
}

/// Result of one display-refresh callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The handle was not the pending one; nothing happened.
    Stale,
    /// Too early for the next core frame.
    Paced,
    /// A new frame was drawn.
    Presented,
    /// No new frame; the surface keeps showing the last one.
    Repeated,
}

#[derive(Debug)]
pub struct RenderLoopAdapter {
    surface: SurfaceId,
    expected: (u32, u32),
    running: bool,
    pending: Option<FrameHandle>,
    pacer: FramePacer,
    last_frame: Option<FrameBuffer>,
    needs_refresh: bool,
}

impl RenderLoopAdapter {
    pub fn new(spec: &SurfaceSpec, pacer: FramePacer) -> Self {
        Self {
            surface: spec.id,
            expected: (spec.width, spec.height),
            running: false,
            pending: None,
            pacer,
            last_frame: None,
            needs_refresh: false,
        }
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Last frame successfully drawn.
    pub fn last_frame(&self) -> Option<&FrameBuffer> {
        self.last_frame.as_ref()
    }

    /// Schedule the first callback. Starting a running loop is a no-op.
    pub fn start(&mut self, scheduler: &mut dyn FrameScheduler) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.pacer.reset();
        self.pending = Some(scheduler.request_frame()?);
        self.running = true;
        log::debug!("render loop on {} started", self.surface);
        Ok(())
    }

    /// Cancel the pending callback.
    pub fn stop(&mut self, scheduler: &mut dyn FrameScheduler) {
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_frame(handle);
        }
        if self.running {
            log::debug!("render loop on {} stopped", self.surface);
        }
        self.running = false;
    }

    /// The surface was reallocated blank; redraw the last frame on the next
    /// tick.
    pub fn mark_reallocated(&mut self) {
        self.needs_refresh = self.last_frame.is_some();
    }

    /// Handle a display-refresh callback. The next callback is scheduled
    /// even when drawing fails, so one bad frame does not end the loop. If
    /// scheduling itself fails the loop stops.
    pub fn tick<H>(
        &mut self,
        handle: FrameHandle,
        now_ms: f64,
        core: &mut dyn EmulatorCore,
        host: &mut H,
    ) -> Result<TickOutcome>
    where
        H: SurfaceBackend + FrameScheduler + ?Sized,
    {
        if !self.running || self.pending != Some(handle) {
            return Ok(TickOutcome::Stale);
        }
        self.pending = None;
        let outcome = self.present(now_ms, core, host);
        match host.request_frame() {
            Ok(next) => self.pending = Some(next),
            Err(e) => {
                // Nothing is pending any more; `start` must be able to re-arm.
                self.running = false;
                log::warn!("render loop on {} could not re-arm: {e}", self.surface);
                return Err(e);
            },
        }
        outcome
    }

    fn present<H>(
        &mut self,
        now_ms: f64,
        core: &mut dyn EmulatorCore,
        host: &mut H,
    ) -> Result<TickOutcome>
    where
        H: SurfaceBackend + ?Sized,
    {
        if self.needs_refresh {
            if let Some(frame) = &self.last_frame {
                host.blit(self.surface, frame)?;
            }
            self.needs_refresh = false;
        }
        // A faulted core keeps its last good picture on screen.
        if core.power_state() == PowerState::Error {
            return Ok(TickOutcome::Repeated);
        }
        if !self.pacer.should_pull(now_ms) {
            return Ok(TickOutcome::Paced);
        }
        let Some(frame) = core.poll_frame() else {
            return Ok(TickOutcome::Repeated);
        };
        if frame.dimensions() != self.expected {
            let (w, h) = frame.dimensions();
            return Err(ShellError::Core(format!(
                "frame is {w}x{h}, surface {} expects {}x{}",
                self.surface, self.expected.0, self.expected.1
            )));
        }
        host.blit(self.surface, &frame)?;
        self.last_frame = Some(frame);
        Ok(TickOutcome::Presented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::default_surfaces;
    use crate::test_utils::{HostCall, MockHost, ScriptedCore};

    fn adapter(pacing: FramePacing) -> RenderLoopAdapter {
        let spec = &default_surfaces()[0];
        RenderLoopAdapter::new(spec, FramePacer::new(pacing, NES_FRAME_RATE))
    }

    #[test]
    fn start_is_idempotent() {
        let mut host = MockHost::new();
        let mut rla = adapter(FramePacing::EveryTick);
        rla.start(&mut host).unwrap();
        rla.start(&mut host).unwrap();
        assert_eq!(host.count(|c| matches!(c, HostCall::RequestFrame(_))), 1);
        assert_eq!(host.outstanding_frames().len(), 1);
    }

    #[test]
    fn stop_cancels_pending() {
        let mut host = MockHost::new();
        let mut rla = adapter(FramePacing::EveryTick);
        rla.start(&mut host).unwrap();
        rla.stop(&mut host);
        assert!(!rla.is_running());
        assert!(rla.pending().is_none());
        assert!(host.outstanding_frames().is_empty());
    }

    #[test]
    fn stale_callback_draws_nothing() {
        let mut host = MockHost::new();
        let (mut core, ctl) = ScriptedCore::new();
        ctl.set_power(PowerState::On);
        let mut rla = adapter(FramePacing::EveryTick);
        rla.start(&mut host).unwrap();
        let handle = rla.pending().unwrap();
        rla.stop(&mut host);

        // The callback was already queued by the host when stop ran.
        let outcome = rla.tick(handle, 16.0, &mut core, &mut host).unwrap();
        assert_eq!(outcome, TickOutcome::Stale);
        assert_eq!(host.blits(SurfaceId::PLAYFIELD), 0);
        assert!(host.outstanding_frames().is_empty());
    }

    #[test]
    fn presents_and_rearms() {
        let mut host = MockHost::new();
        let (mut core, ctl) = ScriptedCore::new();
        ctl.set_power(PowerState::On);
        ctl.push_frame(FrameBuffer::blank(256, 240));
        let mut rla = adapter(FramePacing::EveryTick);
        rla.start(&mut host).unwrap();

        let h = rla.pending().unwrap();
        assert_eq!(rla.tick(h, 0.0, &mut core, &mut host).unwrap(), TickOutcome::Presented);
        assert_eq!(host.blits(SurfaceId::PLAYFIELD), 1);
        assert!(rla.last_frame().is_some());

        // Core has nothing new: last frame stays up, loop re-arms.
        let h2 = rla.pending().unwrap();
        assert_ne!(h, h2);
        assert_eq!(rla.tick(h2, 16.0, &mut core, &mut host).unwrap(), TickOutcome::Repeated);
        assert_eq!(host.blits(SurfaceId::PLAYFIELD), 1);
        assert!(rla.pending().is_some());
    }

    #[test]
    fn failed_rearm_stops_loop_so_it_can_restart() {
        let mut host = MockHost::new();
        let (mut core, ctl) = ScriptedCore::new();
        ctl.set_power(PowerState::On);
        ctl.push_frame(FrameBuffer::blank(256, 240));
        let mut rla = adapter(FramePacing::EveryTick);
        rla.start(&mut host).unwrap();

        host.fail_frame_requests = 1;
        let h = rla.pending().unwrap();
        let err = rla.tick(h, 0.0, &mut core, &mut host).unwrap_err();
        assert!(matches!(err, ShellError::Backend(_)));
        assert!(!rla.is_running());
        assert!(rla.pending().is_none());
        // The frame was still drawn before scheduling failed.
        assert_eq!(host.blits(SurfaceId::PLAYFIELD), 1);

        rla.start(&mut host).unwrap();
        assert!(rla.is_running());
        assert!(rla.pending().is_some());
    }

    #[test]
    fn wrong_size_frame_errors_but_keeps_running() {
        let mut host = MockHost::new();
        let (mut core, ctl) = ScriptedCore::new();
        ctl.set_power(PowerState::On);
        ctl.push_frame(FrameBuffer::blank(160, 144));
        let mut rla = adapter(FramePacing::EveryTick);
        rla.start(&mut host).unwrap();
        let h = rla.pending().unwrap();
        let err = rla.tick(h, 0.0, &mut core, &mut host).unwrap_err();
        assert!(matches!(err, ShellError::Core(_)));
        assert!(rla.pending().is_some());
        assert!(rla.last_frame().is_none());
    }

    #[test]
    fn error_state_keeps_last_frame() {
        let mut host = MockHost::new();
        let (mut core, ctl) = ScriptedCore::new();
        ctl.set_power(PowerState::On);
        ctl.push_frame(FrameBuffer::blank(256, 240));
        let mut rla = adapter(FramePacing::EveryTick);
        rla.start(&mut host).unwrap();
        rla.tick(rla.pending().unwrap(), 0.0, &mut core, &mut host)
            .unwrap();

        ctl.set_power(PowerState::Error);
        ctl.push_frame(FrameBuffer::blank(256, 240));
        let outcome = rla
            .tick(rla.pending().unwrap(), 16.0, &mut core, &mut host)
            .unwrap();
        assert_eq!(outcome, TickOutcome::Repeated);
        assert_eq!(host.blits(SurfaceId::PLAYFIELD), 1);
        assert!(rla.last_frame().is_some());
    }

    #[test]
    fn reallocation_re_presents_last_frame() {
        let mut host = MockHost::new();
        let (mut core, ctl) = ScriptedCore::new();
        ctl.set_power(PowerState::On);
        ctl.push_frame(FrameBuffer::blank(256, 240));
        let mut rla = adapter(FramePacing::EveryTick);
        rla.start(&mut host).unwrap();
        rla.tick(rla.pending().unwrap(), 0.0, &mut core, &mut host)
            .unwrap();
        rla.mark_reallocated();
        rla.tick(rla.pending().unwrap(), 16.0, &mut core, &mut host)
            .unwrap();
        assert_eq!(host.blits(SurfaceId::PLAYFIELD), 2);
    }

    #[test]
    fn core_rate_pacing_on_fast_display() {
        // 120 Hz display, ~60 Hz core: every other tick pulls.
        let mut pacer = FramePacer::new(FramePacing::CoreRate, NES_FRAME_RATE);
        let pulls: Vec<bool> = (0..8)
            .map(|i| pacer.should_pull(f64::from(i) * 1000.0 / 120.0))
            .collect();
        assert_eq!(pulls, vec![true, false, true, false, true, false, true, false]);
    }

    #[test]
    fn core_rate_pacing_on_matching_display() {
        let mut pacer = FramePacer::new(FramePacing::CoreRate, 60.0);
        for i in 0..120 {
            assert!(pacer.should_pull(f64::from(i) * 1000.0 / 60.0));
        }
    }

    #[test]
    fn long_pause_does_not_burst() {
        let mut pacer = FramePacer::new(FramePacing::CoreRate, 60.0);
        assert!(pacer.should_pull(0.0));
        // Tab hidden for five seconds.
        assert!(pacer.should_pull(5000.0));
        // Debt is capped at two periods, so a quick follow-up pulls once more
        // and then pacing resumes.
        assert!(pacer.should_pull(5001.0));
        assert!(!pacer.should_pull(5002.0));
    }

    #[test]
    fn every_tick_always_pulls() {
        let mut pacer = FramePacer::new(FramePacing::EveryTick, NES_FRAME_RATE);
        assert!(pacer.should_pull(0.0));
        assert!(pacer.should_pull(0.0));
    }

    #[test]
    fn pacing_from_toml() {
        #[derive(Deserialize)]
        struct W {
            p: FramePacing,
        }
        let w: W = toml::from_str("p = \"every-tick\"").unwrap();
        assert_eq!(w.p, FramePacing::EveryTick);
    }
}
