//! Headless rustico shell harness.
//!
//! Drives the shell against the software host and the test-pattern core
//! through a scripted session and writes a PNG of the viewport after each
//! step: windowed Playfield, Jam with a key held, fullscreen Playfield with
//! the on-screen controller (landscape and portrait), a rebind in
//! ConfigureInput, and finally a core fault.
//!
//! Usage:
//!   cargo run -p rustico-app [config.toml] [out_dir]
//!   RUSTICO_CONFIG=rustico.toml cargo run -p rustico-app

mod demo_core;
mod software;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use demo_core::TestPatternCore;
use rustico_shell::input::{HostEvent, Viewport, VirtualButton};
use rustico_shell::settings::MemorySettings;
use rustico_shell::{Mode, PowerState, Shell, ShellConfig};
use software::SoftwareHost;

const LANDSCAPE: Viewport = Viewport::new(1280, 720);
const PORTRAIT: Viewport = Viewport::new(720, 1280);
const FRAME_MS: f64 = 1000.0 / 60.0;
const BOOT_FRAMES: u64 = 30;
const FAULT_FRAME: u64 = 600;

struct Session {
    shell: Shell,
    host: SoftwareHost,
    viewport: Viewport,
    clock_ms: f64,
    out_dir: PathBuf,
    shots: usize,
}

impl Session {
    /// Fire up to `n` display refreshes.
    fn run_frames(&mut self, n: usize) {
        self.run_until(n, |_| false);
    }

    /// Fire refreshes until `done` holds or `limit` is reached. Returns
    /// whether `done` was reached.
    fn run_until(&mut self, limit: usize, done: impl Fn(&Shell) -> bool) -> bool {
        for _ in 0..limit {
            if done(&self.shell) {
                return true;
            }
            let Some(handle) = self.host.fire() else {
                log::warn!("no display refresh pending");
                return false;
            };
            self.shell
                .on_animation_frame(handle, self.clock_ms, &mut self.host);
            self.clock_ms += FRAME_MS;
        }
        done(&self.shell)
    }

    fn event(&mut self, event: HostEvent) {
        self.shell.handle_event(event, &mut self.host);
    }

    fn rotate(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.event(HostEvent::OrientationChange(viewport));
    }

    fn snapshot(&mut self, name: &str) -> Result<()> {
        self.shots += 1;
        let path = self.out_dir.join(format!("{:02}_{name}.png", self.shots));
        let rgba = self.host.compose(self.viewport);
        save_png(&path, self.viewport.width, self.viewport.height, &rgba)?;
        let panels: Vec<&str> = self
            .host
            .chrome
            .panels
            .iter()
            .filter(|(_, shown)| **shown)
            .map(|(panel, _)| panel.as_str())
            .collect();
        log::info!(
            "wrote {} ({} mode, power {}, panels [{}], {} blits)",
            path.display(),
            self.shell.active_mode(),
            self.shell.power_state(),
            panels.join(", "),
            self.host.blits(),
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Config from CLI arg, RUSTICO_CONFIG, or built-in defaults.
    let config = match std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RUSTICO_CONFIG").ok())
    {
        Some(path) => {
            ShellConfig::load(Path::new(&path)).with_context(|| format!("loading {path}"))?
        },
        None => ShellConfig::default(),
    };
    let out_dir = std::env::args()
        .nth(2)
        .map_or_else(|| PathBuf::from("snapshots"), PathBuf::from);
    fs::create_dir_all(&out_dir)?;

    let shell = Shell::new(config, Box::new(MemorySettings::new()), LANDSCAPE)?;
    let mut s = Session {
        shell,
        host: SoftwareHost::new(),
        viewport: LANDSCAPE,
        clock_ms: 0.0,
        out_dir,
        shots: 0,
    };
    s.shell.mount(&mut s.host)?;
    s.event(HostEvent::TouchCapability(true));

    let core = TestPatternCore::new(BOOT_FRAMES).fault_at(FAULT_FRAME);
    s.shell.attach_core(Ok(Box::new(core)), &mut s.host);

    // Windowed Playfield; the indicator lights once the core boots.
    s.run_frames(90);
    s.snapshot("playfield")?;

    // Jam with a keyboard button held.
    s.shell.activate(Mode::Jam, &mut s.host)?;
    s.event(HostEvent::KeyDown {
        code: "KeyX".into(),
        repeat: false,
    });
    s.run_frames(30);
    s.snapshot("jam_key_held")?;
    s.event(HostEvent::KeyUp {
        code: "KeyX".into(),
    });

    // Fullscreen Playfield: the controller appears for touch devices.
    s.shell.activate(Mode::Playfield, &mut s.host)?;
    s.shell.request_fullscreen(true, &mut s.host)?;
    // The host grants the request and reports back.
    if s.host.chrome.fullscreen_requested == Some(true) {
        s.event(HostEvent::FullscreenChanged(true));
    }
    let rect = s
        .shell
        .controller()
        .layout()
        .placement(VirtualButton::RoundA)
        .map(|p| p.rect)
        .context("controller layout has no A button")?;
    let (x, y) = (rect.x + rect.w as i32 / 2, rect.y + rect.h as i32 / 2);
    s.event(HostEvent::PointerDown { id: 1, x, y });
    s.run_frames(30);
    s.snapshot("fullscreen_touch")?;
    s.event(HostEvent::PointerUp { id: 1 });

    s.rotate(PORTRAIT);
    s.run_frames(10);
    s.snapshot("fullscreen_portrait")?;
    s.rotate(LANDSCAPE);
    s.event(HostEvent::FullscreenChanged(false));

    // Rebind A to K in ConfigureInput.
    s.shell.activate(Mode::ConfigureInput, &mut s.host)?;
    s.shell.begin_capture(VirtualButton::RoundA, &mut s.host)?;
    for event in [
        HostEvent::KeyDown {
            code: "KeyK".into(),
            repeat: false,
        },
        HostEvent::KeyUp {
            code: "KeyK".into(),
        },
    ] {
        s.event(event);
    }
    let bound = s
        .host
        .chrome
        .bindings
        .iter()
        .find(|(button, _)| *button == VirtualButton::RoundA)
        .and_then(|(_, key)| key.clone());
    log::info!(
        "A is now bound to {} (capturing: {:?})",
        bound.as_deref().unwrap_or("nothing"),
        s.host.chrome.capturing,
    );
    s.run_frames(10);
    s.snapshot("configure_input")?;

    // Run Playfield until the core faults and the error banner shows.
    s.shell.activate(Mode::Playfield, &mut s.host)?;
    let faulted = s.run_until(FAULT_FRAME as usize * 2, |shell| {
        shell.power_state() == PowerState::Error
    });
    s.snapshot("core_fault")?;
    match s.shell.banner() {
        Some(banner) if faulted => log::info!("core fault banner: {}", banner.message),
        _ => log::warn!("core did not fault within the session"),
    }
    if s.host.chrome.debug_visible {
        log::info!("debug block:\n{}", s.host.chrome.debug_text);
    }
    Ok(())
}

/// Save RGBA pixel data as a PNG file.
fn save_png(path: &Path, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    let file = fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(rgba)?;
    Ok(())
}
