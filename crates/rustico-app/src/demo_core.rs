//! Test-pattern emulation core.
//!
//! Stands in for the real NES core: scrolls colour bars, tints the picture
//! while buttons are held, and can be told to fault at a given frame.

use std::collections::BTreeSet;

use rustico_shell::EmulatorCore;
use rustico_shell::frame::{FrameBuffer, PixelFormat};
use rustico_shell::input::VirtualButton;
use rustico_shell::power::PowerState;
use rustico_shell::surface::{NES_HEIGHT, NES_WIDTH};

/// The eight bar colours, left to right.
const BARS: [[u8; 3]; 8] = [
    [0xff, 0xff, 0xff],
    [0xff, 0xff, 0x00],
    [0x00, 0xff, 0xff],
    [0x00, 0xff, 0x00],
    [0xff, 0x00, 0xff],
    [0xff, 0x00, 0x00],
    [0x00, 0x00, 0xff],
    [0x00, 0x00, 0x00],
];

#[derive(Debug, Default)]
pub struct TestPatternCore {
    frame: u64,
    /// Frames produced before power reads `On`.
    boot_frames: u64,
    fault_at: Option<u64>,
    held: BTreeSet<VirtualButton>,
    inputs: u64,
}

impl TestPatternCore {
    pub fn new(boot_frames: u64) -> Self {
        Self {
            boot_frames,
            ..Self::default()
        }
    }

    /// Fault once `frame` frames have been produced.
    pub fn fault_at(mut self, frame: u64) -> Self {
        self.fault_at = Some(frame);
        self
    }

    fn faulted(&self) -> bool {
        self.fault_at.is_some_and(|at| self.frame >= at)
    }

    fn render(&self) -> FrameBuffer {
        let bar_width = NES_WIDTH / BARS.len() as u32;
        let shift = (self.frame % u64::from(NES_WIDTH)) as u32;
        let tint = if self.held.is_empty() { 0 } else { 0x40 };
        let mut pixels = Vec::with_capacity((NES_WIDTH * NES_HEIGHT * 3) as usize);
        for _y in 0..NES_HEIGHT {
            for x in 0..NES_WIDTH {
                let bar = (((x + shift) % NES_WIDTH) / bar_width) as usize;
                let [r, g, b] = BARS[bar.min(BARS.len() - 1)];
                pixels.extend_from_slice(&[r.saturating_sub(tint), g, b.saturating_sub(tint)]);
            }
        }
        FrameBuffer::new(NES_WIDTH, NES_HEIGHT, PixelFormat::Rgb24, pixels)
            .unwrap_or_else(|_| FrameBuffer::blank(NES_WIDTH, NES_HEIGHT))
    }
}

impl EmulatorCore for TestPatternCore {
    fn poll_frame(&mut self) -> Option<FrameBuffer> {
        if self.faulted() {
            return None;
        }
        let frame = self.render();
        self.frame += 1;
        Some(frame)
    }

    fn power_state(&self) -> PowerState {
        if self.faulted() {
            PowerState::Error
        } else if self.frame >= self.boot_frames {
            PowerState::On
        } else {
            PowerState::Off
        }
    }

    fn send_input(&mut self, button: VirtualButton, pressed: bool) {
        self.inputs += 1;
        if pressed {
            self.held.insert(button);
        } else {
            self.held.remove(&button);
        }
    }

    fn debug_text(&self) -> Option<String> {
        if self.faulted() {
            return Some(format!(
                "CPU jammed at frame {}\nopcode $02 at $C123",
                self.frame
            ));
        }
        let held: Vec<&str> = self.held.iter().map(|b| b.id()).collect();
        Some(format!(
            "frame {} inputs {} held [{}]",
            self.frame,
            self.inputs,
            held.join(", ")
        ))
    }
}
