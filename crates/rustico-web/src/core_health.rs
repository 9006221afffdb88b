//! Host-independent half of the JS core adapter: fault latching, power
//! parsing and frame decoding.

use rustico_shell::frame::FrameBuffer;
use rustico_shell::power::PowerState;
use rustico_shell::surface::{NES_HEIGHT, NES_WIDTH};

/// Remembers the first exception the core threw. A core that threw reads
/// as faulted from then on.
#[derive(Debug, Default)]
pub struct CoreHealth {
    fault: Option<String>,
}

impl CoreHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an exception from `call`. Returns whether it was the first.
    pub fn record(&mut self, call: &str, detail: String) -> bool {
        log::error!("core {call}() threw: {detail}");
        if self.fault.is_some() {
            return false;
        }
        self.fault = Some(detail);
        true
    }

    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Power as the shell sees it. `reported` is `None` when `powerState()`
    /// threw.
    pub fn power(&self, reported: Option<&str>) -> PowerState {
        if self.fault.is_some() {
            return PowerState::Error;
        }
        match reported {
            Some(state) => state.parse().unwrap_or_else(|e| {
                log::warn!("{e}");
                PowerState::Error
            }),
            None => PowerState::Error,
        }
    }
}

/// Wrap a `pollFrame()` buffer. Buffers that are neither RGB nor RGBA at the
/// NES resolution are dropped.
pub fn decode_frame(pixels: Vec<u8>) -> Option<FrameBuffer> {
    match FrameBuffer::from_raw(NES_WIDTH, NES_HEIGHT, pixels) {
        Ok(frame) => Some(frame),
        Err(e) => {
            log::warn!("dropping core frame: {e}");
            None
        },
    }
}
