//! Bookkeeping for `requestAnimationFrame` ids.
//!
//! The browser fires callbacks in request order, so the handle of a firing
//! callback is the oldest request that was not cancelled.

use std::collections::VecDeque;

use rustico_shell::FrameHandle;

#[derive(Debug, Default)]
pub struct PendingFrames {
    ids: VecDeque<i32>,
}

impl PendingFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requested(&mut self, id: i32) -> FrameHandle {
        self.ids.push_back(id);
        FrameHandle(id)
    }

    /// A callback fired; returns the request it answers.
    pub fn fired(&mut self) -> Option<FrameHandle> {
        self.ids.pop_front().map(FrameHandle)
    }

    /// Forget a cancelled request. Returns whether it was still pending.
    pub fn cancelled(&mut self, handle: FrameHandle) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| *id != handle.0);
        before != self.ids.len()
    }

    /// Take every outstanding id.
    pub fn drain(&mut self) -> Vec<i32> {
        self.ids.drain(..).collect()
    }
}
