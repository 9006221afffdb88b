//! `requestAnimationFrame` scheduling.
//!
//! One long-lived closure serves every request; [`PendingFrames`] tells it
//! which handle is firing.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::Window;

use rustico_shell::error::Result;
use rustico_shell::{FrameHandle, FrameScheduler};

use crate::frames::PendingFrames;
use crate::js_error;

pub struct RafScheduler {
    window: Window,
    callback: Closure<dyn FnMut(f64)>,
    pending: Rc<RefCell<PendingFrames>>,
}

impl RafScheduler {
    pub fn new(window: Window, mut on_frame: impl FnMut(FrameHandle, f64) + 'static) -> Self {
        let pending = Rc::new(RefCell::new(PendingFrames::new()));
        let queue = Rc::clone(&pending);
        let callback = Closure::wrap(Box::new(move |now: f64| {
            let fired = queue.borrow_mut().fired();
            if let Some(handle) = fired {
                on_frame(handle, now);
            }
        }) as Box<dyn FnMut(f64)>);
        Self {
            window,
            callback,
            pending,
        }
    }
}

impl FrameScheduler for RafScheduler {
    fn request_frame(&mut self) -> Result<FrameHandle> {
        let id = self
            .window
            .request_animation_frame(self.callback.as_ref().unchecked_ref())
            .map_err(|e| js_error("requestAnimationFrame", e))?;
        Ok(self.pending.borrow_mut().requested(id))
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if let Err(e) = self.window.cancel_animation_frame(handle.0) {
            log::warn!("cancelAnimationFrame({}) failed: {e:?}", handle.0);
        }
        self.pending.borrow_mut().cancelled(handle);
    }
}

impl Drop for RafScheduler {
    /// The shared closure dies with the scheduler; nothing may call it later.
    fn drop(&mut self) {
        let ids = self.pending.borrow_mut().drain();
        for id in ids {
            if let Err(e) = self.window.cancel_animation_frame(id) {
                log::warn!("cancelAnimationFrame({id}) failed: {e:?}");
            }
        }
    }
}
