//! Software host: in-memory surfaces, recorded chrome, manual frame clock.
//!
//! Implements every shell backend without a window system. Surfaces keep
//! their last frame; [`SoftwareHost::compose`] flattens the visible surfaces
//! and chrome into one RGBA image of the viewport for snapshots.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rustico_shell::banner::{Banner, BannerKind};
use rustico_shell::color::Color;
use rustico_shell::controller::{ControllerLayout, Rect};
use rustico_shell::error::{Result, ShellError};
use rustico_shell::frame::FrameBuffer;
use rustico_shell::input::{Viewport, VirtualButton};
use rustico_shell::keymap::BindingRow;
use rustico_shell::power::IndicatorLook;
use rustico_shell::surface::{SurfaceId, SurfaceSpec};
use rustico_shell::{ChromeBackend, FrameHandle, FrameScheduler, SurfaceBackend};

const BACKGROUND: Color = Color::rgb(0x10, 0x10, 0x10);
const BUTTON_IDLE: Color = Color::rgba(0x80, 0x80, 0x80, 0x60);
const BUTTON_PRESSED: Color = Color::rgba(0xff, 0xff, 0xff, 0xb4);
const INDICATOR_SIZE: u32 = 12;
const BANNER_HEIGHT: u32 = 8;

struct SoftwareSurface {
    spec: SurfaceSpec,
    visible: bool,
    display: (u32, u32),
    frame: Option<FrameBuffer>,
}

/// Last state pushed to each piece of chrome.
#[derive(Debug, Default)]
pub struct ChromeState {
    pub indicator: Option<IndicatorLook>,
    pub banner: Option<Banner>,
    pub debug_text: String,
    pub debug_visible: bool,
    pub controller: Option<ControllerLayout>,
    pub pressed: BTreeSet<VirtualButton>,
    pub panels: BTreeMap<String, bool>,
    pub bindings: Vec<BindingRow>,
    pub capturing: Option<VirtualButton>,
    pub fullscreen_requested: Option<bool>,
}

#[derive(Default)]
pub struct SoftwareHost {
    surfaces: BTreeMap<SurfaceId, SoftwareSurface>,
    pub chrome: ChromeState,
    next_handle: i32,
    pending: VecDeque<FrameHandle>,
    blits: u64,
}

impl SoftwareHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the oldest pending frame callback.
    pub fn fire(&mut self) -> Option<FrameHandle> {
        self.pending.pop_front()
    }

    pub fn blits(&self) -> u64 {
        self.blits
    }

    fn surface_mut(&mut self, id: SurfaceId) -> Result<&mut SoftwareSurface> {
        self.surfaces
            .get_mut(&id)
            .ok_or_else(|| ShellError::Backend(format!("surface {id} is not allocated")))
    }

    /// Flatten visible surfaces and chrome into a `viewport`-sized RGBA
    /// image. Surfaces are centred; the controller, indicator and banner
    /// are drawn on top.
    pub fn compose(&self, viewport: Viewport) -> Vec<u8> {
        let mut canvas = Canvas::new(viewport.width, viewport.height, BACKGROUND);

        for surface in self.surfaces.values().filter(|s| s.visible) {
            let Some(frame) = &surface.frame else {
                continue;
            };
            let (dw, dh) = surface.display;
            let scaled = upscale(frame, dw, dh);
            let x0 = (i64::from(viewport.width) - i64::from(dw)) / 2;
            let y0 = (i64::from(viewport.height) - i64::from(dh)) / 2;
            canvas.blit(&scaled, dw, dh, x0, y0);
        }

        if let Some(layout) = &self.chrome.controller {
            for placement in &layout.placements {
                let color = if self.chrome.pressed.contains(&placement.button) {
                    BUTTON_PRESSED
                } else {
                    BUTTON_IDLE
                };
                canvas.fill(placement.rect, color);
            }
        }

        if let Some(look) = &self.chrome.indicator {
            let x = viewport.width.saturating_sub(INDICATOR_SIZE * 2) as i32;
            canvas.fill(
                Rect::new(x, INDICATOR_SIZE as i32, INDICATOR_SIZE, INDICATOR_SIZE),
                look.color,
            );
        }

        if let Some(banner) = self.chrome.banner.as_ref() {
            let color = match banner.kind {
                BannerKind::Error => Color::rgb(0xc0, 0x20, 0x20),
                BannerKind::Info => Color::rgb(0x20, 0x60, 0xc0),
            };
            canvas.fill(Rect::new(0, 0, viewport.width, BANNER_HEIGHT), color);
        }

        canvas.pixels
    }
}

/// Nearest-neighbour resample of `frame` to `width`x`height` RGBA.
pub fn upscale(frame: &FrameBuffer, width: u32, height: u32) -> Vec<u8> {
    let src = frame.to_rgba();
    let (fw, fh) = frame.dimensions();
    let mut out = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        let sy = (u64::from(y) * u64::from(fh) / u64::from(height.max(1))) as usize;
        for x in 0..width {
            let sx = (u64::from(x) * u64::from(fw) / u64::from(width.max(1))) as usize;
            let i = (sy * fw as usize + sx) * 4;
            out.extend_from_slice(&src[i..i + 4]);
        }
    }
    out
}

struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    fn new(width: u32, height: u32, fill: Color) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..width as usize * height as usize {
            pixels.extend_from_slice(&[fill.r, fill.g, fill.b, 255]);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    fn offset(&self, x: i64, y: i64) -> Option<usize> {
        let inside = (0..i64::from(self.width)).contains(&x) && (0..i64::from(self.height)).contains(&y);
        inside.then(|| (y as usize * self.width as usize + x as usize) * 4)
    }

    /// Copy an opaque RGBA image with its top-left corner at (`x0`, `y0`).
    fn blit(&mut self, rgba: &[u8], w: u32, h: u32, x0: i64, y0: i64) {
        for y in 0..i64::from(h) {
            for x in 0..i64::from(w) {
                let Some(dst) = self.offset(x0 + x, y0 + y) else {
                    continue;
                };
                let src = (y as usize * w as usize + x as usize) * 4;
                self.pixels[dst..dst + 4].copy_from_slice(&rgba[src..src + 4]);
            }
        }
    }

    /// Alpha-blend a filled rectangle.
    fn fill(&mut self, rect: Rect, color: Color) {
        let alpha = u32::from(color.a);
        for y in 0..i64::from(rect.h) {
            for x in 0..i64::from(rect.w) {
                let Some(i) = self.offset(i64::from(rect.x) + x, i64::from(rect.y) + y) else {
                    continue;
                };
                for (c, value) in [color.r, color.g, color.b].into_iter().enumerate() {
                    let dst = u32::from(self.pixels[i + c]);
                    self.pixels[i + c] = ((u32::from(value) * alpha + dst * (255 - alpha)) / 255) as u8;
                }
            }
        }
    }
}

impl SurfaceBackend for SoftwareHost {
    fn allocate(&mut self, spec: &SurfaceSpec) -> Result<()> {
        self.surfaces.insert(
            spec.id,
            SoftwareSurface {
                spec: spec.clone(),
                visible: false,
                display: (spec.width, spec.height),
                frame: None,
            },
        );
        Ok(())
    }

    fn release(&mut self, id: SurfaceId) -> Result<()> {
        self.surfaces.remove(&id);
        Ok(())
    }

    fn set_visible(&mut self, id: SurfaceId, visible: bool) -> Result<()> {
        self.surface_mut(id)?.visible = visible;
        Ok(())
    }

    fn set_display_size(&mut self, id: SurfaceId, width: u32, height: u32) -> Result<()> {
        self.surface_mut(id)?.display = (width, height);
        Ok(())
    }

    fn blit(&mut self, id: SurfaceId, frame: &FrameBuffer) -> Result<()> {
        let surface = self.surface_mut(id)?;
        if frame.dimensions() != (surface.spec.width, surface.spec.height) {
            return Err(ShellError::Core(format!(
                "frame is {}x{}, surface {id} is {}x{}",
                frame.width(),
                frame.height(),
                surface.spec.width,
                surface.spec.height
            )));
        }
        surface.frame = Some(frame.clone());
        self.blits += 1;
        Ok(())
    }
}

impl ChromeBackend for SoftwareHost {
    fn set_indicator(&mut self, look: &IndicatorLook) -> Result<()> {
        self.chrome.indicator = Some(*look);
        Ok(())
    }

    fn set_banner(&mut self, banner: Option<&Banner>) -> Result<()> {
        self.chrome.banner = banner.cloned();
        Ok(())
    }

    fn set_debug(&mut self, text: &str, visible: bool) -> Result<()> {
        self.chrome.debug_text = text.to_string();
        self.chrome.debug_visible = visible;
        Ok(())
    }

    fn set_controller(&mut self, layout: Option<&ControllerLayout>) -> Result<()> {
        self.chrome.controller = layout.cloned();
        if layout.is_none() {
            self.chrome.pressed.clear();
        }
        Ok(())
    }

    fn set_button_pressed(&mut self, button: VirtualButton, pressed: bool) -> Result<()> {
        if pressed {
            self.chrome.pressed.insert(button);
        } else {
            self.chrome.pressed.remove(&button);
        }
        Ok(())
    }

    fn set_panel_visible(&mut self, panel: &str, visible: bool) -> Result<()> {
        self.chrome.panels.insert(panel.to_string(), visible);
        Ok(())
    }

    fn set_bindings(&mut self, rows: &[BindingRow], capturing: Option<VirtualButton>) -> Result<()> {
        self.chrome.bindings = rows.to_vec();
        self.chrome.capturing = capturing;
        Ok(())
    }

    fn request_fullscreen(&mut self, enter: bool) -> Result<()> {
        self.chrome.fullscreen_requested = Some(enter);
        Ok(())
    }
}

impl FrameScheduler for SoftwareHost {
    fn request_frame(&mut self) -> Result<FrameHandle> {
        self.next_handle += 1;
        let handle = FrameHandle(self.next_handle);
        self.pending.push_back(handle);
        Ok(handle)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.pending.retain(|h| *h != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustico_shell::mode::Mode;
    use rustico_shell::surface::default_surfaces;

    fn playfield() -> SurfaceSpec {
        default_surfaces()
            .into_iter()
            .find(|s| s.mode == Mode::Playfield)
            .unwrap()
    }

    fn checker(w: u32, h: u32) -> FrameBuffer {
        let mut pixels = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }
        FrameBuffer::from_raw(w, h, pixels).unwrap()
    }

    #[test]
    fn upscale_repeats_pixels() {
        let frame = checker(2, 2);
        let out = upscale(&frame, 4, 4);
        assert_eq!(out.len(), 4 * 4 * 4);
        // Row 0: white white black black.
        assert_eq!(&out[0..4], &[255, 255, 255, 255]);
        assert_eq!(&out[4..8], &[255, 255, 255, 255]);
        assert_eq!(&out[8..12], &[0, 0, 0, 255]);
        // Row 2 starts with the second source row.
        let row2 = 2 * 4 * 4;
        assert_eq!(&out[row2..row2 + 4], &[0, 0, 0, 255]);
    }

    #[test]
    fn blit_requires_allocation_and_matching_size() {
        let mut host = SoftwareHost::new();
        let spec = playfield();
        assert!(host.blit(spec.id, &FrameBuffer::blank(256, 240)).is_err());
        host.allocate(&spec).unwrap();
        assert!(matches!(
            host.blit(spec.id, &FrameBuffer::blank(8, 8)),
            Err(ShellError::Core(_))
        ));
        host.blit(spec.id, &FrameBuffer::blank(256, 240)).unwrap();
        assert_eq!(host.blits(), 1);
    }

    #[test]
    fn frames_fire_in_order_and_cancel() {
        let mut host = SoftwareHost::new();
        let a = host.request_frame().unwrap();
        let b = host.request_frame().unwrap();
        let c = host.request_frame().unwrap();
        host.cancel_frame(b);
        assert_eq!(host.fire(), Some(a));
        assert_eq!(host.fire(), Some(c));
        assert_eq!(host.fire(), None);
    }

    #[test]
    fn compose_centres_visible_surface() {
        let mut host = SoftwareHost::new();
        let spec = playfield();
        host.allocate(&spec).unwrap();
        host.set_display_size(spec.id, 256, 240).unwrap();
        host.blit(spec.id, &checker(256, 240)).unwrap();

        let vp = Viewport::new(512, 480);
        let hidden = host.compose(vp);
        assert_eq!(&hidden[0..4], &[0x10, 0x10, 0x10, 255]);

        host.set_visible(spec.id, true).unwrap();
        let shown = host.compose(vp);
        // Surface origin lands at (128, 120); (128 + 120) is even, so white.
        let i = (120 * 512 + 128) * 4;
        assert_eq!(&shown[i..i + 4], &[255, 255, 255, 255]);
        assert_eq!(&shown[0..4], &[0x10, 0x10, 0x10, 255]);
    }

    #[test]
    fn pressed_buttons_draw_brighter() {
        let mut host = SoftwareHost::new();
        let vp = Viewport::new(800, 400);
        let layout = rustico_shell::controller::compute_layout(vp, &Default::default());
        let rect = layout.placement(VirtualButton::RoundA).unwrap().rect;
        host.set_controller(Some(&layout)).unwrap();

        let idle = host.compose(vp);
        host.set_button_pressed(VirtualButton::RoundA, true).unwrap();
        let pressed = host.compose(vp);
        let i = (rect.y as usize * 800 + rect.x as usize) * 4;
        assert!(pressed[i] > idle[i]);

        host.set_controller(None).unwrap();
        assert!(host.chrome.pressed.is_empty());
    }
}
