//! Surface registry.
//!
//! Each mode owns one or more drawable surfaces with a fixed logical
//! resolution and an integer display scale. Surfaces are allocated lazily
//! the first time their mode is shown and may be released while hidden;
//! re-showing reallocates them and the render loop re-presents its last
//! frame.

use std::collections::BTreeSet;

use rustico_types::error::{Result, ShellError};
use rustico_types::input::Viewport;

use crate::backend::SurfaceBackend;
use crate::mode::Mode;

/// Native NES picture size.
pub const NES_WIDTH: u32 = 256;
pub const NES_HEIGHT: u32 = 240;

/// Largest accepted integer scale factor.
pub const MAX_SCALE: u32 = 8;

/// Stable surface identifier (also the DOM canvas id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(&'static str);

impl SurfaceId {
    pub const PLAYFIELD: Self = Self("playfield-screen");
    pub const JAM: Self = Self("jam-screen");
    pub const INPUT_PREVIEW: Self = Self("input-preview");

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Static description of a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSpec {
    pub id: SurfaceId,
    pub mode: Mode,
    /// Logical (drawing) resolution.
    pub width: u32,
    pub height: u32,
    /// Windowed display scale.
    pub scale: u32,
    /// Id of an overlay element layered on top, if any.
    pub overlay: Option<&'static str>,
}

impl SurfaceSpec {
    /// Displayed size. In fullscreen the surface takes the largest integer
    /// multiple of its logical size that fits the viewport (at least 1x).
    pub fn display_size(&self, fullscreen: Option<Viewport>) -> (u32, u32) {
        let scale = match fullscreen {
            Some(vp) => fit_scale(self.width, self.height, vp),
            None => self.scale,
        };
        (self.width * scale, self.height * scale)
    }
}

/// Largest integer scale of `w`x`h` that fits `vp`, never below 1.
pub fn fit_scale(w: u32, h: u32, vp: Viewport) -> u32 {
    let sx = vp.width / w.max(1);
    let sy = vp.height / h.max(1);
    sx.min(sy).max(1)
}

/// Validate a scale factor.
pub fn check_scale(scale: u32) -> Result<u32> {
    if (1..=MAX_SCALE).contains(&scale) {
        Ok(scale)
    } else {
        Err(ShellError::Configuration(format!(
            "scale factor {scale} out of range 1..={MAX_SCALE}"
        )))
    }
}

/// The built-in surface set.
pub fn default_surfaces() -> Vec<SurfaceSpec> {
    vec![
        SurfaceSpec {
            id: SurfaceId::PLAYFIELD,
            mode: Mode::Playfield,
            width: NES_WIDTH,
            height: NES_HEIGHT,
            scale: 3,
            overlay: Some("playfield-overlay"),
        },
        SurfaceSpec {
            id: SurfaceId::JAM,
            mode: Mode::Jam,
            width: NES_WIDTH,
            height: NES_HEIGHT,
            scale: 2,
            overlay: None,
        },
        SurfaceSpec {
            id: SurfaceId::INPUT_PREVIEW,
            mode: Mode::ConfigureInput,
            width: NES_WIDTH,
            height: NES_HEIGHT,
            scale: 1,
            overlay: None,
        },
    ]
}

#[derive(Debug)]
pub struct SurfaceRegistry {
    specs: Vec<SurfaceSpec>,
    allocated: BTreeSet<SurfaceId>,
    visible: BTreeSet<SurfaceId>,
    fullscreen: Option<Viewport>,
}

impl SurfaceRegistry {
    /// Build a registry. Every mode needs at least one surface; the first
    /// one listed for a mode is where its render loop draws.
    pub fn new(specs: Vec<SurfaceSpec>) -> Result<Self> {
        for mode in Mode::ALL {
            if !specs.iter().any(|s| s.mode == mode) {
                return Err(ShellError::Configuration(format!(
                    "mode {mode} has no surface"
                )));
            }
        }
        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|s| s.id == spec.id) {
                return Err(ShellError::Configuration(format!(
                    "duplicate surface {}",
                    spec.id
                )));
            }
            if spec.width == 0 || spec.height == 0 {
                return Err(ShellError::Configuration(format!(
                    "surface {} has zero size",
                    spec.id
                )));
            }
            check_scale(spec.scale)?;
        }
        Ok(Self {
            specs,
            allocated: BTreeSet::new(),
            visible: BTreeSet::new(),
            fullscreen: None,
        })
    }

    pub fn spec(&self, id: SurfaceId) -> Option<&SurfaceSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    pub fn surfaces_for(&self, mode: Mode) -> impl Iterator<Item = &SurfaceSpec> {
        self.specs.iter().filter(move |s| s.mode == mode)
    }

    /// The surface a mode's render loop draws into.
    pub fn primary(&self, mode: Mode) -> Result<&SurfaceSpec> {
        self.surfaces_for(mode)
            .next()
            .ok_or_else(|| ShellError::Configuration(format!("mode {mode} has no surface")))
    }

    pub fn is_allocated(&self, id: SurfaceId) -> bool {
        self.allocated.contains(&id)
    }

    pub fn is_visible(&self, id: SurfaceId) -> bool {
        self.visible.contains(&id)
    }

    pub fn visible(&self) -> impl Iterator<Item = SurfaceId> + '_ {
        self.visible.iter().copied()
    }

    /// Allocate (on first use) and show every surface of `mode`. Returns the
    /// ids that had to be (re)allocated.
    pub fn show_mode(
        &mut self,
        mode: Mode,
        backend: &mut dyn SurfaceBackend,
    ) -> Result<Vec<SurfaceId>> {
        let mut fresh = Vec::new();
        let ids: Vec<SurfaceId> = self.surfaces_for(mode).map(|s| s.id).collect();
        for id in ids {
            if !self.allocated.contains(&id) {
                self.allocate(id, backend)?;
                fresh.push(id);
            }
            backend.set_visible(id, true)?;
            self.visible.insert(id);
        }
        Ok(fresh)
    }

    pub fn hide_mode(&mut self, mode: Mode, backend: &mut dyn SurfaceBackend) -> Result<()> {
        let ids: Vec<SurfaceId> = self.surfaces_for(mode).map(|s| s.id).collect();
        let mut first_err = None;
        for id in ids {
            if self.visible.remove(&id) {
                if let Err(e) = backend.set_visible(id, false) {
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Free every allocated surface that is not on screen. Returns the
    /// released ids.
    pub fn release_hidden(&mut self, backend: &mut dyn SurfaceBackend) -> Result<Vec<SurfaceId>> {
        let hidden: Vec<SurfaceId> = self
            .allocated
            .iter()
            .filter(|id| !self.visible.contains(id))
            .copied()
            .collect();
        for &id in &hidden {
            backend.release(id)?;
            self.allocated.remove(&id);
            log::debug!("released hidden surface {id}");
        }
        Ok(hidden)
    }

    /// Change a surface's windowed scale.
    pub fn set_scale(
        &mut self,
        id: SurfaceId,
        scale: u32,
        backend: &mut dyn SurfaceBackend,
    ) -> Result<()> {
        let scale = check_scale(scale)?;
        let fullscreen = self.fullscreen;
        let spec = self
            .specs
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ShellError::Configuration(format!("unknown surface {id}")))?;
        spec.scale = scale;
        if self.allocated.contains(&id) {
            let (w, h) = spec.display_size(fullscreen);
            backend.set_display_size(id, w, h)?;
        }
        Ok(())
    }

    /// Enter (`Some`) or leave (`None`) fullscreen sizing and resize every
    /// allocated surface.
    pub fn set_fullscreen(
        &mut self,
        viewport: Option<Viewport>,
        backend: &mut dyn SurfaceBackend,
    ) -> Result<()> {
        self.fullscreen = viewport;
        for spec in self.specs.iter().filter(|s| self.allocated.contains(&s.id)) {
            let (w, h) = spec.display_size(viewport);
            backend.set_display_size(spec.id, w, h)?;
        }
        Ok(())
    }

    fn allocate(&mut self, id: SurfaceId, backend: &mut dyn SurfaceBackend) -> Result<()> {
        let spec = self
            .spec(id)
            .ok_or_else(|| ShellError::Configuration(format!("unknown surface {id}")))?;
        backend.allocate(spec)?;
        let (w, h) = spec.display_size(self.fullscreen);
        backend.set_display_size(id, w, h)?;
        self.allocated.insert(id);
        log::debug!("allocated surface {id} ({w}x{h})");
        Ok(())
    }
}
