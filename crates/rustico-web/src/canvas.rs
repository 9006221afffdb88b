//! Canvas-backed surfaces.
//!
//! Each surface is a `<canvas>` already present in the page. Allocation
//! sizes its backing store to the logical resolution and grabs a 2D
//! context. Release shrinks the backing store to zero so the browser can
//! reclaim it. The display size is applied through CSS only.

use std::collections::BTreeMap;

use wasm_bindgen::{Clamped, JsCast};
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlElement, ImageData};

use rustico_shell::SurfaceBackend;
use rustico_shell::error::{Result, ShellError};
use rustico_shell::frame::FrameBuffer;
use rustico_shell::surface::{SurfaceId, SurfaceSpec};

use crate::{dom, js_error};

struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    overlay: Option<HtmlElement>,
    width: u32,
    height: u32,
}

pub struct CanvasSurfaces {
    document: Document,
    surfaces: BTreeMap<SurfaceId, CanvasSurface>,
}

impl CanvasSurfaces {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            surfaces: BTreeMap::new(),
        }
    }

    fn html_element(&self, id: &str) -> Result<HtmlElement> {
        self.document
            .get_element_by_id(id)
            .ok_or_else(|| ShellError::Backend(format!("no element #{id}")))?
            .dyn_into::<HtmlElement>()
            .map_err(|_| ShellError::Backend(format!("#{id} is not an HTML element")))
    }

    fn surface(&self, id: SurfaceId) -> Result<&CanvasSurface> {
        self.surfaces
            .get(&id)
            .ok_or_else(|| ShellError::Backend(format!("surface {id} is not allocated")))
    }

    /// Elements that follow the surface's visibility and display size.
    fn styled(&self, id: SurfaceId) -> Result<Vec<&HtmlElement>> {
        let surface = self.surface(id)?;
        let mut elements: Vec<&HtmlElement> = vec![&surface.canvas];
        elements.extend(surface.overlay.as_ref());
        Ok(elements)
    }
}

impl SurfaceBackend for CanvasSurfaces {
    fn allocate(&mut self, spec: &SurfaceSpec) -> Result<()> {
        let canvas = self
            .document
            .get_element_by_id(spec.id.as_str())
            .ok_or_else(|| ShellError::Backend(format!("no canvas #{}", spec.id)))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| ShellError::Backend(format!("#{} is not a canvas", spec.id)))?;
        canvas.set_width(spec.width);
        canvas.set_height(spec.height);
        let context = canvas
            .get_context("2d")
            .map_err(|e| js_error("getContext", e))?
            .ok_or_else(|| ShellError::Backend(format!("no 2d context for #{}", spec.id)))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| ShellError::Backend("unexpected context type".into()))?;
        context.set_image_smoothing_enabled(false);

        let overlay = match spec.overlay {
            Some(id) => Some(self.html_element(id)?),
            None => None,
        };
        log::debug!("allocated canvas #{} ({}x{})", spec.id, spec.width, spec.height);
        self.surfaces.insert(
            spec.id,
            CanvasSurface {
                canvas,
                context,
                overlay,
                width: spec.width,
                height: spec.height,
            },
        );
        Ok(())
    }

    fn release(&mut self, id: SurfaceId) -> Result<()> {
        if let Some(surface) = self.surfaces.remove(&id) {
            surface.canvas.set_width(0);
            surface.canvas.set_height(0);
            log::debug!("released canvas #{id}");
        }
        Ok(())
    }

    fn set_visible(&mut self, id: SurfaceId, visible: bool) -> Result<()> {
        for element in self.styled(id)? {
            element
                .style()
                .set_property("display", dom::display_value(visible))
                .map_err(|e| js_error("style.display", e))?;
        }
        Ok(())
    }

    fn set_display_size(&mut self, id: SurfaceId, width: u32, height: u32) -> Result<()> {
        let properties = dom::canvas_size_properties(width, height);
        for element in self.styled(id)? {
            let style = element.style();
            for (name, value) in &properties {
                style
                    .set_property(name, value)
                    .map_err(|e| js_error("style", e))?;
            }
        }
        Ok(())
    }

    fn blit(&mut self, id: SurfaceId, frame: &FrameBuffer) -> Result<()> {
        let surface = self.surface(id)?;
        if frame.dimensions() != (surface.width, surface.height) {
            return Err(ShellError::Core(format!(
                "frame is {}x{}, surface {id} is {}x{}",
                frame.width(),
                frame.height(),
                surface.width,
                surface.height
            )));
        }
        let rgba = frame.to_rgba();
        let image = ImageData::new_with_u8_clamped_array_and_sh(
            Clamped(rgba.as_ref()),
            frame.width(),
            frame.height(),
        )
        .map_err(|e| js_error("ImageData", e))?;
        surface
            .context
            .put_image_data(&image, 0.0, 0.0)
            .map_err(|e| js_error("putImageData", e))
    }
}
