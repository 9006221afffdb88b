//! Frame buffers handed over by the emulation core.
//!
//! A frame is a fixed-size, row-major pixel buffer whose dimensions match the
//! logical resolution of the surface it is presented on.

use crate::error::{Result, ShellError};

/// Pixel layout of a [`FrameBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 3 bytes per pixel (R, G, B).
    Rgb24,
    /// 4 bytes per pixel (R, G, B, A).
    Rgba32,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb24 => 3,
            Self::Rgba32 => 4,
        }
    }
}

/// One frame of video from the emulation core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    /// Wrap a pixel buffer, checking that its length matches the dimensions.
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(ShellError::Core(format!(
                "frame buffer is {} bytes, expected {expected} for {width}x{height} {format:?}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Infer the pixel format from the buffer length.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let area = width as usize * height as usize;
        let format = if pixels.len() == area * 4 {
            PixelFormat::Rgba32
        } else {
            PixelFormat::Rgb24
        };
        Self::new(width, height, format, pixels)
    }

    /// An opaque black frame.
    pub fn blank(width: u32, height: u32) -> Self {
        let mut pixels = vec![0u8; width as usize * height as usize * 4];
        for px in pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self {
            width,
            height,
            format: PixelFormat::Rgba32,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA bytes suitable for canvas `ImageData`. Borrows when already RGBA.
    pub fn to_rgba(&self) -> std::borrow::Cow<'_, [u8]> {
        match self.format {
            PixelFormat::Rgba32 => std::borrow::Cow::Borrowed(&self.pixels),
            PixelFormat::Rgb24 => {
                let mut out = Vec::with_capacity(self.pixels.len() / 3 * 4);
                for px in self.pixels.chunks_exact(3) {
                    out.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
                std::borrow::Cow::Owned(out)
            },
        }
    }
}
