//! Image format decoding
//!
//! Decoders turn resource bytes into a surface. Indexed output comes with
//! its palette; the image cache expands it to the screen format.

use crate::error::{EngineError, Result};
use crate::surface::{Palette, PixelFormat, Surface};

/// Decoder output
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub surface: Surface,
    /// Present when `surface` is palette-indexed
    pub palette: Option<Palette>,
}

pub trait ImageDecoder {
    /// Decode `bytes`; `name` is only used for diagnostics
    fn decode(&self, name: &str, bytes: &[u8]) -> Result<DecodedImage>;
}

/// Decoder backed by the `image` crate (PNG, BMP, GIF)
///
/// Produces direct-colour surfaces in the target format.
#[derive(Debug, Clone, Copy)]
pub struct ImageCrateDecoder {
    format: PixelFormat,
}

impl ImageCrateDecoder {
    pub fn new(format: PixelFormat) -> Self {
        Self { format }
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, name: &str, bytes: &[u8]) -> Result<DecodedImage> {
        let decoded = image::load_from_memory(bytes).map_err(|e| EngineError::Decode {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = (rgba.width(), rgba.height());
        if width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(EngineError::Decode {
                name: name.to_string(),
                message: format!("{}x{} exceeds surface limits", width, height),
            });
        }

        let mut surface = Surface::new(width as u16, height as u16, self.format);
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let [r, g, b, _] = pixel.0;
            surface.set_pixel(x as u16, y as u16, self.format.rgb_to_color(r, g, b));
        }

        Ok(DecodedImage {
            surface,
            palette: None,
        })
    }
}
