//! Bitmaps, pixel formats and palettes
//!
//! A `Surface` is a tightly owned pixel buffer in one `PixelFormat`. Decoded
//! images, cached assets and the host framebuffer all use this type.

use std::fmt;

/// Layout of a single pixel in a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub bytes_per_pixel: u8,
    pub r_bits: u8,
    pub g_bits: u8,
    pub b_bits: u8,
    pub a_bits: u8,
    pub r_shift: u8,
    pub g_shift: u8,
    pub b_shift: u8,
    pub a_shift: u8,
}

impl PixelFormat {
    /// Palette-indexed, one byte per pixel
    pub const CLUT8: PixelFormat = PixelFormat {
        bytes_per_pixel: 1,
        r_bits: 0,
        g_bits: 0,
        b_bits: 0,
        a_bits: 0,
        r_shift: 0,
        g_shift: 0,
        b_shift: 0,
        a_shift: 0,
    };

    pub const RGB565: PixelFormat = PixelFormat {
        bytes_per_pixel: 2,
        r_bits: 5,
        g_bits: 6,
        b_bits: 5,
        a_bits: 0,
        r_shift: 11,
        g_shift: 5,
        b_shift: 0,
        a_shift: 0,
    };

    pub const ARGB8888: PixelFormat = PixelFormat {
        bytes_per_pixel: 4,
        r_bits: 8,
        g_bits: 8,
        b_bits: 8,
        a_bits: 8,
        r_shift: 16,
        g_shift: 8,
        b_shift: 0,
        a_shift: 24,
    };

    /// True for palette-indexed formats (8 bits or less per pixel)
    pub fn is_indexed(&self) -> bool {
        self.bytes_per_pixel == 1
    }

    /// Pack an 8-bit RGB triple into this format; alpha is fully opaque
    pub fn rgb_to_color(&self, r: u8, g: u8, b: u8) -> u32 {
        let alpha = if self.a_bits > 0 {
            ((1u32 << self.a_bits) - 1) << self.a_shift
        } else {
            0
        };
        (pack_channel(r, self.r_bits) << self.r_shift)
            | (pack_channel(g, self.g_bits) << self.g_shift)
            | (pack_channel(b, self.b_bits) << self.b_shift)
            | alpha
    }

    /// Unpack a colour back to 8-bit RGB
    pub fn color_to_rgb(&self, color: u32) -> (u8, u8, u8) {
        (
            unpack_channel(color >> self.r_shift, self.r_bits),
            unpack_channel(color >> self.g_shift, self.g_bits),
            unpack_channel(color >> self.b_shift, self.b_bits),
        )
    }

    /// Mask covering the significant bits of one pixel
    pub fn color_mask(&self) -> u32 {
        match self.bytes_per_pixel {
            1 => 0xff,
            2 => 0xffff,
            _ => 0xffff_ffff,
        }
    }
}

fn pack_channel(value: u8, bits: u8) -> u32 {
    if bits == 0 {
        0
    } else {
        (value as u32) >> (8 - bits)
    }
}

fn unpack_channel(value: u32, bits: u8) -> u8 {
    if bits == 0 {
        return 0;
    }
    let max = (1u32 << bits) - 1;
    ((value & max) * 255 / max) as u8
}

/// 256-entry RGB palette as delivered by an indexed-colour decoder
#[derive(Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [u8; 256 * 3],
}

impl Palette {
    pub fn new() -> Self {
        Palette {
            entries: [0; 256 * 3],
        }
    }

    /// Build from packed RGB triples; missing entries stay black
    pub fn from_rgb(data: &[u8]) -> Self {
        let mut palette = Palette::new();
        let len = data.len().min(palette.entries.len());
        palette.entries[..len].copy_from_slice(&data[..len]);
        palette
    }

    pub fn set(&mut self, index: u8, r: u8, g: u8, b: u8) {
        let base = index as usize * 3;
        self.entries[base] = r;
        self.entries[base + 1] = g;
        self.entries[base + 2] = b;
    }

    pub fn rgb(&self, index: u8) -> (u8, u8, u8) {
        let base = index as usize * 3;
        (
            self.entries[base],
            self.entries[base + 1],
            self.entries[base + 2],
        )
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::new()
    }
}

impl fmt::Debug for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Palette({:02x?}..)", &self.entries[..12])
    }
}

/// Owned pixel buffer
#[derive(Clone, PartialEq, Eq)]
pub struct Surface {
    pub width: u16,
    pub height: u16,
    /// Bytes per row
    pub pitch: usize,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl Surface {
    /// Allocate a zero-filled surface
    pub fn new(width: u16, height: u16, format: PixelFormat) -> Self {
        let pitch = width as usize * format.bytes_per_pixel as usize;
        Surface {
            width,
            height,
            pitch,
            format,
            pixels: vec![0; pitch * height as usize],
        }
    }

    /// Wrap existing pixel data; `pixels` must hold `height` rows of `pitch` bytes
    pub fn from_pixels(
        width: u16,
        height: u16,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> Option<Self> {
        let pitch = width as usize * format.bytes_per_pixel as usize;
        if pixels.len() < pitch * height as usize {
            return None;
        }
        Some(Surface {
            width,
            height,
            pitch,
            format,
            pixels,
        })
    }

    fn offset(&self, x: u16, y: u16) -> usize {
        y as usize * self.pitch + x as usize * self.format.bytes_per_pixel as usize
    }

    /// Read the raw colour value at (x, y)
    pub fn pixel(&self, x: u16, y: u16) -> u32 {
        let at = self.offset(x, y);
        match self.format.bytes_per_pixel {
            1 => self.pixels[at] as u32,
            2 => u16::from_le_bytes([self.pixels[at], self.pixels[at + 1]]) as u32,
            _ => u32::from_le_bytes([
                self.pixels[at],
                self.pixels[at + 1],
                self.pixels[at + 2],
                self.pixels[at + 3],
            ]),
        }
    }

    /// Write a raw colour value at (x, y)
    pub fn set_pixel(&mut self, x: u16, y: u16, color: u32) {
        let at = self.offset(x, y);
        match self.format.bytes_per_pixel {
            1 => self.pixels[at] = color as u8,
            2 => self.pixels[at..at + 2].copy_from_slice(&(color as u16).to_le_bytes()),
            _ => self.pixels[at..at + 4].copy_from_slice(&color.to_le_bytes()),
        }
    }

    /// Copy a rectangle of foreign pixels into this surface, clipping at the edges
    pub fn blit(&mut self, src: &[u8], src_pitch: usize, x: i32, y: i32, w: u16, h: u16) {
        let bpp = self.format.bytes_per_pixel as usize;
        for row in 0..h as i32 {
            let dy = y + row;
            if dy < 0 || dy >= self.height as i32 {
                continue;
            }
            let x0 = x.max(0);
            let x1 = (x + w as i32).min(self.width as i32);
            if x0 >= x1 {
                continue;
            }
            let src_start = row as usize * src_pitch + (x0 - x) as usize * bpp;
            let len = (x1 - x0) as usize * bpp;
            if src_start + len > src.len() {
                continue;
            }
            let dst_start = self.offset(x0 as u16, dy as u16);
            self.pixels[dst_start..dst_start + len]
                .copy_from_slice(&src[src_start..src_start + len]);
        }
    }

    /// Expand an indexed surface into `format` through `palette`
    pub fn convert_indexed(&self, palette: &Palette, format: PixelFormat) -> Surface {
        let mut output = Surface::new(self.width, self.height, format);
        for y in 0..self.height {
            for x in 0..self.width {
                let (r, g, b) = palette.rgb(self.pixel(x, y) as u8);
                output.set_pixel(x, y, format.rgb_to_color(r, g, b));
            }
        }
        output
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes_per_pixel", &self.format.bytes_per_pixel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb565_packing() {
        let format = PixelFormat::RGB565;
        assert_eq!(format.rgb_to_color(255, 0, 0), 0xf800);
        assert_eq!(format.rgb_to_color(0, 255, 0), 0x07e0);
        assert_eq!(format.rgb_to_color(0, 0, 255), 0x001f);
        assert_eq!(format.color_to_rgb(0xffff), (255, 255, 255));
    }

    #[test]
    fn test_argb8888_is_opaque() {
        let color = PixelFormat::ARGB8888.rgb_to_color(0x12, 0x34, 0x56);
        assert_eq!(color, 0xff12_3456);
    }

    #[test]
    fn test_convert_indexed() {
        let mut palette = Palette::new();
        palette.set(1, 255, 255, 255);
        let mut indexed = Surface::new(2, 1, PixelFormat::CLUT8);
        indexed.set_pixel(1, 0, 1);

        let converted = indexed.convert_indexed(&palette, PixelFormat::RGB565);
        assert_eq!(converted.format, PixelFormat::RGB565);
        assert_eq!(converted.pixel(0, 0), 0);
        assert_eq!(converted.pixel(1, 0), 0xffff);
    }

    #[test]
    fn test_blit_clips_at_edges() {
        let mut dst = Surface::new(4, 4, PixelFormat::CLUT8);
        let src = vec![7u8; 9];
        dst.blit(&src, 3, 2, 2, 3, 3);
        assert_eq!(dst.pixel(2, 2), 7);
        assert_eq!(dst.pixel(3, 3), 7);
        assert_eq!(dst.pixel(1, 1), 0);
    }
}
