//! Picture drawing on top of the image cache

use crate::error::Result;
use crate::image_cache::ImageCache;
use crate::image_decoder::ImageDecoder;
use crate::platform_trait::Screen;
use crate::resource::ResourceLoader;
use crate::surface::Surface;
use std::rc::Rc;

pub struct GraphicsManager {
    cache: ImageCache,
    loader: Box<dyn ResourceLoader>,
    decoder: Box<dyn ImageDecoder>,
}

impl GraphicsManager {
    pub fn new(
        capacity: usize,
        loader: Box<dyn ResourceLoader>,
        decoder: Box<dyn ImageDecoder>,
    ) -> Self {
        Self {
            cache: ImageCache::new(capacity),
            loader,
            decoder,
        }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// Forget every decoded picture
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Cached screen-format surface for `name`
    pub fn decode_image<S: Screen + ?Sized>(&mut self, screen: &S, name: &str) -> Result<Rc<Surface>> {
        self.cache.get_or_decode(
            name,
            self.loader.as_ref(),
            self.decoder.as_ref(),
            screen.screen_format(),
        )
    }

    /// Copy a picture to the screen at (x, y)
    pub fn draw_pict<S: Screen + ?Sized>(
        &mut self,
        screen: &mut S,
        name: &str,
        x: i32,
        y: i32,
        update_screen: bool,
    ) -> Result<()> {
        let surface = self.decode_image(screen, name)?;
        screen.copy_rect_to_screen(&surface.pixels, surface.pitch, x, y, surface.width, surface.height);

        if update_screen {
            screen.update_screen()?;
        }
        Ok(())
    }

    /// Copy every pixel of a picture except those equal to `transparency`
    pub fn draw_pict_transparent<S: Screen + ?Sized>(
        &mut self,
        screen: &mut S,
        name: &str,
        x: i32,
        y: i32,
        transparency: u32,
        update_screen: bool,
    ) -> Result<()> {
        let surface = self.decode_image(screen, name)?;
        let key = transparency & screen.screen_format().color_mask();

        let framebuffer = screen.lock_screen();
        for i in 0..surface.height {
            let dy = y + i as i32;
            if dy < 0 || dy >= framebuffer.height as i32 {
                continue;
            }
            for j in 0..surface.width {
                let dx = x + j as i32;
                if dx < 0 || dx >= framebuffer.width as i32 {
                    continue;
                }
                let color = surface.pixel(j, i);
                if color != key {
                    framebuffer.set_pixel(dx as u16, dy as u16, color);
                }
            }
        }
        screen.unlock_screen();

        if update_screen {
            screen.update_screen()?;
        }
        Ok(())
    }

    pub fn get_color<S: Screen + ?Sized>(&self, screen: &S, r: u8, g: u8, b: u8) -> u32 {
        screen.screen_format().rgb_to_color(r, g, b)
    }
}
