//! Bounded image cache with least-recently-used eviction
//!
//! A fixed array of slots maps resource names (case-insensitively) to
//! decoded, screen-format surfaces. Lookups scan linearly; the capacity is
//! small and constant.

use crate::error::{EngineError, Result};
use crate::image_decoder::ImageDecoder;
use crate::resource::ResourceLoader;
use crate::surface::{PixelFormat, Surface};
use log::{debug, trace};
use std::rc::Rc;

/// Default number of cache slots
pub const IMAGE_CACHE_SIZE: usize = 10;

#[derive(Debug, Default)]
struct CacheSlot {
    name: String,
    surface: Option<Rc<Surface>>,
    last_used: u64,
}

impl CacheSlot {
    fn is_empty(&self) -> bool {
        self.surface.is_none()
    }

    fn clear(&mut self) {
        self.name.clear();
        self.surface = None;
        self.last_used = 0;
    }
}

#[derive(Debug)]
pub struct ImageCache {
    slots: Vec<CacheSlot>,
    /// Monotonic access counter used as the slot timestamp
    access_clock: u64,
    decode_count: usize,
}

impl ImageCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, CacheSlot::default);
        Self {
            slots,
            access_clock: 0,
            decode_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots holding a decoded surface
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total decodes performed, hits excluded
    pub fn decode_count(&self) -> usize {
        self.decode_count
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots
            .iter()
            .any(|s| !s.is_empty() && s.name.eq_ignore_ascii_case(name))
    }

    /// Drop every cached surface
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
    }

    fn touch(&mut self) -> u64 {
        self.access_clock += 1;
        self.access_clock
    }

    /// Pick the slot for `name`: its current slot, the first empty one, or
    /// the least recently used one (first in scan order on ties)
    fn find_slot(&mut self, name: &str) -> usize {
        let now = self.touch();

        if let Some(i) = self
            .slots
            .iter()
            .position(|s| !s.is_empty() && s.name.eq_ignore_ascii_case(name))
        {
            self.slots[i].last_used = now;
            return i;
        }

        if let Some(i) = self.slots.iter().position(|s| s.is_empty()) {
            trace!("Putting image {} in empty slot {}", name, i);
            let slot = &mut self.slots[i];
            slot.name = name.to_string();
            slot.last_used = now;
            return i;
        }

        let mut oldest = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.last_used < self.slots[oldest].last_used {
                oldest = i;
            }
        }
        debug!(
            "Replacing image {} with {} in slot {}",
            self.slots[oldest].name, name, oldest
        );
        let slot = &mut self.slots[oldest];
        slot.surface = None;
        slot.name = name.to_string();
        slot.last_used = now;
        oldest
    }

    /// Return the cached surface for `name`, decoding it on a miss
    ///
    /// Indexed images are expanded to `screen_format` through their palette.
    /// A load or decode failure leaves the chosen slot empty and is returned
    /// to the caller.
    pub fn get_or_decode(
        &mut self,
        name: &str,
        loader: &dyn ResourceLoader,
        decoder: &dyn ImageDecoder,
        screen_format: PixelFormat,
    ) -> Result<Rc<Surface>> {
        let index = self.find_slot(name);
        if let Some(surface) = &self.slots[index].surface {
            return Ok(Rc::clone(surface));
        }

        match Self::decode(name, loader, decoder, screen_format) {
            Ok(surface) => {
                self.decode_count += 1;
                let surface = Rc::new(surface);
                self.slots[index].surface = Some(Rc::clone(&surface));
                Ok(surface)
            }
            Err(e) => {
                self.slots[index].clear();
                Err(e)
            }
        }
    }

    fn decode(
        name: &str,
        loader: &dyn ResourceLoader,
        decoder: &dyn ImageDecoder,
        screen_format: PixelFormat,
    ) -> Result<Surface> {
        let bytes = loader.load(name)?;
        let image = decoder.decode(name, &bytes)?;

        if !image.surface.format.is_indexed() {
            return Ok(image.surface);
        }

        let palette = image.palette.ok_or_else(|| EngineError::Decode {
            name: name.to_string(),
            message: "indexed image without a palette".to_string(),
        })?;
        trace!(
            "Converting {} ({}x{}) to {}-byte pixels",
            name,
            image.surface.width,
            image.surface.height,
            screen_format.bytes_per_pixel
        );
        Ok(image.surface.convert_indexed(&palette, screen_format))
    }
}
