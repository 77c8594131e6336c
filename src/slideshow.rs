//! Picture slideshow host
//!
//! A minimal `ScriptHost` used by the `revenant` binary: it shows each
//! configured picture centred on the screen and waits for a click (or a key)
//! before moving on. An optional music track plays in a loop throughout.

use crate::error::Result;
use crate::graphics::GraphicsManager;
use crate::music::MUSIC_LOOP;
use crate::scheduler::{FrameContext, ScriptHost};
use log::{info, warn};

pub struct Slideshow {
    graphics: GraphicsManager,
    pictures: Vec<String>,
    music: Option<String>,
    next: usize,
}

impl Slideshow {
    pub fn new(graphics: GraphicsManager, pictures: Vec<String>) -> Self {
        Self {
            graphics,
            pictures,
            music: None,
            next: 0,
        }
    }

    /// Loop `track` while the slideshow runs
    pub fn with_music(mut self, track: impl Into<String>) -> Self {
        self.music = Some(track.into());
        self
    }

    pub fn graphics(&self) -> &GraphicsManager {
        &self.graphics
    }

    /// Pictures shown so far
    pub fn shown(&self) -> usize {
        self.next
    }
}

impl ScriptHost for Slideshow {
    fn boot(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        ctx.flags.allow_player_input = true;
        self.next = 0;

        if let (Some(track), Some(sound)) = (self.music.as_deref(), ctx.sound.as_deref_mut()) {
            if let Err(e) = sound.play_music(track, MUSIC_LOOP) {
                warn!("Cannot play {}: {}", track, e);
            }
        }
        Ok(())
    }

    fn execute_frame(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        let Some(name) = self.pictures.get(self.next) else {
            return Ok(());
        };

        let picture = self.graphics.decode_image(&*ctx.platform, name)?;
        let (width, height) = ctx.platform.screen_size();
        let x = (width as i32 - picture.width as i32) / 2;
        let y = (height as i32 - picture.height as i32) / 2;
        info!("Showing {} at ({}, {})", name, x, y);

        self.graphics.draw_pict(&mut *ctx.platform, name, x, y, false)?;
        self.next += 1;
        ctx.flags.wait_for_player_click = true;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.next >= self.pictures.len()
    }

    fn teardown(&mut self) {
        self.graphics.clear_cache();
    }
}
