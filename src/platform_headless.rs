//! Headless platform for testing and CI environments
//!
//! Events are scripted up front, optionally stamped with the virtual time at
//! which they become visible. The clock only moves when the engine delays,
//! so a scripted run is fully deterministic.

use crate::platform_trait::{Clock, CursorShape, Event, EventSource, PlatformError, Screen};
use crate::surface::{PixelFormat, Surface};
use log::debug;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct HeadlessPlatform {
    /// (visible_at_ms, event) in delivery order
    events: VecDeque<(u64, Event)>,
    framebuffer: Surface,
    now: u64,
    updates: usize,
    cursor: CursorShape,
    cursor_visible: bool,
    locked: bool,
    quit_when_exhausted: bool,
    quit_sent: bool,
}

impl HeadlessPlatform {
    pub fn new(width: u16, height: u16, format: PixelFormat) -> Self {
        Self {
            events: VecDeque::new(),
            framebuffer: Surface::new(width, height, format),
            now: 0,
            updates: 0,
            cursor: CursorShape::Normal,
            cursor_visible: true,
            locked: false,
            quit_when_exhausted: false,
            quit_sent: false,
        }
    }

    /// Deliver a single `Quit` once the script runs dry, so an unattended
    /// run always terminates
    pub fn quit_when_exhausted(mut self) -> Self {
        self.quit_when_exhausted = true;
        self
    }

    /// Queue an event that is visible immediately
    pub fn push_event(&mut self, event: Event) {
        self.events.push_back((0, event));
    }

    /// Queue an event that becomes visible once the clock reaches `at_ms`
    pub fn push_event_at(&mut self, at_ms: u64, event: Event) {
        self.events.push_back((at_ms, event));
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Number of `update_screen` calls so far
    pub fn update_count(&self) -> usize {
        self.updates
    }

    pub fn cursor(&self) -> CursorShape {
        self.cursor
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub fn framebuffer(&self) -> &Surface {
        &self.framebuffer
    }
}

impl EventSource for HeadlessPlatform {
    fn poll_event(&mut self) -> Option<Event> {
        match self.events.front() {
            Some((at, _)) if *at <= self.now => self.events.pop_front().map(|(_, event)| event),
            Some(_) => None,
            None => {
                if self.quit_when_exhausted && !self.quit_sent {
                    debug!("Headless: event script exhausted, sending quit");
                    self.quit_sent = true;
                    Some(Event::Quit)
                } else {
                    None
                }
            }
        }
    }
}

impl Screen for HeadlessPlatform {
    fn screen_format(&self) -> PixelFormat {
        self.framebuffer.format
    }

    fn screen_size(&self) -> (u16, u16) {
        (self.framebuffer.width, self.framebuffer.height)
    }

    fn copy_rect_to_screen(&mut self, pixels: &[u8], pitch: usize, x: i32, y: i32, w: u16, h: u16) {
        self.framebuffer.blit(pixels, pitch, x, y, w, h);
    }

    fn lock_screen(&mut self) -> &mut Surface {
        self.locked = true;
        &mut self.framebuffer
    }

    fn unlock_screen(&mut self) {
        self.locked = false;
    }

    fn update_screen(&mut self) -> Result<(), PlatformError> {
        if self.locked {
            return Err(PlatformError::new("update_screen while the screen is locked"));
        }
        self.updates += 1;
        Ok(())
    }

    fn set_cursor(&mut self, shape: CursorShape) {
        self.cursor = shape;
    }

    fn show_cursor(&mut self, visible: bool) {
        self.cursor_visible = visible;
    }
}

impl Clock for HeadlessPlatform {
    fn now_millis(&self) -> u64 {
        self.now
    }

    fn delay_millis(&mut self, millis: u64) {
        self.now += millis;
    }
}
