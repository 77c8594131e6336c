//! Logging wrapper for platform implementations
//!
//! Logs every platform call that changes host state, to help debug frame
//! pacing and input handling.

use crate::platform_trait::{Clock, CursorShape, Event, EventSource, PlatformError, Screen};
use crate::surface::{PixelFormat, Surface};
use log::info;

pub struct LoggingPlatform<P> {
    inner: P,
    op_count: usize,
}

impl<P> LoggingPlatform<P> {
    pub fn new(inner: P) -> Self {
        info!("=== PLATFORM LOGGING STARTED ===");
        Self { inner, op_count: 0 }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    fn log_op(&mut self, op: &str) {
        self.op_count += 1;
        info!("[OP {:04}] {}", self.op_count, op);
    }
}

impl<P: EventSource> EventSource for LoggingPlatform<P> {
    fn poll_event(&mut self) -> Option<Event> {
        let event = self.inner.poll_event();
        // Empty polls happen every few milliseconds; only log deliveries
        if let Some(ev) = event {
            self.log_op(&format!("poll_event() -> {:?}", ev));
        }
        event
    }
}

impl<P: Screen> Screen for LoggingPlatform<P> {
    fn screen_format(&self) -> PixelFormat {
        self.inner.screen_format()
    }

    fn screen_size(&self) -> (u16, u16) {
        self.inner.screen_size()
    }

    fn copy_rect_to_screen(&mut self, pixels: &[u8], pitch: usize, x: i32, y: i32, w: u16, h: u16) {
        self.log_op(&format!("copy_rect_to_screen({}, {}, {}x{})", x, y, w, h));
        self.inner.copy_rect_to_screen(pixels, pitch, x, y, w, h)
    }

    fn lock_screen(&mut self) -> &mut Surface {
        self.log_op("lock_screen()");
        self.inner.lock_screen()
    }

    fn unlock_screen(&mut self) {
        self.log_op("unlock_screen()");
        self.inner.unlock_screen()
    }

    fn update_screen(&mut self) -> Result<(), PlatformError> {
        self.log_op("update_screen()");
        self.inner.update_screen()
    }

    fn set_cursor(&mut self, shape: CursorShape) {
        self.log_op(&format!("set_cursor({:?})", shape));
        self.inner.set_cursor(shape)
    }

    fn show_cursor(&mut self, visible: bool) {
        self.log_op(&format!("show_cursor({})", visible));
        self.inner.show_cursor(visible)
    }
}

impl<P: Clock> Clock for LoggingPlatform<P> {
    fn now_millis(&self) -> u64 {
        self.inner.now_millis()
    }

    fn delay_millis(&mut self, millis: u64) {
        self.inner.delay_millis(millis)
    }
}
