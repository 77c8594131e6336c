//! Host platform interface used by the engine core
//!
//! The frame scheduler and the graphics layer only talk to the host through
//! these traits, whether the host is a terminal, a test harness or a real
//! window system.

use crate::error::EngineError;
use crate::surface::{PixelFormat, Surface};
use std::fmt;

/// Keys the engines care about; everything else arrives as `Char` or `Other`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Return,
    KeypadEnter,
    /// Keypad digit 0-9
    Keypad(u8),
    Escape,
    Backspace,
    /// Function key F1-F12
    F(u8),
    Up,
    Down,
    Left,
    Right,
    Other(u32),
}

/// Host input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    LeftDown,
    RightDown,
    MouseMove { x: i16, y: i16 },
    Quit,
    KeyDown(KeyCode),
}

/// Mouse cursor shapes selected by the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Normal,
    /// A player command is armed
    Cross,
}

/// Non-blocking input event queue
pub trait EventSource {
    /// Pop the next pending event, if any
    fn poll_event(&mut self) -> Option<Event>;
}

/// Display sink owning the host framebuffer
pub trait Screen {
    /// Native pixel format of the framebuffer
    fn screen_format(&self) -> PixelFormat;

    /// Framebuffer dimensions in pixels
    fn screen_size(&self) -> (u16, u16);

    /// Copy a rectangle of pixels in the native format to (x, y)
    fn copy_rect_to_screen(&mut self, pixels: &[u8], pitch: usize, x: i32, y: i32, w: u16, h: u16);

    /// Exclusive access to the framebuffer until `unlock_screen`
    fn lock_screen(&mut self) -> &mut Surface;

    fn unlock_screen(&mut self) {}

    /// Present the framebuffer
    fn update_screen(&mut self) -> Result<(), PlatformError>;

    fn set_cursor(&mut self, shape: CursorShape);

    fn show_cursor(&mut self, visible: bool);
}

/// Millisecond clock
pub trait Clock {
    fn now_millis(&self) -> u64;

    /// Yield to the host for `millis`
    fn delay_millis(&mut self, millis: u64);
}

/// Everything the frame loop needs from the host
pub trait Platform: EventSource + Screen + Clock {}

impl<T: EventSource + Screen + Clock + ?Sized> Platform for T {}

impl<P: EventSource + ?Sized> EventSource for Box<P> {
    fn poll_event(&mut self) -> Option<Event> {
        (**self).poll_event()
    }
}

impl<P: Screen + ?Sized> Screen for Box<P> {
    fn screen_format(&self) -> PixelFormat {
        (**self).screen_format()
    }

    fn screen_size(&self) -> (u16, u16) {
        (**self).screen_size()
    }

    fn copy_rect_to_screen(&mut self, pixels: &[u8], pitch: usize, x: i32, y: i32, w: u16, h: u16) {
        (**self).copy_rect_to_screen(pixels, pitch, x, y, w, h)
    }

    fn lock_screen(&mut self) -> &mut Surface {
        (**self).lock_screen()
    }

    fn unlock_screen(&mut self) {
        (**self).unlock_screen()
    }

    fn update_screen(&mut self) -> Result<(), PlatformError> {
        (**self).update_screen()
    }

    fn set_cursor(&mut self, shape: CursorShape) {
        (**self).set_cursor(shape)
    }

    fn show_cursor(&mut self, visible: bool) {
        (**self).show_cursor(visible)
    }
}

impl<P: Clock + ?Sized> Clock for Box<P> {
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }

    fn delay_millis(&mut self, millis: u64) {
        (**self).delay_millis(millis)
    }
}

/// Platform error type
#[derive(Debug, Clone)]
pub struct PlatformError {
    pub message: String,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Platform error: {}", self.message)
    }
}

impl std::error::Error for PlatformError {}

impl From<std::io::Error> for PlatformError {
    fn from(error: std::io::Error) -> Self {
        Self::new(format!("I/O error: {}", error))
    }
}

impl From<PlatformError> for EngineError {
    fn from(error: PlatformError) -> Self {
        EngineError::Platform(error.message)
    }
}
