//! Terminal platform built on crossterm
//!
//! Input comes from crossterm's event queue (polled with a zero timeout so
//! the frame loop never blocks). The framebuffer is presented as half-block
//! characters, two pixel rows per terminal cell, with true-colour escapes.

use crate::platform_trait::{
    Clock, CursorShape, Event, EventSource, KeyCode, PlatformError, Screen,
};
use crate::surface::{PixelFormat, Surface};
use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, KeyCode as TermKey, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::debug;
use std::io::{self, Write};
use std::time::{Duration, Instant};

pub struct CrosstermPlatform {
    framebuffer: Surface,
    started: Instant,
    term_size: (u16, u16),
    cursor: CursorShape,
    in_raw_mode: bool,
}

impl CrosstermPlatform {
    pub fn new(width: u16, height: u16, format: PixelFormat) -> Result<Self, PlatformError> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture, cursor::Hide)?;
        let term_size = terminal::size()?;
        debug!(
            "Crossterm platform: {}x{} framebuffer on {}x{} terminal",
            width, height, term_size.0, term_size.1
        );

        Ok(Self {
            framebuffer: Surface::new(width, height, format),
            started: Instant::now(),
            term_size,
            cursor: CursorShape::Normal,
            in_raw_mode: true,
        })
    }

    fn cleanup(&mut self) {
        if self.in_raw_mode {
            let _ = execute!(
                io::stdout(),
                ResetColor,
                cursor::Show,
                DisableMouseCapture,
                LeaveAlternateScreen
            );
            let _ = terminal::disable_raw_mode();
            self.in_raw_mode = false;
        }
    }

    /// Map a terminal cell to framebuffer coordinates
    fn cell_to_pixel(&self, column: u16, row: u16) -> (i16, i16) {
        let (cols, rows) = self.term_size;
        let x = column as u32 * self.framebuffer.width as u32 / cols.max(1) as u32;
        let y = row as u32 * self.framebuffer.height as u32 / rows.max(1) as u32;
        (x as i16, y as i16)
    }

    fn translate(&mut self, raw: event::Event) -> Option<Event> {
        match raw {
            event::Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    return None;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == TermKey::Char('c')
                {
                    debug!("Ctrl+C pressed");
                    return Some(Event::Quit);
                }
                let code = match key.code {
                    TermKey::Enter => KeyCode::Return,
                    TermKey::Esc => KeyCode::Escape,
                    TermKey::Backspace => KeyCode::Backspace,
                    TermKey::F(n) => KeyCode::F(n),
                    TermKey::Char(c) => KeyCode::Char(c),
                    TermKey::Up => KeyCode::Up,
                    TermKey::Down => KeyCode::Down,
                    TermKey::Left => KeyCode::Left,
                    TermKey::Right => KeyCode::Right,
                    _ => return None,
                };
                Some(Event::KeyDown(code))
            }
            event::Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::Down(MouseButton::Left) => Some(Event::LeftDown),
                MouseEventKind::Down(MouseButton::Right) => Some(Event::RightDown),
                MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                    let (x, y) = self.cell_to_pixel(mouse.column, mouse.row);
                    Some(Event::MouseMove { x, y })
                }
                _ => None,
            },
            event::Event::Resize(cols, rows) => {
                self.term_size = (cols, rows);
                None
            }
            _ => None,
        }
    }

    fn render(&self) -> io::Result<()> {
        let mut stdout = io::stdout();
        let (cols, rows) = self.term_size;
        let fb = &self.framebuffer;
        if fb.width == 0 || fb.height == 0 {
            return Ok(());
        }
        let format = fb.format;
        let pixel_rows = rows as u32 * 2;

        for row in 0..rows {
            queue!(stdout, cursor::MoveTo(0, row))?;
            for col in 0..cols {
                let x = (col as u32 * fb.width as u32 / cols.max(1) as u32) as u16;
                let top = (row as u32 * 2 * fb.height as u32 / pixel_rows) as u16;
                let bottom = ((row as u32 * 2 + 1) * fb.height as u32 / pixel_rows) as u16;
                let (tr, tg, tb) = format.color_to_rgb(fb.pixel(x, top));
                let (br, bg, bb) = format.color_to_rgb(fb.pixel(x, bottom));
                queue!(
                    stdout,
                    SetForegroundColor(Color::Rgb { r: tr, g: tg, b: tb }),
                    SetBackgroundColor(Color::Rgb { r: br, g: bg, b: bb }),
                    Print('\u{2580}')
                )?;
            }
        }
        queue!(stdout, ResetColor)?;
        stdout.flush()
    }
}

impl EventSource for CrosstermPlatform {
    fn poll_event(&mut self) -> Option<Event> {
        // Zero timeout: drain what is queued and return to the frame loop
        while let Ok(true) = event::poll(Duration::ZERO) {
            match event::read() {
                Ok(raw) => {
                    if let Some(event) = self.translate(raw) {
                        return Some(event);
                    }
                }
                Err(e) => {
                    debug!("Event read error: {}", e);
                    return None;
                }
            }
        }
        None
    }
}

impl Screen for CrosstermPlatform {
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
        &mut self.framebuffer
    }

    fn update_screen(&mut self) -> Result<(), PlatformError> {
        self.render()?;
        Ok(())
    }

    fn set_cursor(&mut self, shape: CursorShape) {
        // The terminal pointer cannot change shape; remember it for logging
        if shape != self.cursor {
            debug!("Cursor shape: {:?}", shape);
            self.cursor = shape;
        }
    }

    fn show_cursor(&mut self, visible: bool) {
        let _ = if visible {
            execute!(io::stdout(), cursor::Show)
        } else {
            execute!(io::stdout(), cursor::Hide)
        };
    }
}

impl Clock for CrosstermPlatform {
    fn now_millis(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn delay_millis(&mut self, millis: u64) {
        std::thread::sleep(Duration::from_millis(millis));
    }
}

impl Drop for CrosstermPlatform {
    fn drop(&mut self) {
        self.cleanup();
    }
}
