//! Platform manager that creates the appropriate host backend
//!
//! This module is responsible for:
//! - Detecting whether an interactive terminal is available
//! - Falling back from the terminal backend to headless
//! - Wrapping the chosen backend with logging on request

use crate::config::DisplayConfig;
use crate::platform_crossterm::CrosstermPlatform;
use crate::platform_headless::HeadlessPlatform;
use crate::platform_logging::LoggingPlatform;
use crate::platform_trait::{Platform, PlatformError};
use crate::surface::PixelFormat;
use log::debug;

/// Platform mode selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformMode {
    /// Try the terminal, fall back to headless
    #[default]
    Auto,
    /// Force the terminal backend (fail if not available)
    Terminal,
    /// No host output (for testing/CI)
    Headless,
}

impl PlatformMode {
    /// Parse a mode name; unknown names select `Auto`
    pub fn from_name(name: &str) -> Self {
        match name {
            "terminal" => PlatformMode::Terminal,
            "headless" => PlatformMode::Headless,
            _ => PlatformMode::Auto,
        }
    }
}

/// Host environment capabilities
#[derive(Debug)]
pub struct PlatformCapabilities {
    pub has_terminal: bool,
    pub is_interactive: bool,
}

impl PlatformCapabilities {
    /// Detect current environment capabilities
    pub fn detect() -> Self {
        Self {
            has_terminal: atty::is(atty::Stream::Stdout),
            is_interactive: atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout),
        }
    }

    pub fn supports_terminal(&self) -> bool {
        self.has_terminal && self.is_interactive
    }
}

/// Pixel format for a configured depth; anything but 4 bytes selects RGB565
pub fn screen_format(bytes_per_pixel: u8) -> PixelFormat {
    match bytes_per_pixel {
        4 => PixelFormat::ARGB8888,
        _ => PixelFormat::RGB565,
    }
}

/// Create a platform implementation for the given mode
pub fn create_platform(
    mode: PlatformMode,
    display: &DisplayConfig,
) -> Result<Box<dyn Platform>, PlatformError> {
    let caps = PlatformCapabilities::detect();
    let format = screen_format(display.bytes_per_pixel);
    let (width, height) = (display.width.max(1), display.height.max(1));
    debug!("Platform capabilities: {:?}", caps);
    debug!("Creating platform with mode {:?}", mode);

    let platform: Box<dyn Platform> = match mode {
        PlatformMode::Auto => {
            if caps.supports_terminal() {
                match CrosstermPlatform::new(width, height, format) {
                    Ok(p) => {
                        debug!("Using crossterm platform");
                        Box::new(p)
                    }
                    Err(e) => {
                        debug!("Terminal failed ({}), falling back to headless", e);
                        Box::new(HeadlessPlatform::new(width, height, format).quit_when_exhausted())
                    }
                }
            } else {
                debug!("No interactive terminal, using headless");
                Box::new(HeadlessPlatform::new(width, height, format).quit_when_exhausted())
            }
        }

        PlatformMode::Terminal => {
            if !caps.supports_terminal() {
                return Err(PlatformError::new("Terminal mode requires an interactive terminal"));
            }
            Box::new(CrosstermPlatform::new(width, height, format)?)
        }

        PlatformMode::Headless => {
            debug!("Using headless platform");
            Box::new(HeadlessPlatform::new(width, height, format).quit_when_exhausted())
        }
    };

    // Check if we should wrap with logging
    if std::env::var("PLATFORM_LOG").is_ok() {
        debug!("Wrapping platform with logging");
        return Ok(Box::new(LoggingPlatform::new(platform)));
    }

    Ok(platform)
}
