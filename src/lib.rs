//! Shared runtime for point-and-click adventure engines
//!
//! The frame scheduler drives a script host on top of a host platform,
//! with a bounded image cache for pictures and a timer-driven MIDI player
//! for music.

pub mod config;
pub mod error;
pub mod graphics;
pub mod image_cache;
pub mod image_decoder;
pub mod input;
pub mod instrument_map;
pub mod midi_driver;
pub mod midi_parser;
pub mod music;
pub mod platform_crossterm;
pub mod platform_headless;
pub mod platform_logging;
pub mod platform_manager;
pub mod platform_trait;
pub mod resource;
pub mod scheduler;
pub mod slideshow;
pub mod surface;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod image_cache_tests;
