// Test doubles shared by the unit tests
use crate::error::{EngineError, Result};
use crate::image_decoder::{DecodedImage, ImageDecoder};
use crate::input::{MouseData, Shortcut};
use crate::midi_driver::{MidiChannel, MidiDriver, TimerCallback, PERCUSSION_CHANNEL};
use crate::midi_parser::{MidiSink, TrackParser, META_END_OF_TRACK};
use crate::platform_trait::KeyCode;
use crate::scheduler::{FrameContext, ScriptHost, SoundSystem};
use crate::surface::{Palette, PixelFormat, Surface};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Decodes `[width, height, index...]` into a CLUT8 surface
///
/// The palette maps 0 to black and 1 to white.
pub struct IndexedDecoder {
    palette: Palette,
    pub with_palette: bool,
}

impl IndexedDecoder {
    pub fn new() -> Self {
        let mut palette = Palette::new();
        palette.set(1, 255, 255, 255);
        Self {
            palette,
            with_palette: true,
        }
    }
}

impl ImageDecoder for IndexedDecoder {
    fn decode(&self, name: &str, bytes: &[u8]) -> Result<DecodedImage> {
        let bad = || EngineError::Decode {
            name: name.to_string(),
            message: "short image".to_string(),
        };
        if bytes.len() < 2 {
            return Err(bad());
        }
        let surface = Surface::from_pixels(
            bytes[0] as u16,
            bytes[1] as u16,
            PixelFormat::CLUT8,
            bytes[2..].to_vec(),
        )
        .ok_or_else(bad)?;
        Ok(DecodedImage {
            surface,
            palette: self.with_palette.then(|| self.palette.clone()),
        })
    }
}

/// Collects everything a parser emits
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<u32>,
    pub metas: Vec<u8>,
}

impl MidiSink for RecordingSink {
    fn send(&mut self, event: u32) {
        self.events.push(event);
    }

    fn meta_event(&mut self, kind: u8, _data: &[u8]) {
        self.metas.push(kind);
    }
}

/// Wrap one track's bytes in a format 0 Standard MIDI File
pub fn smf_format0(ppqn: u16, track: &[u8]) -> Vec<u8> {
    smf(0, ppqn, &[track])
}

/// Standard MIDI File with one MTrk chunk per entry of `tracks`
pub fn smf(format: u16, ppqn: u16, tracks: &[&[u8]]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"MThd");
    data.extend_from_slice(&6u32.to_be_bytes());
    data.extend_from_slice(&format.to_be_bytes());
    data.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    data.extend_from_slice(&ppqn.to_be_bytes());
    for track in tracks {
        data.extend_from_slice(b"MTrk");
        data.extend_from_slice(&(track.len() as u32).to_be_bytes());
        data.extend_from_slice(track);
    }
    data
}

/// What a `MockDriver` and its channels saw
#[derive(Debug, Default)]
pub struct DriverLog {
    /// (device channel, event)
    pub sends: Vec<(u8, u32)>,
    /// (device channel, level)
    pub volumes: Vec<(u8, u8)>,
    pub allocated: Vec<u8>,
    pub opened: bool,
    pub closed: bool,
}

pub struct MockChannel {
    number: u8,
    log: Arc<Mutex<DriverLog>>,
}

impl MidiChannel for MockChannel {
    fn number(&self) -> u8 {
        self.number
    }

    fn send(&mut self, event: u32) {
        self.log.lock().sends.push((self.number, event));
    }

    fn volume(&mut self, level: u8) {
        self.log.lock().volumes.push((self.number, level));
    }
}

/// Driver whose timer only fires when a test says so
pub struct MockDriver {
    pub log: Arc<Mutex<DriverLog>>,
    callback: Arc<Mutex<Option<TimerCallback>>>,
    open_status: Option<i32>,
    next_channel: u8,
}

/// Test-side handle onto a `MockDriver` that has been moved into a player
#[derive(Clone)]
pub struct MockDriverHandle {
    pub log: Arc<Mutex<DriverLog>>,
    callback: Arc<Mutex<Option<TimerCallback>>>,
}

impl MockDriverHandle {
    /// Run the registered timer callback once
    pub fn fire_timer(&self) {
        if let Some(cb) = self.callback.lock().as_mut() {
            cb();
        }
    }

    pub fn has_callback(&self) -> bool {
        self.callback.lock().is_some()
    }
}

impl MockDriver {
    pub fn new() -> (Self, MockDriverHandle) {
        let log = Arc::new(Mutex::new(DriverLog::default()));
        let callback = Arc::new(Mutex::new(None));
        let handle = MockDriverHandle {
            log: Arc::clone(&log),
            callback: Arc::clone(&callback),
        };
        (
            Self {
                log,
                callback,
                open_status: None,
                next_channel: 0,
            },
            handle,
        )
    }

    /// Make `open` fail with `status`
    pub fn failing(status: i32) -> Self {
        let (mut driver, _) = Self::new();
        driver.open_status = Some(status);
        driver
    }

    fn channel(&mut self, number: u8) -> Box<dyn MidiChannel> {
        self.log.lock().allocated.push(number);
        Box::new(MockChannel {
            number,
            log: Arc::clone(&self.log),
        })
    }
}

impl MidiDriver for MockDriver {
    fn open(&mut self) -> std::result::Result<(), i32> {
        if let Some(status) = self.open_status {
            return Err(status);
        }
        self.log.lock().opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().closed = true;
    }

    fn set_timer_callback(&mut self, callback: Option<TimerCallback>) {
        *self.callback.lock() = callback;
    }

    fn base_tempo(&self) -> u32 {
        10_000
    }

    fn allocate_channel(&mut self) -> Option<Box<dyn MidiChannel>> {
        if self.next_channel == PERCUSSION_CHANNEL {
            self.next_channel += 1;
        }
        if self.next_channel >= 16 {
            return None;
        }
        let number = self.next_channel;
        self.next_channel += 1;
        Some(self.channel(number))
    }

    fn percussion_channel(&mut self) -> Option<Box<dyn MidiChannel>> {
        Some(self.channel(PERCUSSION_CHANNEL))
    }
}

#[derive(Debug, Default)]
pub struct ParserLog {
    pub ticks: usize,
    pub unloaded: usize,
    pub jumps: Vec<u32>,
    pub timer_rate: Option<u32>,
    pub track: Option<usize>,
}

/// Parser that emits a fixed event list every tick
pub struct MockParser {
    pub log: Arc<Mutex<ParserLog>>,
    accept: bool,
    events: Vec<u32>,
    end_of_track: bool,
}

impl MockParser {
    pub fn new(log: Arc<Mutex<ParserLog>>) -> Self {
        Self {
            log,
            accept: true,
            events: Vec::new(),
            end_of_track: false,
        }
    }

    /// `load_music` fails
    pub fn rejecting(mut self) -> Self {
        self.accept = false;
        self
    }

    pub fn emitting(mut self, events: Vec<u32>) -> Self {
        self.events = events;
        self
    }

    /// Every tick ends with an End of Track meta event
    pub fn ending(mut self) -> Self {
        self.end_of_track = true;
        self
    }
}

impl TrackParser for MockParser {
    fn load_music(&mut self, data: &[u8]) -> bool {
        self.accept && !data.is_empty()
    }

    fn set_track(&mut self, track: usize) -> bool {
        self.log.lock().track = Some(track);
        true
    }

    fn unload_music(&mut self) {
        self.log.lock().unloaded += 1;
    }

    fn jump_to_tick(&mut self, tick: u32) -> bool {
        self.log.lock().jumps.push(tick);
        true
    }

    fn set_timer_rate(&mut self, micros: u32) {
        self.log.lock().timer_rate = Some(micros);
    }

    fn on_timer(&mut self, sink: &mut dyn MidiSink) {
        self.log.lock().ticks += 1;
        for &event in &self.events {
            sink.send(event);
        }
        if self.end_of_track {
            sink.meta_event(META_END_OF_TRACK, &[]);
        }
    }
}

#[derive(Debug, Default)]
pub struct SoundLog {
    pub updates: usize,
    pub stops: usize,
    pub plays: Vec<String>,
}

pub struct MockSound {
    pub log: Rc<RefCell<SoundLog>>,
    playing: bool,
}

impl MockSound {
    pub fn new() -> (Self, Rc<RefCell<SoundLog>>) {
        let log = Rc::new(RefCell::new(SoundLog::default()));
        (
            Self {
                log: Rc::clone(&log),
                playing: false,
            },
            log,
        )
    }
}

impl SoundSystem for MockSound {
    fn update(&mut self) {
        self.log.borrow_mut().updates += 1;
    }

    fn play_music(&mut self, resource: &str, _flags: u32) -> Result<()> {
        self.log.borrow_mut().plays.push(resource.to_string());
        self.playing = true;
        Ok(())
    }

    fn stop_music(&mut self) {
        self.log.borrow_mut().stops += 1;
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

/// Script host that records what each frame saw and acts on a plan
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub booted: bool,
    pub torn_down: bool,
    pub frames: usize,
    pub keys: Vec<KeyCode>,
    pub mouse: Vec<MouseData>,
    pub shortcuts: Vec<Shortcut>,
    pub pending_loads: usize,
    /// Opened by `boot`
    pub allow_input: bool,
    pub finish_after: Option<usize>,
    pub fail_on_frame: Option<usize>,
    pub wait_on_frame: Option<usize>,
    pub exit_on_frame: Option<usize>,
    pub load_on_frame: Option<usize>,
}

impl ScriptHost for RecordingHost {
    fn boot(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        self.booted = true;
        ctx.flags.allow_player_input = self.allow_input;
        Ok(())
    }

    fn handle_shortcut(&mut self, ctx: &mut FrameContext<'_>, shortcut: Shortcut) -> Result<()> {
        self.shortcuts.push(shortcut);
        if let Shortcut::Command(cmd) = shortcut {
            ctx.flags.player_command = Some(cmd);
        }
        Ok(())
    }

    fn execute_frame(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        self.frames += 1;
        let frame = Some(self.frames);
        if let Some(key) = ctx.key() {
            self.keys.push(key);
        }
        self.mouse.push(ctx.mouse_data());

        if frame == self.fail_on_frame {
            return Err(EngineError::Script(format!("frame {} failed", self.frames)));
        }
        if frame == self.wait_on_frame {
            ctx.flags.wait_for_player_click = true;
        }
        if frame == self.exit_on_frame {
            ctx.flags.exit_requested = true;
        }
        if frame == self.load_on_frame {
            ctx.flags.check_for_pending_data_load = true;
        }
        Ok(())
    }

    fn load_pending_data(&mut self, _ctx: &mut FrameContext<'_>) -> Result<()> {
        self.pending_loads += 1;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finish_after.map_or(false, |n| self.frames >= n)
    }

    fn teardown(&mut self) {
        self.torn_down = true;
    }
}
