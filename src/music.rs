//! Music playback
//!
//! `MusicPlayer` sits between a track parser and a MIDI driver. The driver's
//! timer fires on its own thread while the game thread starts, stops and
//! re-levels playback, so every piece of shared state lives behind one
//! mutex. The timer callback only holds a weak reference to it.
//!
//! `Music` is the resource-level front end the engines call: it loads a
//! track by name, builds a parser for it and hands it to the player.

use crate::config::MusicConfig;
use crate::error::{EngineError, Result};
use crate::instrument_map::mt32_to_gm;
use crate::midi_driver::{MidiChannel, MidiDriver, PERCUSSION_CHANNEL};
use crate::midi_parser::{MidiSink, TrackParser, META_END_OF_TRACK};
use crate::resource::ResourceLoader;
use crate::scheduler::SoundSystem;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Loop the track instead of stopping at its end
pub const MUSIC_LOOP: u32 = 0x0001;

const CHANNEL_COUNT: usize = 16;
const DEFAULT_CHANNEL_VOLUME: u8 = 127;

/// Lifecycle of the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Closed,
    Opened,
    Playing,
    Stopped,
}

/// Channel bookkeeping and the driver; the parser's output lands here
struct ChannelRouter {
    driver: Option<Box<dyn MidiDriver>>,
    channels: [Option<Box<dyn MidiChannel>>; CHANNEL_COUNT],
    /// Last raw volume per channel, before master scaling
    channel_volume: [u8; CHANNEL_COUNT],
    master_volume: u8,
    native_mt32: bool,
    end_of_track: bool,
}

impl ChannelRouter {
    fn new(driver: Option<Box<dyn MidiDriver>>) -> Self {
        Self {
            driver,
            channels: Default::default(),
            channel_volume: [DEFAULT_CHANNEL_VOLUME; CHANNEL_COUNT],
            master_volume: 255,
            native_mt32: false,
            end_of_track: false,
        }
    }

    fn scaled(&self, raw: u8) -> u8 {
        (raw as u32 * self.master_volume as u32 / 255) as u8
    }

    fn dispatch(&mut self, event: u32) {
        let channel = (event & 0x0f) as usize;
        let mut event = event;

        if event & 0xfff0 == 0x07b0 {
            // Volume controller: remember the raw level, forward it scaled
            let volume = ((event >> 16) & 0x7f) as u8;
            self.channel_volume[channel] = volume;
            event = (event & 0xff00_ffff) | ((self.scaled(volume) as u32) << 16);
        } else if event & 0xf0 == 0xc0 && !self.native_mt32 {
            let program = ((event >> 8) & 0xff) as u8;
            event = (event & 0xffff_00ff) | ((mt32_to_gm(program) as u32) << 8);
        } else if event & 0xfff0 == 0x7bb0 && self.channels[channel].is_none() {
            // All Notes Off on a channel we never allocated
            return;
        }

        if self.channels[channel].is_none() {
            if let Some(driver) = self.driver.as_mut() {
                self.channels[channel] = if channel == PERCUSSION_CHANNEL as usize {
                    driver.percussion_channel()
                } else {
                    driver.allocate_channel()
                };
            }
        }

        if let Some(device) = self.channels[channel].as_mut() {
            device.send(event);
        }
    }

    fn set_master_volume(&mut self, volume: u8) {
        self.master_volume = volume;
        for i in 0..CHANNEL_COUNT {
            let level = self.scaled(self.channel_volume[i]);
            if let Some(device) = self.channels[i].as_mut() {
                device.volume(level);
            }
        }
    }

    /// Silence and hand back every device channel
    fn release_channels(&mut self) {
        for (i, slot) in self.channels.iter_mut().enumerate() {
            if let Some(mut device) = slot.take() {
                device.send(0x7bb0 | i as u32);
            }
        }
    }
}

impl MidiSink for ChannelRouter {
    fn send(&mut self, event: u32) {
        self.dispatch(event);
    }

    fn meta_event(&mut self, kind: u8, _data: &[u8]) {
        // End of Track is the only meta event the player reacts to
        if kind == META_END_OF_TRACK {
            self.end_of_track = true;
        }
    }
}

struct PlayerState {
    router: ChannelRouter,
    parser: Option<Box<dyn TrackParser>>,
    is_playing: bool,
    is_open: bool,
    has_played: bool,
    looping: bool,
}

impl PlayerState {
    fn on_timer(&mut self) {
        if !self.is_playing {
            return;
        }
        if let Some(parser) = self.parser.as_mut() {
            parser.on_timer(&mut self.router);
        }
        if std::mem::take(&mut self.router.end_of_track) {
            self.end_of_track();
        }
    }

    fn end_of_track(&mut self) {
        if self.looping {
            if let Some(parser) = self.parser.as_mut() {
                parser.jump_to_tick(0);
            }
        } else {
            self.stop();
        }
    }

    fn stop(&mut self) {
        self.is_playing = false;
        if let Some(mut parser) = self.parser.take() {
            parser.unload_music();
        }
        self.router.release_channels();
    }
}

/// Channel-multiplexing MIDI player driven by the driver's timer
pub struct MusicPlayer {
    state: Arc<Mutex<PlayerState>>,
}

impl MusicPlayer {
    pub fn new(driver: Option<Box<dyn MidiDriver>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PlayerState {
                router: ChannelRouter::new(driver),
                parser: None,
                is_playing: false,
                is_open: false,
                has_played: false,
                looping: false,
            })),
        }
    }

    /// Open the driver and register the timer callback
    ///
    /// Opening an already open player does nothing.
    pub fn open(&mut self) -> Result<()> {
        let mut driver = {
            let mut state = self.state.lock();
            if state.is_open {
                return Ok(());
            }
            state.router.driver.take().ok_or(EngineError::NoDriver)?
        };

        // Same lock order as close(): a running tick holds the callback
        // lock and then takes the state lock
        if let Err(code) = driver.open() {
            self.state.lock().router.driver = Some(driver);
            return Err(EngineError::DeviceOpen(code));
        }
        let weak: Weak<Mutex<PlayerState>> = Arc::downgrade(&self.state);
        driver.set_timer_callback(Some(Box::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().on_timer();
            }
        })));

        let mut state = self.state.lock();
        state.router.driver = Some(driver);
        state.is_open = true;
        debug!("MusicPlayer: driver opened");
        Ok(())
    }

    /// Stop, unregister the timer and release the driver
    pub fn close(&mut self) {
        self.stop_music();
        let driver = {
            let mut state = self.state.lock();
            state.is_open = false;
            state.router.driver.take()
        };
        // The state lock must be free here: unregistering waits for an
        // in-flight tick, and that tick takes the lock
        if let Some(mut driver) = driver {
            driver.set_timer_callback(None);
            driver.close();
            debug!("MusicPlayer: driver closed");
        }
    }

    /// Attach `parser` and start playing it
    pub fn play_music(&self, mut parser: Box<dyn TrackParser>) {
        let mut state = self.state.lock();
        if let Some(rate) = state.router.driver.as_ref().map(|d| d.base_tempo()) {
            parser.set_timer_rate(rate);
        }
        if let Some(mut previous) = state.parser.replace(parser) {
            previous.unload_music();
        }
        state.is_playing = true;
        state.has_played = true;
    }

    pub fn stop_music(&self) {
        self.state.lock().stop();
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().is_playing
    }

    pub fn state(&self) -> PlaybackState {
        let state = self.state.lock();
        if state.is_playing {
            PlaybackState::Playing
        } else if !state.is_open {
            PlaybackState::Closed
        } else if state.has_played {
            PlaybackState::Stopped
        } else {
            PlaybackState::Opened
        }
    }

    /// Set the master volume, clamped to 0..=255, and re-level live channels
    pub fn set_volume(&self, volume: i32) {
        let volume = volume.clamp(0, 255) as u8;
        let mut state = self.state.lock();
        if state.router.master_volume == volume {
            return;
        }
        state.router.set_master_volume(volume);
    }

    pub fn volume(&self) -> u8 {
        self.state.lock().router.master_volume
    }

    pub fn set_looping(&self, looping: bool) {
        self.state.lock().looping = looping;
    }

    /// The device understands MT-32 program numbers natively
    pub fn set_native_mt32(&self, native: bool) {
        self.state.lock().router.native_mt32 = native;
    }

    /// Route one packed MIDI message to its device channel
    pub fn dispatch_event(&self, event: u32) {
        self.state.lock().router.dispatch(event);
    }

    /// Timer entry point; advances the parser by one tick while playing
    pub fn on_timer_tick(&self) {
        self.state.lock().on_timer();
    }

    /// React to the parser reaching the end of its track
    pub fn on_end_of_track(&self) {
        self.state.lock().end_of_track();
    }
}

impl Drop for MusicPlayer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builds a fresh parser for each track
pub type ParserFactory = Box<dyn Fn() -> Box<dyn TrackParser>>;

/// Resource-level music front end
pub struct Music {
    player: MusicPlayer,
    loader: Box<dyn ResourceLoader>,
    parser_factory: ParserFactory,
    enabled: bool,
    /// Loop every track, whatever the play flags say
    always_loop: bool,
    initialized: bool,
}

impl Music {
    /// Create the player and open `driver`
    pub fn new(
        driver: Option<Box<dyn MidiDriver>>,
        loader: Box<dyn ResourceLoader>,
        parser_factory: ParserFactory,
        config: &MusicConfig,
    ) -> Result<Self> {
        let mut player = MusicPlayer::new(driver);
        player.open()?;
        player.set_native_mt32(config.native_mt32);
        player.set_volume(config.master_volume);
        Ok(Self {
            player,
            loader,
            parser_factory,
            enabled: config.enabled,
            always_loop: config.looping,
            initialized: true,
        })
    }

    pub fn player(&self) -> &MusicPlayer {
        &self.player
    }

    fn check_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(EngineError::NoDriver)
        }
    }

    /// Load `resource` and play it; `MUSIC_LOOP` in `flags` loops it
    ///
    /// A track the parser rejects is logged and skipped.
    pub fn play(&mut self, resource: &str, flags: u32) -> Result<()> {
        self.check_initialized()?;
        if !self.enabled {
            return Ok(());
        }

        let data = self.loader.load(resource)?;
        let mut parser = (self.parser_factory)();
        if !parser.load_music(&data) {
            warn!("Error reading track {}", resource);
            return Ok(());
        }

        info!("Music::play({}, {:#x})", resource, flags);
        parser.set_track(0);
        self.player
            .set_looping(self.always_loop || flags & MUSIC_LOOP != 0);
        self.player.play_music(parser);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.check_initialized()
    }

    pub fn resume(&mut self) -> Result<()> {
        self.check_initialized()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.check_initialized()?;
        self.player.stop_music();
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    /// Close the driver; later calls fail until a new `Music` is built
    pub fn shutdown(&mut self) {
        self.player.close();
        self.initialized = false;
    }
}

impl SoundSystem for Music {
    // Playback advances on the driver timer, so there is nothing to pump

    fn play_music(&mut self, resource: &str, flags: u32) -> Result<()> {
        self.play(resource, flags)
    }

    fn stop_music(&mut self) {
        if let Err(e) = self.stop() {
            debug!("Music::stop ignored: {}", e);
        }
    }

    fn is_playing(&self) -> bool {
        Music::is_playing(self)
    }
}
