//! MIDI output driver interface
//!
//! A driver owns the output device and the periodic timer that drives track
//! playback. Channels are handed out one at a time; channel 9 is the
//! percussion channel and is never returned by `allocate_channel`.

use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// MIDI channel reserved for percussion
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Called by the driver from its timer context
pub type TimerCallback = Box<dyn FnMut() + Send>;

/// A device voice owned by the music player
pub trait MidiChannel: Send {
    /// Device channel number (0-15)
    fn number(&self) -> u8;

    /// Send a packed short message (status | data1 << 8 | data2 << 16)
    fn send(&mut self, event: u32);

    /// Set the channel's live volume (0-127)
    fn volume(&mut self, level: u8) {
        let event = 0xB0 | self.number() as u32 | (0x07 << 8) | ((level as u32 & 0x7f) << 16);
        self.send(event);
    }
}

pub trait MidiDriver: Send {
    /// Acquire the device; `Err` carries the driver's status code
    fn open(&mut self) -> Result<(), i32>;

    fn close(&mut self);

    /// Register (or with `None`, remove) the periodic timer callback
    ///
    /// Once this returns with `None`, the previous callback is not running
    /// and will not run again.
    fn set_timer_callback(&mut self, callback: Option<TimerCallback>);

    /// Microseconds between timer callbacks
    fn base_tempo(&self) -> u32;

    fn allocate_channel(&mut self) -> Option<Box<dyn MidiChannel>>;

    fn percussion_channel(&mut self) -> Option<Box<dyn MidiChannel>>;
}

/// Bitmask of channels in use, shared between a driver and its channels
type ChannelMask = Arc<Mutex<u16>>;

struct LoggingChannel {
    number: u8,
    in_use: ChannelMask,
}

impl MidiChannel for LoggingChannel {
    fn number(&self) -> u8 {
        self.number
    }

    fn send(&mut self, event: u32) {
        trace!("[ch {:02}] {:06x}", self.number, event & 0x00ff_ffff);
    }
}

impl Drop for LoggingChannel {
    fn drop(&mut self) {
        *self.in_use.lock() &= !(1 << self.number);
    }
}

/// Driver with a real timer thread that logs every message at `trace`
///
/// Useful on hosts without a MIDI device and for watching what a track
/// sends.
pub struct LoggingDriver {
    timer_hz: u32,
    callback: Arc<Mutex<Option<TimerCallback>>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    in_use: ChannelMask,
}

impl LoggingDriver {
    pub fn new(timer_hz: u32) -> Self {
        Self {
            timer_hz: timer_hz.max(1),
            callback: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
            in_use: Arc::new(Mutex::new(0)),
        }
    }

    fn claim(&mut self, number: u8) -> Option<Box<dyn MidiChannel>> {
        let mut mask = self.in_use.lock();
        if *mask & (1 << number) != 0 {
            return None;
        }
        *mask |= 1 << number;
        Some(Box::new(LoggingChannel {
            number,
            in_use: Arc::clone(&self.in_use),
        }))
    }
}

impl MidiDriver for LoggingDriver {
    fn open(&mut self) -> Result<(), i32> {
        if self.thread.is_some() {
            return Err(4);
        }
        let period = Duration::from_micros(self.base_tempo() as u64);
        let callback = Arc::clone(&self.callback);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        debug!("LoggingDriver: starting {} Hz timer", self.timer_hz);
        self.thread = Some(std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                std::thread::sleep(period);
                if let Some(cb) = callback.lock().as_mut() {
                    cb();
                }
            }
        }));
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            debug!("LoggingDriver: timer stopped");
        }
    }

    fn set_timer_callback(&mut self, callback: Option<TimerCallback>) {
        // Taking the lock waits out a tick that is in progress
        *self.callback.lock() = callback;
    }

    fn base_tempo(&self) -> u32 {
        1_000_000 / self.timer_hz
    }

    fn allocate_channel(&mut self) -> Option<Box<dyn MidiChannel>> {
        (0..16u8)
            .filter(|&n| n != PERCUSSION_CHANNEL)
            .find_map(|n| self.claim(n))
    }

    fn percussion_channel(&mut self) -> Option<Box<dyn MidiChannel>> {
        self.claim(PERCUSSION_CHANNEL)
    }
}

impl Drop for LoggingDriver {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_channels_skip_percussion_and_are_released() {
        let mut driver = LoggingDriver::new(100);
        let channels: Vec<_> = (0..15).filter_map(|_| driver.allocate_channel()).collect();
        assert_eq!(channels.len(), 15);
        assert!(channels.iter().all(|c| c.number() != PERCUSSION_CHANNEL));
        assert!(driver.allocate_channel().is_none());

        let percussion = driver.percussion_channel().unwrap();
        assert_eq!(percussion.number(), PERCUSSION_CHANNEL);
        assert!(driver.percussion_channel().is_none());

        drop(channels);
        assert!(driver.allocate_channel().is_some());
    }

    #[test]
    fn test_timer_fires_until_unregistered() {
        let mut driver = LoggingDriver::new(1000);
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        driver.open().unwrap();
        driver.set_timer_callback(Some(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        std::thread::sleep(Duration::from_millis(50));
        driver.set_timer_callback(None);
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen > 0);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
        driver.close();
    }
}
