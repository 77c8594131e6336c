//! Track parsers turn a sequenced-music byte stream into timed MIDI messages
//!
//! The parser does not hold a reference to its output. The music player
//! passes a `MidiSink` into every `on_timer` call, so the parser never
//! outlives or aliases the player's channel state.

use log::{debug, warn};

/// Meta event type signalling the end of a track
pub const META_END_OF_TRACK: u8 = 0x2f;
pub const META_TEMPO: u8 = 0x51;

/// Receiver for parser output
pub trait MidiSink {
    /// Packed short message: status | data1 << 8 | data2 << 16
    fn send(&mut self, event: u32);

    fn meta_event(&mut self, kind: u8, data: &[u8]);
}

pub trait TrackParser: Send {
    /// Parse `data`; false if the stream is unusable
    fn load_music(&mut self, data: &[u8]) -> bool;

    fn set_track(&mut self, track: usize) -> bool;

    fn unload_music(&mut self);

    fn jump_to_tick(&mut self, tick: u32) -> bool;

    /// Microseconds that pass between `on_timer` calls
    fn set_timer_rate(&mut self, micros: u32);

    /// Advance by one timer period, emitting everything that became due
    fn on_timer(&mut self, sink: &mut dyn MidiSink);
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TrackEvent {
    Short(u32),
    Meta(u8, Vec<u8>),
}

#[derive(Debug, Clone)]
struct TimedEvent {
    tick: u32,
    event: TrackEvent,
}

/// Byte reader over one chunk
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn byte(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let slice = self.data.get(self.pos..self.pos.checked_add(len)?)?;
        self.pos += len;
        Some(slice)
    }

    fn u16_be(&mut self) -> Option<u16> {
        let b = self.bytes(2)?;
        Some(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32_be(&mut self) -> Option<u32> {
        let b = self.bytes(4)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Variable-length quantity, at most four bytes
    fn vlq(&mut self) -> Option<u32> {
        let mut value = 0u32;
        for _ in 0..4 {
            let b = self.byte()?;
            value = (value << 7) | (b & 0x7f) as u32;
            if b & 0x80 == 0 {
                return Some(value);
            }
        }
        None
    }
}

fn data_bytes(status: u8) -> usize {
    match status & 0xf0 {
        0xc0 | 0xd0 => 1,
        _ => 2,
    }
}

fn parse_track(chunk: &[u8]) -> Option<Vec<TimedEvent>> {
    let mut reader = Reader::new(chunk);
    let mut events = Vec::new();
    let mut tick = 0u32;
    let mut running_status = 0u8;

    while !reader.at_end() {
        tick = tick.checked_add(reader.vlq()?)?;
        let mut status = reader.byte()?;

        match status {
            0xff => {
                let kind = reader.byte()?;
                let len = reader.vlq()? as usize;
                let data = reader.bytes(len)?.to_vec();
                let end = kind == META_END_OF_TRACK;
                events.push(TimedEvent {
                    tick,
                    event: TrackEvent::Meta(kind, data),
                });
                if end {
                    break;
                }
            }
            0xf0 | 0xf7 => {
                // SysEx is not forwarded
                let len = reader.vlq()? as usize;
                reader.bytes(len)?;
            }
            // System common and real-time messages have no place in a track
            0xf1..=0xfe => return None,
            _ => {
                let first = if status & 0x80 == 0 {
                    // Running status: this byte is already data
                    if running_status == 0 {
                        return None;
                    }
                    let data = status;
                    status = running_status;
                    data
                } else {
                    running_status = status;
                    reader.byte()?
                };
                let mut packed = status as u32 | ((first as u32 & 0x7f) << 8);
                if data_bytes(status) == 2 {
                    packed |= (reader.byte()? as u32 & 0x7f) << 16;
                }
                events.push(TimedEvent {
                    tick,
                    event: TrackEvent::Short(packed),
                });
            }
        }
    }

    let ended = matches!(
        events.last(),
        Some(TimedEvent { event: TrackEvent::Meta(META_END_OF_TRACK, _), .. })
    );
    if !ended {
        events.push(TimedEvent {
            tick,
            event: TrackEvent::Meta(META_END_OF_TRACK, Vec::new()),
        });
    }
    Some(events)
}

/// Standard MIDI File (format 0, 1 or 2) parser
///
/// Format 1 files are merged into a single track at load time; format 2
/// files expose each track separately through `set_track`.
#[derive(Debug)]
pub struct SmfParser {
    tracks: Vec<Vec<TimedEvent>>,
    ppqn: u32,
    timer_rate: u32,
    active: Option<usize>,
    next_event: usize,
    /// Microseconds per quarter note
    tempo: u32,
    position_us: u64,
    last_event_tick: u32,
    last_event_us: u64,
}

impl SmfParser {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            ppqn: 96,
            timer_rate: 1_000_000 / 120,
            active: None,
            next_event: 0,
            tempo: 500_000,
            position_us: 0,
            last_event_tick: 0,
            last_event_us: 0,
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Tick of the next pending event on the active track
    pub fn next_tick(&self) -> Option<u32> {
        let track = self.tracks.get(self.active?)?;
        track.get(self.next_event).map(|e| e.tick)
    }

    fn rewind(&mut self) {
        self.next_event = 0;
        self.tempo = 500_000;
        self.position_us = 0;
        self.last_event_tick = 0;
        self.last_event_us = 0;
    }

    fn event_time_us(&self, tick: u32) -> u64 {
        let delta = (tick - self.last_event_tick) as u64;
        self.last_event_us + delta * self.tempo as u64 / self.ppqn as u64
    }

    fn apply_tempo(&mut self, event: &TrackEvent) {
        if let TrackEvent::Meta(META_TEMPO, data) = event {
            if data.len() == 3 {
                self.tempo = u32::from_be_bytes([0, data[0], data[1], data[2]]).max(1);
            }
        }
    }
}

impl Default for SmfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackParser for SmfParser {
    fn load_music(&mut self, data: &[u8]) -> bool {
        self.unload_music();
        let mut reader = Reader::new(data);

        if reader.bytes(4) != Some(b"MThd") {
            warn!("Not a standard MIDI file");
            return false;
        }
        let header_len = match reader.u32_be() {
            Some(len) if len >= 6 => len as usize,
            _ => return false,
        };
        let (format, count, division) = match (reader.u16_be(), reader.u16_be(), reader.u16_be()) {
            (Some(f), Some(c), Some(d)) => (f, c, d),
            _ => return false,
        };
        if reader.bytes(header_len - 6).is_none() {
            return false;
        }
        if division & 0x8000 != 0 || division == 0 {
            warn!("SMPTE time division is not supported");
            return false;
        }

        let mut tracks = Vec::new();
        while tracks.len() < count as usize && !reader.at_end() {
            let (id, len) = match (reader.bytes(4), reader.u32_be()) {
                (Some(id), Some(len)) => (id, len as usize),
                _ => return false,
            };
            let chunk = match reader.bytes(len) {
                Some(chunk) => chunk,
                None => return false,
            };
            if id != b"MTrk" {
                continue;
            }
            match parse_track(chunk) {
                Some(events) => tracks.push(events),
                None => {
                    warn!("Malformed track {}", tracks.len());
                    return false;
                }
            }
        }
        if tracks.is_empty() {
            return false;
        }

        if format == 1 && tracks.len() > 1 {
            let end = tracks
                .iter()
                .filter_map(|t| t.last().map(|e| e.tick))
                .max()
                .unwrap_or(0);
            let mut merged: Vec<TimedEvent> = tracks
                .into_iter()
                .flatten()
                .filter(|e| !matches!(e.event, TrackEvent::Meta(META_END_OF_TRACK, _)))
                .collect();
            // Stable sort keeps per-track order at equal ticks
            merged.sort_by_key(|e| e.tick);
            merged.push(TimedEvent {
                tick: end,
                event: TrackEvent::Meta(META_END_OF_TRACK, Vec::new()),
            });
            tracks = vec![merged];
        }

        debug!(
            "Loaded MIDI file: format {}, {} track(s), {} ppqn",
            format,
            tracks.len(),
            division
        );
        self.tracks = tracks;
        self.ppqn = division as u32;
        true
    }

    fn set_track(&mut self, track: usize) -> bool {
        if track >= self.tracks.len() {
            return false;
        }
        self.active = Some(track);
        self.rewind();
        true
    }

    fn unload_music(&mut self) {
        self.tracks.clear();
        self.active = None;
        self.rewind();
    }

    fn jump_to_tick(&mut self, tick: u32) -> bool {
        let Some(active) = self.active else {
            return false;
        };
        self.rewind();
        // Replay tempo changes up to the target without sounding notes
        let events: Vec<TrackEvent> = self.tracks[active]
            .iter()
            .take_while(|e| e.tick < tick)
            .map(|e| e.event.clone())
            .collect();
        for (i, event) in events.iter().enumerate() {
            let at = self.tracks[active][i].tick;
            self.last_event_us = self.event_time_us(at);
            self.last_event_tick = at;
            self.apply_tempo(event);
        }
        self.next_event = events.len();
        self.last_event_us = self.event_time_us(tick);
        self.last_event_tick = tick;
        self.position_us = self.last_event_us;
        true
    }

    fn set_timer_rate(&mut self, micros: u32) {
        self.timer_rate = micros.max(1);
    }

    fn on_timer(&mut self, sink: &mut dyn MidiSink) {
        let Some(active) = self.active else {
            return;
        };
        self.position_us += self.timer_rate as u64;

        while let Some(timed) = self.tracks.get(active).and_then(|t| t.get(self.next_event)) {
            let due = self.event_time_us(timed.tick);
            if due > self.position_us {
                break;
            }
            let tick = timed.tick;
            let event = timed.event.clone();
            self.next_event += 1;
            self.last_event_tick = tick;
            self.last_event_us = due;
            self.apply_tempo(&event);

            match event {
                TrackEvent::Short(packed) => sink.send(packed),
                TrackEvent::Meta(kind, data) => {
                    sink.meta_event(kind, &data);
                    // The sink may have rewound or unloaded us
                    if kind == META_END_OF_TRACK {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{smf, smf_format0, RecordingSink};

    #[test]
    fn test_rejects_non_midi() {
        let mut parser = SmfParser::new();
        assert!(!parser.load_music(b"FORM....XDIR"));
        assert_eq!(parser.track_count(), 0);
    }

    #[test]
    fn test_plays_events_in_time() {
        // 96 ppqn at 500000 us/qn: one tick = 5208 us
        let track = [
            0x00, 0x90, 0x3c, 0x40, // note on at 0
            0x60, 0x3c, 0x00, // running status note on (vel 0) at 96
            0x00, 0xff, 0x2f, 0x00,
        ];
        let mut parser = SmfParser::new();
        assert!(parser.load_music(&smf_format0(96, &track)));
        assert!(parser.set_track(0));
        parser.set_timer_rate(250_000);

        let mut sink = RecordingSink::default();
        parser.on_timer(&mut sink);
        assert_eq!(sink.events, vec![0x40_3c90]);

        parser.on_timer(&mut sink);
        assert_eq!(sink.events, vec![0x40_3c90, 0x00_3c90]);
        assert_eq!(sink.metas, vec![META_END_OF_TRACK]);
    }

    #[test]
    fn test_jump_to_tick_zero_restarts() {
        let track = [0x00, 0xc0, 0x05, 0x00, 0xff, 0x2f, 0x00];
        let mut parser = SmfParser::new();
        assert!(parser.load_music(&smf_format0(96, &track)));
        parser.set_track(0);

        let mut sink = RecordingSink::default();
        parser.on_timer(&mut sink);
        assert_eq!(parser.next_tick(), None);
        assert!(parser.jump_to_tick(0));
        assert_eq!(parser.next_tick(), Some(0));
        parser.on_timer(&mut sink);
        assert_eq!(sink.events, vec![0x05c0, 0x05c0]);
    }

    #[test]
    fn test_truncated_track_fails() {
        let track = [0x00, 0x90, 0x3c];
        let mut parser = SmfParser::new();
        assert!(!parser.load_music(&smf_format0(96, &track)));
    }

    #[test]
    fn test_track_without_end_marker_still_ends() {
        let track = [0x00, 0x90, 0x3c, 0x40];
        let mut parser = SmfParser::new();
        assert!(parser.load_music(&smf_format0(96, &track)));
        parser.set_track(0);

        let mut sink = RecordingSink::default();
        parser.on_timer(&mut sink);
        assert_eq!(sink.events, vec![0x40_3c90]);
        assert_eq!(sink.metas, vec![META_END_OF_TRACK]);
    }

    #[test]
    fn test_system_common_status_rejects_track() {
        for status in [0xf1, 0xf2, 0xf8, 0xfe] {
            let track = [0x00, 0x90, 0x3c, 0x40, 0x00, status, 0x00, 0xff, 0x2f, 0x00];
            let mut parser = SmfParser::new();
            assert!(!parser.load_music(&smf_format0(96, &track)), "status {:#x}", status);
        }
    }

    #[test]
    fn test_sysex_is_skipped() {
        let track = [0x00, 0xf0, 0x02, 0x7e, 0xf7, 0x00, 0xc0, 0x05, 0x00, 0xff, 0x2f, 0x00];
        let mut parser = SmfParser::new();
        assert!(parser.load_music(&smf_format0(96, &track)));
        parser.set_track(0);

        let mut sink = RecordingSink::default();
        parser.on_timer(&mut sink);
        assert_eq!(sink.events, vec![0x05c0]);
    }

    #[test]
    fn test_format1_tracks_merge_in_tick_order() {
        // 96 ppqn at 500000 us/qn: tick 96 = 500000 us, tick 176 = 916666 us
        let first: &[u8] = &[
            0x00, 0xc0, 0x01, // tick 0
            0x60, 0xc0, 0x02, // tick 96
            0x00, 0xff, 0x2f, 0x00,
        ];
        let second: &[u8] = &[
            0x00, 0xc1, 0x03, // tick 0
            0x30, 0xc1, 0x04, // tick 48
            0x81, 0x00, 0xff, 0x2f, 0x00, // end at tick 176
        ];
        let mut parser = SmfParser::new();
        assert!(parser.load_music(&smf(1, 96, &[first, second])));
        assert_eq!(parser.track_count(), 1);
        assert!(parser.set_track(0));
        parser.set_timer_rate(600_000);

        let mut sink = RecordingSink::default();
        parser.on_timer(&mut sink);
        assert_eq!(sink.events, vec![0x01c0, 0x03c1, 0x04c1, 0x02c0]);
        assert!(sink.metas.is_empty());
        // One end marker, at the end of the longest track
        assert_eq!(parser.next_tick(), Some(176));

        parser.on_timer(&mut sink);
        assert_eq!(sink.metas, vec![META_END_OF_TRACK]);
        assert_eq!(parser.next_tick(), None);
    }

    #[test]
    fn test_format2_tracks_stay_separate() {
        let first: &[u8] = &[0x00, 0xc0, 0x01, 0x00, 0xff, 0x2f, 0x00];
        let second: &[u8] = &[0x00, 0xc1, 0x02];
        let mut parser = SmfParser::new();
        assert!(parser.load_music(&smf(2, 96, &[first, second])));
        assert_eq!(parser.track_count(), 2);
        assert!(!parser.set_track(2));
        assert!(parser.set_track(1));

        let mut sink = RecordingSink::default();
        parser.on_timer(&mut sink);
        assert_eq!(sink.events, vec![0x02c1]);
        assert_eq!(sink.metas, vec![META_END_OF_TRACK]);
    }

    #[test]
    fn test_jump_to_tick_replays_tempo() {
        // Tempo 250000 us/qn at 96 ppqn: tick 96 = 250000 us, tick 192 = 500000 us
        let track = [
            0x00, 0xff, 0x51, 0x03, 0x03, 0xd0, 0x90, // tick 0
            0x60, 0x90, 0x3c, 0x40, // tick 96
            0x60, 0x80, 0x3c, 0x00, // tick 192
            0x00, 0xff, 0x2f, 0x00,
        ];
        let mut parser = SmfParser::new();
        assert!(parser.load_music(&smf_format0(96, &track)));
        parser.set_track(0);

        assert!(parser.jump_to_tick(96));
        assert_eq!(parser.next_tick(), Some(96));
        parser.set_timer_rate(250_000);

        // At the default tempo tick 192 would still be 500000 us away
        let mut sink = RecordingSink::default();
        parser.on_timer(&mut sink);
        assert_eq!(sink.events, vec![0x40_3c90, 0x00_3c80]);
        assert_eq!(sink.metas, vec![META_END_OF_TRACK]);
    }
}
