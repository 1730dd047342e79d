//! Frame codec
//!
//! Serializes the three logical signals into frames under a [`BusLayout`]
//! and reads them back. Encoding writes the field, leaves padding zero and
//! hands the rest of the payload to the [`Obfuscator`]. Decoding reads only
//! the field bytes and ignores everything else.
//!
//! Speed travels as a big-endian u16 of hundredths of km/h. A speed that
//! rounds to zero is sent as idle jitter instead: a `1` sentinel followed by
//! a noise byte, so idle never looks like a clean zero on the bus.

use crate::config::DifficultyLevel;
use crate::layout::{BusLayout, SignalLayout};
use crate::obfuscator::Obfuscator;
use crate::types::{DoorState, Frame, SignalKind, TurnSignalState, FRAME_CAPACITY, KPH_TO_MPH};
use byteorder::{BigEndian, ByteOrder};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Sentinel high byte written for idle speed
pub const IDLE_SENTINEL: u8 = 1;

/// Range the idle noise value is drawn from before truncation to a byte
const IDLE_NOISE_MIN: u16 = 100;
const IDLE_NOISE_MAX: u16 = 354;

/// Encoder/decoder for one process's bus layout
#[derive(Debug, Clone)]
pub struct FrameCodec {
    layout: BusLayout,
    obfuscator: Obfuscator,
    jitter: ChaCha8Rng,
}

impl FrameCodec {
    /// Codec for `layout` with entropy-seeded noise
    pub fn new(layout: BusLayout, difficulty: DifficultyLevel) -> Self {
        Self {
            layout,
            obfuscator: Obfuscator::new(difficulty),
            jitter: ChaCha8Rng::from_entropy(),
        }
    }

    /// Codec with a reproducible noise stream
    pub fn with_noise_seed(layout: BusLayout, difficulty: DifficultyLevel, seed: u64) -> Self {
        Self {
            layout,
            obfuscator: Obfuscator::with_seed(difficulty, seed),
            jitter: ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
        }
    }

    pub fn layout(&self) -> &BusLayout {
        &self.layout
    }

    /// Encode the door lock bitmask
    pub fn encode_door(&mut self, doors: DoorState) -> Frame {
        let layout = self.layout.door;
        self.encode_with(&layout, SignalKind::Door, |field| field[0] = doors.mask())
    }

    /// Encode the turn indicator bitmask
    pub fn encode_turn_signal(&mut self, turn: TurnSignalState) -> Frame {
        let layout = self.layout.turn;
        self.encode_with(&layout, SignalKind::TurnSignal, |field| field[0] = turn.mask())
    }

    /// Encode a speed given in km/h
    pub fn encode_speed(&mut self, kph: f64) -> Frame {
        let hundredths = Self::to_hundredths(kph);
        let layout = self.layout.speed;
        let idle_noise = if hundredths == 0 {
            // Truncation to a byte is part of the wire format
            Some(self.jitter.gen_range(IDLE_NOISE_MIN..=IDLE_NOISE_MAX) as u8)
        } else {
            None
        };

        self.encode_with(&layout, SignalKind::Speed, |field| match idle_noise {
            Some(noise) => {
                field[0] = IDLE_SENTINEL;
                field[1] = noise;
            }
            None => BigEndian::write_u16(&mut field[..2], hundredths),
        })
    }

    /// Encode a speed given in mph (the control panel's internal unit)
    pub fn encode_speed_mph(&mut self, mph: f64) -> Frame {
        self.encode_speed(mph / KPH_TO_MPH)
    }

    /// Shared encode path: zeroed buffer, field write, obfuscation
    fn encode_with<F>(&mut self, layout: &SignalLayout, kind: SignalKind, write_field: F) -> Frame
    where
        F: FnOnce(&mut [u8]),
    {
        let mut frame = Frame::new(layout.id, layout.length);
        let start = layout.offset as usize;
        let end = start + kind.min_width() as usize;

        // Fields that do not fit the payload are never written
        if end <= FRAME_CAPACITY {
            write_field(&mut frame.data[start..end]);
        }

        self.obfuscator
            .obfuscate(&mut frame.data, layout.protected_range(kind));

        log::trace!("Encoded {} frame: {}", kind, frame);
        frame
    }

    /// km/h -> wire hundredths, saturating at both ends
    fn to_hundredths(kph: f64) -> u16 {
        let hundredths = kph * 100.0;
        if hundredths.is_nan() || hundredths <= 0.0 {
            0
        } else if hundredths >= u16::MAX as f64 {
            u16::MAX
        } else {
            hundredths as u16
        }
    }

    /// Decode the door bitmask; `None` if the frame is too short
    pub fn decode_door(frame: &Frame, layout: &SignalLayout) -> Option<DoorState> {
        Self::field(frame, layout, SignalKind::Door).map(|field| DoorState::from_mask(field[0]))
    }

    /// Decode the turn indicator bitmask; `None` if the frame is too short
    pub fn decode_turn_signal(frame: &Frame, layout: &SignalLayout) -> Option<TurnSignalState> {
        Self::field(frame, layout, SignalKind::TurnSignal)
            .map(|field| TurnSignalState::from_mask(field[0]))
    }

    /// Decode speed in km/h; `None` if the frame is too short
    ///
    /// Idle jitter is not special-cased and reads as a low nonzero speed.
    pub fn decode_speed_kph(frame: &Frame, layout: &SignalLayout) -> Option<f64> {
        Self::field(frame, layout, SignalKind::Speed)
            .map(|field| BigEndian::read_u16(field) as f64 / 100.0)
    }

    /// Decode speed converted to mph
    pub fn decode_speed_mph(frame: &Frame, layout: &SignalLayout) -> Option<f64> {
        Self::decode_speed_kph(frame, layout).map(|kph| kph * KPH_TO_MPH)
    }

    /// Field bytes of `kind`, provided the declared length covers them
    fn field<'a>(frame: &'a Frame, layout: &SignalLayout, kind: SignalKind) -> Option<&'a [u8]> {
        let start = layout.offset as usize;
        let end = start + kind.min_width() as usize;
        if (frame.len as usize) < end || end > FRAME_CAPACITY {
            return None;
        }
        Some(&frame.data[start..end])
    }
}
