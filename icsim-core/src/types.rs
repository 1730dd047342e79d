//! Core types for the instrument cluster simulator
//!
//! This module defines the bus frame, the three logical signal values that
//! travel inside frames, and the error type shared by the whole library.

use std::fmt;

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Payload capacity of a classic CAN frame in bytes
pub const FRAME_CAPACITY: usize = 8;

/// Fixed km/h -> mph conversion factor used on the cluster side
pub const KPH_TO_MPH: f64 = 0.6213751;

/// Raw bus frame as exchanged over a [`Transport`](crate::transport::Transport)
///
/// The payload buffer is always fully sized; bytes beyond `len` are not
/// meaningful and are not transmitted by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Bus identifier (11-bit range for simulator traffic)
    pub id: u32,
    /// Declared data length (0..=8)
    pub len: u8,
    /// Payload buffer
    pub data: [u8; FRAME_CAPACITY],
}

impl Frame {
    /// Create a zeroed frame with the given identifier and declared length
    ///
    /// Lengths beyond [`FRAME_CAPACITY`] are clamped.
    pub fn new(id: u32, len: u8) -> Self {
        Self {
            id,
            len: len.min(FRAME_CAPACITY as u8),
            data: [0; FRAME_CAPACITY],
        }
    }

    /// Create a frame from a data slice (at most 8 bytes are kept)
    pub fn from_slice(id: u32, data: &[u8]) -> Self {
        let len = data.len().min(FRAME_CAPACITY);
        let mut frame = Self::new(id, len as u8);
        frame.data[..len].copy_from_slice(&data[..len]);
        frame
    }

    /// The bytes covered by the declared length
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03X}#", self.id)?;
        for byte in self.payload() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Number of doors tracked by the simulator
pub const DOOR_COUNT: usize = 4;

/// Door lock state packed as a bitmask (bit i set = door i+1 locked)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DoorState(u8);

impl DoorState {
    /// Mask with every door locked
    pub const ALL_LOCKED_MASK: u8 = 0x0F;

    /// All four doors locked (the startup state)
    pub fn all_locked() -> Self {
        Self(Self::ALL_LOCKED_MASK)
    }

    /// All four doors unlocked
    pub fn all_unlocked() -> Self {
        Self(0)
    }

    /// Build from a wire/intent bitmask; bits above door 4 are dropped
    pub fn from_mask(mask: u8) -> Self {
        Self(mask & Self::ALL_LOCKED_MASK)
    }

    /// The packed bitmask
    pub fn mask(self) -> u8 {
        self.0
    }

    /// Whether door `index` (0-based) is locked; out-of-range doors read as locked
    pub fn is_locked(self, index: usize) -> bool {
        index >= DOOR_COUNT || self.0 & (1 << index) != 0
    }

    /// Lock door `index` (0-based)
    pub fn lock(&mut self, index: usize) {
        if index < DOOR_COUNT {
            self.0 |= 1 << index;
        }
    }

    /// Unlock door `index` (0-based); clears its bit
    pub fn unlock(&mut self, index: usize) {
        if index < DOOR_COUNT {
            self.0 &= !(1 << index);
        }
    }

    /// True when every door is locked
    pub fn all_doors_locked(self) -> bool {
        self.0 == Self::ALL_LOCKED_MASK
    }
}

impl Default for DoorState {
    fn default() -> Self {
        Self::all_locked()
    }
}

/// Turn indicator state: one bit per side
///
/// Both bits set never comes out of the integrator but is a legal wire
/// state and is decoded as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TurnSignalState {
    pub left: bool,
    pub right: bool,
}

impl TurnSignalState {
    pub const LEFT_BIT: u8 = 0x01;
    pub const RIGHT_BIT: u8 = 0x02;

    /// Both indicators dark
    pub fn off() -> Self {
        Self::default()
    }

    /// Decode from a wire bitmask; each bit is tested independently
    pub fn from_mask(mask: u8) -> Self {
        Self {
            left: mask & Self::LEFT_BIT != 0,
            right: mask & Self::RIGHT_BIT != 0,
        }
    }

    /// Encode to a wire bitmask
    pub fn mask(self) -> u8 {
        let mut mask = 0;
        if self.left {
            mask |= Self::LEFT_BIT;
        }
        if self.right {
            mask |= Self::RIGHT_BIT;
        }
        mask
    }

    pub fn is_off(self) -> bool {
        !self.left && !self.right
    }
}

impl fmt::Display for TurnSignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.left, self.right) {
            (false, false) => write!(f, "off"),
            (true, false) => write!(f, "left"),
            (false, true) => write!(f, "right"),
            (true, true) => write!(f, "left+right"),
        }
    }
}

/// The three logical signals exchanged over the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Door,
    TurnSignal,
    Speed,
}

impl SignalKind {
    /// Minimum field width in bytes
    pub fn min_width(self) -> u8 {
        match self {
            SignalKind::Door | SignalKind::TurnSignal => 1,
            SignalKind::Speed => 2,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Door => write!(f, "door"),
            SignalKind::TurnSignal => write!(f, "signal"),
            SignalKind::Speed => write!(f, "speed"),
        }
    }
}

/// Errors that can occur in the simulator core
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Invalid difficulty level: {0} (expected 0, 1 or 2)")]
    InvalidDifficulty(u8),

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Traffic log line {line}: {reason}")]
    TrafficParse { line: usize, reason: String },

    #[error("Bus disconnected")]
    Disconnected,
}

impl SimError {
    /// Whether a receive loop can keep going after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SimError::MalformedFrame(_))
    }
}
