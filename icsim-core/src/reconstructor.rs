//! Cluster-side state reconstruction
//!
//! Inverse of the dynamics integrator: every accepted frame overwrites the
//! matching field of [`VehicleState`]. There is no smoothing, the state is a
//! last-value cache, and frames that cannot be decoded leave it untouched.

use crate::codec::FrameCodec;
use crate::layout::BusLayout;
use crate::types::{DoorState, Frame, SignalKind, TurnSignalState};
use serde::Serialize;

/// Displayable vehicle state owned by the cluster
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehicleState {
    #[serde(serialize_with = "serialize_doors")]
    pub doors: DoorState,
    #[serde(serialize_with = "serialize_turn")]
    pub turn: TurnSignalState,
    pub speed_mph: f64,
}

fn serialize_doors<S: serde::Serializer>(doors: &DoorState, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(doors.mask())
}

fn serialize_turn<S: serde::Serializer>(turn: &TurnSignalState, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(turn.mask())
}

impl VehicleState {
    /// Startup state: all doors locked, indicators off, stationary
    pub fn new() -> Self {
        Self {
            doors: DoorState::all_locked(),
            turn: TurnSignalState::off(),
            speed_mph: 0.0,
        }
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::new()
    }
}

/// Signals updated by one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Applied {
    pub door: bool,
    pub turn: bool,
    pub speed: bool,
}

impl Applied {
    /// Whether anything in the state was overwritten
    pub fn any(&self) -> bool {
        self.door || self.turn || self.speed
    }

    fn mark(&mut self, kind: SignalKind) {
        match kind {
            SignalKind::Door => self.door = true,
            SignalKind::TurnSignal => self.turn = true,
            SignalKind::Speed => self.speed = true,
        }
    }
}

/// Applies received frames to a [`VehicleState`] under this process's layout
#[derive(Debug, Clone)]
pub struct DecodeReconstructor {
    layout: BusLayout,
    state: VehicleState,
    foreign_frames: u64,
    short_frames: u64,
}

impl DecodeReconstructor {
    pub fn new(layout: BusLayout) -> Self {
        Self {
            layout,
            state: VehicleState::new(),
            foreign_frames: 0,
            short_frames: 0,
        }
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn layout(&self) -> &BusLayout {
        &self.layout
    }

    /// Frames seen whose identifier matched none of the signals
    pub fn foreign_frames(&self) -> u64 {
        self.foreign_frames
    }

    /// Frames with a known identifier but too short to carry their field
    pub fn short_frames(&self) -> u64 {
        self.short_frames
    }

    /// Apply one received frame
    ///
    /// Foreign identifiers are discarded without side effects on the state.
    pub fn apply(&mut self, frame: &Frame) -> Applied {
        let mut applied = Applied::default();
        let mut known = false;

        let layout = self.layout;
        for kind in layout.kinds_for(frame.id) {
            known = true;
            if self.apply_signal(frame, kind) {
                applied.mark(kind);
            }
        }

        if !known {
            self.foreign_frames += 1;
            log::trace!("Discarding foreign frame {}", frame);
        } else if !applied.any() {
            self.short_frames += 1;
            log::debug!("Ignoring short frame {}", frame);
        }

        applied
    }

    fn apply_signal(&mut self, frame: &Frame, kind: SignalKind) -> bool {
        let layout = self.layout.get(kind);
        match kind {
            SignalKind::Door => match FrameCodec::decode_door(frame, layout) {
                Some(doors) => self.state.doors = doors,
                None => return false,
            },
            SignalKind::TurnSignal => match FrameCodec::decode_turn_signal(frame, layout) {
                Some(turn) => self.state.turn = turn,
                None => return false,
            },
            SignalKind::Speed => match FrameCodec::decode_speed_mph(frame, layout) {
                Some(mph) => self.state.speed_mph = mph,
                None => return false,
            },
        }
        true
    }
}
