//! Simulation contexts for the two processes
//!
//! [`ControlPanel`] owns everything the sending side mutates (integrator,
//! codec, bus handle, last sent door state); [`InstrumentCluster`] owns the
//! receiving side. Each is driven by its process's loop; nothing is global.

use crate::codec::FrameCodec;
use crate::config::SimConfig;
use crate::dynamics::{DynamicsIntegrator, OperatorIntent};
use crate::layout::LayoutGenerator;
use crate::reconstructor::{Applied, DecodeReconstructor, VehicleState};
use crate::transport::Transport;
use crate::types::{DoorState, Frame, Result};
use std::time::Duration;

/// Counters kept by the control panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelStats {
    pub frames_sent: u64,
    pub send_failures: u64,
}

/// Sending side: intent -> dynamics -> codec -> bus
pub struct ControlPanel<T: Transport> {
    bus: T,
    codec: FrameCodec,
    dynamics: DynamicsIntegrator,
    sent_doors: Option<DoorState>,
    stats: PanelStats,
}

impl<T: Transport> ControlPanel<T> {
    /// Panel using the layout derived from `config`
    pub fn new(config: &SimConfig, bus: T) -> Self {
        let layout = LayoutGenerator::generate(config.seed, config.difficulty);
        Self::with_codec(FrameCodec::new(layout, config.difficulty), bus)
    }

    /// Panel with a prepared codec (reproducible noise in tests)
    pub fn with_codec(codec: FrameCodec, bus: T) -> Self {
        Self {
            bus,
            codec,
            dynamics: DynamicsIntegrator::new(),
            sent_doors: None,
            stats: PanelStats::default(),
        }
    }

    pub fn dynamics(&self) -> &DynamicsIntegrator {
        &self.dynamics
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn stats(&self) -> PanelStats {
        self.stats
    }

    /// One control loop iteration
    ///
    /// Advances the integrator by `elapsed`, sends a speed and/or indicator
    /// frame for every gate that fired, and a door frame whenever the
    /// requested locks differ from the last ones sent (always on the first
    /// tick). Returns the number of frames sent.
    pub fn tick(&mut self, elapsed: Duration, intent: &OperatorIntent) -> usize {
        let mut frames = Vec::with_capacity(3);

        let doors = intent.doors();
        if self.sent_doors != Some(doors) {
            log::debug!("Door locks now 0x{:X}", doors.mask());
            frames.push(self.codec.encode_door(doors));
            self.sent_doors = Some(doors);
        }

        let output = self.dynamics.advance(elapsed, intent.throttle(), intent.turn());
        if let Some(mph) = output.speed_mph {
            frames.push(self.codec.encode_speed_mph(mph));
        }
        if let Some(turn) = output.turn {
            frames.push(self.codec.encode_turn_signal(turn));
        }

        frames.iter().filter(|frame| self.send(frame)).count()
    }

    /// Send one frame; failures are logged and counted, never retried
    fn send(&mut self, frame: &Frame) -> bool {
        match self.bus.send(frame) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                log::trace!("Sent {}", frame);
                true
            }
            Err(e) => {
                self.stats.send_failures += 1;
                log::warn!("Failed to send {}: {}", frame, e);
                false
            }
        }
    }

    pub fn into_bus(self) -> T {
        self.bus
    }
}

/// Receiving side: bus -> reconstructor -> state
pub struct InstrumentCluster<T: Transport> {
    bus: T,
    reconstructor: DecodeReconstructor,
}

impl<T: Transport> InstrumentCluster<T> {
    pub fn new(config: &SimConfig, bus: T) -> Self {
        let layout = LayoutGenerator::generate(config.seed, config.difficulty);
        Self {
            bus,
            reconstructor: DecodeReconstructor::new(layout),
        }
    }

    pub fn state(&self) -> &VehicleState {
        self.reconstructor.state()
    }

    pub fn reconstructor(&self) -> &DecodeReconstructor {
        &self.reconstructor
    }

    /// Block for one frame and apply it
    ///
    /// Transport errors are returned to the caller, which decides whether the
    /// loop survives them.
    pub fn step(&mut self) -> Result<Applied> {
        let frame = self.bus.receive()?;
        let applied = self.reconstructor.apply(&frame);
        if applied.any() {
            log::debug!("Accepted {} -> {:?}", frame, applied);
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DifficultyLevel;
    use crate::dynamics::{Throttle, TurnIntent};
    use crate::transport::LoopbackBus;
    use crate::types::{SignalKind, SimError, TurnSignalState};

    #[test]
    fn test_first_tick_sends_all_three() {
        let (panel_bus, mut cluster_bus) = LoopbackBus::pair();
        let mut panel = ControlPanel::new(&SimConfig::new(), panel_bus);
        let intent = OperatorIntent::new();

        assert_eq!(panel.tick(Duration::ZERO, &intent), 3);
        let ids: Vec<_> = cluster_bus.drain().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![411, 580, 392]);

        // Nothing due 5ms later
        assert_eq!(panel.tick(Duration::from_millis(5), &intent), 0);
    }

    #[test]
    fn test_door_frame_only_on_change() {
        let (panel_bus, mut cluster_bus) = LoopbackBus::pair();
        let mut panel = ControlPanel::new(&SimConfig::new(), panel_bus);
        let intent = OperatorIntent::new();
        panel.tick(Duration::ZERO, &intent);
        cluster_bus.drain();

        intent.unlock_door(0);
        panel.tick(Duration::from_millis(1), &intent);
        let frames = cluster_bus.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id, 411);
        assert_eq!(frames[0].data[2], 0x0E);
    }

    fn run_session(config: &SimConfig, ticks: usize) -> (f64, TurnSignalState, VehicleState) {
        let (panel_bus, cluster_bus) = LoopbackBus::pair();
        let mut panel = ControlPanel::new(config, panel_bus);
        let mut cluster = InstrumentCluster::new(config, cluster_bus);
        let intent = OperatorIntent::new();
        intent.set_throttle(Throttle::Accelerate);
        intent.set_turn(TurnIntent::Right);
        intent.unlock_door(0);

        let mut sent = panel.tick(Duration::ZERO, &intent);
        for _ in 0..ticks {
            sent += panel.tick(Duration::from_millis(10), &intent);
        }
        for _ in 0..sent {
            cluster.step().unwrap();
        }

        let dynamics = panel.dynamics();
        (dynamics.speed_mph(), dynamics.turn_signal(), *cluster.state())
    }

    #[test]
    fn test_cluster_follows_panel() {
        // Default identifiers with padded lengths: every field is carried
        let config = SimConfig::new().with_difficulty(DifficultyLevel::Pad);
        let layout = LayoutGenerator::generate(config.seed, config.difficulty);
        for kind in [SignalKind::Door, SignalKind::TurnSignal, SignalKind::Speed] {
            assert!(layout.get(kind).carries(kind), "{} not carried", kind);
            assert_eq!(layout.kinds_for(layout.get(kind).id).count(), 1);
        }

        let (speed, turn, state) = run_session(&config, 120);
        assert!(speed > 0.0);
        assert!((state.speed_mph - speed).abs() < 0.05);
        assert!(turn.right);
        assert_eq!(state.turn, turn);
        assert_eq!(state.doors.mask(), 0x0E);
    }

    #[test]
    fn test_disabled_speed_field_is_never_shown() {
        let config = SimConfig::new()
            .with_seed(31337)
            .with_difficulty(DifficultyLevel::Pad);
        let layout = LayoutGenerator::generate(config.seed, config.difficulty);
        assert!(!layout.speed.carries(SignalKind::Speed));
        assert_eq!(layout.kinds_for(layout.speed.id).count(), 1);

        let (speed, _, state) = run_session(&config, 120);
        assert!(speed > 0.0);
        assert_eq!(state.speed_mph, 0.0);
    }

    #[test]
    fn test_send_failure_is_counted_not_fatal() {
        let (panel_bus, cluster_bus) = LoopbackBus::pair();
        drop(cluster_bus);
        let mut panel = ControlPanel::new(&SimConfig::new(), panel_bus);

        assert_eq!(panel.tick(Duration::ZERO, &OperatorIntent::new()), 0);
        assert_eq!(panel.stats().send_failures, 3);
    }

    #[test]
    fn test_cluster_reports_disconnect() {
        let (panel_bus, cluster_bus) = LoopbackBus::pair();
        drop(panel_bus);
        let mut cluster = InstrumentCluster::new(&SimConfig::new(), cluster_bus);
        assert!(matches!(cluster.step(), Err(SimError::Disconnected)));
    }
}
