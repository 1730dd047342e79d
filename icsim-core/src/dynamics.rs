//! Vehicle dynamics integrator
//!
//! Turns discrete operator intent into the continuous speed and blinking
//! indicator state the control panel puts on the bus. Speed and indicators
//! update on independent gates (10ms and 500ms of simulated time).

use crate::scheduler::Gate;
use crate::types::{DoorState, TurnSignalState};
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU8, Ordering};
use std::time::Duration;

/// Speed limiter in mph (260 would be a full gauge)
pub const MAX_SPEED: f64 = 90.0;

/// Seconds from standstill to `MAX_SPEED`
pub const ACCEL_RATE: f64 = 8.0;

/// Minimum simulated time between speed updates
pub const SPEED_GATE: Duration = Duration::from_millis(10);

/// Minimum simulated time between indicator updates
pub const TURN_GATE: Duration = Duration::from_millis(500);

/// Speeds below this while decelerating snap to zero
const STOP_THRESHOLD: f64 = 1.0;

/// Throttle axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Throttle {
    /// Released: decelerate
    Release,
    /// Hold speed (coasting is static)
    #[default]
    Hold,
    Accelerate,
}

impl Throttle {
    /// Sign convention used by the intent atomics: -1, 0, +1
    pub fn from_axis(value: i8) -> Self {
        match value.signum() {
            -1 => Throttle::Release,
            1 => Throttle::Accelerate,
            _ => Throttle::Hold,
        }
    }

    pub fn axis(self) -> i8 {
        match self {
            Throttle::Release => -1,
            Throttle::Hold => 0,
            Throttle::Accelerate => 1,
        }
    }
}

/// Steering axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnIntent {
    Left,
    #[default]
    Straight,
    Right,
}

impl TurnIntent {
    pub fn from_axis(value: i8) -> Self {
        match value.signum() {
            -1 => TurnIntent::Left,
            1 => TurnIntent::Right,
            _ => TurnIntent::Straight,
        }
    }

    pub fn axis(self) -> i8 {
        match self {
            TurnIntent::Left => -1,
            TurnIntent::Straight => 0,
            TurnIntent::Right => 1,
        }
    }
}

/// Operator intent shared between the input thread and the control loop
///
/// One atomic per axis; the input thread only stores, the loop only loads.
#[derive(Debug)]
pub struct OperatorIntent {
    throttle: AtomicI8,
    turn: AtomicI8,
    doors: AtomicU8,
    running: AtomicBool,
}

impl OperatorIntent {
    /// Neutral intent: hold speed, wheel straight, all doors locked
    pub fn new() -> Self {
        Self {
            throttle: AtomicI8::new(0),
            turn: AtomicI8::new(0),
            doors: AtomicU8::new(DoorState::ALL_LOCKED_MASK),
            running: AtomicBool::new(true),
        }
    }

    pub fn set_throttle(&self, throttle: Throttle) {
        self.throttle.store(throttle.axis(), Ordering::Relaxed);
    }

    pub fn throttle(&self) -> Throttle {
        Throttle::from_axis(self.throttle.load(Ordering::Relaxed))
    }

    pub fn set_turn(&self, turn: TurnIntent) {
        self.turn.store(turn.axis(), Ordering::Relaxed);
    }

    pub fn turn(&self) -> TurnIntent {
        TurnIntent::from_axis(self.turn.load(Ordering::Relaxed))
    }

    /// Desired door locks
    pub fn doors(&self) -> DoorState {
        DoorState::from_mask(self.doors.load(Ordering::Relaxed))
    }

    pub fn set_doors(&self, doors: DoorState) {
        self.doors.store(doors.mask(), Ordering::Relaxed);
    }

    /// Lock door `index` (0-based)
    pub fn lock_door(&self, index: usize) {
        let mut doors = self.doors();
        doors.lock(index);
        self.set_doors(doors);
    }

    /// Unlock door `index` (0-based)
    pub fn unlock_door(&self, index: usize) {
        let mut doors = self.doors();
        doors.unlock(index);
        self.set_doors(doors);
    }

    /// Ask the control loop to stop
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Default for OperatorIntent {
    fn default() -> Self {
        Self::new()
    }
}

/// What changed during one `advance` call
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickOutput {
    /// New speed in mph, present whenever the speed gate fired
    pub speed_mph: Option<f64>,
    /// New indicator state, present whenever the turn gate fired
    pub turn: Option<TurnSignalState>,
}

impl TickOutput {
    pub fn is_empty(&self) -> bool {
        self.speed_mph.is_none() && self.turn.is_none()
    }
}

/// Speed and indicator state machine advanced by elapsed simulated time
#[derive(Debug, Clone)]
pub struct DynamicsIntegrator {
    now: Duration,
    speed: f64,
    max_speed: f64,
    turn: TurnSignalState,
    speed_gate: Gate,
    turn_gate: Gate,
}

impl DynamicsIntegrator {
    /// Stationary vehicle, indicators off, both gates never fired
    pub fn new() -> Self {
        Self::with_max_speed(MAX_SPEED)
    }

    /// Integrator with a custom limiter
    pub fn with_max_speed(max_speed: f64) -> Self {
        Self {
            now: Duration::ZERO,
            speed: 0.0,
            max_speed,
            turn: TurnSignalState::off(),
            speed_gate: Gate::new(SPEED_GATE),
            turn_gate: Gate::new(TURN_GATE),
        }
    }

    /// Current speed in mph
    pub fn speed_mph(&self) -> f64 {
        self.speed
    }

    pub fn turn_signal(&self) -> TurnSignalState {
        self.turn
    }

    /// Simulated time since start
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Speed change per speed-gate firing
    pub fn rate(&self) -> f64 {
        self.max_speed / (ACCEL_RATE * 100.0)
    }

    /// Advance simulated time and run whichever gated updates are due
    pub fn advance(
        &mut self,
        elapsed: Duration,
        throttle: Throttle,
        turn: TurnIntent,
    ) -> TickOutput {
        self.now += elapsed;
        let mut output = TickOutput::default();

        if self.speed_gate.poll(self.now) {
            self.update_speed(throttle);
            output.speed_mph = Some(self.speed);
        }

        if self.turn_gate.poll(self.now) {
            self.update_turn(turn);
            output.turn = Some(self.turn);
        }

        output
    }

    fn update_speed(&mut self, throttle: Throttle) {
        let rate = self.rate();
        match throttle {
            Throttle::Release => {
                self.speed -= rate;
                if self.speed < STOP_THRESHOLD {
                    self.speed = 0.0;
                }
            }
            Throttle::Accelerate => {
                self.speed += rate;
                if self.speed > self.max_speed {
                    self.speed = self.max_speed;
                }
            }
            Throttle::Hold => {}
        }
    }

    /// Toggle the requested side each firing so the indicator blinks
    fn update_turn(&mut self, turn: TurnIntent) {
        match turn {
            TurnIntent::Left => {
                self.turn.left = !self.turn.left;
                self.turn.right = false;
            }
            TurnIntent::Right => {
                self.turn.right = !self.turn.right;
                self.turn.left = false;
            }
            TurnIntent::Straight => self.turn = TurnSignalState::off(),
        }
    }
}

impl Default for DynamicsIntegrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_fires_both_gates() {
        let mut dynamics = DynamicsIntegrator::new();
        let output = dynamics.advance(Duration::ZERO, Throttle::Hold, TurnIntent::Straight);
        assert_eq!(output.speed_mph, Some(0.0));
        assert_eq!(output.turn, Some(TurnSignalState::off()));

        let output =
            dynamics.advance(Duration::from_millis(5), Throttle::Hold, TurnIntent::Straight);
        assert!(output.is_empty());
    }

    #[test]
    fn test_left_indicator_blinks() {
        let mut dynamics = DynamicsIntegrator::new();
        let mut expected_left = true;

        for step in 0..10 {
            let elapsed = if step == 0 { Duration::ZERO } else { TURN_GATE };
            let output = dynamics.advance(elapsed, Throttle::Hold, TurnIntent::Left);
            let turn = output.turn.expect("turn gate fires every 500ms");
            assert_eq!(turn.left, expected_left, "step {}", step);
            assert!(!turn.right);
            expected_left = !expected_left;
        }
    }

    #[test]
    fn test_switching_sides_clears_other_bit() {
        let mut dynamics = DynamicsIntegrator::new();
        dynamics.advance(Duration::ZERO, Throttle::Hold, TurnIntent::Left);
        assert!(dynamics.turn_signal().left);

        let output = dynamics.advance(TURN_GATE, Throttle::Hold, TurnIntent::Right);
        assert_eq!(output.turn, Some(TurnSignalState { left: false, right: true }));

        let output = dynamics.advance(TURN_GATE, Throttle::Hold, TurnIntent::Straight);
        assert_eq!(output.turn, Some(TurnSignalState::off()));
    }

    #[test]
    fn test_speed_clamps_at_max() {
        let mut dynamics = DynamicsIntegrator::new();
        for _ in 0..2_000 {
            let output = dynamics.advance(SPEED_GATE, Throttle::Accelerate, TurnIntent::Straight);
            assert!(output.speed_mph.unwrap() <= MAX_SPEED);
        }
        assert_eq!(dynamics.speed_mph(), MAX_SPEED);
    }

    #[test]
    fn test_release_from_standstill_stays_zero() {
        let mut dynamics = DynamicsIntegrator::new();
        for _ in 0..100 {
            dynamics.advance(SPEED_GATE, Throttle::Release, TurnIntent::Straight);
            assert_eq!(dynamics.speed_mph(), 0.0);
        }
    }

    #[test]
    fn test_release_snaps_to_zero_below_one() {
        let mut dynamics = DynamicsIntegrator::new();
        // 9 firings: 9 * 0.1125 = 1.0125 mph
        for _ in 0..9 {
            dynamics.advance(SPEED_GATE, Throttle::Accelerate, TurnIntent::Straight);
        }
        assert!(dynamics.speed_mph() > 1.0);

        dynamics.advance(SPEED_GATE, Throttle::Release, TurnIntent::Straight);
        assert_eq!(dynamics.speed_mph(), 0.0);
    }

    #[test]
    fn test_hold_keeps_speed_but_still_reports() {
        let mut dynamics = DynamicsIntegrator::new();
        for _ in 0..50 {
            dynamics.advance(SPEED_GATE, Throttle::Accelerate, TurnIntent::Straight);
        }
        let cruising = dynamics.speed_mph();

        let output = dynamics.advance(SPEED_GATE, Throttle::Hold, TurnIntent::Straight);
        assert_eq!(output.speed_mph, Some(cruising));
    }

    #[test]
    fn test_speed_gate_limits_rate() {
        let mut dynamics = DynamicsIntegrator::new();
        dynamics.advance(Duration::ZERO, Throttle::Accelerate, TurnIntent::Straight);
        let after_first = dynamics.speed_mph();

        // Two 5ms polls make one 10ms gate interval
        let step = Duration::from_millis(5);
        let first = dynamics.advance(step, Throttle::Accelerate, TurnIntent::Straight);
        assert_eq!(first.speed_mph, None);
        let second = dynamics.advance(step, Throttle::Accelerate, TurnIntent::Straight);
        assert_eq!(second.speed_mph, Some(after_first + dynamics.rate()));
    }

    #[test]
    fn test_zero_to_max_takes_accel_rate_seconds() {
        let mut dynamics = DynamicsIntegrator::new();
        let firings = (ACCEL_RATE * 100.0) as usize;
        for _ in 0..firings - 1 {
            dynamics.advance(SPEED_GATE, Throttle::Accelerate, TurnIntent::Straight);
        }
        assert!(dynamics.speed_mph() < MAX_SPEED);
        dynamics.advance(SPEED_GATE, Throttle::Accelerate, TurnIntent::Straight);
        dynamics.advance(SPEED_GATE, Throttle::Accelerate, TurnIntent::Straight);
        assert_eq!(dynamics.speed_mph(), MAX_SPEED);
    }

    #[test]
    fn test_operator_intent_atomics() {
        let intent = OperatorIntent::new();
        assert_eq!(intent.throttle(), Throttle::Hold);
        assert!(intent.doors().all_doors_locked());

        intent.set_throttle(Throttle::Accelerate);
        intent.set_turn(TurnIntent::Left);
        intent.unlock_door(3);
        assert_eq!(intent.throttle(), Throttle::Accelerate);
        assert_eq!(intent.turn(), TurnIntent::Left);
        assert_eq!(intent.doors().mask(), 0x07);

        assert!(intent.is_running());
        intent.request_stop();
        assert!(!intent.is_running());
    }

    #[test]
    fn test_axis_mapping() {
        assert_eq!(Throttle::from_axis(-7), Throttle::Release);
        assert_eq!(TurnIntent::from_axis(3), TurnIntent::Right);
        assert_eq!(TurnIntent::from_axis(0).axis(), 0);
    }
}
