//! Instrument Cluster Simulator Core
//!
//! The reusable half of a vehicle-bus simulation pair: a control panel that
//! turns operator input into bus frames, and an instrument cluster that
//! rebuilds vehicle state from the frames it receives. The two sides never
//! talk directly; they only agree on a seed and a difficulty level.
//!
//! # Architecture
//!
//! - [`LayoutGenerator`] derives frame identifiers, field offsets and frame
//!   lengths from the shared seed, identically in both processes
//! - [`FrameCodec`] encodes door, indicator and speed values under that
//!   layout, obfuscating unused bytes per [`DifficultyLevel`]
//! - [`DynamicsIntegrator`] advances speed and indicator state from
//!   [`OperatorIntent`] on gated cadences
//! - [`DecodeReconstructor`] applies received frames to a [`VehicleState`]
//! - [`Transport`] is the only channel between the two sides
//! - [`ControlPanel`] and [`InstrumentCluster`] bundle each side's state
//!   into one context owned by its process loop
//!
//! Rendering, input capture and process management live in the application
//! layer (icsim-cli).
//!
//! # Example Usage
//!
//! ```
//! use icsim_core::{
//!     DecodeReconstructor, DifficultyLevel, DoorState, FrameCodec, LayoutGenerator,
//!     LoopbackBus, Transport,
//! };
//!
//! // Both sides derive the layout on their own from the shared seed
//! let layout = LayoutGenerator::generate(4242, DifficultyLevel::Pad);
//! let mut codec = FrameCodec::new(layout, DifficultyLevel::Pad);
//! let mut cluster =
//!     DecodeReconstructor::new(LayoutGenerator::generate(4242, DifficultyLevel::Pad));
//!
//! let (mut panel_bus, mut cluster_bus) = LoopbackBus::pair();
//! let mut doors = DoorState::all_locked();
//! doors.unlock(1);
//! panel_bus.send(&codec.encode_door(doors)).unwrap();
//!
//! let frame = cluster_bus.receive().unwrap();
//! cluster.apply(&frame);
//! ```

// Public modules
pub mod codec;
pub mod config;
pub mod dynamics;
pub mod layout;
pub mod obfuscator;
pub mod reconstructor;
pub mod scheduler;
pub mod session;
pub mod traffic;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use codec::FrameCodec;
pub use config::{DifficultyLevel, SimConfig};
pub use dynamics::{DynamicsIntegrator, OperatorIntent, Throttle, TickOutput, TurnIntent};
pub use layout::{BusLayout, LayoutGenerator, SignalLayout};
pub use obfuscator::Obfuscator;
pub use reconstructor::{Applied, DecodeReconstructor, VehicleState};
pub use scheduler::{Gate, ManualClock, TickSource, WallClock};
pub use session::{ControlPanel, InstrumentCluster, PanelStats};
pub use traffic::{TrafficLog, TrafficRecord};
pub use transport::{LoopbackBus, Transport, UdpBus};
pub use types::{
    DoorState, Frame, Result, SignalKind, SimError, TurnSignalState, FRAME_CAPACITY, KPH_TO_MPH,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
