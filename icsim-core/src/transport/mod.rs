//! Bus transports
//!
//! The core only needs a frame-oriented send/receive channel. Two
//! implementations are provided: a UDP virtual bus for running the two
//! processes side by side and an in-process loopback pair for tests.

use crate::types::{Frame, Result};

pub mod loopback;
pub mod udp;

pub use loopback::LoopbackBus;
pub use udp::UdpBus;

/// Frame-oriented bus endpoint
///
/// The control panel only sends and the cluster only receives; neither side
/// retries on failure.
pub trait Transport {
    /// Put a frame on the bus
    fn send(&mut self, frame: &Frame) -> Result<()>;

    /// Block until the next frame arrives
    fn receive(&mut self) -> Result<Frame>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        (**self).send(frame)
    }

    fn receive(&mut self) -> Result<Frame> {
        (**self).receive()
    }
}
