//! In-process loopback bus

use super::Transport;
use crate::types::{Frame, Result, SimError};
use std::sync::mpsc::{self, Receiver, Sender};

/// One end of an in-process bus; frames sent on one end arrive at the other
#[derive(Debug)]
pub struct LoopbackBus {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

impl LoopbackBus {
    /// Create two connected endpoints
    pub fn pair() -> (LoopbackBus, LoopbackBus) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            LoopbackBus { tx: a_tx, rx: a_rx },
            LoopbackBus { tx: b_tx, rx: b_rx },
        )
    }

    /// Non-blocking receive; `None` when nothing is queued
    pub fn try_receive(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Drain every queued frame
    pub fn drain(&mut self) -> Vec<Frame> {
        self.rx.try_iter().collect()
    }
}

impl Transport for LoopbackBus {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        self.tx.send(*frame).map_err(|_| SimError::Disconnected)
    }

    fn receive(&mut self) -> Result<Frame> {
        self.rx.recv().map_err(|_| SimError::Disconnected)
    }
}
