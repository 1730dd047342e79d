//! UDP virtual bus
//!
//! Each frame travels as one 16-byte datagram laid out like a classic CAN
//! frame:
//!
//! | bytes | content                      |
//! |-------|------------------------------|
//! | 0..4  | identifier (u32 little-end.) |
//! | 4     | declared length (0..=8)      |
//! | 5..8  | reserved, zero               |
//! | 8..16 | payload                      |
//!
//! The "device" is a `host:port` address: the cluster listens on it, the
//! control panel and the traffic player send to it.

use super::Transport;
use crate::types::{Frame, Result, SimError, FRAME_CAPACITY};
use byteorder::{ByteOrder, LittleEndian};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

/// Size of one frame datagram
pub const DATAGRAM_SIZE: usize = 16;

const LEN_OFFSET: usize = 4;
const DATA_OFFSET: usize = 8;

/// Frame transport over UDP datagrams
#[derive(Debug)]
pub struct UdpBus {
    socket: UdpSocket,
    connected: bool,
}

impl UdpBus {
    /// Bind to `device` and receive every frame sent to it
    pub fn listen(device: &str) -> Result<Self> {
        let socket = UdpSocket::bind(resolve(device)?)?;
        log::info!("Listening for frames on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            connected: false,
        })
    }

    /// Open a sending endpoint towards `device`
    pub fn connect(device: &str) -> Result<Self> {
        let target = resolve(device)?;
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(target)?;
        log::info!("Sending frames to {}", target);
        Ok(Self {
            socket,
            connected: true,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl Transport for UdpBus {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        if !self.connected {
            return Err(SimError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "listening bus endpoint cannot send",
            )));
        }
        let datagram = encode_datagram(frame);
        let sent = self.socket.send(&datagram)?;
        if sent != DATAGRAM_SIZE {
            return Err(SimError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram write: {} of {} bytes", sent, DATAGRAM_SIZE),
            )));
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Frame> {
        // Oversized buffer so oversized datagrams are detected, not truncated
        let mut buffer = [0u8; DATAGRAM_SIZE * 4];
        let received = self.socket.recv(&mut buffer)?;
        decode_datagram(&buffer[..received])
    }
}

fn resolve(device: &str) -> Result<SocketAddr> {
    device.to_socket_addrs()?.next().ok_or_else(|| {
        SimError::Io(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("bus device '{}' did not resolve", device),
        ))
    })
}

/// Serialize a frame into its datagram form
pub fn encode_datagram(frame: &Frame) -> [u8; DATAGRAM_SIZE] {
    let mut datagram = [0u8; DATAGRAM_SIZE];
    LittleEndian::write_u32(&mut datagram[..LEN_OFFSET], frame.id);
    datagram[LEN_OFFSET] = frame.len;
    datagram[DATA_OFFSET..].copy_from_slice(&frame.data);
    datagram
}

/// Parse a datagram back into a frame
pub fn decode_datagram(datagram: &[u8]) -> Result<Frame> {
    if datagram.len() != DATAGRAM_SIZE {
        return Err(SimError::MalformedFrame(format!(
            "incomplete frame datagram: {} bytes",
            datagram.len()
        )));
    }

    let len = datagram[LEN_OFFSET];
    if len as usize > FRAME_CAPACITY {
        return Err(SimError::MalformedFrame(format!(
            "declared length {} exceeds {} bytes",
            len, FRAME_CAPACITY
        )));
    }

    let mut frame = Frame::new(LittleEndian::read_u32(&datagram[..LEN_OFFSET]), len);
    frame.data.copy_from_slice(&datagram[DATA_OFFSET..]);
    Ok(frame)
}
