//! Background traffic logs
//!
//! Parses candump-style logs and replays them onto a bus so the simulator's
//! own frames are buried in realistic noise:
//!
//! ```text
//! (1436509052.249713) vcan0 044#2A366C2BBA
//! (1436509052.449847) vcan0 0F6#7A
//! ```
//!
//! CAN-FD (`ID##...`) and remote (`ID#R`) frames are skipped.

use crate::scheduler::TickSource;
use crate::transport::Transport;
use crate::types::{Frame, Result, SimError, FRAME_CAPACITY};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

/// One frame of a traffic log with its capture time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficRecord {
    /// Capture timestamp (seconds since the capture's epoch)
    pub timestamp: Duration,
    pub frame: Frame,
}

/// A parsed traffic log
#[derive(Debug, Clone, Default)]
pub struct TrafficLog {
    records: Vec<TrafficRecord>,
    skipped: usize,
}

impl TrafficLog {
    /// Load and parse a log file
    pub fn load(path: &Path) -> Result<Self> {
        log::info!("Loading traffic log: {:?}", path);
        let file = File::open(path)?;
        Self::parse(BufReader::new(file))
    }

    /// Parse a log from any buffered reader
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut log = TrafficLog::default();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            match parse_line(&line, index + 1)? {
                Some(record) => log.records.push(record),
                None => log.skipped += 1,
            }
        }

        log::debug!(
            "Parsed {} traffic frames ({} lines skipped)",
            log.records.len(),
            log.skipped
        );
        Ok(log)
    }

    pub fn records(&self) -> &[TrafficRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Lines that were blank, comments, or unsupported frame kinds
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Replay the log once, pausing for the captured inter-frame gaps
    ///
    /// Send failures are logged and skipped. Stops early when `keep_going`
    /// returns false; returns the number of frames sent.
    pub fn replay<T, C, F>(&self, bus: &mut T, clock: &mut C, keep_going: F) -> u64
    where
        T: Transport + ?Sized,
        C: TickSource + ?Sized,
        F: Fn() -> bool,
    {
        let mut sent = 0;
        let mut previous: Option<Duration> = None;

        for record in &self.records {
            if !keep_going() {
                break;
            }
            if let Some(prev) = previous {
                let gap = record.timestamp.saturating_sub(prev);
                if !gap.is_zero() {
                    clock.pause(gap);
                }
            }
            previous = Some(record.timestamp);

            match bus.send(&record.frame) {
                Ok(()) => sent += 1,
                Err(e) => log::warn!("Failed to replay frame {}: {}", record.frame, e),
            }
        }

        sent
    }
}

/// Parse one log line; `Ok(None)` for lines that carry no classic frame
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<TrafficRecord>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let error = |reason: String| SimError::TrafficParse {
        line: line_no,
        reason,
    };

    let mut fields = line.split_whitespace();
    let (Some(stamp), Some(_iface), Some(body)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(error(format!("expected '(time) iface ID#DATA', got '{}'", line)));
    };

    let timestamp =
        parse_timestamp(stamp).ok_or_else(|| error(format!("bad timestamp '{}'", stamp)))?;

    let Some((id_text, data_text)) = body.split_once('#') else {
        return Err(error(format!("missing '#' in '{}'", body)));
    };

    if data_text.starts_with('#') || data_text.starts_with('R') || data_text.starts_with('r') {
        log::trace!("Skipping non-classic frame on line {}: {}", line_no, body);
        return Ok(None);
    }

    let id = u32::from_str_radix(id_text, 16)
        .map_err(|_| error(format!("bad identifier '{}'", id_text)))?;
    let data = parse_hex(data_text).ok_or_else(|| error(format!("bad payload '{}'", data_text)))?;
    if data.len() > FRAME_CAPACITY {
        return Err(error(format!("payload of {} bytes exceeds {}", data.len(), FRAME_CAPACITY)));
    }

    Ok(Some(TrafficRecord {
        timestamp,
        frame: Frame::from_slice(id, &data),
    }))
}

/// `(secs.fraction)` -> Duration
fn parse_timestamp(stamp: &str) -> Option<Duration> {
    let inner = stamp.strip_prefix('(')?.strip_suffix(')')?;
    let (secs, fraction) = inner.split_once('.').unwrap_or((inner, ""));
    let secs: u64 = secs.parse().ok()?;

    if fraction.is_empty() {
        return Some(Duration::from_secs(secs));
    }
    if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let nanos: u32 = format!("{:0<9}", fraction).parse().ok()?;
    Some(Duration::new(secs, nanos))
}

fn parse_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}
