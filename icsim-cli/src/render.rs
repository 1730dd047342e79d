//! Cluster display backends

use icsim_core::types::DOOR_COUNT;
use icsim_core::VehicleState;
use std::io::{self, Write};

/// Something that can show the current vehicle state
pub trait Renderer {
    fn redraw(&mut self, state: &VehicleState) -> io::Result<()>;
}

/// Full-screen text dashboard redrawn in place with ANSI escapes
pub struct TextRenderer<W: Write> {
    out: W,
}

impl TextRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn redraw(&mut self, state: &VehicleState) -> io::Result<()> {
        // Cursor home, clear screen
        write!(self.out, "\x1b[H\x1b[2J")?;
        writeln!(self.out, "═══════════════════════════════")?;
        writeln!(self.out, "  Instrument Cluster")?;
        writeln!(self.out, "═══════════════════════════════")?;
        writeln!(self.out, "  Speed:   {:>5.1} mph", state.speed_mph)?;
        writeln!(
            self.out,
            "  Signals: {}  {}",
            lamp("<", state.turn.left),
            lamp(">", state.turn.right)
        )?;
        for door in 0..DOOR_COUNT {
            let status = if state.doors.is_locked(door) {
                "locked"
            } else {
                "OPEN"
            };
            writeln!(self.out, "  Door {}:  {}", door + 1, status)?;
        }
        self.out.flush()
    }
}

fn lamp(symbol: &'static str, on: bool) -> &'static str {
    if on {
        symbol
    } else {
        "."
    }
}

/// Writes one log line per state change (or JSON to stdout)
#[derive(Debug, Default)]
pub struct LogRenderer {
    json: bool,
    last: Option<VehicleState>,
}

impl LogRenderer {
    pub fn new(json: bool) -> Self {
        Self { json, last: None }
    }

    /// Line describing `state`
    pub fn describe(&self, state: &VehicleState) -> io::Result<String> {
        if self.json {
            return serde_json::to_string(state).map_err(io::Error::other);
        }
        Ok(format!(
            "speed {:.1} mph | signals {} | doors 0x{:X}",
            state.speed_mph,
            state.turn,
            state.doors.mask()
        ))
    }
}

impl Renderer for LogRenderer {
    fn redraw(&mut self, state: &VehicleState) -> io::Result<()> {
        if self.last.as_ref() == Some(state) {
            return Ok(());
        }
        let line = self.describe(state)?;
        if self.json {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", line)?;
            stdout.flush()?;
        } else {
            log::info!("{}", line);
        }
        self.last = Some(*state);
        Ok(())
    }
}
