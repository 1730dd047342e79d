//! Background traffic player
//!
//! The control panel runs the `replay` subcommand of this same binary as a
//! child process, looping a capture onto the bus forever. The child is
//! killed when the handle drops.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::{Child, Command, Stdio};

pub struct TrafficPlayer {
    child: Child,
}

impl TrafficPlayer {
    /// Start looping `traffic` onto `device`
    pub fn spawn(device: &str, traffic: &Path) -> Result<Self> {
        if !traffic.is_file() {
            bail!("Traffic file not found: {:?}", traffic);
        }

        let exe = std::env::current_exe().context("Failed to locate own executable")?;
        let child = Command::new(exe)
            .arg("--quiet")
            .arg("replay")
            .arg(device)
            .arg("-I")
            .arg(traffic)
            .args(["--loops", "infinite"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .context("Failed to start traffic player")?;

        log::info!("Traffic player started (pid {}) with {:?}", child.id(), traffic);
        Ok(Self { child })
    }

    /// Start the player, or log why there is no background traffic
    pub fn try_spawn(device: &str, traffic: &Path) -> Option<Self> {
        match Self::spawn(device, traffic) {
            Ok(player) => Some(player),
            Err(e) => {
                log::warn!("No background traffic: {:#}", e);
                None
            }
        }
    }
}

impl Drop for TrafficPlayer {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            log::debug!("Traffic player already gone: {}", e);
        }
        let _ = self.child.wait();
        log::info!("Traffic player stopped");
    }
}
