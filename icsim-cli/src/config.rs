//! Configuration loading and seed sharing

use anyhow::{bail, Context, Result};
use icsim_core::{DifficultyLevel, SimConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where the cluster publishes a randomized seed for the control panel
pub const DEFAULT_SEED_FILE: &str = "/tmp/icsim_seed.txt";

/// Background traffic played by the control panel unless disabled
pub const DEFAULT_TRAFFIC_FILE: &str = "./data/sample-can.log";

/// Application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub controls: ControlsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Use the text dashboard instead of log output
    #[serde(default)]
    pub text_mode: bool,
    /// Emit state updates as JSON lines
    #[serde(default)]
    pub json: bool,
    #[serde(default = "default_seed_file")]
    pub seed_file: PathBuf,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            text_mode: false,
            json: false,
            seed_file: default_seed_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlsConfig {
    #[serde(default = "default_traffic_file")]
    pub traffic_file: PathBuf,
    #[serde(default = "default_true")]
    pub play_traffic: bool,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            traffic_file: default_traffic_file(),
            play_traffic: true,
        }
    }
}

fn default_seed_file() -> PathBuf {
    PathBuf::from(DEFAULT_SEED_FILE)
}

fn default_traffic_file() -> PathBuf {
    PathBuf::from(DEFAULT_TRAFFIC_FILE)
}

fn default_true() -> bool {
    true
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

/// Load the config file if one was given, defaults otherwise
pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(AppConfig::default()),
    }
}

/// Command-line overrides for the shared simulation settings
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides<'a> {
    pub seed: Option<i32>,
    pub seed_file: Option<&'a Path>,
    pub difficulty: Option<u8>,
    pub poll_ms: Option<u64>,
}

/// Merge command-line overrides over the file configuration
///
/// An explicit seed wins over a seed file, which wins over the config file.
pub fn resolve(base: &SimConfig, overrides: Overrides<'_>) -> Result<SimConfig> {
    let mut config = base.clone();

    if let Some(seed) = overrides.seed {
        config.seed = seed;
    } else if let Some(path) = overrides.seed_file {
        config.seed = read_seed_file(path)?;
    }

    if let Some(level) = overrides.difficulty {
        config.difficulty = DifficultyLevel::try_from(level)?;
    }

    if let Some(poll_ms) = overrides.poll_ms {
        config.poll_ms = poll_ms;
    }
    if config.poll_ms == 0 {
        bail!("Poll interval must be at least 1ms");
    }

    Ok(config)
}

/// Read a seed shared by the other process
pub fn read_seed_file(path: &Path) -> Result<i32> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {:?}", path))?;
    content
        .trim()
        .parse()
        .with_context(|| format!("Seed file {:?} does not hold an integer", path))
}

/// Publish a seed for the other process
pub fn write_seed_file(path: &Path, seed: i32) -> Result<()> {
    fs::write(path, format!("{}\n", seed))
        .with_context(|| format!("Failed to write seed file: {:?}", path))
}

/// Nonzero seed derived from the wall clock
pub fn clock_seed() -> i32 {
    match chrono::Utc::now().timestamp() as i32 {
        0 => 1,
        seed => seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [simulation]
            seed = 1234
            difficulty = 2

            [cluster]
            text_mode = true

            [controls]
            traffic_file = "traffic.log"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.simulation.seed, 1234);
        assert_eq!(config.simulation.difficulty, DifficultyLevel::RandomizeUnused);
        assert_eq!(config.simulation.poll_ms, 5);
        assert!(config.cluster.text_mode);
        assert_eq!(config.cluster.seed_file, PathBuf::from(DEFAULT_SEED_FILE));
        assert_eq!(config.controls.traffic_file, PathBuf::from("traffic.log"));
        assert!(config.controls.play_traffic);
    }

    #[test]
    fn test_invalid_difficulty_rejected() {
        let result: std::result::Result<AppConfig, _> =
            toml::from_str("[simulation]\ndifficulty = 5\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.simulation, SimConfig::default());
        assert!(!config.cluster.text_mode);
    }

    #[test]
    fn test_seed_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.txt");

        write_seed_file(&path, -42).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "-42\n");
        assert_eq!(read_seed_file(&path).unwrap(), -42);
    }

    #[test]
    fn test_bad_seed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a seed").unwrap();
        assert!(read_seed_file(file.path()).is_err());
    }

    #[test]
    fn test_resolve_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "777").unwrap();
        let base = SimConfig::new().with_seed(5);

        let from_file = resolve(
            &base,
            Overrides { seed_file: Some(file.path()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(from_file.seed, 777);

        let explicit = resolve(
            &base,
            Overrides {
                seed: Some(9),
                seed_file: Some(file.path()),
                difficulty: Some(1),
                poll_ms: Some(20),
            },
        )
        .unwrap();
        assert_eq!(explicit.seed, 9);
        assert_eq!(explicit.difficulty, DifficultyLevel::Pad);
        assert_eq!(explicit.poll_ms, 20);

        assert_eq!(resolve(&base, Overrides::default()).unwrap().seed, 5);
        assert!(resolve(&base, Overrides { difficulty: Some(3), ..Default::default() }).is_err());
        assert!(resolve(&base, Overrides { poll_ms: Some(0), ..Default::default() }).is_err());
        assert!(resolve(&base.clone().with_poll_interval(0), Overrides::default()).is_err());
    }

    #[test]
    fn test_clock_seed_nonzero() {
        assert_ne!(clock_seed(), 0);
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Path::new("/nonexistent/icsim.toml")).unwrap_err();
        assert!(err.to_string().contains("icsim.toml"));
    }
}
