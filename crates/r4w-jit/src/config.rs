//! # JIT Queue Configuration
//!
//! Every timing constant used by the queue lives in [`JitConfig`], loadable
//! from YAML.
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `R4W_JIT_CONFIG` environment variable
//! 2. `./r4w-jit.yaml` (current directory)
//! 3. `~/.config/r4w/jit.yaml` (user config)
//! 4. `/etc/r4w/jit.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! capacity: 32
//! beacons_in_queue: 3
//! beacon_period_us: 128000000
//! tx_start_delay_us: 1500
//! tx_margin_delay_us: 1000
//! tx_jit_delay_us: 30000
//! beacon_guard_us: 3000000
//! beacon_reserved_us: 2120000
//! asap_margin_us: 1000000
//!
//! logging:
//!   level: debug
//!   format: compact
//! ```
//!
//! ## Timing Model
//!
//! ```text
//!                 pre_delay                 post_delay
//!        |<------------------------>|<------------------------>|
//!  ------+---------+----------------+--------------------------+------
//!        |  guard  | start + jit    ^ count_us     time on air |
//!        (beacons only)
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::observe::LogConfig;
use crate::types::FrameClass;

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV: &str = "R4W_JIT_CONFIG";

/// Error type for configuration operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("config not found: {0}")]
    NotFound(String),

    #[error("failed to read config: {0}")]
    ReadError(String),

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// JIT queue timing and sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitConfig {
    /// Maximum number of frames held at once
    pub capacity: usize,
    /// Number of beacons kept pre-scheduled in the queue
    pub beacons_in_queue: u32,
    /// Beacon period (128 s for LoRaWAN class B)
    pub beacon_period_us: u32,
    /// Time the radio needs to start a TX once programmed
    pub tx_start_delay_us: u32,
    /// Overlap margin between two windows
    pub tx_margin_delay_us: u32,
    /// How early a frame is handed to the radio before its timestamp
    pub tx_jit_delay_us: u32,
    /// Interval before a beacon where no ping slot may be placed
    pub beacon_guard_us: u32,
    /// Beacon time on air, with some margin
    pub beacon_reserved_us: u32,
    /// Offset from "now" at which an immediate downlink is first tried
    pub asap_margin_us: u32,
    /// Logging configuration
    pub logging: LogConfig,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            capacity: 32,
            beacons_in_queue: 3,
            beacon_period_us: 128_000_000,
            tx_start_delay_us: 1_500,
            tx_margin_delay_us: 1_000,
            tx_jit_delay_us: 30_000,
            beacon_guard_us: 3_000_000,
            beacon_reserved_us: 2_120_000,
            asap_margin_us: 1_000_000,
            logging: LogConfig::default(),
        }
    }
}

impl JitConfig {
    /// Furthest ahead of "now" a timestamped downlink may be queued.
    ///
    /// Also the staleness bound used by peek: an entry whose forward distance
    /// reaches it has already been missed.
    pub fn max_advance_delay_us(&self) -> u32 {
        let delay = (self.beacons_in_queue as u64 + 1) * self.beacon_period_us as u64;
        delay.min(u32::MAX as u64) as u32
    }

    /// Reserved time before the TX timestamp of a newly queued frame.
    pub fn pre_delay_us(&self, class: FrameClass) -> u32 {
        match class {
            FrameClass::DownlinkA | FrameClass::DownlinkB | FrameClass::DownlinkC => {
                self.tx_start_delay_us.wrapping_add(self.tx_jit_delay_us)
            }
            FrameClass::Beacon => self
                .tx_start_delay_us
                .wrapping_add(self.beacon_guard_us)
                .wrapping_add(self.tx_jit_delay_us),
        }
    }

    /// A frame closer to "now" than this is rejected as too late.
    pub fn too_late_threshold_us(&self) -> u32 {
        self.tx_start_delay_us
            .wrapping_add(self.tx_margin_delay_us)
            .wrapping_add(self.tx_jit_delay_us)
    }

    /// Load configuration from the default search path.
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if Path::new(&path).exists() {
                return Self::load_from(Path::new(&path));
            }
        }

        for path in &Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Get configuration search paths.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./r4w-jit.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "r4w") {
            paths.push(dirs.config_dir().join("jit.yaml"));
        }

        paths.push(PathBuf::from("/etc/r4w/jit.yaml"));

        paths
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 || self.capacity > u8::MAX as usize {
            return Err(ConfigError::ValidationError(
                "capacity must be 1-255".to_string(),
            ));
        }

        if self.beacon_period_us == 0 {
            return Err(ConfigError::ValidationError(
                "beacon_period_us must be > 0".to_string(),
            ));
        }

        // wrapping comparisons only order instants less than half the counter apart
        let half_range = u32::MAX as u64 / 2;
        let advance = (self.beacons_in_queue as u64 + 1) * self.beacon_period_us as u64;
        if advance > half_range {
            return Err(ConfigError::ValidationError(format!(
                "(beacons_in_queue + 1) * beacon_period_us = {} exceeds {} us",
                advance, half_range
            )));
        }

        let beacon_window = self.tx_start_delay_us as u64
            + self.beacon_guard_us as u64
            + self.tx_jit_delay_us as u64
            + self.beacon_reserved_us as u64
            + self.tx_margin_delay_us as u64;
        if beacon_window >= advance {
            return Err(ConfigError::ValidationError(
                "beacon window does not fit in the advance window".to_string(),
            ));
        }

        if self.asap_margin_us as u64 >= advance {
            return Err(ConfigError::ValidationError(
                "asap_margin_us must be below the advance window".to_string(),
            ));
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        serde_yaml::to_string(&Self::default()).unwrap_or_default()
    }
}
