use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_DIR: &str = "joypoll";
const SETTINGS_FILE: &str = "settings.toml";

/// Poll loop settings
///
/// Read once at startup; nothing is ever written back.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PollSettings {
    /// Delay between two drains of the hardware queue
    pub update_interval_ms: u64,

    /// Delay before the very first drain so device enumeration can settle
    pub warmup_delay_ms: u64,

    /// Max level for the log subscriber (`trace`, `debug`, `info`, ...)
    pub log_level: String,

    /// Capacity of each subscriber's event buffer
    pub bus_capacity: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            update_interval_ms: 50,
            warmup_delay_ms: 500,
            log_level: "info".to_string(),
            bus_capacity: 1024,
        }
    }
}

impl PollSettings {
    /// Change the steady-state interval. Negative values leave the current
    /// interval in place.
    pub fn set_update_interval_ms(&mut self, interval_ms: i64) -> bool {
        match u64::try_from(interval_ms) {
            Ok(ms) => {
                self.update_interval_ms = ms;
                true
            }
            Err(_) => {
                debug!(
                    "Ignoring negative update interval {}ms, keeping {}ms",
                    interval_ms, self.update_interval_ms
                );
                false
            }
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse settings: {}", e))
    }

    /// Load settings from `path`, or defaults if the file does not exist.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if settings file exists: {}", e))?
        {
            info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read settings file: {}", e))?;
        let settings = Self::from_toml_str(&content)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load from the platform config directory (`~/.config/joypoll` on Linux).
    pub async fn load() -> Result<Self> {
        match settings_path() {
            Some(path) => Self::load_from(&path).await,
            None => {
                info!("No config directory available, using default settings");
                Ok(Self::default())
            }
        }
    }
}

pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(CONFIG_DIR);
        path.push(SETTINGS_FILE);
        path
    })
}
