//! Runtime configuration: Wi-Fi credentials, the NetSIO bridge endpoint, and
//! modem defaults, loaded once at startup (spec §4.5, §4.9 "modem defaults").

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::modem::at::PERMITTED_BAUD_RATES;

/// Modem defaults applied when a [`crate::modem::ModemDevice`] is
/// constructed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemDefaults {
    pub echo: bool,
    pub verbose: bool,
    pub baud: u32,
    pub listen_port: u16,
    pub auto_answer_rings: u8,
}

impl Default for ModemDefaults {
    fn default() -> Self {
        Self {
            echo: true,
            verbose: true,
            baud: 1200,
            listen_port: 6400,
            auto_answer_rings: 0,
        }
    }
}

/// Top-level FujiNet-NIO configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FujiConfig {
    /// Wi-Fi network name. Empty when unset (e.g. a wired/NetSIO-only
    /// deployment).
    #[serde(default)]
    pub wifi_ssid: String,
    /// Wi-Fi passphrase. Never logged.
    #[serde(default)]
    pub wifi_passphrase: String,
    /// Host the NetSIO transport connects/binds to.
    #[serde(default = "default_netsio_host")]
    pub netsio_host: String,
    /// Port the NetSIO transport connects/binds to.
    #[serde(default = "default_netsio_port")]
    pub netsio_port: u16,
    #[serde(default)]
    pub modem: ModemDefaults,
}

fn default_netsio_host() -> String {
    "0.0.0.0".to_string()
}

fn default_netsio_port() -> u16 {
    9997
}

impl Default for FujiConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_passphrase: String::new(),
            netsio_host: default_netsio_host(),
            netsio_port: default_netsio_port(),
            modem: ModemDefaults::default(),
        }
    }
}

impl FujiConfig {
    /// Reject settings that would never work rather than let them surface
    /// later as a confusing device-level failure.
    pub fn validate(&self) -> Result<()> {
        if !PERMITTED_BAUD_RATES.contains(&self.modem.baud) {
            return Err(Error::Config(format!("unsupported modem baud rate {}", self.modem.baud)));
        }
        Ok(())
    }
}

/// Typed load/save of a [`FujiConfig`] from some backing store.
pub trait ConfigStore {
    /// Load the stored config, or [`FujiConfig::default`] if none exists
    /// yet.
    fn load(&self) -> Result<FujiConfig>;

    /// Persist a config, replacing whatever was stored before.
    fn save(&self, config: &FujiConfig) -> Result<()>;
}

/// A [`ConfigStore`] backed by a single JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    path: PathBuf,
}

impl JsonFileConfigStore {
    /// Point the store at `path`; the file need not exist yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn load(&self) -> Result<FujiConfig> {
        if !self.path.exists() {
            return Ok(FujiConfig::default());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| Error::Config(format!("reading {}: {e}", self.path.display())))?;
        let config: FujiConfig = serde_json::from_str(&text).map_err(|e| Error::Config(format!("parsing {}: {e}", self.path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn save(&self, config: &FujiConfig) -> Result<()> {
        config.validate()?;
        let text = serde_json::to_string_pretty(config).map_err(|e| Error::Config(format!("serializing config: {e}")))?;
        fs::write(&self.path, text).map_err(|e| Error::Config(format!("writing {}: {e}", self.path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConfigStore::new(dir.path().join("fujinet.json"));
        let config = store.load().unwrap();
        assert_eq!(config, FujiConfig::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConfigStore::new(dir.path().join("fujinet.json"));
        let mut config = FujiConfig::default();
        config.wifi_ssid = "basement-lab".to_string();
        config.modem.baud = 2400;
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn invalid_baud_rate_is_rejected_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConfigStore::new(dir.path().join("fujinet.json"));
        let mut config = FujiConfig::default();
        config.modem.baud = 57600;
        assert!(store.save(&config).is_err());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fujinet.json");
        fs::write(&path, r#"{"wifi_ssid": "only-this"}"#).unwrap();
        let store = JsonFileConfigStore::new(path);
        let config = store.load().unwrap();
        assert_eq!(config.wifi_ssid, "only-this");
        assert_eq!(config.netsio_port, default_netsio_port());
    }
}
