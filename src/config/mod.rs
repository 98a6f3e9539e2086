//! # Configuration Management Module
//!
//! Loads and writes the TOML configuration used by the `btserial` binary.
//!
//! ## Configuration Structure
//!
//! - [`BluetoothConfig`] - service UUID, legacy channel and serial link settings
//! - [`PeerConfig`] - one entry per paired device the tool may send to
//! - [`SummaryConfig`] - width of the one-line descriptor summaries
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use btserial::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("btserial.toml").await?;
//!     let config = Config::load("btserial.toml").await?;
//!     for peer in &config.peers {
//!         println!("{} ({})", peer.name, peer.address);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bluetooth]
//! service_uuid = "00001101-0000-1000-8000-00805f9b34fb"
//! legacy_channel = 1
//! baud_rate = 9600
//!
//! [[peers]]
//! address = "00:11:22:AA:BB:CC"
//! name = "HC-05"
//! port = "/dev/rfcomm0"
//!
//! [summary]
//! max_length = 60   # at least 7
//!
//! [logging]
//! level = "info"
//! file = "btserial.log"
//! ```
//!
//! Peers are the paired-device snapshot handed to the connection negotiator;
//! addresses are matched exactly as written here, including letter case.

use crate::bluetooth::{Peer, PeerSource, LEGACY_CHANNEL, SERIAL_PORT_SERVICE_UUID};
use crate::descriptor::{DEFAULT_SUMMARY_LENGTH, MIN_SUMMARY_LENGTH};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::io;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bluetooth: BluetoothConfig,
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
    #[serde(default)]
    pub summary: SummaryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BluetoothConfig {
    /// Service class UUID looked up by the secure and insecure tiers.
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    /// RFCOMM channel for the legacy tier.
    #[serde(default = "default_legacy_channel")]
    pub legacy_channel: u8,
    /// Line speed for SPP links exposed as serial devices. Most SPP bridges ignore it.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Read/write timeout applied to an opened serial link (ms).
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
}

fn default_service_uuid() -> String {
    SERIAL_PORT_SERVICE_UUID.to_string()
}

fn default_legacy_channel() -> u8 {
    LEGACY_CHANNEL
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_io_timeout_ms() -> u64 {
    1000
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            service_uuid: default_service_uuid(),
            legacy_channel: default_legacy_channel(),
            baud_rate: default_baud_rate(),
            io_timeout_ms: default_io_timeout_ms(),
        }
    }
}

impl BluetoothConfig {
    pub fn service_uuid(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.service_uuid)
            .map_err(|e| anyhow!("Invalid service_uuid '{}': {}", self.service_uuid, e))
    }
}

/// A paired device and the serial devices its SPP link is exposed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub address: String,
    pub name: String,
    /// Device used by the secure tier (e.g. `/dev/rfcomm0`, `COM5`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_port: Option<String>,
}

impl PeerConfig {
    pub fn peer(&self) -> Peer {
        Peer::new(self.address.clone(), self.name.clone())
    }
}

impl PeerSource for Vec<PeerConfig> {
    fn paired_peers(&self) -> io::Result<Vec<Peer>> {
        Ok(self.iter().map(PeerConfig::peer).collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Widest summary line in chars. At least `MIN_SUMMARY_LENGTH` (7), the
    /// room needed for `...` plus the escaped CR/LF marker.
    pub max_length: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_SUMMARY_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.bluetooth.service_uuid()?;
        if config.summary.max_length < MIN_SUMMARY_LENGTH {
            return Err(anyhow!(
                "Invalid summary.max_length {} in {}: must be at least {}",
                config.summary.max_length,
                path,
                MIN_SUMMARY_LENGTH
            ));
        }
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn find_peer(&self, address: &str) -> Option<&PeerConfig> {
        self.peers.iter().find(|p| p.address == address)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bluetooth: BluetoothConfig::default(),
            peers: vec![PeerConfig {
                address: "00:11:22:AA:BB:CC".to_string(),
                name: "HC-05".to_string(),
                port: Some("/dev/rfcomm0".to_string()),
                insecure_port: None,
                legacy_port: None,
            }],
            summary: SummaryConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("btserial.log".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bluetooth_config() {
        let config = BluetoothConfig::default();
        assert_eq!(config.service_uuid().unwrap(), SERIAL_PORT_SERVICE_UUID);
        assert_eq!(config.legacy_channel, 1);
        assert_eq!(config.baud_rate, 9600);
    }

    #[test]
    fn test_invalid_service_uuid() {
        let config = BluetoothConfig {
            service_uuid: "not-a-uuid".to_string(),
            ..BluetoothConfig::default()
        };
        assert!(config.service_uuid().is_err());
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let toml_src = r#"
            [bluetooth]

            [[peers]]
            address = "00-11-22-aa-bb-cc"
            name = "Bench"

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.bluetooth.legacy_channel, 1);
        assert_eq!(config.summary.max_length, 60);
        assert_eq!(config.peers.len(), 1);
        assert_eq!(config.peers[0].port, None);
        assert!(config.logging.file.is_none());
        assert!(config.find_peer("00-11-22-aa-bb-cc").is_some());
        assert!(config.find_peer("00-11-22-AA-BB-CC").is_none());
    }

    #[test]
    fn test_peers_as_source() {
        let config = Config::default();
        let peers = config.peers.paired_peers().unwrap();
        assert_eq!(peers, vec![Peer::new("00:11:22:AA:BB:CC", "HC-05")]);
    }

    #[tokio::test]
    async fn test_default_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("btserial.toml");
        let path = path.to_str().unwrap();
        Config::create_default(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded.peers, Config::default().peers);
        assert_eq!(loaded.logging.file.as_deref(), Some("btserial.log"));
    }

    #[tokio::test]
    async fn test_load_rejects_bad_uuid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(
            &path,
            "[bluetooth]\nservice_uuid = \"xyz\"\n[logging]\nlevel = \"info\"\n",
        )
        .unwrap();
        assert!(Config::load(path.to_str().unwrap()).await.is_err());
    }

    #[tokio::test]
    async fn test_load_rejects_too_narrow_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narrow.toml");
        let write = |width: usize| {
            std::fs::write(
                &path,
                format!(
                    "[bluetooth]\n[summary]\nmax_length = {}\n[logging]\nlevel = \"info\"\n",
                    width
                ),
            )
            .unwrap();
        };

        write(6);
        let err = Config::load(path.to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("summary.max_length"));
        write(0);
        assert!(Config::load(path.to_str().unwrap()).await.is_err());

        write(MIN_SUMMARY_LENGTH);
        let config = Config::load(path.to_str().unwrap()).await.unwrap();
        assert_eq!(config.summary.max_length, 7);
    }
}
