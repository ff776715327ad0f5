use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::FramewatchError;
use crate::protocols::http::Infractions;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub inspect: InspectConfig,

    #[serde(default)]
    pub stream: StreamConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or create default
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/framewatch/config.toml"),
            dirs_next::config_dir()
                .map(|p| p.join("framewatch/config.toml"))
                .unwrap_or_default(),
            PathBuf::from("framewatch.toml"),
        ];

        for path in &paths {
            if path.is_file() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Check limits that serde alone cannot express
    pub fn validate(&self) -> crate::error::Result<()> {
        self.inspect.validate()?;
        for (name, tracker) in self.stream.trackers() {
            tracker.validate(name)?;
        }
        Ok(())
    }
}

/// HTTP inspection limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectConfig {
    /// Infractions that abort framing for the rest of the flow
    #[serde(default)]
    pub disaster_mask: Infractions,

    /// Largest body that may be merged into one detection block
    #[serde(default = "default_block_cap")]
    pub block_cap: u64,

    /// Largest header plus body section handed to detection
    #[serde(default = "default_section_cap")]
    pub section_cap: u64,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            disaster_mask: Infractions::empty(),
            block_cap: default_block_cap(),
            section_cap: default_section_cap(),
        }
    }
}

impl InspectConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if self.block_cap == 0 || self.section_cap == 0 || self.block_cap > self.section_cap {
            return Err(FramewatchError::InvalidLimits {
                block_cap: self.block_cap,
                section_cap: self.section_cap,
            });
        }
        Ok(())
    }
}

/// Session tracker limits per transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_tcp")]
    pub tcp: TrackerConfig,

    #[serde(default = "default_udp")]
    pub udp: TrackerConfig,

    #[serde(default = "default_icmp")]
    pub icmp: TrackerConfig,

    #[serde(default = "default_ip")]
    pub ip: TrackerConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tcp: default_tcp(),
            udp: default_udp(),
            icmp: default_icmp(),
            ip: default_ip(),
        }
    }
}

impl StreamConfig {
    pub fn trackers(&self) -> [(&'static str, &TrackerConfig); 4] {
        [
            ("tcp", &self.tcp),
            ("udp", &self.udp),
            ("icmp", &self.icmp),
            ("ip", &self.ip),
        ]
    }
}

/// Limits for one session tracker; `max_sessions = 0` disables it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub max_sessions: usize,

    /// Idle timeout in seconds
    #[serde(default = "default_session_timeout")]
    pub session_timeout: u64,
}

impl TrackerConfig {
    pub fn enabled(&self) -> bool {
        self.max_sessions > 0
    }

    fn validate(&self, protocol: &'static str) -> crate::error::Result<()> {
        if self.enabled() && self.session_timeout == 0 {
            return Err(FramewatchError::InvalidSessionLimit {
                protocol,
                reason: "session_timeout must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

fn default_block_cap() -> u64 {
    16384
}

fn default_section_cap() -> u64 {
    63780
}

fn default_session_timeout() -> u64 {
    30
}

fn default_tcp() -> TrackerConfig {
    TrackerConfig {
        max_sessions: 262144,
        session_timeout: 30,
    }
}

fn default_udp() -> TrackerConfig {
    TrackerConfig {
        max_sessions: 131072,
        session_timeout: 30,
    }
}

fn default_icmp() -> TrackerConfig {
    TrackerConfig {
        max_sessions: 65536,
        session_timeout: 30,
    }
}

fn default_ip() -> TrackerConfig {
    TrackerConfig {
        max_sessions: 16384,
        session_timeout: 30,
    }
}
