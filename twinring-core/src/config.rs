// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Describes a ping/pong channel: two named queues, one per direction, and
//! the parameters of the round-trip run. Any invalid field results in a
//! HardValidationError before a region is touched.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HardValidationError, TwinRingError, TwinRingResult};
use crate::shm::page_size;
use crate::types::RegionName;

/// Largest accepted ring capacity, in pages.
const MAX_CAPACITY_PAGES: usize = 65536;

/// Raw channel configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawChannelConfig {
    #[serde(default = "default_ping")]
    ping: String,
    #[serde(default = "default_pong")]
    pong: String,
    #[serde(default = "default_capacity_pages")]
    capacity_pages: usize,
    #[serde(default = "default_sync")]
    sync: bool,
}

fn default_ping() -> String {
    "/twinring.ping".to_string()
}

fn default_pong() -> String {
    "/twinring.pong".to_string()
}

fn default_capacity_pages() -> usize {
    10
}

fn default_sync() -> bool {
    true
}

impl Default for RawChannelConfig {
    fn default() -> Self {
        Self {
            ping: default_ping(),
            pong: default_pong(),
            capacity_pages: default_capacity_pages(),
            sync: default_sync(),
        }
    }
}

/// Raw round-trip configuration.
#[derive(Debug, Deserialize)]
struct RawPingPongConfig {
    #[serde(default = "default_iterations")]
    iterations: u64,
    #[serde(default = "default_attach_attempts")]
    attach_attempts: u32,
    #[serde(default = "default_attach_interval_ms")]
    attach_interval_ms: u64,
}

fn default_iterations() -> u64 {
    1_000_000
}

fn default_attach_attempts() -> u32 {
    10
}

fn default_attach_interval_ms() -> u64 {
    1000
}

impl Default for RawPingPongConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            attach_attempts: default_attach_attempts(),
            attach_interval_ms: default_attach_interval_ms(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    channel: RawChannelConfig,
    #[serde(default)]
    pingpong: RawPingPongConfig,
}

/// Validated channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Region the ping side writes and the pong side reads.
    pub ping: RegionName,
    /// Region the pong side writes and the ping side reads.
    pub pong: RegionName,
    /// Ring capacity in bytes (a multiple of the page size).
    pub capacity: usize,
    pub sync: bool,
}

/// Validated round-trip configuration.
#[derive(Debug, Clone)]
pub struct PingPongConfig {
    pub iterations: u64,
    pub attach_attempts: u32,
    pub attach_interval: Duration,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub channel: ChannelConfig,
    pub pingpong: PingPongConfig,
}

impl Default for Config {
    fn default() -> Self {
        // The defaults are valid by construction.
        match ConfigLoader::validate(RawConfig::default()) {
            Ok(config) => config,
            Err(e) => panic!("default configuration is invalid: {}", e),
        }
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> TwinRingResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(TwinRingError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| TwinRingError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> TwinRingResult<Config> {
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| TwinRingError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> TwinRingResult<Config> {
        let channel = Self::validate_channel(raw.channel)?;
        let pingpong = Self::validate_pingpong(raw.pingpong)?;
        Ok(Config { channel, pingpong })
    }

    fn validate_channel(raw: RawChannelConfig) -> TwinRingResult<ChannelConfig> {
        let ping = RegionName::new(raw.ping)?;
        let pong = RegionName::new(raw.pong)?;

        if ping == pong {
            return Err(HardValidationError::InvalidFieldValue {
                field: "pong",
                value: pong.to_string(),
                reason: "Ping and pong regions must have different names".to_string(),
            }
            .into());
        }

        if raw.capacity_pages == 0 || raw.capacity_pages > MAX_CAPACITY_PAGES {
            return Err(HardValidationError::InvalidFieldValue {
                field: "capacity_pages",
                value: raw.capacity_pages.to_string(),
                reason: format!("Must be between 1 and {} pages", MAX_CAPACITY_PAGES),
            }
            .into());
        }

        Ok(ChannelConfig {
            ping,
            pong,
            capacity: raw.capacity_pages * page_size(),
            sync: raw.sync,
        })
    }

    fn validate_pingpong(raw: RawPingPongConfig) -> TwinRingResult<PingPongConfig> {
        if raw.iterations == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "iterations",
                value: "0".to_string(),
                reason: "At least one message must be exchanged".to_string(),
            }
            .into());
        }

        if raw.attach_attempts == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "attach_attempts",
                value: "0".to_string(),
                reason: "At least one attach attempt is required".to_string(),
            }
            .into());
        }

        if raw.attach_interval_ms == 0 || raw.attach_interval_ms > 60_000 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "attach_interval_ms",
                value: raw.attach_interval_ms.to_string(),
                reason: "Must be between 1 and 60000ms".to_string(),
            }
            .into());
        }

        Ok(PingPongConfig {
            iterations: raw.iterations,
            attach_attempts: raw.attach_attempts,
            attach_interval: Duration::from_millis(raw.attach_interval_ms),
        })
    }
}
