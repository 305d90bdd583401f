// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration for the inspection engine daemon.
//!
//! Loaded from the `[eol-engine]` section of `eol-rs.toml`, searched in the
//! usual places (CWD → XDG config → /etc) unless `--config` points at a
//! specific file. CLI arguments override config file values.

use serde::{Deserialize, Serialize};

use eol_app::ConfigFile;
use eol_core::device::{Device, DeviceType, LinkAccess};
use eol_core::measure::{Limit, LimitDirection};
use eol_core::session::{ModelSpec, PhaseSpec};

/// Top-level `[eol-engine]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub general: GeneralConfig,
    pub stream: StreamConfig,
    pub command: CommandConfig,
    pub safety: SafetyConfig,
    pub devices: Vec<DeviceConfig>,
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
    /// Model selected when the CLI does not name one
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Push stream endpoint
    pub addr: String,
    /// Connect attempts before the subscription is reported dead
    pub connect_attempts: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8760".to_string(),
            connect_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Command channel endpoint
    pub addr: String,
    /// Per-exchange I/O timeout in seconds
    pub io_timeout_secs: f64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8761".to_string(),
            io_timeout_secs: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Budget for one tester command/response round trip, in seconds
    pub round_trip_timeout_secs: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            round_trip_timeout_secs: 5.0,
        }
    }
}

/// One registered bench device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    pub device_type: DeviceType,
    /// Serial port path, or host:port when `tcp` is set
    pub port: String,
    #[serde(default)]
    pub baud: Option<u32>,
    #[serde(default)]
    pub tcp: bool,
}

impl DeviceConfig {
    pub fn to_device(&self) -> Device {
        let access = if self.tcp {
            LinkAccess::Tcp {
                addr: self.port.clone(),
            }
        } else {
            LinkAccess::Serial {
                path: self.port.clone(),
                baud: self.baud.unwrap_or(9600),
            }
        };
        Device::new(self.id.clone(), self.device_type, access)
    }
}

/// One product model with its ordered phase limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub phases: Vec<PhaseConfig>,
    #[serde(default = "default_measurement_duration")]
    pub measurement_duration: f64,
    #[serde(default = "default_wait_duration")]
    pub wait_duration: f64,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: f64,
}

fn default_measurement_duration() -> f64 {
    5.0
}

fn default_wait_duration() -> f64 {
    2.0
}

fn default_interval_seconds() -> f64 {
    0.1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub name: String,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
    #[serde(default = "default_direction")]
    pub direction: LimitDirection,
}

fn default_direction() -> LimitDirection {
    LimitDirection::InRange
}

impl ModelConfig {
    pub fn to_spec(&self) -> ModelSpec {
        ModelSpec {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            phases: self
                .phases
                .iter()
                .map(|p| PhaseSpec {
                    name: p.name.clone(),
                    limit: Limit {
                        lower: p.lower,
                        upper: p.upper,
                        direction: p.direction,
                    },
                })
                .collect(),
            measurement_duration: self.measurement_duration,
            wait_duration: self.wait_duration,
            interval_seconds: self.interval_seconds,
        }
    }
}

impl ConfigFile for EngineConfig {
    fn section_key() -> &'static str {
        "eol-engine"
    }
}
