//! Configuration system for the telemetry publisher
//!
//! All process-wide constants (topics, QoS, intervals,
//! timeouts, broker address) live in an explicit configuration structure so
//! multiple sensor instances or brokers can be driven from files instead of
//! compiled-in constants. A configuration file is optional: the built-in
//! defaults reproduce the classic local-broker setup.

use crate::transport::QosLevel;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Main configuration structure for a publisher process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SensorPubConfig {
    #[serde(default)]
    pub sensor: SensorSection,
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub publish: PublishSection,
}

/// Sensor identity section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SensorSection {
    /// Fixed sensor name. When absent a random `Sensor<N>` identity is
    /// generated per process; collisions across instances are possible.
    pub name: Option<String>,
}

/// MQTT broker connection section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL with scheme and port (`mqtt://`, `tcp://` or `mqtts://`)
    #[serde(default = "default_broker_url")]
    pub broker_url: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Keep-alive heartbeat in seconds, short enough to detect outages quickly
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Bound on the initial connect attempt in milliseconds. The first
    /// attempt failing is fatal to the process.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            broker_url: default_broker_url(),
            username_env: None,
            password_env: None,
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Publish loop section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishSection {
    /// Topic driven by the publish loop
    #[serde(default = "default_temperature_topic")]
    pub temperature_topic: String,
    /// Humidity channel; configured but not driven by the loop
    #[serde(default = "default_humidity_topic")]
    pub humidity_topic: String,
    /// Interval between publish attempts in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// QoS for published readings: 0 (at most once) or 1 (at least once)
    #[serde(default)]
    pub qos: u8,
    /// Whether the broker should retain published readings
    #[serde(default)]
    pub retained: bool,
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            temperature_topic: default_temperature_topic(),
            humidity_topic: default_humidity_topic(),
            interval_ms: default_interval_ms(),
            qos: 0,
            retained: false,
        }
    }
}

impl PublishSection {
    /// Map the numeric config value onto the transport QoS level.
    /// Only valid after [`SensorPubConfig::validate`] has accepted the config.
    pub fn qos_level(&self) -> QosLevel {
        match self.qos {
            1 => QosLevel::AtLeastOnce,
            _ => QosLevel::AtMostOnce,
        }
    }
}

fn default_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_keep_alive_secs() -> u64 {
    10
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_temperature_topic() -> String {
    "/sensors/temp".to_string()
}

fn default_humidity_topic() -> String {
    "/sensors/hum".to_string()
}

fn default_interval_ms() -> u64 {
    1000
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SensorPubConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: SensorPubConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publish.interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "publish.interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.publish.qos > 1 {
            return Err(ConfigError::InvalidConfig(format!(
                "publish.qos must be 0 or 1, got {}",
                self.publish.qos
            )));
        }
        if !self.publish.temperature_topic.starts_with('/') {
            return Err(ConfigError::InvalidConfig(format!(
                "publish.temperature_topic must be an absolute topic path: {}",
                self.publish.temperature_topic
            )));
        }
        if !self.publish.humidity_topic.starts_with('/') {
            return Err(ConfigError::InvalidConfig(format!(
                "publish.humidity_topic must be an absolute topic path: {}",
                self.publish.humidity_topic
            )));
        }
        if self.mqtt.keep_alive_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.keep_alive_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Get MQTT username from environment variable
    pub fn get_mqtt_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get MQTT password from environment variable
    pub fn get_mqtt_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.password_env.as_ref())
    }

    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }
}
