//! Pure connection state management for the MQTT client
//!
//! This module contains the connection state machine types, the lifecycle
//! observer seam, reconnection policy configuration, and MQTT options
//! construction from config.

use crate::config::MqttSection;
use rumqttc::v5::MqttOptions;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Connection state for the MQTT client
///
/// Owned exclusively by the client; transitions are driven by broker events,
/// never set externally. Legal transitions:
/// Disconnected -> Connecting -> Connected,
/// Connected -> Reconnecting -> Connected,
/// any -> Disconnected when the client releases the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; reason for the last release
    Disconnected(String),
    /// Initial connect attempt in flight
    Connecting,
    /// Successfully connected and ready to publish
    Connected,
    /// Network lost; attempting to reconnect (attempt count)
    Reconnecting(u32),
}

/// Observer for connection lifecycle transitions.
///
/// Decouples logging (or any other side effect) from the transport
/// implementation. Observers are invoked inline by the connection supervisor
/// and must not block.
pub trait ConnectionObserver: Send + Sync {
    fn on_state_change(&self, state: &ConnectionState);
}

/// Default observer: human-readable status lines for each transition.
#[derive(Debug, Default)]
pub struct LogObserver;

impl ConnectionObserver for LogObserver {
    fn on_state_change(&self, state: &ConnectionState) {
        match state {
            ConnectionState::Connecting => info!("connecting to broker"),
            ConnectionState::Connected => info!("connection established"),
            ConnectionState::Reconnecting(attempt) => {
                warn!(attempt, "connection lost, attempting to reconnect")
            }
            ConnectionState::Disconnected(reason) => info!(%reason, "disconnected"),
        }
    }
}

/// Reconnection policy
///
/// Retries are unbounded: a telemetry publisher is useless without its broker
/// and readings are disposable, so the supervisor keeps trying until shutdown.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Backoff delays in milliseconds, walked once per consecutive attempt
    pub backoff_pattern: Vec<u64>,
    /// Delay to use after the pattern is exhausted
    pub sustained_delay: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            backoff_pattern: vec![25, 50, 100, 250],
            sustained_delay: 250,
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay for the given attempt (1-based).
    /// Pattern: 25ms, 50ms, 100ms, 250ms, then sustain at 250ms forever.
    pub fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        if self.backoff_pattern.is_empty() {
            self.sustained_delay
        } else {
            let index = (attempt.saturating_sub(1)) as usize;
            if index < self.backoff_pattern.len() {
                self.backoff_pattern[index]
            } else {
                self.sustained_delay
            }
        }
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("No connection confirmation within {0:?}")]
    ConnectTimeout(Duration),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Client already connected")]
    AlreadyConnected,
}

/// Build rumqttc options from config.
/// Shared between the initial connection and every reconnection attempt.
pub fn configure_mqtt_options(
    client_id: &str,
    config: &MqttSection,
) -> Result<MqttOptions, MqttError> {
    let url = Url::parse(&config.broker_url)
        .map_err(|_| MqttError::InvalidBrokerUrl(config.broker_url.clone()))?;

    match url.scheme() {
        // tcp:// is the conventional plain-MQTT spelling in broker docs
        "mqtt" | "tcp" | "mqtts" => {}
        other => {
            return Err(MqttError::InvalidBrokerUrl(format!(
                "unsupported scheme '{other}' in {}",
                config.broker_url
            )))
        }
    }

    let host = url
        .host_str()
        .ok_or_else(|| MqttError::InvalidBrokerUrl(config.broker_url.clone()))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

    let mut mqtt_options = MqttOptions::new(client_id, host, port);

    // Short keep-alive so network outages are detected quickly
    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    if let Some(username_env) = &config.username_env {
        if let Ok(username) = std::env::var(username_env) {
            let password = config
                .password_env
                .as_ref()
                .and_then(|env_name| std::env::var(env_name).ok())
                .unwrap_or_default();
            mqtt_options.set_credentials(&username, &password);
        }
    }

    Ok(mqtt_options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_mqtt_config() -> MqttSection {
        MqttSection {
            broker_url: "mqtt://localhost:1883".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_reconnect_config_default() {
        let config = ReconnectConfig::default();
        assert_eq!(config.backoff_pattern, vec![25, 50, 100, 250]);
        assert_eq!(config.sustained_delay, 250);
    }

    #[test]
    fn test_calculate_backoff_delay() {
        let config = ReconnectConfig::default();

        assert_eq!(config.calculate_backoff_delay(1), 25);
        assert_eq!(config.calculate_backoff_delay(2), 50);
        assert_eq!(config.calculate_backoff_delay(3), 100);
        assert_eq!(config.calculate_backoff_delay(4), 250);

        // Sustained delay after pattern exhausted
        assert_eq!(config.calculate_backoff_delay(5), 250);
        assert_eq!(config.calculate_backoff_delay(100), 250);
    }

    #[test]
    fn test_empty_pattern_falls_back_to_sustained_delay() {
        let config = ReconnectConfig {
            backoff_pattern: vec![],
            sustained_delay: 500,
        };
        assert_eq!(config.calculate_backoff_delay(1), 500);
        assert_eq!(config.calculate_backoff_delay(10), 500);
    }

    #[test]
    fn test_configure_mqtt_options() {
        let config = test_mqtt_config();
        assert!(configure_mqtt_options("Sensor1", &config).is_ok());
    }

    #[test]
    fn test_tcp_scheme_accepted() {
        let config = MqttSection {
            broker_url: "tcp://localhost:1883".to_string(),
            ..Default::default()
        };
        assert!(configure_mqtt_options("Sensor1", &config).is_ok());
    }

    #[test]
    fn test_invalid_broker_url() {
        let mut config = test_mqtt_config();
        config.broker_url = "not a url".to_string();
        let result = configure_mqtt_options("Sensor1", &config);
        assert!(matches!(result, Err(MqttError::InvalidBrokerUrl(_))));
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        let mut config = test_mqtt_config();
        config.broker_url = "http://localhost:1883".to_string();
        let result = configure_mqtt_options("Sensor1", &config);
        assert!(matches!(result, Err(MqttError::InvalidBrokerUrl(_))));
    }

    #[test]
    fn test_connection_state_equality() {
        assert_eq!(ConnectionState::Connected, ConnectionState::Connected);
        assert_eq!(
            ConnectionState::Reconnecting(2),
            ConnectionState::Reconnecting(2)
        );
        assert_ne!(
            ConnectionState::Connected,
            ConnectionState::Disconnected("released".to_string())
        );
    }

    #[test]
    fn test_log_observer_does_not_panic() {
        let observer = LogObserver;
        observer.on_state_change(&ConnectionState::Connecting);
        observer.on_state_change(&ConnectionState::Connected);
        observer.on_state_change(&ConnectionState::Reconnecting(3));
        observer.on_state_change(&ConnectionState::Disconnected("shutdown".to_string()));
    }
}
