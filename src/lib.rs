//! sensorpub - Resilient MQTT Sensor Telemetry Publisher
//!
//! A small daemon that periodically publishes simulated sensor readings to an
//! MQTT broker, keeps the connection alive across network outages, and shuts
//! down cleanly on SIGINT/SIGTERM.
//!
//! # Overview
//!
//! The crate is built from four cooperating pieces:
//! - MQTT transport layer with automatic, unbounded reconnection
//! - A periodic publisher loop that never blocks on broker acknowledgments
//! - A shutdown coordinator translating process signals into an orderly stop
//! - Simulated sensor reading sources (temperature and humidity)
//!
//! # Quick Start
//!
//! ```rust
//! use sensorpub::config::SensorPubConfig;
//! use sensorpub::sensor::{Sensor, SensorIdentity};
//!
//! // Built-in defaults target mqtt://localhost:1883 at a 1s cadence
//! let config = SensorPubConfig::default();
//! assert_eq!(config.mqtt.broker_url, "mqtt://localhost:1883");
//! assert_eq!(config.publish.temperature_topic, "/sensors/temp");
//!
//! // Sensors carry a process-local identity, e.g. "Sensor42"
//! let sensor = Sensor::new(SensorIdentity::Fixed("Sensor7".to_string()));
//! let reading = sensor.temperature();
//! assert!(reading.starts_with("Sensor7 temp: "));
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod publisher;
pub mod sensor;
pub mod shutdown;
pub mod testing;
pub mod transport;

pub use config::SensorPubConfig;
pub use error::{TelemetryError, TelemetryResult};
pub use publisher::{Publisher, PublisherHandle};
pub use sensor::{Sensor, SensorIdentity};
pub use shutdown::ShutdownCoordinator;
pub use transport::mqtt::MqttClient;
pub use transport::{PendingAck, PublishRequest, QosLevel, Transport};
