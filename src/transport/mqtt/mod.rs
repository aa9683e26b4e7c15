//! MQTT transport implementation
//!
//! Split into pure and impure halves: `connection` and `supervisor` hold
//! state-machine and policy logic with no I/O, `client` performs the actual
//! network communication against rumqttc.

pub mod client;
pub mod connection;
pub mod supervisor;

pub use client::MqttClient;
pub use connection::{
    configure_mqtt_options, ConnectionObserver, ConnectionState, LogObserver, MqttError,
    ReconnectConfig,
};
pub use supervisor::{ConnectionEvent, ConnectionSupervisor, EventRoute, ReconnectionDecision};
