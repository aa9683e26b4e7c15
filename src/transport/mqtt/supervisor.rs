//! Pure supervision logic for the MQTT connection
//!
//! Reconnection decisions, state transitions, and event routing live here as
//! functions with no I/O so the policy can be tested without a broker.

use super::connection::{ConnectionState, ReconnectConfig};
use rumqttc::v5::Event;

/// Pure reconnection and state-transition decision logic
pub struct ConnectionSupervisor;

impl ConnectionSupervisor {
    /// Decide whether to attempt another reconnection.
    /// Retries are unbounded; only a shutdown request stops the supervisor.
    pub fn should_attempt_reconnection(
        current_attempts: u32,
        config: &ReconnectConfig,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }

        let backoff_delay = config.calculate_backoff_delay(current_attempts + 1);
        ReconnectionDecision::Proceed {
            attempt: current_attempts + 1,
            delay_ms: backoff_delay,
        }
    }

    /// Next connection state after an event.
    ///
    /// Keeps the state machine moving only along its legal edges: a ConnAck
    /// always lands in Connected, network loss while running lands in
    /// Reconnecting, and only an explicit release lands in Disconnected.
    pub fn next_state(event: ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::ConnectStarted => ConnectionState::Connecting,
            ConnectionEvent::ConnAckReceived => ConnectionState::Connected,
            ConnectionEvent::ReconnectionStarted(attempt) => ConnectionState::Reconnecting(attempt),
            ConnectionEvent::ClientReleased(reason) => ConnectionState::Disconnected(reason),
        }
    }

    /// Check if the connection state allows publishing
    pub fn can_publish(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }

    /// Route a rumqttc event to a supervision decision.
    /// The publisher subscribes to nothing, so inbound publishes and
    /// subscription acks are infrastructure noise here.
    pub fn route_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => {
                use rumqttc::v5::mqttbytes::v5::Packet;
                match incoming {
                    Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                    Packet::Disconnect(_) => EventRoute::Disconnected,
                    other => EventRoute::Infrastructure(format!("{other:?}")),
                }
            }
            Event::Outgoing(_) => EventRoute::Outgoing,
        }
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq, Eq)]
pub enum ReconnectionDecision {
    /// Proceed with reconnection attempt
    Proceed { attempt: u32, delay_ms: u64 },
    /// Abort reconnection - shutdown requested
    AbortShutdownRequested,
}

/// Connection events that drive state transitions
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Initial connect attempt started
    ConnectStarted,
    /// ConnAck received from broker
    ConnAckReceived,
    /// Reconnection attempt started after network loss
    ReconnectionStarted(u32),
    /// Client released the connection
    ClientReleased(String),
}

/// Routing decisions for rumqttc events
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish
    ConnectionAcknowledged,
    /// Broker disconnected us
    Disconnected,
    /// Infrastructure event (PingResp, outgoing acks, etc.)
    Infrastructure(String),
    /// Outgoing packet (handled automatically)
    Outgoing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnection_follows_backoff_pattern() {
        let config = ReconnectConfig::default();

        let decision = ConnectionSupervisor::should_attempt_reconnection(0, &config, false);
        assert_eq!(
            decision,
            ReconnectionDecision::Proceed {
                attempt: 1,
                delay_ms: 25
            }
        );

        let decision = ConnectionSupervisor::should_attempt_reconnection(2, &config, false);
        assert_eq!(
            decision,
            ReconnectionDecision::Proceed {
                attempt: 3,
                delay_ms: 100
            }
        );

        // Sustained delay once the pattern is exhausted
        let decision = ConnectionSupervisor::should_attempt_reconnection(7, &config, false);
        assert_eq!(
            decision,
            ReconnectionDecision::Proceed {
                attempt: 8,
                delay_ms: 250
            }
        );
    }

    #[test]
    fn test_reconnection_is_unbounded() {
        let config = ReconnectConfig::default();
        // No attempt count aborts the supervisor
        for attempts in [10u32, 1_000, 1_000_000] {
            let decision =
                ConnectionSupervisor::should_attempt_reconnection(attempts, &config, false);
            assert!(matches!(decision, ReconnectionDecision::Proceed { .. }));
        }
    }

    #[test]
    fn test_shutdown_aborts_reconnection() {
        let config = ReconnectConfig::default();
        let decision = ConnectionSupervisor::should_attempt_reconnection(0, &config, true);
        assert_eq!(decision, ReconnectionDecision::AbortShutdownRequested);
    }

    #[test]
    fn test_state_transitions_follow_legal_edges() {
        // Disconnected -> Connecting -> Connected
        assert_eq!(
            ConnectionSupervisor::next_state(ConnectionEvent::ConnectStarted),
            ConnectionState::Connecting
        );
        assert_eq!(
            ConnectionSupervisor::next_state(ConnectionEvent::ConnAckReceived),
            ConnectionState::Connected
        );

        // Connected -> Reconnecting -> Connected
        assert_eq!(
            ConnectionSupervisor::next_state(ConnectionEvent::ReconnectionStarted(1)),
            ConnectionState::Reconnecting(1)
        );
        assert_eq!(
            ConnectionSupervisor::next_state(ConnectionEvent::ConnAckReceived),
            ConnectionState::Connected
        );

        // any -> Disconnected on release
        assert_eq!(
            ConnectionSupervisor::next_state(ConnectionEvent::ClientReleased(
                "client disconnect".to_string()
            )),
            ConnectionState::Disconnected("client disconnect".to_string())
        );
    }

    #[test]
    fn test_route_event_maps_broker_packets() {
        use rumqttc::v5::mqttbytes::v5::{
            ConnAck, ConnectReturnCode, Disconnect, DisconnectReasonCode, Packet, PingResp,
        };
        use rumqttc::Outgoing;

        let connack = Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
            properties: None,
        }));
        assert!(matches!(
            ConnectionSupervisor::route_event(&connack),
            EventRoute::ConnectionAcknowledged
        ));

        let disconnect = Event::Incoming(Packet::Disconnect(Disconnect {
            reason_code: DisconnectReasonCode::NormalDisconnection,
            properties: None,
        }));
        assert!(matches!(
            ConnectionSupervisor::route_event(&disconnect),
            EventRoute::Disconnected
        ));

        let ping = Event::Incoming(Packet::PingResp(PingResp));
        assert!(matches!(
            ConnectionSupervisor::route_event(&ping),
            EventRoute::Infrastructure(_)
        ));

        let outgoing = Event::Outgoing(Outgoing::Publish(1));
        assert!(matches!(
            ConnectionSupervisor::route_event(&outgoing),
            EventRoute::Outgoing
        ));
    }

    #[test]
    fn test_connack_after_reconnection_resumes_publishing() {
        use rumqttc::v5::mqttbytes::v5::{ConnAck, ConnectReturnCode, Packet};

        // Network loss suspends publishing
        let state = ConnectionSupervisor::next_state(ConnectionEvent::ReconnectionStarted(2));
        assert!(!ConnectionSupervisor::can_publish(&state));

        // A fresh ConnAck routes to acknowledgment and lands back in
        // Connected, where publishing resumes
        let connack = Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
            properties: None,
        }));
        assert!(matches!(
            ConnectionSupervisor::route_event(&connack),
            EventRoute::ConnectionAcknowledged
        ));
        let state = ConnectionSupervisor::next_state(ConnectionEvent::ConnAckReceived);
        assert!(ConnectionSupervisor::can_publish(&state));
    }

    #[test]
    fn test_can_publish_only_when_connected() {
        assert!(ConnectionSupervisor::can_publish(
            &ConnectionState::Connected
        ));
        assert!(!ConnectionSupervisor::can_publish(
            &ConnectionState::Connecting
        ));
        assert!(!ConnectionSupervisor::can_publish(
            &ConnectionState::Reconnecting(1)
        ));
        assert!(!ConnectionSupervisor::can_publish(
            &ConnectionState::Disconnected("released".to_string())
        ));
    }
}
