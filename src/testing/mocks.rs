//! Mock implementations for testing
//!
//! Provides a mock Transport that records publish attempts so the publish
//! loop and shutdown handshake can be exercised without a broker.

use crate::transport::mqtt::{ConnectionState, MqttError};
use crate::transport::{PendingAck, PublishError, PublishRequest, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Mock transport recording every publish attempt
#[derive(Debug, Default)]
pub struct MockTransport {
    published: Arc<Mutex<Vec<PublishRequest>>>,
    connected: AtomicBool,
    fail_connect: bool,
    fail_publishes: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that already reports Connected, for loop tests that skip
    /// the connect phase.
    pub fn connected() -> Self {
        let transport = Self::default();
        transport.connected.store(true, Ordering::SeqCst);
        transport
    }

    /// Make `connect` fail, simulating an unreachable broker at startup.
    pub fn with_failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Resolve every publish ack with an error while still recording the
    /// attempt, simulating per-message delivery failures.
    pub fn with_failing_publishes(mut self) -> Self {
        self.fail_publishes = true;
        self
    }

    /// Number of publish attempts submitted so far.
    pub fn publish_count(&self) -> usize {
        self.published.lock().expect("mock lock poisoned").len()
    }

    /// Snapshot of all recorded publish requests.
    pub fn published_requests(&self) -> Vec<PublishRequest> {
        self.published.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.fail_connect {
            Err(MqttError::ConnectionFailed(
                "mock connection failure".to_string(),
            ))
        } else {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn disconnect(&self) -> Result<(), Self::Error> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn publish(&self, request: PublishRequest) -> PendingAck {
        self.published
            .lock()
            .expect("mock lock poisoned")
            .push(request);

        if self.fail_publishes {
            PendingAck::resolved(Err(PublishError::Rejected(
                "mock publish failure".to_string(),
            )))
        } else {
            PendingAck::resolved(Ok(()))
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        if self.is_connected() {
            Some(ConnectionState::Connected)
        } else {
            Some(ConnectionState::Disconnected("mock".to_string()))
        }
    }
}
