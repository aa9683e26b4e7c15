//! Transport layer for telemetry delivery
//!
//! This module provides the transport abstraction and its MQTT implementation.
//! The trait seam exists so the publish loop can be exercised against a mock
//! transport without a broker.

use thiserror::Error;
use tokio::sync::oneshot;

pub mod mqtt;

/// Delivery guarantee level for a published message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosLevel {
    /// Fire-and-forget; no broker acknowledgment
    AtMostOnce,
    /// Broker acknowledges delivery; may duplicate
    AtLeastOnce,
}

/// A single message submission, immutable once constructed.
/// Created by the publisher, consumed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub topic: String,
    pub payload: String,
    pub qos: QosLevel,
    pub retained: bool,
}

/// Why a publish submission failed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PublishError {
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: mqtt::ConnectionState },
    #[error("Broker rejected publish: {0}")]
    Rejected(String),
    #[error("Acknowledgment channel closed before resolution")]
    AckDropped,
}

/// Handle to the eventual outcome of a publish submission.
///
/// `publish` returns promptly regardless of network state; awaiting the
/// handle yields the submission result. Callers that do not care simply drop
/// it; the typical pattern is a detached task that awaits and logs failures
/// so the tick loop never stalls on a slow broker.
#[derive(Debug)]
pub struct PendingAck {
    rx: oneshot::Receiver<Result<(), PublishError>>,
}

impl PendingAck {
    /// Create an unresolved ack and the sender half that resolves it.
    pub fn channel() -> (AckHandle, PendingAck) {
        let (tx, rx) = oneshot::channel();
        (AckHandle { tx }, PendingAck { rx })
    }

    /// Create an ack that is already resolved with `result`.
    pub fn resolved(result: Result<(), PublishError>) -> Self {
        let (handle, pending) = Self::channel();
        handle.resolve(result);
        pending
    }

    /// Wait for the submission outcome.
    pub async fn wait(self) -> Result<(), PublishError> {
        self.rx.await.unwrap_or(Err(PublishError::AckDropped))
    }
}

/// Sender half of a [`PendingAck`]
#[derive(Debug)]
pub struct AckHandle {
    tx: oneshot::Sender<Result<(), PublishError>>,
}

impl AckHandle {
    /// Resolve the paired ack. Dropping the handle unresolved surfaces as
    /// [`PublishError::AckDropped`] on the waiting side.
    pub fn resolve(self, result: Result<(), PublishError>) {
        let _ = self.tx.send(result);
    }
}

/// Transport trait for telemetry delivery
///
/// This trait provides an abstraction over the broker connection to enable
/// dependency injection and testing. The implementation owns the single
/// logical broker connection; no other component holds connection state.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connect to the broker. The initial attempt failing is fatal; once
    /// connected the transport reconnects autonomously on network loss.
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Release the connection; idempotent, safe during or after shutdown.
    async fn disconnect(&self) -> Result<(), Self::Error>;

    /// Submit a message asynchronously. Must return promptly regardless of
    /// network state and never block on a broker round-trip. Ordering across
    /// publishes is not guaranteed.
    fn publish(&self, request: PublishRequest) -> PendingAck;

    /// Check if transport is currently connected
    fn is_connected(&self) -> bool;

    /// Get current connection state (None before `connect` is called)
    fn connection_state(&self) -> Option<mqtt::ConnectionState>;
}
