//! Shutdown coordination
//!
//! Translates an external termination request (SIGINT from an operator,
//! SIGTERM from an orchestrator) into an orderly stop: signal the publisher
//! loop, wait for it to acknowledge, and hand control back to the driver for
//! broker disconnect and process exit.

use crate::publisher::PublisherHandle;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::info;

/// Waits for a termination signal and drives the stop handshake.
///
/// Construct this before spawning the publisher so no signal window is
/// missed. Exactly one signal begins shutdown; duplicates are ignored.
pub struct ShutdownCoordinator {
    sigint: Signal,
    sigterm: Signal,
}

impl ShutdownCoordinator {
    /// Register for SIGINT and SIGTERM notifications.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Block until the first termination signal arrives.
    pub async fn wait_for_signal(&mut self) {
        tokio::select! {
            _ = self.sigint.recv() => info!("received SIGINT"),
            _ = self.sigterm.recv() => info!("received SIGTERM"),
        }
    }

    /// Run the full shutdown protocol against a spawned publisher:
    /// wait for a signal, request the stop, wait for the loop to exit.
    ///
    /// If the loop never acknowledges, this waits forever; the loop's only
    /// suspension points are the ticker and the stop signal, so in practice
    /// the wait is bounded by one publish interval.
    pub async fn run(mut self, publisher: PublisherHandle) {
        self.wait_for_signal().await;
        info!("signal caught - exiting");

        publisher.request_stop();
        publisher.wait_done().await;
        info!("publish loop stopped");
    }
}
