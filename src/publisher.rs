//! Periodic publish loop
//!
//! Drives one reading-and-publish cycle every fixed interval until told to
//! stop. Each publish is fire-and-forget: the acknowledgment is awaited by a
//! detached task whose only effect is an error log line, so a slow or failed
//! broker never stalls the cadence. The loop has exactly two states: running,
//! and stopped after acknowledging the stop request.

use crate::config::PublishSection;
use crate::sensor::Sensor;
use crate::transport::{PublishRequest, QosLevel, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::{interval_at, Instant};
use tracing::{error, info};

/// The periodic reading-and-publish loop
pub struct Publisher<T: Transport> {
    transport: Arc<T>,
    sensor: Sensor,
    topic: String,
    qos: QosLevel,
    retained: bool,
    interval: Duration,
}

impl<T: Transport + 'static> Publisher<T> {
    pub fn new(transport: Arc<T>, sensor: Sensor, publish: &PublishSection) -> Self {
        Self {
            transport,
            sensor,
            topic: publish.temperature_topic.clone(),
            qos: publish.qos_level(),
            retained: publish.retained,
            interval: Duration::from_millis(publish.interval_ms),
        }
    }

    /// Start the tick loop on its own task.
    ///
    /// The returned handle carries the single-fire stop signal and the
    /// single-fire completion acknowledgment the shutdown coordinator waits
    /// on.
    pub fn spawn(self) -> PublisherHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(self.run(stop_rx, done_tx));
        PublisherHandle { stop_tx, done_rx }
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>, done_tx: oneshot::Sender<()>) {
        info!(
            sensor = %self.sensor.name(),
            topic = %self.topic,
            interval_ms = self.interval.as_millis() as u64,
            "publisher started"
        );

        // First tick one full interval after loop start
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                changed = stop_rx.changed() => {
                    // A closed stop channel means the coordinator is gone;
                    // treat it the same as an explicit stop.
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.publish_once();
                }
            }
        }

        info!("publisher done");
        let _ = done_tx.send(());
    }

    /// One tick: read, submit, detach the ack wait.
    fn publish_once(&self) {
        let reading = self.sensor.temperature();
        info!(topic = %self.topic, payload = %reading, "sending message");

        let ack = self.transport.publish(PublishRequest {
            topic: self.topic.clone(),
            payload: reading,
            qos: self.qos,
            retained: self.retained,
        });

        // Await the ack off the tick loop so delivery status never delays
        // the next interval. Failures are logged and otherwise dropped.
        tokio::spawn(async move {
            if let Err(e) = ack.wait().await {
                error!(error = %e, "error publishing reading");
            }
        });
    }
}

/// Control handle for a spawned [`Publisher`]
pub struct PublisherHandle {
    stop_tx: watch::Sender<bool>,
    done_rx: oneshot::Receiver<()>,
}

impl PublisherHandle {
    /// Request the loop to stop. Idempotent; duplicate requests are no-ops.
    pub fn request_stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Wait until the loop has acknowledged the stop and exited.
    /// Bounded in practice by at most one publish interval.
    pub async fn wait_done(self) {
        let _ = self.done_rx.await;
    }
}
