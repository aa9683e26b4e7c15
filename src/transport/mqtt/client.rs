//! Impure I/O operations for the MQTT client
//!
//! Owns the single logical broker connection under a stable client identity:
//! the rumqttc client, its event loop, and the supervisor task that keeps the
//! connection alive with unbounded retries.

use super::connection::{
    configure_mqtt_options, ConnectionObserver, ConnectionState, LogObserver, MqttError,
    ReconnectConfig,
};
use super::supervisor::{ConnectionEvent, ConnectionSupervisor, EventRoute, ReconnectionDecision};
use crate::config::MqttSection;
use crate::transport::{PendingAck, PublishError, PublishRequest, QosLevel, Transport};
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Event loop channel capacity; publishes beyond this bound are rejected
/// rather than queued, keeping `publish` prompt under broker stalls.
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// MQTT transport client for the telemetry publisher
pub struct MqttClient {
    client_id: String,
    client: Arc<Mutex<AsyncClient>>,
    // Behind a Mutex so the client stays Sync; consumed on first connect
    event_loop: Mutex<Option<EventLoop>>,
    config: MqttSection,
    supervisor_handle: Mutex<Option<JoinHandle<()>>>,
    state_tx: Option<watch::Sender<ConnectionState>>,
    state_rx: Option<watch::Receiver<ConnectionState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    reconnect_config: ReconnectConfig,
    observer: Arc<dyn ConnectionObserver>,
}

impl MqttClient {
    pub fn new(client_id: &str, config: MqttSection) -> Result<Self, MqttError> {
        let mqtt_options = configure_mqtt_options(client_id, &config)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        Ok(MqttClient {
            client_id: client_id.to_string(),
            client: Arc::new(Mutex::new(client)),
            event_loop: Mutex::new(Some(event_loop)),
            config,
            supervisor_handle: Mutex::new(None),
            state_tx: None,
            state_rx: None,
            shutdown_tx: None,
            reconnect_config: ReconnectConfig::default(),
            observer: Arc::new(LogObserver),
        })
    }

    /// Replace the default logging observer.
    pub fn with_observer(mut self, observer: Arc<dyn ConnectionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Connect to the broker.
    ///
    /// Spawns the supervisor task driving the rumqttc event loop, then blocks
    /// until the broker confirms the connection with a ConnAck. The first
    /// attempt failing is fatal to this call: it is the caller's decision
    /// whether to abort the process. After a successful return, network loss
    /// is handled autonomously with unbounded reconnection.
    pub async fn connect(&mut self) -> Result<(), MqttError> {
        let event_loop = self
            .event_loop
            .lock()
            .await
            .take()
            .ok_or(MqttError::AlreadyConnected)?;

        let initial = ConnectionSupervisor::next_state(ConnectionEvent::ConnectStarted);
        self.observer.on_state_change(&initial);
        let (state_tx, state_rx) = watch::channel(initial);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.state_tx = Some(state_tx.clone());
        self.state_rx = Some(state_rx.clone());
        self.shutdown_tx = Some(shutdown_tx);

        let handle = tokio::spawn(Self::run_supervisor(
            event_loop,
            self.client_id.clone(),
            self.config.clone(),
            self.client.clone(),
            self.reconnect_config.clone(),
            state_tx,
            shutdown_rx,
            self.observer.clone(),
        ));
        *self.supervisor_handle.lock().await = Some(handle);

        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let result = Self::wait_for_connection_confirmation(state_rx, timeout).await;
        if result.is_err() {
            // The process has no purpose without the broker; stop the
            // supervisor's background retries before the caller aborts.
            if let Some(shutdown_tx) = &self.shutdown_tx {
                let _ = shutdown_tx.send(true);
            }
        }
        result
    }

    /// Wait for connection confirmation (ConnAck) with a timeout.
    /// The supervisor entering Reconnecting during this window means the
    /// first attempt already failed, which is fatal here.
    async fn wait_for_connection_confirmation(
        mut state_rx: watch::Receiver<ConnectionState>,
        timeout: Duration,
    ) -> Result<(), MqttError> {
        let wait = async {
            loop {
                match state_rx.borrow_and_update().clone() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Reconnecting(_) => {
                        return Err(MqttError::ConnectionFailed(
                            "initial connect attempt failed".to_string(),
                        ));
                    }
                    ConnectionState::Disconnected(reason) => {
                        return Err(MqttError::ConnectionFailed(reason));
                    }
                    ConnectionState::Connecting => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(MqttError::ConnectionFailed(
                        "state channel closed".to_string(),
                    ));
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(MqttError::ConnectTimeout(timeout)),
        }
    }

    /// Supervisor task: drives the event loop, transitions connection state,
    /// and rebuilds the connection after network loss until shutdown.
    #[allow(clippy::too_many_arguments)]
    async fn run_supervisor(
        mut event_loop: EventLoop,
        client_id: String,
        config: MqttSection,
        shared_client: Arc<Mutex<AsyncClient>>,
        reconnect_config: ReconnectConfig,
        state_tx: watch::Sender<ConnectionState>,
        mut shutdown_rx: watch::Receiver<bool>,
        observer: Arc<dyn ConnectionObserver>,
    ) {
        info!(client_id = %client_id, "starting mqtt event loop");
        let mut reconnect_attempts = 0u32;

        loop {
            tokio::select! {
                // Shutdown signal takes priority over event processing
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }

                polled = event_loop.poll() => {
                    match polled {
                        Ok(event) => match ConnectionSupervisor::route_event(&event) {
                            EventRoute::ConnectionAcknowledged => {
                                reconnect_attempts = 0;
                                Self::transition(&state_tx, &observer, ConnectionEvent::ConnAckReceived);
                            }
                            EventRoute::Disconnected => {
                                warn!(client_id = %client_id, "broker disconnected client");
                                if !Self::reconnect(
                                    &client_id,
                                    &config,
                                    &shared_client,
                                    &reconnect_config,
                                    &state_tx,
                                    shutdown_rx.clone(),
                                    &observer,
                                    &mut reconnect_attempts,
                                    &mut event_loop,
                                ).await {
                                    break;
                                }
                            }
                            EventRoute::Infrastructure(event_str) => {
                                debug!(target: "mqtt_transport", event = %event_str, "mqtt event");
                            }
                            EventRoute::Outgoing => {}
                        },
                        Err(e) => {
                            warn!(client_id = %client_id, error = %e, "mqtt event loop error");
                            if !Self::reconnect(
                                &client_id,
                                &config,
                                &shared_client,
                                &reconnect_config,
                                &state_tx,
                                shutdown_rx.clone(),
                                &observer,
                                &mut reconnect_attempts,
                                &mut event_loop,
                            ).await {
                                break;
                            }
                        }
                    }
                }
            }
        }
        info!(client_id = %client_id, "mqtt event loop stopped");
    }

    /// Apply a state transition and notify the observer.
    fn transition(
        state_tx: &watch::Sender<ConnectionState>,
        observer: &Arc<dyn ConnectionObserver>,
        event: ConnectionEvent,
    ) {
        let next = ConnectionSupervisor::next_state(event);
        observer.on_state_change(&next);
        let _ = state_tx.send(next);
    }

    /// Back off, then rebuild the client and event loop for another attempt.
    /// Returns false when the supervisor should stop instead.
    #[allow(clippy::too_many_arguments)]
    async fn reconnect(
        client_id: &str,
        config: &MqttSection,
        shared_client: &Arc<Mutex<AsyncClient>>,
        reconnect_config: &ReconnectConfig,
        state_tx: &watch::Sender<ConnectionState>,
        shutdown_rx: watch::Receiver<bool>,
        observer: &Arc<dyn ConnectionObserver>,
        reconnect_attempts: &mut u32,
        event_loop: &mut EventLoop,
    ) -> bool {
        let decision = ConnectionSupervisor::should_attempt_reconnection(
            *reconnect_attempts,
            reconnect_config,
            *shutdown_rx.borrow(),
        );

        match decision {
            ReconnectionDecision::Proceed { attempt, delay_ms } => {
                *reconnect_attempts = attempt;
                Self::transition(
                    state_tx,
                    observer,
                    ConnectionEvent::ReconnectionStarted(attempt),
                );

                if !Self::interruptible_sleep(shutdown_rx.clone(), delay_ms).await {
                    return false;
                }
                if *shutdown_rx.borrow() {
                    return false;
                }

                match configure_mqtt_options(client_id, config) {
                    Ok(mqtt_options) => {
                        let (new_client, new_event_loop) =
                            AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);
                        *event_loop = new_event_loop;
                        // Swap the shared client so publishes use the fresh connection
                        let mut client_guard = shared_client.lock().await;
                        *client_guard = new_client;
                        true
                    }
                    Err(e) => {
                        error!(error = %e, "failed to rebuild connection");
                        true
                    }
                }
            }
            ReconnectionDecision::AbortShutdownRequested => {
                info!("shutdown requested, stopping reconnection");
                false
            }
        }
    }

    /// Sleep that wakes early on shutdown.
    /// Returns true if the sleep completed, false if shutdown was requested.
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay_ms: u64) -> bool {
        tokio::select! {
            _ = shutdown_rx.changed() => !*shutdown_rx.borrow(),
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
        }
    }

    /// Get current connection state.
    /// Returns None if `connect` has not been called yet.
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.state_rx.as_ref().map(|rx| rx.borrow().clone())
    }

    fn check_connection_state(&self) -> Result<(), PublishError> {
        let state = self
            .connection_state()
            .unwrap_or(ConnectionState::Disconnected("never connected".to_string()));
        if ConnectionSupervisor::can_publish(&state) {
            Ok(())
        } else {
            Err(PublishError::NotConnected { state })
        }
    }

    /// Submit a message; returns promptly regardless of network state.
    ///
    /// The request is handed to the rumqttc client on a detached task and the
    /// returned ack resolves with the submission outcome. Nothing here waits
    /// on a broker round-trip.
    pub fn publish(&self, request: PublishRequest) -> PendingAck {
        if let Err(e) = self.check_connection_state() {
            return PendingAck::resolved(Err(e));
        }

        let (ack, pending) = PendingAck::channel();
        let client = self.client.clone();
        tokio::spawn(async move {
            let qos = match request.qos {
                QosLevel::AtMostOnce => QoS::AtMostOnce,
                QosLevel::AtLeastOnce => QoS::AtLeastOnce,
            };
            let result = {
                let client_guard = client.lock().await;
                client_guard
                    .publish(request.topic, qos, request.retained, request.payload)
                    .await
            };
            ack.resolve(result.map_err(|e| PublishError::Rejected(e.to_string())));
        });
        pending
    }

    /// Release the connection. Idempotent: safe to call during or after
    /// shutdown, or on a client that never connected.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }

        // Best effort: the broker may already be unreachable
        {
            let client_guard = self.client.lock().await;
            if let Err(e) = client_guard.disconnect().await {
                debug!(error = %e, "disconnect request not delivered");
            }
        }

        if let Some(state_tx) = &self.state_tx {
            Self::transition(
                state_tx,
                &self.observer,
                ConnectionEvent::ClientReleased("client disconnect".to_string()),
            );
        }

        if let Some(handle) = self.supervisor_handle.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(Ok(())) => debug!("supervisor task shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => {
                    warn!(error = %e, "supervisor task ended with error")
                }
                Err(_) => warn!("supervisor task did not stop in time"),
                _ => {}
            }
        }

        info!("mqtt client disconnected");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        MqttClient::connect(self).await
    }

    async fn disconnect(&self) -> Result<(), Self::Error> {
        MqttClient::disconnect(self).await
    }

    fn publish(&self, request: PublishRequest) -> PendingAck {
        MqttClient::publish(self, request)
    }

    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), Some(ConnectionState::Connected))
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        MqttClient::connection_state(self)
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        // Signal the supervisor; we cannot await its handle in Drop, so
        // callers wanting a graceful stop must call disconnect() explicitly.
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }
        if let Ok(mut guard) = self.supervisor_handle.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
