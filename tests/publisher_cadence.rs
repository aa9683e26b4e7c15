//! Integration tests for the publish loop cadence and stop handshake
//!
//! Exercises the publisher against a mock transport under paused time:
//! every completed tick submits exactly one publish attempt, delivery
//! failures never disturb the cadence, and the stop handshake completes
//! within one interval.

use sensorpub::config::PublishSection;
use sensorpub::sensor::{Sensor, SensorIdentity};
use sensorpub::testing::mocks::MockTransport;
use sensorpub::transport::QosLevel;
use sensorpub::Publisher;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

// Spawn and yield once so the loop task creates its ticker before the test
// advances the paused clock
async fn spawn_publisher(
    transport: Arc<MockTransport>,
    interval_ms: u64,
) -> sensorpub::PublisherHandle {
    let section = PublishSection {
        interval_ms,
        ..Default::default()
    };
    let sensor = Sensor::new(SensorIdentity::Fixed("Sensor1".to_string()));
    let handle = Publisher::new(transport, sensor, &section).spawn();
    tokio::task::yield_now().await;
    handle
}

#[tokio::test(start_paused = true)]
async fn three_and_a_half_seconds_yields_exactly_three_attempts() {
    let transport = Arc::new(MockTransport::connected());
    let handle = spawn_publisher(transport.clone(), 1_000).await;

    // Run for 3.5s before the termination request: ticks at 1s, 2s, 3s
    sleep(Duration::from_millis(3_500)).await;
    handle.request_stop();
    handle.wait_done().await;

    assert_eq!(transport.publish_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn every_completed_tick_submits_one_attempt_despite_failures() {
    let transport = Arc::new(MockTransport::connected().with_failing_publishes());
    let handle = spawn_publisher(transport.clone(), 1_000).await;

    sleep(Duration::from_millis(10_500)).await;
    handle.request_stop();
    handle.wait_done().await;

    // N completed ticks, N attempts, regardless of per-message outcomes
    assert_eq!(transport.publish_count(), 10);
}

#[tokio::test(start_paused = true)]
async fn stop_completes_within_one_interval() {
    let transport = Arc::new(MockTransport::connected());
    let handle = spawn_publisher(transport.clone(), 1_000).await;

    sleep(Duration::from_millis(2_200)).await;
    handle.request_stop();

    // The loop's only other suspension point is the ticker, so completion
    // arrives within one interval of the request.
    let done = timeout(Duration::from_millis(1_100), handle.wait_done());
    assert!(done.await.is_ok(), "stop handshake should complete promptly");
    assert_eq!(transport.publish_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn no_attempts_after_stop_is_observed() {
    let transport = Arc::new(MockTransport::connected());
    let handle = spawn_publisher(transport.clone(), 1_000).await;

    sleep(Duration::from_millis(4_500)).await;
    handle.request_stop();
    handle.wait_done().await;
    let count_at_stop = transport.publish_count();
    assert_eq!(count_at_stop, 4);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.publish_count(), count_at_stop);
}

#[tokio::test(start_paused = true)]
async fn duplicate_stop_requests_have_no_additional_effect() {
    let transport = Arc::new(MockTransport::connected());
    let handle = spawn_publisher(transport.clone(), 1_000).await;

    sleep(Duration::from_millis(1_500)).await;
    handle.request_stop();
    handle.request_stop();
    handle.request_stop();
    handle.wait_done().await;

    assert_eq!(transport.publish_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn faster_interval_scales_attempt_count() {
    let transport = Arc::new(MockTransport::connected());
    let handle = spawn_publisher(transport.clone(), 250).await;

    sleep(Duration::from_millis(1_100)).await;
    handle.request_stop();
    handle.wait_done().await;

    assert_eq!(transport.publish_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn readings_use_qos_zero_and_no_retain() {
    let transport = Arc::new(MockTransport::connected());
    let handle = spawn_publisher(transport.clone(), 1_000).await;

    sleep(Duration::from_millis(2_100)).await;
    handle.request_stop();
    handle.wait_done().await;

    for request in transport.published_requests() {
        assert_eq!(request.topic, "/sensors/temp");
        assert_eq!(request.qos, QosLevel::AtMostOnce);
        assert!(!request.retained);
        assert!(request.payload.starts_with("Sensor1 temp: "));
    }
}
