mod common;

use std::time::Duration;
use tokio::sync::oneshot;

use common::{Call, FakeNetworkManager, Fixture, HOTSPOT_PROFILE};
use smartlock_provision::{HotspotState, ShutdownTimings};

fn stopped(fixture: &Fixture) -> bool {
    fixture
        .fake
        .calls()
        .contains(&Call::StopConnection(HOTSPOT_PROFILE.into()))
}

#[tokio::test]
async fn waits_for_delivery_before_teardown() {
    let fixture = Fixture::new(FakeNetworkManager::with_wifi("wlan0"));
    let (tx, rx) = oneshot::channel();

    let handle = fixture.shutdown.schedule(rx).expect("first schedule arms");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!stopped(&fixture));
    assert!(!fixture.terminate.is_cancelled());

    tx.send(()).unwrap();
    handle.finished().await;

    assert!(stopped(&fixture));
    assert_eq!(fixture.hotspot.state(), HotspotState::Idle);
    assert!(fixture.terminate.is_cancelled());
}

#[tokio::test]
async fn arms_at_most_once() {
    let fixture = Fixture::new(FakeNetworkManager::with_wifi("wlan0"));
    let (_tx1, rx1) = oneshot::channel();
    let (_tx2, rx2) = oneshot::channel();

    assert!(fixture.shutdown.schedule(rx1).is_some());
    assert!(fixture.shutdown.is_armed());
    assert!(fixture.shutdown.schedule(rx2).is_none());
}

#[tokio::test]
async fn dropped_sender_counts_as_delivered() {
    let fixture = Fixture::new(FakeNetworkManager::with_wifi("wlan0"));
    let (tx, rx) = oneshot::channel::<()>();
    drop(tx);

    fixture.shutdown.schedule(rx).unwrap().finished().await;

    assert!(stopped(&fixture));
    assert!(fixture.terminate.is_cancelled());
}

#[tokio::test]
async fn unconfirmed_delivery_times_out() {
    let timings = ShutdownTimings {
        response_timeout: Duration::from_millis(50),
        linger: Duration::ZERO,
        exit_delay: Duration::ZERO,
    };
    let fixture = Fixture::with_timings(FakeNetworkManager::with_wifi("wlan0"), timings);
    let (_tx, rx) = oneshot::channel();

    tokio::time::timeout(
        Duration::from_secs(5),
        fixture.shutdown.schedule(rx).unwrap().finished(),
    )
    .await
    .expect("sequence should proceed after the delivery timeout");

    assert!(stopped(&fixture));
    assert!(fixture.terminate.is_cancelled());
}

#[tokio::test]
async fn cancel_before_teardown_restores_the_session() {
    let fixture = Fixture::new(FakeNetworkManager::with_wifi("wlan0"));
    let (_tx, rx) = oneshot::channel();

    let handle = fixture.shutdown.schedule(rx).unwrap();
    handle.cancel();
    handle.finished().await;

    assert!(!stopped(&fixture));
    assert!(!fixture.terminate.is_cancelled());
    assert!(!fixture.shutdown.is_armed());
    assert_eq!(fixture.hotspot.state(), HotspotState::Active);

    let (tx, rx) = oneshot::channel();
    let handle = fixture.shutdown.schedule(rx).expect("can be re-armed after cancel");
    tx.send(()).unwrap();
    handle.finished().await;
    assert!(stopped(&fixture));
}
