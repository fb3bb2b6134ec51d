//! Drive an `Lc1Link` against the simulated controller over an in-memory stream

use std::time::Duration;

use lc1_link::{DeviceMode, Lc1Link, LinkConfig, LinkError};
use lc1_sim::{SimConfig, SimError, SimulatorHandle};

fn fast_sim() -> SimConfig {
    SimConfig {
        tick_ms: 2,
        heater_step: 0.25,
        lambda_step: 0.25,
        ..Default::default()
    }
}

fn pair(sim_config: SimConfig) -> (Lc1Link, SimulatorHandle) {
    let (host, device) = tokio::io::duplex(4096);
    let link = Lc1Link::spawn(
        host,
        LinkConfig {
            read_poll_ms: 10,
            ..Default::default()
        },
    );
    let sim = SimulatorHandle::spawn(device, sim_config);
    (link, sim)
}

/// Poll the link status until `f` holds or two seconds pass
async fn wait_for_status<F>(link: &Lc1Link, mut f: F) -> bool
where
    F: FnMut(&lc1_link::DeviceStatus) -> bool,
{
    for _ in 0..400 {
        if f(&link.status()) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[tokio::test]
async fn test_identify_against_simulator() {
    let (link, sim) = pair(SimConfig::default());

    let info = link.identify().await.unwrap();
    assert_eq!(
        info.id,
        vec![0x01, 0x73, 0x11, 0x0A, 0x4C, 0x43, 0x31, 0x20, 0x05, 0x32]
    );
    assert_eq!(
        info.version,
        vec![0x01, 0x4E, 0x4C, 0x43, 0x2D, 0x31, 0x5F, 0x31, 0x00, 0x00]
    );

    link.shutdown().await.unwrap();
    // A host going away ends the simulator cleanly, whichever side notices first
    assert!(matches!(sim.shutdown().await, Ok(())));
}

#[tokio::test]
async fn test_concurrent_requests_all_answered() {
    let (link, sim) = pair(fast_sim());

    let (a, b, c) = tokio::join!(link.request_id(), link.request_version(), link.request_id());
    assert_eq!(a.unwrap().payload[1], 0x73);
    assert_eq!(b.unwrap().payload[1], 0x4E);
    assert_eq!(c.unwrap().payload[1], 0x73);

    link.shutdown().await.unwrap();
    // A host going away ends the simulator cleanly, whichever side notices first
    assert!(matches!(sim.shutdown().await, Ok(())));
}

#[tokio::test]
async fn test_status_follows_cycle() {
    let (link, sim) = pair(fast_sim());

    assert!(wait_for_status(&link, |s| s.mode == DeviceMode::Heating).await);
    assert!(wait_for_status(&link, |s| s.mode == DeviceMode::LambdaMeasure).await);

    let status = link.status();
    assert!(status.lambda.is_some());
    assert!(status.heater.is_none());
    assert!(link.status_line().starts_with("Device lambdameasure"));

    link.shutdown().await.unwrap();
    // A host going away ends the simulator cleanly, whichever side notices first
    assert!(matches!(sim.shutdown().await, Ok(())));
}

#[tokio::test]
async fn test_manual_heater_observed() {
    let (link, sim) = pair(fast_sim());

    sim.set_manual_heater(0.42).await.unwrap();
    assert!(
        wait_for_status(&link, |s| {
            s.mode == DeviceMode::Heating && s.heater.map_or(false, |h| (h - 0.42).abs() < 1e-9)
        })
        .await
    );

    sim.set_manual_o2(0.15).await.unwrap();
    assert!(
        wait_for_status(&link, |s| {
            s.mode == DeviceMode::LambdaMeasure && s.o2.map_or(false, |o2| (o2 - 0.15).abs() < 1e-9)
        })
        .await
    );

    link.shutdown().await.unwrap();
    // A host going away ends the simulator cleanly, whichever side notices first
    assert!(matches!(sim.shutdown().await, Ok(())));
}

#[tokio::test]
async fn test_simulator_stops_when_link_closes() {
    for _ in 0..8 {
        let (link, sim) = pair(fast_sim());
        link.shutdown().await.unwrap();

        for _ in 0..400 {
            if !sim.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!sim.is_running());
        assert!(matches!(
            sim.set_auto().await,
            Err(SimError::Stopped)
        ));
        assert!(matches!(sim.shutdown().await, Ok(())));
    }
}

#[tokio::test]
async fn test_request_fails_after_simulator_stops() {
    let (link, sim) = pair(SimConfig::default());
    sim.shutdown().await.unwrap();

    // Once the simulator side is dropped the link sees EOF
    let err = link.request_id().await.unwrap_err();
    assert!(matches!(
        err,
        LinkError::Disconnected | LinkError::RequestTimeout { .. }
    ));
    for _ in 0..100 {
        if !link.is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!link.is_connected());
}
