//! Session lifecycle: idempotent start/stop, rollback, device loss.

#[path = "helpers/mod.rs"]
mod helpers;

use artic_audio::device::testing::FakeBackend;
use artic_audio::{AudioSession, Error};
use helpers::{test_config, TestModel};

fn session(backend: &FakeBackend) -> AudioSession {
    AudioSession::new(
        test_config(2),
        Box::new(backend.clone()),
        Box::new(|config, _| Ok(Box::new(TestModel::new(config.parameter_count(), 50)))),
    )
    .unwrap()
}

#[test]
fn start_is_idempotent() {
    let backend = FakeBackend::new(48000);
    let mut s = session(&backend);

    s.start().unwrap();
    s.start().unwrap();
    // The second start did not reopen the client or rebuild anything.
    assert_eq!(backend.open_count(), 1);
    assert!(s.is_started());
    assert_eq!(s.sample_rate(), 48000);

    // The single well-defined state still renders.
    assert!(s.push_frame(&[0.3, 0.3]));
    assert_eq!(backend.run_cycles(64, 1), 64);
    assert!(backend.captured()[..50].iter().all(|&x| x == 0.3));
}

#[test]
fn stop_reports_whether_running() {
    let backend = FakeBackend::new(48000);
    let mut s = session(&backend);

    assert!(!s.stop());
    s.start().unwrap();
    assert!(s.stop());
    assert!(!s.stop());
    assert!(!s.is_started());
    // With the client gone the callback can no longer fire.
    assert_eq!(backend.run_cycles(64, 1), 0);
}

#[test]
fn push_frame_while_stopped_is_dropped() {
    let backend = FakeBackend::new(48000);
    let mut s = session(&backend);
    assert!(!s.push_frame(&[0.1, 0.1]));
    s.start().unwrap();
    assert!(s.push_frame(&[0.1, 0.1]));
    s.stop();
    assert!(!s.push_frame(&[0.1, 0.1]));
}

#[test]
fn failed_start_rolls_back() {
    let backend = FakeBackend::new(48000);
    let mut s = session(&backend);

    backend.set_fail_open(true);
    let err = s.start().unwrap_err();
    assert!(matches!(err, Error::DeviceUnavailable(_)));
    assert!(!s.is_started());
    assert!(!s.push_frame(&[0.0, 0.0]));

    // Once the service is back, the same session starts cleanly.
    backend.set_fail_open(false);
    s.start().unwrap();
    assert!(s.is_started());
}

#[test]
fn restart_builds_a_fresh_pipeline() {
    let backend = FakeBackend::new(48000);
    let mut s = session(&backend);

    s.start().unwrap();
    assert!(s.push_frame(&[0.9, 0.9]));
    backend.run_cycles(64, 1);
    assert!(s.poll_analysis().is_some());

    s.stop();
    backend.clear_captured();
    s.start().unwrap();
    assert_eq!(backend.open_count(), 2);

    // No stale frames or metering from the previous run.
    assert!(s.poll_analysis().is_none());
    backend.run_cycles(64, 1);
    assert!(backend.captured().iter().all(|&x| x == 0.0));
    let report = s.poll_analysis().unwrap();
    assert_eq!(report.position, 64);
    assert_eq!(report.underruns, 1);
}

#[test]
fn device_loss_is_observable() {
    let backend = FakeBackend::new(48000);
    let mut s = session(&backend);
    s.start().unwrap();
    assert!(!s.device_lost());

    backend.trigger_shutdown();
    assert!(s.device_lost());

    // Recovery goes through the normal lifecycle.
    assert!(s.stop());
    s.start().unwrap();
    assert!(!s.device_lost());
}

#[test]
fn reload_config_rules() {
    let backend = FakeBackend::new(48000);
    let mut s = session(&backend);

    s.start().unwrap();
    assert!(matches!(
        s.reload_config(test_config(2)),
        Err(Error::ClientState(_))
    ));

    s.stop();
    assert!(matches!(
        s.reload_config(test_config(3)),
        Err(Error::InvalidConfig(_))
    ));
    s.reload_config(test_config(2)).unwrap();
}

#[test]
fn rejects_invalid_config_at_construction() {
    let mut config = test_config(2);
    config.parameters[0].min = 2.0; // min >= max
    let backend = FakeBackend::new(48000);
    let result = AudioSession::new(
        config,
        Box::new(backend),
        Box::new(|c, _| Ok(Box::new(TestModel::new(c.parameter_count(), 1)))),
    );
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
