//! End-to-end rendering through the session, driven by the fake device
//! backend on a simulated clock.

#[path = "helpers/mod.rs"]
mod helpers;

use artic_audio::device::testing::FakeBackend;
use artic_audio::{AudioSession, MAX_OUTPUT_LEVEL, PARAMETER_RING_FRAMES};
use helpers::{test_config, TestModel};

fn session_with(
    backend: &FakeBackend,
    params: usize,
    samples_per_frame: usize,
) -> AudioSession {
    AudioSession::new(
        test_config(params),
        Box::new(backend.clone()),
        Box::new(move |config, _sample_rate| {
            Ok(Box::new(TestModel::new(
                config.parameter_count(),
                samples_per_frame,
            )))
        }),
    )
    .unwrap()
}

#[test]
fn three_frames_through_one_callback() {
    let backend = FakeBackend::new(44100);
    let mut session = session_with(&backend, 2, 100);
    session.start().unwrap();

    for frame in [[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]] {
        assert!(session.push_frame(&frame));
    }

    assert_eq!(backend.run_cycles(512, 1), 512);
    let captured = backend.captured();
    assert_eq!(captured.len(), 512);
    assert!(captured.iter().all(|s| s.is_finite()));

    let peak = captured.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak <= MAX_OUTPUT_LEVEL);

    // All three frames were consumed: 300 samples of content, then silence.
    assert!(captured[..100].iter().all(|&s| s == 0.1));
    assert!(captured[100..200].iter().all(|&s| s == 0.3));
    assert!(captured[200..300].iter().all(|&s| s == 0.5));
    assert!(captured[300..].iter().all(|&s| s == 0.0));

    // The parameter ring drained completely: a full ring's worth of frames
    // fits again.
    for _ in 0..PARAMETER_RING_FRAMES {
        assert!(session.push_frame(&[0.0, 0.0]));
    }
    assert!(!session.push_frame(&[0.0, 0.0]));
}

#[test]
fn gap_in_stream_is_reported_and_silent() {
    let backend = FakeBackend::new(44100);
    let mut session = session_with(&backend, 2, 100);
    session.start().unwrap();

    assert!(session.push_frame(&[0.4, 0.4]));
    backend.run_cycles(256, 1);

    let report = session.poll_analysis().expect("analysis frame expected");
    assert_eq!(report.position, 256);
    assert_eq!(report.underruns, 1);

    // No input at all: pure silence, underrun count grows.
    backend.clear_captured();
    backend.run_cycles(256, 2);
    assert!(backend.captured().iter().all(|&s| s == 0.0));
    let report = session.poll_analysis().unwrap();
    assert_eq!(report.underruns, 3);
    assert_eq!(report.position, 3 * 256);
}

#[test]
fn keeping_up_yields_no_underruns() {
    let backend = FakeBackend::new(44100);
    let mut session = session_with(&backend, 1, 64);

    session.start().unwrap();
    for _ in 0..50 {
        // 4 frames = 256 samples per 256-sample callback.
        for _ in 0..4 {
            assert!(session.push_frame(&[0.5]));
        }
        backend.run_cycles(256, 1);
    }
    let report = session.poll_analysis().unwrap();
    assert_eq!(report.underruns, 0);
    assert_eq!(report.position, 50 * 256);
    assert!(session.peak() > 0.0);
}

#[test]
fn overflowing_producer_drops_whole_frames() {
    let backend = FakeBackend::new(44100);
    let mut session = session_with(&backend, 2, 10);
    session.start().unwrap();

    let mut accepted = 0;
    for _ in 0..PARAMETER_RING_FRAMES + 10 {
        if session.push_frame(&[0.2, 0.2]) {
            accepted += 1;
        }
    }
    assert_eq!(accepted, PARAMETER_RING_FRAMES);

    // Everything accepted arrives intact; the excess vanished without
    // corrupting the stream.
    backend.run_cycles(PARAMETER_RING_FRAMES * 10, 1);
    let captured = backend.captured();
    assert!(captured[..PARAMETER_RING_FRAMES * 10]
        .iter()
        .all(|&s| s == 0.2));
}

#[test]
fn loud_model_output_is_normalized() {
    let backend = FakeBackend::new(44100);
    let config = {
        let mut c = test_config(1);
        c.parameters[0].max = 10.0;
        c
    };
    let mut session = AudioSession::new(
        config,
        Box::new(backend.clone()),
        Box::new(|config, _| Ok(Box::new(TestModel::new(config.parameter_count(), 128)))),
    )
    .unwrap();
    session.start().unwrap();

    assert!(session.push_frame(&[8.0]));
    backend.run_cycles(128, 1);

    let peak = backend
        .captured()
        .iter()
        .fold(0.0f32, |m, s| m.max(s.abs()));
    assert!((peak - MAX_OUTPUT_LEVEL).abs() < 1e-4, "peak {peak}");
}
