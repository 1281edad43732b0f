//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use artic_audio::{ParameterSpec, SynthConfig, VocalTractModel};

/// Deterministic stand-in for the synthesis engine: each loaded frame emits
/// `samples_per_frame` copies of the frame's first component.
pub struct TestModel {
    params: usize,
    samples_per_frame: usize,
    queue: Vec<f32>,
    frames_loaded: usize,
}

impl TestModel {
    pub fn new(params: usize, samples_per_frame: usize) -> Self {
        Self {
            params,
            samples_per_frame,
            queue: Vec::with_capacity(4096),
            frames_loaded: 0,
        }
    }
}

impl VocalTractModel for TestModel {
    fn parameter_count(&self) -> usize {
        self.params
    }

    fn load_frame(&mut self, frame: &[f32]) {
        assert_eq!(frame.len(), self.params);
        self.frames_loaded += 1;
        for _ in 0..self.samples_per_frame {
            self.queue.push(frame[0]);
        }
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    fn render(&mut self, out: &mut [f32]) -> usize {
        let n = out.len().min(self.queue.len());
        out[..n].copy_from_slice(&self.queue[..n]);
        self.queue.drain(..n);
        n
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.frames_loaded = 0;
    }
}

/// A configuration with `n` parameters spanning [0, 1], defaults at 0.
pub fn test_config(n: usize) -> SynthConfig {
    SynthConfig {
        output_rate: 22050.0,
        control_rate: 250.0,
        smoothing_window: 1,
        parameters: (0..n)
            .map(|i| ParameterSpec {
                name: format!("param{i}"),
                label: format!("Parameter {i}"),
                min: 0.0,
                max: 1.0,
                default: 0.0,
            })
            .collect(),
    }
}
