//! Per-callback rendering: parameter frames in, device samples out.

use std::sync::Arc;

use crate::analysis::{AnalysisFrame, AtomicPeak};
use crate::model::VocalTractModel;
use crate::ring::{RingConsumer, RingProducer};
use crate::smooth::MovingAverageFilter;
use crate::{Error, Result};

/// Output ceiling for |sample|; the normalization scale keeps the peak here
/// instead of letting the device clip.
pub const MAX_OUTPUT_LEVEL: f32 = 0.95;

/// Owns the vocal-tract model and implements the process-callback body.
///
/// Owned exclusively by the audio thread once the session is active; the
/// control thread reaches it only through the two rings. Nothing in
/// [`process`](RenderProcessor::process) allocates, locks, panics, or does
/// I/O.
pub struct RenderProcessor {
    model: Box<dyn VocalTractModel>,
    filters: Vec<MovingAverageFilter>,
    parameters: RingConsumer<f32>,
    analysis: RingProducer<AnalysisFrame>,
    /// Scratch frames, sized to the parameter count at construction.
    raw_frame: Vec<f32>,
    smoothed_frame: Vec<f32>,
    position: u64,
    /// Largest |sample| the model has produced this session. Never decays:
    /// the normalization scale only tightens.
    max_abs_sample: f32,
    underruns: u64,
    live_peak: Arc<AtomicPeak>,
}

impl RenderProcessor {
    pub fn new(
        model: Box<dyn VocalTractModel>,
        smoothing_window: usize,
        parameters: RingConsumer<f32>,
        analysis: RingProducer<AnalysisFrame>,
        live_peak: Arc<AtomicPeak>,
    ) -> Result<Self> {
        let n = model.parameter_count();
        if n == 0 {
            return Err(Error::InvalidConfig(
                "vocal-tract model reports zero parameters".into(),
            ));
        }
        if parameters.capacity() < n {
            return Err(Error::InvalidConfig(format!(
                "parameter ring capacity {} cannot hold one frame of {n} values",
                parameters.capacity()
            )));
        }
        Ok(Self {
            filters: vec![MovingAverageFilter::new(smoothing_window); n],
            raw_frame: vec![0.0; n],
            smoothed_frame: vec![0.0; n],
            model,
            parameters,
            analysis,
            position: 0,
            max_abs_sample: 0.0,
            underruns: 0,
            live_peak,
        })
    }

    /// Clear all filter, model, and metering state and drop stale parameter
    /// frames. Control-thread-only, and only while no callback can fire.
    pub fn reset(&mut self) {
        self.model.reset();
        for filter in &mut self.filters {
            filter.reset();
        }
        self.parameters.clear();
        self.position = 0;
        self.max_abs_sample = 0.0;
        self.underruns = 0;
        self.live_peak.set(0.0);
    }

    /// Render one device callback's worth of output.
    pub fn process(&mut self, output: &mut [f32]) {
        let nframes = output.len();
        let frame_len = self.raw_frame.len();

        // Top up the model from the parameter stream, one whole frame at a
        // time. A partially written frame is impossible: the producer only
        // commits whole frames.
        while self.model.pending() < nframes && self.parameters.read_space() >= frame_len {
            let read = self.parameters.read(&mut self.raw_frame);
            debug_assert_eq!(read, frame_len);
            for (i, filter) in self.filters.iter_mut().enumerate() {
                self.smoothed_frame[i] = filter.next(self.raw_frame[i]);
            }
            self.model.load_frame(&self.smoothed_frame);
        }

        // Copy out what the model has; the rest of the callback is exact
        // silence, reported below, never a stall.
        let produced = self.model.render(output);
        if produced < nframes {
            output[produced..].fill(0.0);
            self.underruns += 1;
        }

        let mut callback_peak: f32 = 0.0;
        for sample in &output[..produced] {
            callback_peak = callback_peak.max(sample.abs());
        }
        if callback_peak > self.max_abs_sample {
            self.max_abs_sample = callback_peak;
        }
        if self.max_abs_sample > MAX_OUTPUT_LEVEL {
            let scale = MAX_OUTPUT_LEVEL / self.max_abs_sample;
            for sample in &mut output[..produced] {
                *sample *= scale;
            }
            callback_peak *= scale;
        }

        self.position += nframes as u64;
        self.live_peak.set(callback_peak);

        // Best-effort metering: dropped silently when the ring is full.
        let report = AnalysisFrame {
            peak: callback_peak,
            position: self.position,
            underruns: self.underruns,
        };
        let _ = self.analysis.write(core::slice::from_ref(&report));
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn underruns(&self) -> u64 {
        self.underruns
    }
}
