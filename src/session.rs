//! Audio session lifecycle: rings, processor, and device client ownership.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::analysis::{AnalysisFrame, AnalysisMonitor, AtomicPeak};
use crate::config::SynthConfig;
use crate::device::{DeviceBackend, DeviceClient};
use crate::model::VocalTractModel;
use crate::processor::RenderProcessor;
use crate::ring::{spsc_ring, RingProducer};
use crate::Result;

/// Parameter ring capacity, in frames.
pub const PARAMETER_RING_FRAMES: usize = 32;

/// Analysis ring capacity, in frames. One frame per callback; at small
/// callback sizes this covers roughly 65536 samples of lookback.
pub const ANALYSIS_RING_FRAMES: usize = 1024;

const CLIENT_NAME: &str = "artic_synth";
const OUTPUT_PORT_NAME: &str = "output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SessionState {
    #[default]
    Stopped,
    Started,
}

/// Builds a fresh vocal-tract model for each session start.
///
/// Receives the validated configuration and the device sample rate, which is
/// only known once the client is open.
pub type ModelFactory =
    Box<dyn Fn(&SynthConfig, u32) -> Result<Box<dyn VocalTractModel>> + Send>;

/// Owns the live audio path: device client, rings, and (indirectly, through
/// the installed callback) the render processor.
///
/// Single control-thread actor: all methods are `&mut self`, and the audio
/// thread is reached only through the rings.
pub struct AudioSession {
    config: SynthConfig,
    backend: Box<dyn DeviceBackend>,
    model_factory: ModelFactory,
    state: SessionState,
    client: Option<Box<dyn DeviceClient>>,
    parameters: Option<RingProducer<f32>>,
    monitor: Option<AnalysisMonitor>,
    live_peak: Arc<AtomicPeak>,
    device_lost: Arc<AtomicBool>,
    sample_rate: u32,
}

impl AudioSession {
    pub fn new(
        config: SynthConfig,
        backend: Box<dyn DeviceBackend>,
        model_factory: ModelFactory,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend,
            model_factory,
            state: SessionState::Stopped,
            client: None,
            parameters: None,
            monitor: None,
            live_peak: Arc::new(AtomicPeak::new()),
            device_lost: Arc::new(AtomicBool::new(false)),
            sample_rate: 0,
        })
    }

    /// Start live rendering. Idempotent: a second `start` while running is a
    /// no-op. On any failure everything built so far is rolled back and the
    /// session stays stopped.
    pub fn start(&mut self) -> Result<()> {
        if self.state == SessionState::Started {
            return Ok(());
        }

        let mut client = self.backend.open(CLIENT_NAME)?;
        let sample_rate = client.sample_rate();
        client.register_port(OUTPUT_PORT_NAME)?;

        let n = self.config.parameter_count();
        let (param_tx, param_rx) = spsc_ring::<f32>(PARAMETER_RING_FRAMES * n);
        let (analysis_tx, analysis_rx) = spsc_ring::<AnalysisFrame>(ANALYSIS_RING_FRAMES);

        let model = (self.model_factory)(&self.config, sample_rate)?;
        let mut processor = RenderProcessor::new(
            model,
            self.config.smoothing_window,
            param_rx,
            analysis_tx,
            Arc::clone(&self.live_peak),
        )?;
        processor.reset();

        client.set_process_callback(Box::new(move |out| processor.process(out)));

        self.device_lost.store(false, Ordering::Release);
        let lost = Arc::clone(&self.device_lost);
        client.set_shutdown_callback(Box::new(move || {
            lost.store(true, Ordering::Release);
            tracing::warn!("audio device disconnected the client");
        }));

        // Failure here drops client/rings/processor on the way out; nothing
        // was assigned to self yet.
        client.activate()?;

        self.client = Some(client);
        self.parameters = Some(param_tx);
        self.monitor = Some(AnalysisMonitor::new(analysis_rx));
        self.sample_rate = sample_rate;
        self.state = SessionState::Started;
        tracing::info!(sample_rate, parameters = n, "audio session started");
        Ok(())
    }

    /// Stop live rendering. Returns whether a session had actually been
    /// running. Idempotent: `stop` while stopped is a no-op.
    pub fn stop(&mut self) -> bool {
        if self.state == SessionState::Stopped {
            return false;
        }

        // Deactivate first: once the client is gone the callback can no
        // longer fire, and tearing down the rings is race-free.
        if let Some(mut client) = self.client.take() {
            client.deactivate();
        }
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.clear();
        }
        self.parameters = None;
        self.monitor = None;
        self.live_peak.set(0.0);
        self.state = SessionState::Stopped;
        tracing::info!("audio session stopped");
        true
    }

    /// Push one parameter frame toward the audio thread.
    ///
    /// Whole-frame-or-nothing bounded write: returns `false` when the frame
    /// was dropped (session stopped, or the ring is full because the
    /// producer outran the audio thread). The producer reacts by slowing
    /// down or accepting the loss; this call never blocks.
    pub fn push_frame(&mut self, frame: &[f32]) -> bool {
        debug_assert_eq!(frame.len(), self.config.parameter_count());
        let Some(parameters) = self.parameters.as_mut() else {
            return false;
        };
        if frame.len() != self.config.parameter_count() {
            return false;
        }
        if parameters.write_space() < frame.len() {
            return false;
        }
        let written = parameters.write(frame);
        debug_assert_eq!(written, frame.len());
        true
    }

    /// Drain the analysis channel; `None` simply means nothing new arrived.
    pub fn poll_analysis(&mut self) -> Option<AnalysisFrame> {
        self.monitor.as_mut()?.poll()
    }

    /// Newest analysis snapshot seen so far.
    pub fn latest_analysis(&self) -> Option<AnalysisFrame> {
        self.monitor.as_ref()?.latest()
    }

    /// Instantaneous output peak, readable from any thread.
    pub fn peak(&self) -> f32 {
        self.live_peak.get()
    }

    /// Shared handle to the live peak meter, for UI threads.
    pub fn peak_handle(&self) -> Arc<AtomicPeak> {
        Arc::clone(&self.live_peak)
    }

    /// Whether the device disconnected us since the last `start`.
    pub fn device_lost(&self) -> bool {
        self.device_lost.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.state == SessionState::Started
    }

    /// Device operating rate discovered at the last successful `start`.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Replace the configuration; only allowed while stopped, and the
    /// parameter count must not change.
    pub fn reload_config(&mut self, replacement: SynthConfig) -> Result<()> {
        if self.state == SessionState::Started {
            return Err(crate::Error::ClientState(
                "cannot reload configuration while started".into(),
            ));
        }
        self.config.check_reload(&replacement)?;
        self.config = replacement;
        Ok(())
    }

    /// External ports the running client could be wired to.
    pub fn ports(&self) -> Result<Vec<String>> {
        match self.client.as_ref() {
            Some(client) => client.ports(),
            None => Err(crate::Error::ClientState("session not started".into())),
        }
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.stop();
    }
}
