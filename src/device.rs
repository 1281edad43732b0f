//! Audio device client: the boundary to the platform audio service.
//!
//! The device API is a host-controlled inversion-of-control boundary (the
//! audio service calls into us), so it sits behind a capability trait. The
//! production implementation is cpal-based; [`testing::FakeBackend`] drives
//! the same callbacks on a simulated clock so the render path can be tested
//! without a real device.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::{Error, Result};

/// Real-time process callback. Receives the mono output buffer for one
/// device callback; must not block, allocate, or panic.
pub type ProcessFn = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// Async notification fired once if the device disconnects the client.
pub type ShutdownFn = Box<dyn FnOnce() + Send + 'static>;

/// Capability interface to one audio service connection.
///
/// Setup order: register a port, install callbacks, then
/// [`activate`](DeviceClient::activate). Dropping a client closes the
/// connection and is safe even if it was never activated. All operations are
/// control-thread, non-real-time calls.
pub trait DeviceClient: Send {
    /// Create the output port. Fails on name collision or service rejection.
    fn register_port(&mut self, name: &str) -> Result<()>;

    /// Install the real-time callback. Must precede [`activate`](DeviceClient::activate).
    fn set_process_callback(&mut self, callback: ProcessFn);

    /// Install the disconnect notification.
    fn set_shutdown_callback(&mut self, callback: ShutdownFn);

    /// Begin live callback delivery.
    fn activate(&mut self) -> Result<()>;

    /// Stop callback delivery. After this returns, the process callback can
    /// no longer fire.
    fn deactivate(&mut self);

    fn is_active(&self) -> bool;

    /// The device's fixed operating rate, queried once at setup.
    fn sample_rate(&self) -> u32;

    /// Discover external ports this client could be wired to.
    fn ports(&self) -> Result<Vec<String>>;

    /// Wire the named local port to an external target port.
    fn connect(&mut self, port_name: &str, target: &str) -> Result<()>;
}

/// Opens device clients against one audio service.
pub trait DeviceBackend {
    /// Establish a connection to the audio service. Fails with
    /// [`Error::DeviceUnavailable`] if the service is unreachable.
    fn open(&self, client_name: &str) -> Result<Box<dyn DeviceClient>>;
}

// ---------------------------------------------------------------------------
// cpal implementation
// ---------------------------------------------------------------------------

/// Wrapper to hold `cpal::Stream` in a `Send` context.
///
/// # Safety
/// `cpal::Stream` is `!Send` due to platform internals. This is safe because
/// the owning client is only driven from the control thread.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for StreamHandle {}

/// cpal-backed [`DeviceBackend`] using the default host.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    device_index: Option<usize>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self { device_index: None }
    }

    /// Target a specific output device instead of the default one.
    pub fn with_device(index: usize) -> Self {
        Self {
            device_index: Some(index),
        }
    }

    /// List available output devices.
    pub fn output_devices() -> Result<Vec<String>> {
        cpal::default_host()
            .output_devices()?
            .map(|d| Ok(d.name()?))
            .collect()
    }
}

impl DeviceBackend for CpalBackend {
    fn open(&self, client_name: &str) -> Result<Box<dyn DeviceClient>> {
        let device = get_device(self.device_index)?;
        let config = device.default_output_config()?;
        tracing::debug!(
            client = client_name,
            rate = config.sample_rate().0,
            "opened audio device client"
        );
        Ok(Box::new(CpalClient {
            client_name: client_name.to_string(),
            device_index: self.device_index,
            sample_rate: config.sample_rate().0,
            port: None,
            process: None,
            shutdown: Arc::new(Mutex::new(None)),
            stream: None,
        }))
    }
}

/// One cpal device connection.
///
/// cpal exposes devices rather than a port graph, so the port operations map
/// accordingly: `register_port` names the output stream, `ports` enumerates
/// output devices, and `connect` retargets the client to one of them (only
/// before activation).
pub struct CpalClient {
    client_name: String,
    device_index: Option<usize>,
    sample_rate: u32,
    port: Option<String>,
    process: Option<ProcessFn>,
    shutdown: Arc<Mutex<Option<ShutdownFn>>>,
    stream: Option<StreamHandle>,
}

impl DeviceClient for CpalClient {
    fn register_port(&mut self, name: &str) -> Result<()> {
        if self.port.is_some() {
            return Err(Error::PortRegistration(format!(
                "client {} already has an output port",
                self.client_name
            )));
        }
        self.port = Some(name.to_string());
        Ok(())
    }

    fn set_process_callback(&mut self, callback: ProcessFn) {
        self.process = Some(callback);
    }

    fn set_shutdown_callback(&mut self, callback: ShutdownFn) {
        *self.shutdown.lock() = Some(callback);
    }

    fn activate(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        if self.port.is_none() {
            return Err(Error::ClientState("no output port registered".into()));
        }
        let process = self
            .process
            .take()
            .ok_or_else(|| Error::ClientState("no process callback installed".into()))?;

        let device = get_device(self.device_index)?;
        let config = device.default_output_config()?;
        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &config.into(), process, self.shutdown.clone())?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &config.into(), process, self.shutdown.clone())?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &config.into(), process, self.shutdown.clone())?
            }
            format => {
                return Err(Error::InvalidConfig(format!(
                    "unsupported sample format: {format:?}"
                )));
            }
        };
        stream.play()?;
        self.stream = Some(StreamHandle(stream));
        tracing::info!(client = self.client_name, "audio client activated");
        Ok(())
    }

    fn deactivate(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!(client = self.client_name, "audio client deactivated");
        }
    }

    fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn ports(&self) -> Result<Vec<String>> {
        CpalBackend::output_devices()
    }

    fn connect(&mut self, port_name: &str, target: &str) -> Result<()> {
        if self.is_active() {
            return Err(Error::ClientState(
                "cannot retarget an active client".into(),
            ));
        }
        if self.port.as_deref() != Some(port_name) {
            return Err(Error::PortRegistration(format!(
                "unknown port: {port_name}"
            )));
        }
        let index = Self::find_device(target)?;
        let device = get_device(Some(index))?;
        self.sample_rate = device.default_output_config()?.sample_rate().0;
        self.device_index = Some(index);
        Ok(())
    }
}

impl CpalClient {
    fn find_device(name: &str) -> Result<usize> {
        for (i, device) in cpal::default_host().output_devices()?.enumerate() {
            if device.name()? == name {
                return Ok(i);
            }
        }
        Err(Error::DeviceUnavailable(format!(
            "no output device named {name}"
        )))
    }
}

fn get_device(index: Option<usize>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match index {
        Some(i) => {
            let devices: Vec<_> = host.output_devices()?.collect();
            let count = devices.len();
            devices.into_iter().nth(i).ok_or_else(|| {
                Error::DeviceUnavailable(format!(
                    "device index {i} out of range ({count} available)"
                ))
            })
        }
        None => host
            .default_output_device()
            .ok_or_else(|| Error::DeviceUnavailable("no output device available".into())),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut process: ProcessFn,
    shutdown: Arc<Mutex<Option<ShutdownFn>>>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;

    // Pre-allocated mono buffer (grows on first callback, then stable).
    let mut mono = Vec::<f32>::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let frames = data.len() / channels;
                if mono.len() < frames {
                    mono.resize(frames, 0.0);
                }
                process(&mut mono[..frames]);
                write_output(data, channels, &mono);
            }));

            if result.is_err() {
                output_silence(data);
            }
        },
        move |err| {
            tracing::warn!(%err, "audio stream error");
            if let Some(callback) = shutdown.lock().take() {
                callback();
            }
        },
        None,
    )?;

    Ok(stream)
}

/// Duplicate the mono render onto every device channel, converting formats.
#[inline]
fn write_output<T: cpal::SizedSample + cpal::FromSample<f32>>(
    data: &mut [T],
    channels: usize,
    mono: &[f32],
) {
    for (i, sample) in data.iter_mut().enumerate() {
        *sample = T::from_sample(mono[i / channels]);
    }
}

/// Output silence (panic recovery).
#[inline]
fn output_silence<T: cpal::SizedSample + cpal::FromSample<f32>>(data: &mut [T]) {
    for sample in data.iter_mut() {
        *sample = T::from_sample(0.0);
    }
}

// ---------------------------------------------------------------------------
// Fake backend for device-free tests
// ---------------------------------------------------------------------------

pub mod testing {
    //! Fake device backend that runs the process callback on a simulated
    //! clock. Used by the integration tests; exposed so downstream crates
    //! can test their control loops the same way.

    use super::*;

    #[derive(Default)]
    struct FakeState {
        port: Option<String>,
        process: Option<ProcessFn>,
        shutdown: Option<ShutdownFn>,
        active: bool,
        captured: Vec<f32>,
        fail_open: bool,
        open_count: usize,
    }

    /// Test backend. Every client opened from it shares this backend's
    /// state, so the test can drive callbacks after handing the client off.
    #[derive(Clone)]
    pub struct FakeBackend {
        state: Arc<Mutex<FakeState>>,
        sample_rate: u32,
    }

    impl FakeBackend {
        pub fn new(sample_rate: u32) -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeState::default())),
                sample_rate,
            }
        }

        /// Make the next `open` fail as if the service were down.
        pub fn set_fail_open(&self, fail: bool) {
            self.state.lock().fail_open = fail;
        }

        /// Run the process callback `cycles` times with `nframes` samples
        /// each, as the device driver would. Returns samples produced.
        pub fn run_cycles(&self, nframes: usize, cycles: usize) -> usize {
            let mut state = self.state.lock();
            if !state.active {
                return 0;
            }
            let mut produced = 0;
            let mut scratch = vec![0.0f32; nframes];
            for _ in 0..cycles {
                scratch.fill(0.0);
                if let Some(process) = state.process.as_mut() {
                    process(&mut scratch);
                } else {
                    break;
                }
                state.captured.extend_from_slice(&scratch);
                produced += nframes;
            }
            produced
        }

        /// Fire the shutdown notification, as on device disconnect.
        pub fn trigger_shutdown(&self) {
            let callback = {
                let mut state = self.state.lock();
                state.active = false;
                state.shutdown.take()
            };
            if let Some(callback) = callback {
                callback();
            }
        }

        /// All samples produced so far across every cycle.
        pub fn captured(&self) -> Vec<f32> {
            self.state.lock().captured.clone()
        }

        pub fn clear_captured(&self) {
            self.state.lock().captured.clear();
        }

        pub fn is_active(&self) -> bool {
            self.state.lock().active
        }

        pub fn open_count(&self) -> usize {
            self.state.lock().open_count
        }
    }

    impl DeviceBackend for FakeBackend {
        fn open(&self, client_name: &str) -> Result<Box<dyn DeviceClient>> {
            let mut state = self.state.lock();
            if state.fail_open {
                return Err(Error::DeviceUnavailable(format!(
                    "fake service refused client {client_name}"
                )));
            }
            state.open_count += 1;
            // A fresh client supersedes any previous connection.
            state.port = None;
            state.process = None;
            state.shutdown = None;
            state.active = false;
            Ok(Box::new(FakeClient {
                state: Arc::clone(&self.state),
                sample_rate: self.sample_rate,
            }))
        }
    }

    pub struct FakeClient {
        state: Arc<Mutex<FakeState>>,
        sample_rate: u32,
    }

    impl DeviceClient for FakeClient {
        fn register_port(&mut self, name: &str) -> Result<()> {
            let mut state = self.state.lock();
            if state.port.is_some() {
                return Err(Error::PortRegistration("port already registered".into()));
            }
            state.port = Some(name.to_string());
            Ok(())
        }

        fn set_process_callback(&mut self, callback: ProcessFn) {
            self.state.lock().process = Some(callback);
        }

        fn set_shutdown_callback(&mut self, callback: ShutdownFn) {
            self.state.lock().shutdown = Some(callback);
        }

        fn activate(&mut self) -> Result<()> {
            let mut state = self.state.lock();
            if state.port.is_none() {
                return Err(Error::ClientState("no output port registered".into()));
            }
            if state.process.is_none() {
                return Err(Error::ClientState("no process callback installed".into()));
            }
            state.active = true;
            Ok(())
        }

        fn deactivate(&mut self) {
            let mut state = self.state.lock();
            state.active = false;
            state.process = None;
            state.shutdown = None;
        }

        fn is_active(&self) -> bool {
            self.state.lock().active
        }

        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn ports(&self) -> Result<Vec<String>> {
            Ok(vec!["fake:playback_1".into()])
        }

        fn connect(&mut self, _port_name: &str, _target: &str) -> Result<()> {
            Ok(())
        }
    }

    impl Drop for FakeClient {
        fn drop(&mut self) {
            self.deactivate();
        }
    }
}
