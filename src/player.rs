//! Non-real-time playback of a pre-rendered sample buffer.
//!
//! The live session streams parameters; this path auditions a complete
//! render instead. A mutex is the right tool here: neither the render step
//! nor the chunk-copying playback callback runs under the live callback's
//! hard deadline, so a short wait is acceptable.

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::device::{DeviceBackend, DeviceClient};
use crate::{Error, Result};

const CLIENT_NAME: &str = "artic_player";
const OUTPUT_PORT_NAME: &str = "playback";

struct PlayerBuffer {
    samples: Vec<f32>,
    /// Read cursor; always within `[0, samples.len()]`.
    index: usize,
}

/// Double-buffered audition player: fill under the lock, stream under the
/// same lock one chunk at a time.
///
/// `fill_buffer` during an in-flight `play` is allowed; the lock serializes
/// the two, so playback never reads torn data, though swapping content
/// mid-play may be audible.
pub struct BufferedPlayer {
    inner: Arc<Mutex<PlayerBuffer>>,
}

impl BufferedPlayer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PlayerBuffer {
                samples: Vec::new(),
                index: 0,
            })),
        }
    }

    /// Run `f` with exclusive mutable access to the sample buffer. The
    /// closure may overwrite or resize it freely.
    pub fn fill_buffer<F>(&self, f: F)
    where
        F: FnOnce(&mut Vec<f32>),
    {
        let mut guard = self.inner.lock();
        f(&mut guard.samples);
        // The buffer may have shrunk below an in-flight cursor.
        guard.index = guard.index.min(guard.samples.len());
    }

    /// Samples currently buffered.
    pub fn len(&self) -> usize {
        self.inner.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().samples.is_empty()
    }

    /// Stream the buffer through a temporary output client.
    ///
    /// Resets the read index to zero, registers a port, and feeds the device
    /// callback chunk by chunk, holding the lock only for each chunk copy.
    /// The returned handle signals completion (or a device error) once the
    /// buffer is exhausted; the tail of the final callback is silence.
    pub fn play(&self, sample_rate: u32, backend: &dyn DeviceBackend) -> Result<PlaybackHandle> {
        let mut client = backend.open(CLIENT_NAME)?;
        if client.sample_rate() != sample_rate {
            // The device rate wins; a mismatch shifts pitch and duration.
            tracing::warn!(
                requested = sample_rate,
                device = client.sample_rate(),
                "playback sample rate mismatch"
            );
        }
        client.register_port(OUTPUT_PORT_NAME)?;

        self.inner.lock().index = 0;

        let inner = Arc::clone(&self.inner);
        let (done_tx, done_rx) = bounded::<Result<()>>(1);
        let error_tx = done_tx.clone();
        let mut finished = false;

        client.set_process_callback(Box::new(move |out| {
            if finished {
                out.fill(0.0);
                return;
            }
            let copied;
            let exhausted;
            {
                let mut guard = inner.lock();
                let len = guard.samples.len();
                let start = guard.index.min(len);
                copied = (len - start).min(out.len());
                out[..copied].copy_from_slice(&guard.samples[start..start + copied]);
                guard.index = start + copied;
                exhausted = guard.index >= len;
            }
            out[copied..].fill(0.0);
            if exhausted {
                finished = true;
                let _ = done_tx.try_send(Ok(()));
            }
        }));

        client.set_shutdown_callback(Box::new(move || {
            let _ = error_tx.try_send(Err(Error::DeviceLost));
        }));

        client.activate()?;
        Ok(PlaybackHandle {
            client: Some(client),
            done: done_rx,
        })
    }
}

impl Default for BufferedPlayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the playback client alive and carries the completion signal.
pub struct PlaybackHandle {
    client: Option<Box<dyn DeviceClient>>,
    done: Receiver<Result<()>>,
}

impl PlaybackHandle {
    /// Block until the buffer is exhausted or the device fails, then close
    /// the client.
    pub fn wait(mut self) -> Result<()> {
        let result = self
            .done
            .recv()
            .map_err(|_| Error::Playback("playback channel closed".into()))?;
        self.close();
        result
    }

    /// Non-blocking completion check. `None` while still playing.
    pub fn try_wait(&self) -> Option<Result<()>> {
        match self.done.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(Error::Playback("playback channel closed".into())))
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.deactivate();
        }
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.close();
    }
}
