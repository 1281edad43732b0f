//! Metering transport from the audio thread back to the control thread.

use atomic_float::AtomicF32;
use core::sync::atomic::Ordering;

use crate::ring::RingConsumer;

/// One metering record, produced once per callback by the audio thread.
///
/// Lossy by design: when the control thread lags, frames are dropped on the
/// producer side rather than slowing the audio thread.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalysisFrame {
    /// Maximum |sample| written to the device in this callback, post-scaling.
    pub peak: f32,
    /// Output sample position at the end of the callback.
    pub position: u64,
    /// Cumulative count of callbacks that ran out of parameter data.
    pub underruns: u64,
}

/// Cache-line aligned atomic f32, for sharing the live peak level with UI
/// threads without draining the analysis ring.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicPeak {
    value: AtomicF32,
}

impl AtomicPeak {
    pub fn new() -> Self {
        Self {
            value: AtomicF32::new(0.0),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.value.store(value, Ordering::Release);
    }

    /// Read and reset, for peak-hold style meters.
    #[inline]
    pub fn take(&self) -> f32 {
        self.value.swap(0.0, Ordering::AcqRel)
    }
}

impl Default for AtomicPeak {
    fn default() -> Self {
        Self::new()
    }
}

/// Control-side consumer of the analysis ring.
///
/// Absence of data is normal, not an error: the audio thread only reports
/// once per callback and drops reports when the ring is full.
pub struct AnalysisMonitor {
    frames: RingConsumer<AnalysisFrame>,
    latest: Option<AnalysisFrame>,
}

impl AnalysisMonitor {
    pub fn new(frames: RingConsumer<AnalysisFrame>) -> Self {
        Self {
            frames,
            latest: None,
        }
    }

    /// Drain everything available, returning the newest frame if any arrived.
    pub fn poll(&mut self) -> Option<AnalysisFrame> {
        let mut newest = None;
        let mut scratch = [AnalysisFrame::default(); 32];
        loop {
            let n = self.frames.read(&mut scratch);
            if n == 0 {
                break;
            }
            newest = Some(scratch[n - 1]);
        }
        if newest.is_some() {
            self.latest = newest;
        }
        newest
    }

    /// Newest frame seen by any previous `poll`.
    pub fn latest(&self) -> Option<AnalysisFrame> {
        self.latest
    }

    /// Cumulative underrun count from the newest frame seen.
    pub fn underruns(&self) -> u64 {
        self.latest.map(|f| f.underruns).unwrap_or(0)
    }

    /// Discard buffered frames and the cached snapshot.
    /// Control-thread-only, session-stopped-only, like the ring `clear`.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::spsc_ring;

    #[test]
    fn poll_returns_newest_and_caches_it() {
        let (mut tx, rx) = spsc_ring::<AnalysisFrame>(8);
        let mut monitor = AnalysisMonitor::new(rx);
        assert_eq!(monitor.poll(), None);

        for i in 1..=3u64 {
            let frame = AnalysisFrame {
                peak: 0.1 * i as f32,
                position: i * 512,
                underruns: 0,
            };
            assert_eq!(tx.write(core::slice::from_ref(&frame)), 1);
        }

        let newest = monitor.poll().unwrap();
        assert_eq!(newest.position, 3 * 512);
        // Nothing new, but the snapshot sticks.
        assert_eq!(monitor.poll(), None);
        assert_eq!(monitor.latest().unwrap().position, 3 * 512);
    }

    #[test]
    fn atomic_peak_take_resets() {
        let peak = AtomicPeak::new();
        peak.set(0.8);
        assert_eq!(peak.take(), 0.8);
        assert_eq!(peak.get(), 0.0);
    }
}
