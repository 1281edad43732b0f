//! Per-parameter smoothing to avoid audible stepping artifacts.
//!
//! Parameter frames arrive less often than once per output sample; feeding
//! the raw steps into the vocal-tract model produces zipper noise. Each
//! parameter runs through its own moving-average filter before it reaches
//! the model.

/// Moving-average filter over a fixed history window.
///
/// O(1) per call via a running sum, no allocation after construction.
/// Deterministic: the output is the mean of the last `window` inputs
/// (or of all inputs seen so far, while warming up).
#[derive(Debug, Clone)]
pub struct MovingAverageFilter {
    history: Vec<f32>,
    pos: usize,
    filled: usize,
    sum: f64,
}

impl MovingAverageFilter {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            history: vec![0.0; window],
            pos: 0,
            filled: 0,
            sum: 0.0,
        }
    }

    /// Feed one raw sample, get the smoothed value.
    #[inline]
    pub fn next(&mut self, x: f32) -> f32 {
        if self.filled == self.history.len() {
            self.sum -= f64::from(self.history[self.pos]);
        } else {
            self.filled += 1;
        }
        self.history[self.pos] = x;
        self.pos = (self.pos + 1) % self.history.len();
        self.sum += f64::from(x);
        (self.sum / self.filled as f64) as f32
    }

    /// Clear the history window.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.pos = 0;
        self.filled = 0;
        self.sum = 0.0;
    }

    pub fn window(&self) -> usize {
        self.history.len()
    }
}
