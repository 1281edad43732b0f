//! Seam to the articulatory synthesis engine.
//!
//! The vocal-tract model is treated as an opaque render unit: one parameter
//! frame goes in, some number of output samples come out of an internal
//! queue. The rule system that produces parameter trajectories lives outside
//! this crate entirely.

/// Pull-based vocal-tract model contract.
///
/// The render processor owns exactly one model instance and calls it only
/// from the audio thread. Implementations must not allocate, lock, or do I/O
/// in [`load_frame`](VocalTractModel::load_frame) or
/// [`render`](VocalTractModel::render) once warmed up; the internal output
/// queue has to be pre-sized at construction.
pub trait VocalTractModel: Send {
    /// Number of control values in one parameter frame.
    fn parameter_count(&self) -> usize;

    /// Consume one smoothed parameter frame and append the generated samples
    /// to the internal output queue. `frame.len()` equals
    /// [`parameter_count`](VocalTractModel::parameter_count).
    fn load_frame(&mut self, frame: &[f32]);

    /// Samples currently queued and not yet rendered out.
    fn pending(&self) -> usize;

    /// Pop up to `out.len()` queued samples into `out`, returning the number
    /// actually written. The queue may hold fewer than requested; the caller
    /// handles the shortfall.
    fn render(&mut self, out: &mut [f32]) -> usize;

    /// Drop all queued output and internal synthesis state.
    /// Control-thread-only, called only while no callback can fire.
    fn reset(&mut self);
}
