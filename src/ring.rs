//! Lock-free single-producer/single-consumer ring buffer.
//!
//! This is the only data path crossing the control/audio thread boundary.
//! One instance carries parameter frames toward the audio thread, another
//! carries analysis frames back. Both operations are wait-free: a full
//! buffer makes `write` return a short count, an empty one makes `read`
//! return zero. Nothing ever blocks and unread data is never overwritten.
//!
//! The 1:1 thread assignment is enforced by construction: [`spsc_ring`]
//! hands out exactly one [`RingProducer`] and one [`RingConsumer`], both
//! `Send` but not `Clone`.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Cache-line aligned cursor, so the producer and consumer cursors never
/// share a line.
#[repr(align(64))]
struct Cursor(AtomicUsize);

impl Cursor {
    fn new() -> Self {
        Self(AtomicUsize::new(0))
    }
}

struct RingState<T> {
    buf: Box<[UnsafeCell<T>]>,
    mask: usize,
    /// Total elements ever written. Advanced with `Release` after the slots
    /// are filled, observed by the consumer with `Acquire`.
    write: Cursor,
    /// Total elements ever read. Mirror of `write` for the other direction.
    read: Cursor,
}

// The producer and consumer touch disjoint slots: the cursors partition the
// buffer, and each side only moves its own cursor.
unsafe impl<T: Send> Sync for RingState<T> {}
unsafe impl<T: Send> Send for RingState<T> {}

impl<T> RingState<T> {
    #[inline]
    fn capacity(&self) -> usize {
        self.mask + 1
    }
}

/// Create an SPSC ring holding at least `min_capacity` elements.
///
/// The actual capacity is `min_capacity` rounded up to a power of two.
pub fn spsc_ring<T: Copy + Default>(min_capacity: usize) -> (RingProducer<T>, RingConsumer<T>) {
    let capacity = min_capacity.max(2).next_power_of_two();
    let buf = (0..capacity)
        .map(|_| UnsafeCell::new(T::default()))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let state = Arc::new(RingState {
        buf,
        mask: capacity - 1,
        write: Cursor::new(),
        read: Cursor::new(),
    });
    (
        RingProducer {
            state: Arc::clone(&state),
        },
        RingConsumer { state },
    )
}

/// Write half of an SPSC ring. Owned by exactly one thread at a time.
pub struct RingProducer<T> {
    state: Arc<RingState<T>>,
}

/// Read half of an SPSC ring. Owned by exactly one thread at a time.
pub struct RingConsumer<T> {
    state: Arc<RingState<T>>,
}

impl<T: Copy> RingProducer<T> {
    /// Copy up to `data.len()` elements into the ring.
    ///
    /// Returns the number actually written; less than requested means the
    /// buffer was full. Never blocks, never overwrites unread data.
    pub fn write(&mut self, data: &[T]) -> usize {
        let state = &*self.state;
        let read = state.read.0.load(Ordering::Acquire);
        // Only this producer advances `write`, so a relaxed load is enough.
        let write = state.write.0.load(Ordering::Relaxed);
        let free = state.capacity() - write.wrapping_sub(read);
        let n = data.len().min(free);
        for (i, value) in data[..n].iter().enumerate() {
            let slot = write.wrapping_add(i) & state.mask;
            unsafe { *state.buf[slot].get() = *value };
        }
        // Publish the slots before the new cursor becomes visible.
        state.write.0.store(write.wrapping_add(n), Ordering::Release);
        n
    }

    /// Elements that can be written without truncation.
    pub fn write_space(&self) -> usize {
        let read = self.state.read.0.load(Ordering::Acquire);
        let write = self.state.write.0.load(Ordering::Relaxed);
        self.state.capacity() - write.wrapping_sub(read)
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity()
    }
}

impl<T: Copy> RingConsumer<T> {
    /// Copy up to `data.len()` available elements out of the ring.
    ///
    /// Returns the number actually read; zero means the buffer was empty.
    pub fn read(&mut self, data: &mut [T]) -> usize {
        let state = &*self.state;
        let write = state.write.0.load(Ordering::Acquire);
        let read = state.read.0.load(Ordering::Relaxed);
        let available = write.wrapping_sub(read);
        let n = data.len().min(available);
        for (i, slot) in data[..n].iter_mut().enumerate() {
            let idx = read.wrapping_add(i) & state.mask;
            *slot = unsafe { *state.buf[idx].get() };
        }
        // Release the consumed slots back to the producer.
        state.read.0.store(read.wrapping_add(n), Ordering::Release);
        n
    }

    /// Elements available for reading.
    pub fn read_space(&self) -> usize {
        let write = self.state.write.0.load(Ordering::Acquire);
        let read = self.state.read.0.load(Ordering::Relaxed);
        write.wrapping_sub(read)
    }

    /// Discard all unread data.
    ///
    /// Control-thread-only: must not run while the other side's thread is
    /// live (the session only calls this while stopped).
    pub fn clear(&mut self) {
        let write = self.state.write.0.load(Ordering::Acquire);
        self.state.read.0.store(write, Ordering::Release);
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity()
    }
}
