//! Lock-free float accumulator for scatter passes.
//!
//! Several particles may target the same grid node in the same pass, so
//! accumulation goes through a compare-and-swap loop on the raw bits.

use std::sync::atomic::{AtomicU32, Ordering};

/// An `f32` stored as `AtomicU32` bits.
///
/// All accesses use `Relaxed`: passes are separated by rayon joins, which
/// already provide the happens-before edge between stages.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Add `delta` and return the previous value.
    #[inline]
    pub fn fetch_add(&self, delta: f32) -> f32 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(prev) => return f32::from_bits(prev),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Allocate `len` accumulators initialised to `value`.
pub fn atomic_vec(len: usize, value: f32) -> Vec<AtomicF32> {
    (0..len).map(|_| AtomicF32::new(value)).collect()
}
