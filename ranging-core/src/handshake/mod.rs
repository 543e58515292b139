//! Single-slot flag handshake between the tick interrupt and the consumer.
//!
//! The interrupt is the only writer of the sample and the only setter of the
//! ready flag; the consumer is the only clearer. Release/acquire ordering on the
//! flag guarantees a consumer that observes `ready` also observes the sample
//! stored before it. A publish that lands while the previous sample is still
//! unread overwrites it and bumps the overrun counter.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::ranging::EchoSample;

pub struct SampleCell {
    sample: AtomicU32,
    ready: AtomicBool,
    overruns: AtomicU32,
}

impl SampleCell {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sample: AtomicU32::new(0),
            ready: AtomicBool::new(false),
            overruns: AtomicU32::new(0),
        }
    }

    /// Stores a sample and raises the ready flag. Interrupt side only.
    pub fn publish(&self, sample: EchoSample) {
        let unread = self.ready.load(Ordering::Acquire);
        self.sample.store(sample.quanta(), Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
        if unread {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Reads the pending sample and clears the flag. Consumer side only.
    ///
    /// The flag is cleared after the sample is copied out, so a second call
    /// without an intervening publish returns `None`.
    #[must_use]
    pub fn take(&self) -> Option<EchoSample> {
        if !self.ready.load(Ordering::Acquire) {
            return None;
        }
        let quanta = self.sample.load(Ordering::Relaxed);
        self.ready.store(false, Ordering::Release);
        Some(EchoSample::new(quanta))
    }

    /// Returns `true` while a published sample is waiting to be taken.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Samples overwritten before the consumer took them.
    #[must_use]
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Drops any pending sample and zeroes the overrun counter.
    pub fn clear(&self) {
        self.ready.store(false, Ordering::Release);
        self.sample.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
    }
}

impl Default for SampleCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cell_yields_nothing() {
        let cell = SampleCell::new();
        assert!(!cell.is_ready());
        assert_eq!(cell.take(), None);
    }

    #[test]
    fn take_consumes_the_sample_once() {
        let cell = SampleCell::new();
        cell.publish(EchoSample::new(17));
        assert!(cell.is_ready());
        assert_eq!(cell.take(), Some(EchoSample::new(17)));
        assert_eq!(cell.take(), None);
        assert_eq!(cell.overruns(), 0);
    }

    #[test]
    fn unread_sample_is_overwritten_and_counted() {
        let cell = SampleCell::new();
        cell.publish(EchoSample::new(10));
        cell.publish(EchoSample::new(11));
        cell.publish(EchoSample::new(12));

        assert_eq!(cell.take(), Some(EchoSample::new(12)));
        assert_eq!(cell.overruns(), 2);

        cell.clear();
        assert_eq!(cell.overruns(), 0);
        assert!(!cell.is_ready());
    }
}
