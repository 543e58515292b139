//! Hand-off of converted readings from the consumer task to the indicator task.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Sender, TrySendError};
use ranging_core::consumer::Reading;

use crate::telemetry;

/// Readings buffered between the two tasks.
pub const READING_QUEUE_DEPTH: usize = 4;

/// Non-blocking sender that counts and logs readings it had to drop.
pub struct ReadingForwarder<'ch, M: RawMutex, const N: usize> {
    sender: Sender<'ch, M, Reading, N>,
    dropped: u32,
}

impl<'ch, M: RawMutex, const N: usize> ReadingForwarder<'ch, M, N> {
    pub fn new(sender: Sender<'ch, M, Reading, N>) -> Self {
        Self { sender, dropped: 0 }
    }

    /// Queues `reading`. A full queue drops it; the next reading that fits
    /// brings the indicators up to date.
    pub fn forward(&mut self, reading: Reading) -> bool {
        match self.sender.try_send(reading) {
            Ok(()) => true,
            Err(TrySendError::Full(reading)) => {
                self.dropped = self.dropped.wrapping_add(1);
                telemetry::log_reading_dropped(&reading, self.dropped);
                false
            }
        }
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}
