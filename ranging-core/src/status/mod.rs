//! Aggregate counters surfaced by the `status` command and periodic logs.
//!
//! The emulator keeps a [`RangingSnapshot`] directly and updates it through
//! [`RangingSnapshot::record_outcome`] / [`RangingSnapshot::record_reading`].
//! The firmware mirrors the same fields in atomics and assembles a snapshot
//! on demand, so both render through the same [`fmt::Display`] impl.

use core::fmt;

use crate::consumer::{Distance, Reading};
use crate::feedback::ProximityBand;
use crate::ranging::{CycleOutcome, RangingState};

/// Point-in-time view of the ranging pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangingSnapshot {
    pub state: Option<RangingState>,
    /// Cycles that ended, whatever the outcome.
    pub cycles: u32,
    pub samples: u32,
    pub timeouts: u32,
    pub out_of_range: u32,
    pub overruns: u32,
    pub fast_approaches: u32,
    pub last_distance: Option<Distance>,
    pub last_band: Option<ProximityBand>,
}

impl RangingSnapshot {
    /// Builds a snapshot with nothing recorded yet.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            state: None,
            cycles: 0,
            samples: 0,
            timeouts: 0,
            out_of_range: 0,
            overruns: 0,
            fast_approaches: 0,
            last_distance: None,
            last_band: None,
        }
    }

    /// Counts a finished cycle.
    pub fn record_outcome(&mut self, outcome: CycleOutcome) {
        self.cycles = self.cycles.wrapping_add(1);
        match outcome {
            CycleOutcome::Sample(_) => self.samples = self.samples.wrapping_add(1),
            CycleOutcome::EchoTimeout { .. } => self.timeouts = self.timeouts.wrapping_add(1),
            CycleOutcome::OutOfRange(_) => {
                self.out_of_range = self.out_of_range.wrapping_add(1);
            }
        }
    }

    /// Remembers the latest converted reading.
    pub fn record_reading(&mut self, reading: &Reading) {
        self.last_distance = Some(reading.distance);
        self.last_band = Some(reading.band);
        if reading.is_fast_approach() {
            self.fast_approaches = self.fast_approaches.wrapping_add(1);
        }
    }
}

impl Default for RangingSnapshot {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for RangingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            Some(state) => write!(f, "state={state}")?,
            None => f.write_str("state=unknown")?,
        }
        write!(
            f,
            " cycles={} samples={} timeouts={} out-of-range={} overruns={} fast={}",
            self.cycles,
            self.samples,
            self.timeouts,
            self.out_of_range,
            self.overruns,
            self.fast_approaches
        )?;
        match (self.last_distance, self.last_band) {
            (Some(distance), Some(band)) => write!(f, " last={distance} [{band}]"),
            (Some(distance), None) => write!(f, " last={distance}"),
            _ => f.write_str(" last=none"),
        }
    }
}
