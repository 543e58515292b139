//! Foreground side of the ranging pipeline.
//!
//! [`RangingConsumer::poll_and_convert`] drains the [`SampleCell`], turns the
//! echo width into centimetres, feeds the [`ApproachTracker`], and classifies
//! the result into a [`ProximityBand`] for the indicator collaborators.

use core::fmt;

use crate::feedback::ProximityBand;
use crate::handshake::SampleCell;
use crate::ranging::EchoSample;
use crate::timing::{MICROS_PER_CM_ROUND_TRIP, OUT_OF_RANGE_SENTINEL_CM, RangingConfig, TickQuantum};

/// Converts an echo width to centimetres, truncating toward zero.
#[must_use]
pub fn quanta_to_cm(quanta: u32, quantum: TickQuantum) -> u32 {
    let nanos = u64::from(quanta) * u64::from(quantum.as_nanos());
    let cm = nanos / (u64::from(MICROS_PER_CM_ROUND_TRIP) * 1_000);
    u32::try_from(cm).unwrap_or(u32::MAX)
}

/// Physical interpretation of one echo sample.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Distance {
    Centimeters(u32),
    /// Echo was wider than the configured bound.
    OutOfRange,
}

impl Distance {
    /// Interprets a sample under `config`, applying the out-of-range cap.
    #[must_use]
    pub fn from_sample(sample: EchoSample, config: &RangingConfig) -> Self {
        if sample.quanta() > config.max_echo_quanta {
            Distance::OutOfRange
        } else {
            Distance::Centimeters(quanta_to_cm(sample.quanta(), config.quantum))
        }
    }

    #[must_use]
    pub const fn centimeters(self) -> Option<u32> {
        match self {
            Distance::Centimeters(cm) => Some(cm),
            Distance::OutOfRange => None,
        }
    }

    /// Distance for numeric displays, with out-of-range shown as the sentinel.
    #[must_use]
    pub const fn display_cm(self) -> u32 {
        match self {
            Distance::Centimeters(cm) => cm,
            Distance::OutOfRange => OUT_OF_RANGE_SENTINEL_CM,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Centimeters(cm) => write!(f, "{cm} cm"),
            Distance::OutOfRange => write!(f, "out-of-range ({OUT_OF_RANGE_SENTINEL_CM})"),
        }
    }
}

/// Result of comparing a distance with the previous one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ApproachSignal {
    /// Centimetres closed since the previous sample; zero when holding or receding.
    pub delta_cm: u32,
    pub fast: bool,
}

/// Two-sample differencing over the fixed cycle period.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ApproachTracker {
    threshold_cm: u32,
    previous_cm: Option<u32>,
}

impl ApproachTracker {
    #[must_use]
    pub const fn new(threshold_cm: u32) -> Self {
        Self {
            threshold_cm,
            previous_cm: None,
        }
    }

    #[must_use]
    pub const fn threshold_cm(&self) -> u32 {
        self.threshold_cm
    }

    #[must_use]
    pub const fn previous_cm(&self) -> Option<u32> {
        self.previous_cm
    }

    /// Feeds one distance. The first distance after construction or
    /// [`reset`](Self::reset) only seeds the tracker and yields `None`.
    pub fn observe(&mut self, distance_cm: u32) -> Option<ApproachSignal> {
        let signal = self.previous_cm.map(|previous| {
            let delta_cm = previous.saturating_sub(distance_cm);
            ApproachSignal {
                delta_cm,
                fast: delta_cm >= self.threshold_cm,
            }
        });
        self.previous_cm = Some(distance_cm);
        signal
    }

    pub fn reset(&mut self) {
        self.previous_cm = None;
    }
}

/// One converted sample.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Reading {
    pub sample: EchoSample,
    pub distance: Distance,
    pub approach: Option<ApproachSignal>,
    pub band: ProximityBand,
}

impl Reading {
    #[must_use]
    pub fn is_fast_approach(&self) -> bool {
        self.approach.is_some_and(|signal| signal.fast)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] width={}q",
            self.distance,
            self.band,
            self.sample.quanta()
        )?;
        if let Some(signal) = self.approach {
            write!(f, " delta={}cm", signal.delta_cm)?;
            if signal.fast {
                f.write_str(" FAST")?;
            }
        }
        Ok(())
    }
}

/// Outcome of a single poll.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsumerPoll {
    /// The flag was clear; nothing to report. Also what an echo timeout looks like.
    NoNewData,
    Reading(Reading),
}

impl ConsumerPoll {
    #[must_use]
    pub const fn reading(self) -> Option<Reading> {
        match self {
            ConsumerPoll::Reading(reading) => Some(reading),
            ConsumerPoll::NoNewData => None,
        }
    }
}

/// Foreground reader paired with one [`SampleCell`].
pub struct RangingConsumer<'a> {
    cell: &'a SampleCell,
    config: RangingConfig,
    tracker: Option<ApproachTracker>,
    last: Option<Reading>,
    readings: u32,
}

impl<'a> RangingConsumer<'a> {
    /// Approach tracking follows `config.approach_threshold_cm`.
    #[must_use]
    pub fn new(cell: &'a SampleCell, config: RangingConfig) -> Self {
        Self {
            cell,
            config,
            tracker: config.approach_threshold_cm.map(ApproachTracker::new),
            last: None,
            readings: 0,
        }
    }

    /// Takes the pending sample, if any, and converts it.
    pub fn poll_and_convert(&mut self) -> ConsumerPoll {
        let Some(sample) = self.cell.take() else {
            return ConsumerPoll::NoNewData;
        };

        let distance = Distance::from_sample(sample, &self.config);
        let approach = match (self.tracker.as_mut(), distance) {
            (Some(tracker), Distance::Centimeters(cm)) => tracker.observe(cm),
            (Some(tracker), Distance::OutOfRange) => {
                tracker.reset();
                None
            }
            (None, _) => None,
        };

        let reading = Reading {
            sample,
            distance,
            approach,
            band: ProximityBand::classify(distance, &self.config),
        };
        self.last = Some(reading);
        self.readings = self.readings.wrapping_add(1);
        ConsumerPoll::Reading(reading)
    }

    #[must_use]
    pub fn last_reading(&self) -> Option<Reading> {
        self.last
    }

    #[must_use]
    pub fn readings(&self) -> u32 {
        self.readings
    }

    /// Samples the producer overwrote before this consumer took them.
    #[must_use]
    pub fn overruns(&self) -> u32 {
        self.cell.overruns()
    }

    #[must_use]
    pub fn config(&self) -> &RangingConfig {
        &self.config
    }

    #[must_use]
    pub fn tracker(&self) -> Option<&ApproachTracker> {
        self.tracker.as_ref()
    }

    /// Forgets history. Pending samples in the cell are left alone.
    pub fn reset(&mut self) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.reset();
        }
        self.last = None;
        self.readings = 0;
    }
}
