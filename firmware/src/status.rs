#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The tick interrupt may only touch these atomics; it never logs. The
//! consumer task reads them back to detect timeouts and to assemble a
//! [`RangingSnapshot`] for the periodic status log.

use portable_atomic::{AtomicU8, AtomicU32, Ordering};
use ranging_core::consumer::{Distance, Reading};
use ranging_core::feedback::ProximityBand;
use ranging_core::ranging::{CycleOutcome, RangingState};
use ranging_core::status::RangingSnapshot;

const UNKNOWN: u8 = 0;
const UNKNOWN_DISTANCE: u32 = 0;
const OUT_OF_RANGE_DISTANCE: u32 = u32::MAX;

/// Active ranging phase (index + 1, 0 == unknown).
static STATE: AtomicU8 = AtomicU8::new(UNKNOWN);
static CYCLES: AtomicU32 = AtomicU32::new(0);
static SAMPLES: AtomicU32 = AtomicU32::new(0);
static TIMEOUTS: AtomicU32 = AtomicU32::new(0);
static OUT_OF_RANGE: AtomicU32 = AtomicU32::new(0);
static FAST_APPROACHES: AtomicU32 = AtomicU32::new(0);
/// Last distance in cm (+1), [`OUT_OF_RANGE_DISTANCE`], or 0 when unknown.
static LAST_DISTANCE: AtomicU32 = AtomicU32::new(UNKNOWN_DISTANCE);
/// Last proximity band (index + 1, 0 == unknown).
static LAST_BAND: AtomicU8 = AtomicU8::new(UNKNOWN);

const fn encode_state(state: RangingState) -> u8 {
    match state {
        RangingState::Trigger => 1,
        RangingState::TriggerHold => 2,
        RangingState::AwaitEcho => 3,
        RangingState::MeasureEcho => 4,
        RangingState::Cooldown => 5,
    }
}

const fn decode_state(raw: u8) -> Option<RangingState> {
    match raw {
        1 => Some(RangingState::Trigger),
        2 => Some(RangingState::TriggerHold),
        3 => Some(RangingState::AwaitEcho),
        4 => Some(RangingState::MeasureEcho),
        5 => Some(RangingState::Cooldown),
        _ => None,
    }
}

const fn encode_band(band: ProximityBand) -> u8 {
    match band {
        ProximityBand::Near => 1,
        ProximityBand::Close => 2,
        ProximityBand::Clear => 3,
        ProximityBand::OutOfRange => 4,
    }
}

const fn decode_band(raw: u8) -> Option<ProximityBand> {
    match raw {
        1 => Some(ProximityBand::Near),
        2 => Some(ProximityBand::Close),
        3 => Some(ProximityBand::Clear),
        4 => Some(ProximityBand::OutOfRange),
        _ => None,
    }
}

fn encode_distance(distance: Distance) -> u32 {
    match distance {
        Distance::Centimeters(cm) => cm.saturating_add(1).min(OUT_OF_RANGE_DISTANCE - 1),
        Distance::OutOfRange => OUT_OF_RANGE_DISTANCE,
    }
}

fn decode_distance(raw: u32) -> Option<Distance> {
    match raw {
        UNKNOWN_DISTANCE => None,
        OUT_OF_RANGE_DISTANCE => Some(Distance::OutOfRange),
        value => Some(Distance::Centimeters(value - 1)),
    }
}

/// Records the phase the state machine is in after a tick. Interrupt safe.
pub fn record_state(state: RangingState) {
    STATE.store(encode_state(state), Ordering::Relaxed);
}

/// Counts a finished cycle. Interrupt safe.
pub fn record_outcome(outcome: CycleOutcome) {
    CYCLES.fetch_add(1, Ordering::Relaxed);
    let counter = match outcome {
        CycleOutcome::Sample(_) => &SAMPLES,
        CycleOutcome::EchoTimeout { .. } => &TIMEOUTS,
        CycleOutcome::OutOfRange(_) => &OUT_OF_RANGE,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Stores the reading most recently converted by the consumer.
pub fn record_reading(reading: &Reading) {
    LAST_DISTANCE.store(encode_distance(reading.distance), Ordering::Relaxed);
    LAST_BAND.store(encode_band(reading.band), Ordering::Relaxed);
    if reading.is_fast_approach() {
        FAST_APPROACHES.fetch_add(1, Ordering::Relaxed);
    }
}

/// Echo timeouts observed since boot.
pub fn timeouts() -> u32 {
    TIMEOUTS.load(Ordering::Relaxed)
}

/// Builds a [`RangingSnapshot`] from the stored counters.
pub fn snapshot(overruns: u32) -> RangingSnapshot {
    RangingSnapshot {
        state: decode_state(STATE.load(Ordering::Relaxed)),
        cycles: CYCLES.load(Ordering::Relaxed),
        samples: SAMPLES.load(Ordering::Relaxed),
        timeouts: timeouts(),
        out_of_range: OUT_OF_RANGE.load(Ordering::Relaxed),
        overruns,
        fast_approaches: FAST_APPROACHES.load(Ordering::Relaxed),
        last_distance: decode_distance(LAST_DISTANCE.load(Ordering::Relaxed)),
        last_band: decode_band(LAST_BAND.load(Ordering::Relaxed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_round_trip() {
        for state in [
            RangingState::Trigger,
            RangingState::TriggerHold,
            RangingState::AwaitEcho,
            RangingState::MeasureEcho,
            RangingState::Cooldown,
        ] {
            assert_eq!(decode_state(encode_state(state)), Some(state));
        }
        assert_eq!(decode_state(UNKNOWN), None);
    }

    #[test]
    fn zero_distance_is_distinct_from_unknown() {
        assert_eq!(decode_distance(UNKNOWN_DISTANCE), None);
        assert_eq!(
            decode_distance(encode_distance(Distance::Centimeters(0))),
            Some(Distance::Centimeters(0))
        );
        assert_eq!(
            decode_distance(encode_distance(Distance::OutOfRange)),
            Some(Distance::OutOfRange)
        );
        assert_eq!(
            decode_distance(encode_distance(Distance::Centimeters(u32::MAX))),
            Some(Distance::Centimeters(u32::MAX - 2))
        );
    }

    #[test]
    fn band_codes_round_trip() {
        for band in [
            ProximityBand::Near,
            ProximityBand::Close,
            ProximityBand::Clear,
            ProximityBand::OutOfRange,
        ] {
            assert_eq!(decode_band(encode_band(band)), Some(band));
        }
        assert_eq!(decode_band(UNKNOWN), None);
    }
}
