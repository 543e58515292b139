use std::time::Duration;

use ranging_core::ranging::{LineLevel, TransceiverLines};
use ranging_core::timing::{MICROS_PER_CM_ROUND_TRIP, TickQuantum};

/// Delay between the trigger falling edge and the echo rising edge.
pub const ECHO_LATENCY: Duration = Duration::from_micros(250);
/// Farthest reflector the simulated transceiver can see.
pub const MAX_RANGE_CM: u32 = 400;
/// Echo width reported when the reflector is beyond [`MAX_RANGE_CM`].
pub const NO_RETURN_PULSE: Duration = Duration::from_millis(38);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Pulse {
    starts_in: u32,
    remaining: u32,
}

/// Tick-accurate model of an HC-SR04 style transceiver.
///
/// Each trigger falling edge schedules one echo pulse whose width matches the
/// round-trip time to the current target. With no target the echo never rises.
pub struct SimulatedTransceiver {
    quantum: TickQuantum,
    target_cm: Option<u32>,
    trigger_high: bool,
    pulse: Option<Pulse>,
    trigger_pulses: u32,
}

impl SimulatedTransceiver {
    pub fn new(quantum: TickQuantum, target_cm: Option<u32>) -> Self {
        Self {
            quantum,
            target_cm,
            trigger_high: false,
            pulse: None,
            trigger_pulses: 0,
        }
    }

    pub fn target_cm(&self) -> Option<u32> {
        self.target_cm
    }

    /// Takes effect from the next trigger; an echo already in flight is kept.
    pub fn set_target_cm(&mut self, target_cm: Option<u32>) {
        self.target_cm = target_cm;
    }

    pub fn trigger_pulses(&self) -> u32 {
        self.trigger_pulses
    }

    /// Echo width in quanta for a reflector at `cm`, rounded up to whole ticks.
    pub fn echo_quanta_for(&self, cm: u32) -> u32 {
        if cm > MAX_RANGE_CM {
            return self.quantum.quanta_in(NO_RETURN_PULSE);
        }
        let nanos = u64::from(cm) * u64::from(MICROS_PER_CM_ROUND_TRIP) * 1_000;
        let quantum = u64::from(self.quantum.as_nanos().max(1));
        u32::try_from(nanos.div_ceil(quantum)).unwrap_or(u32::MAX)
    }

    fn schedule_echo(&mut self) {
        self.pulse = self.target_cm.map(|cm| Pulse {
            starts_in: self.quantum.quanta_in(ECHO_LATENCY),
            remaining: self.echo_quanta_for(cm),
        });
    }
}

impl TransceiverLines for SimulatedTransceiver {
    fn set_trigger(&mut self, level: LineLevel) {
        let high = level.is_high();
        if high && !self.trigger_high {
            self.trigger_pulses += 1;
        }
        if self.trigger_high && !high {
            self.schedule_echo();
        }
        self.trigger_high = high;
    }

    fn echo(&mut self) -> LineLevel {
        let Some(pulse) = self.pulse.as_mut() else {
            return LineLevel::Low;
        };
        if pulse.starts_in > 0 {
            pulse.starts_in -= 1;
            return LineLevel::Low;
        }
        if pulse.remaining > 0 {
            pulse.remaining -= 1;
            return LineLevel::High;
        }
        self.pulse = None;
        LineLevel::Low
    }
}
