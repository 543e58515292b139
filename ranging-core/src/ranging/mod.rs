//! Tick-driven ranging state machine.
//!
//! [`RangingCycle::advance`] is the whole protocol as a pure function: given
//! the current phase, the echo level sampled this tick, and the timing
//! configuration, it returns the next phase plus the side effects to apply.
//! [`RangingStateMachine`] wraps it with the transceiver lines and the shared
//! [`SampleCell`], and is what the timer interrupt calls once per quantum.
//!
//! Cycle order is fixed:
//!
//! ```text
//! Trigger -> TriggerHold -> AwaitEcho -> MeasureEcho -> Cooldown -> Trigger
//!                               \_________(timeout)_____^
//! ```

use core::fmt;

use crate::handshake::SampleCell;
use crate::timing::RangingConfig;

/// Active phase of the ranging cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RangingState {
    Trigger,
    TriggerHold,
    AwaitEcho,
    MeasureEcho,
    Cooldown,
}

impl RangingState {
    /// Short label used in logs and status output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            RangingState::Trigger => "trigger",
            RangingState::TriggerHold => "trigger-hold",
            RangingState::AwaitEcho => "await-echo",
            RangingState::MeasureEcho => "measure-echo",
            RangingState::Cooldown => "cooldown",
        }
    }
}

impl fmt::Display for RangingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Logic level of a transceiver line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineLevel {
    Low,
    High,
}

impl LineLevel {
    #[must_use]
    pub const fn from_high(high: bool) -> Self {
        if high { LineLevel::High } else { LineLevel::Low }
    }

    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, LineLevel::High)
    }
}

/// Input observed by the state machine on a single tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickEvent {
    pub echo: LineLevel,
}

impl TickEvent {
    #[must_use]
    pub const fn new(echo: LineLevel) -> Self {
        Self { echo }
    }

    #[must_use]
    pub const fn echo_high() -> Self {
        Self::new(LineLevel::High)
    }

    #[must_use]
    pub const fn echo_low() -> Self {
        Self::new(LineLevel::Low)
    }
}

/// Echo pulse width in tick quanta.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct EchoSample(u32);

impl EchoSample {
    #[must_use]
    pub const fn new(quanta: u32) -> Self {
        Self(quanta)
    }

    #[must_use]
    pub const fn quanta(self) -> u32 {
        self.0
    }
}

/// How a measurement cycle ended, reported on the tick it ends.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CycleOutcome {
    /// Echo fell within the bound; the sample was published.
    Sample(EchoSample),
    /// Echo never rose. Nothing is published.
    EchoTimeout { waited_quanta: u32 },
    /// Echo stayed high past the bound; the capped width was published.
    OutOfRange(EchoSample),
}

impl CycleOutcome {
    /// Sample handed to the consumer for this outcome, if any.
    #[must_use]
    pub const fn published(self) -> Option<EchoSample> {
        match self {
            CycleOutcome::Sample(sample) | CycleOutcome::OutOfRange(sample) => Some(sample),
            CycleOutcome::EchoTimeout { .. } => None,
        }
    }
}

/// Side effects produced by one transition.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TickEffects {
    /// New level for the trigger line, when it changes this tick.
    pub trigger: Option<LineLevel>,
    pub outcome: Option<CycleOutcome>,
}

impl TickEffects {
    const NONE: Self = Self {
        trigger: None,
        outcome: None,
    };

    const fn drive(level: LineLevel) -> Self {
        Self {
            trigger: Some(level),
            outcome: None,
        }
    }

    const fn finish(outcome: CycleOutcome) -> Self {
        Self {
            trigger: None,
            outcome: Some(outcome),
        }
    }
}

/// Phase plus per-phase tick counter. The counter resets on entry to every phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RangingCycle {
    state: RangingState,
    counter: u32,
}

impl RangingCycle {
    /// Power-on phase: about to raise the trigger.
    #[must_use]
    pub const fn new() -> Self {
        Self::enter(RangingState::Trigger)
    }

    const fn enter(state: RangingState) -> Self {
        Self { state, counter: 0 }
    }

    #[must_use]
    pub const fn state(self) -> RangingState {
        self.state
    }

    #[must_use]
    pub const fn counter(self) -> u32 {
        self.counter
    }

    /// Applies one tick to the cycle.
    #[must_use]
    pub const fn advance(self, event: TickEvent, config: &RangingConfig) -> (Self, TickEffects) {
        let echo_high = event.echo.is_high();
        match self.state {
            RangingState::Trigger => (
                Self::enter(RangingState::TriggerHold),
                TickEffects::drive(LineLevel::High),
            ),
            // The pulse has now been high for exactly one quantum.
            RangingState::TriggerHold => (
                Self::enter(RangingState::AwaitEcho),
                TickEffects::drive(LineLevel::Low),
            ),
            RangingState::AwaitEcho => {
                if echo_high {
                    return (Self::enter(RangingState::MeasureEcho), TickEffects::NONE);
                }
                let counter = self.counter.saturating_add(1);
                if counter > config.echo_timeout_quanta {
                    (
                        Self::enter(RangingState::Cooldown),
                        TickEffects::finish(CycleOutcome::EchoTimeout {
                            waited_quanta: counter,
                        }),
                    )
                } else {
                    (Self { counter, ..self }, TickEffects::NONE)
                }
            }
            RangingState::MeasureEcho => {
                if !echo_high {
                    let sample = EchoSample::new(self.counter);
                    return (
                        Self::enter(RangingState::Cooldown),
                        TickEffects::finish(CycleOutcome::Sample(sample)),
                    );
                }
                let counter = self.counter.saturating_add(1);
                if counter > config.max_echo_quanta {
                    (
                        Self::enter(RangingState::Cooldown),
                        TickEffects::finish(CycleOutcome::OutOfRange(EchoSample::new(counter))),
                    )
                } else {
                    (Self { counter, ..self }, TickEffects::NONE)
                }
            }
            RangingState::Cooldown => {
                let counter = self.counter.saturating_add(1);
                if counter > config.cooldown_quanta {
                    (Self::enter(RangingState::Trigger), TickEffects::NONE)
                } else {
                    (Self { counter, ..self }, TickEffects::NONE)
                }
            }
        }
    }
}

impl Default for RangingCycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Abstraction over the trigger output and echo input pins.
pub trait TransceiverLines {
    /// Drives the trigger line.
    fn set_trigger(&mut self, level: LineLevel);

    /// Samples the echo line.
    fn echo(&mut self) -> LineLevel;
}

/// Lines for a transceiver that never answers: echo reads low forever.
#[derive(Copy, Clone, Debug, Default)]
pub struct DisconnectedTransceiver;

impl DisconnectedTransceiver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransceiverLines for DisconnectedTransceiver {
    fn set_trigger(&mut self, _: LineLevel) {}

    fn echo(&mut self) -> LineLevel {
        LineLevel::Low
    }
}

/// Interrupt-side driver: owns the lines and publishes into a [`SampleCell`].
pub struct RangingStateMachine<'a, L> {
    lines: L,
    config: RangingConfig,
    cycle: RangingCycle,
    cell: &'a SampleCell,
}

impl<'a, L: TransceiverLines> RangingStateMachine<'a, L> {
    /// Creates a machine in the `Trigger` phase and parks the trigger line low.
    pub fn new(mut lines: L, config: RangingConfig, cell: &'a SampleCell) -> Self {
        lines.set_trigger(LineLevel::Low);
        Self {
            lines,
            config,
            cycle: RangingCycle::new(),
            cell,
        }
    }

    /// Runs one quantum of the protocol. Call exactly once per timer interrupt.
    ///
    /// The returned outcome is diagnostic only; consumers learn about samples
    /// through the cell.
    pub fn tick(&mut self) -> Option<CycleOutcome> {
        let event = TickEvent::new(self.lines.echo());
        let (next, effects) = self.cycle.advance(event, &self.config);
        self.cycle = next;

        if let Some(level) = effects.trigger {
            self.lines.set_trigger(level);
        }
        if let Some(sample) = effects.outcome.and_then(CycleOutcome::published) {
            self.cell.publish(sample);
        }

        effects.outcome
    }

    #[must_use]
    pub fn state(&self) -> RangingState {
        self.cycle.state()
    }

    #[must_use]
    pub fn cycle(&self) -> RangingCycle {
        self.cycle
    }

    #[must_use]
    pub fn config(&self) -> &RangingConfig {
        &self.config
    }

    #[must_use]
    pub fn lines(&self) -> &L {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: RangingConfig = RangingConfig::DEFAULT
        .with_echo_timeout(4)
        .with_cooldown(3)
        .with_max_echo(6);

    fn step(cycle: RangingCycle, echo_high: bool) -> (RangingCycle, TickEffects) {
        cycle.advance(TickEvent::new(LineLevel::from_high(echo_high)), &CONFIG)
    }

    #[test]
    fn trigger_is_raised_then_lowered_on_consecutive_ticks() {
        let (cycle, effects) = step(RangingCycle::new(), false);
        assert_eq!(cycle.state(), RangingState::TriggerHold);
        assert_eq!(effects.trigger, Some(LineLevel::High));

        let (cycle, effects) = step(cycle, true);
        assert_eq!(cycle.state(), RangingState::AwaitEcho);
        assert_eq!(cycle.counter(), 0);
        assert_eq!(effects.trigger, Some(LineLevel::Low));
    }

    #[test]
    fn await_echo_times_out_after_configured_quanta() {
        let mut cycle = RangingCycle::new();
        (cycle, _) = step(cycle, false);
        (cycle, _) = step(cycle, false);

        for expected in 1..=4 {
            let (next, effects) = step(cycle, false);
            assert_eq!(next.state(), RangingState::AwaitEcho);
            assert_eq!(next.counter(), expected);
            assert_eq!(effects, TickEffects::default());
            cycle = next;
        }

        let (cycle, effects) = step(cycle, false);
        assert_eq!(cycle.state(), RangingState::Cooldown);
        assert_eq!(cycle.counter(), 0);
        assert_eq!(
            effects.outcome,
            Some(CycleOutcome::EchoTimeout { waited_quanta: 5 })
        );
    }

    #[test]
    fn measure_counts_high_ticks_after_rising_edge() {
        let mut cycle = RangingCycle::new();
        (cycle, _) = step(cycle, false);
        (cycle, _) = step(cycle, false);
        (cycle, _) = step(cycle, true);
        assert_eq!(cycle.state(), RangingState::MeasureEcho);
        assert_eq!(cycle.counter(), 0);

        for _ in 0..3 {
            (cycle, _) = step(cycle, true);
        }
        let (cycle, effects) = step(cycle, false);
        assert_eq!(cycle.state(), RangingState::Cooldown);
        assert_eq!(
            effects.outcome,
            Some(CycleOutcome::Sample(EchoSample::new(3)))
        );
    }

    #[test]
    fn echo_wider_than_bound_is_capped() {
        let mut cycle = RangingCycle::new();
        (cycle, _) = step(cycle, false);
        (cycle, _) = step(cycle, false);
        (cycle, _) = step(cycle, true);

        let mut outcome = None;
        for _ in 0..7 {
            let (next, effects) = step(cycle, true);
            cycle = next;
            if effects.outcome.is_some() {
                outcome = effects.outcome;
                break;
            }
        }

        assert_eq!(cycle.state(), RangingState::Cooldown);
        assert_eq!(outcome, Some(CycleOutcome::OutOfRange(EchoSample::new(7))));
    }

    #[test]
    fn cooldown_returns_to_trigger_and_ignores_echo() {
        let mut cycle = RangingCycle::enter(RangingState::Cooldown);
        for _ in 0..3 {
            (cycle, _) = step(cycle, true);
            assert_eq!(cycle.state(), RangingState::Cooldown);
        }
        let (cycle, effects) = step(cycle, true);
        assert_eq!(cycle, RangingCycle::new());
        assert_eq!(effects, TickEffects::default());
    }

    #[derive(Default)]
    struct ScriptedLines {
        echo_high: bool,
        trigger: Option<LineLevel>,
        trigger_writes: usize,
    }

    impl TransceiverLines for ScriptedLines {
        fn set_trigger(&mut self, level: LineLevel) {
            self.trigger = Some(level);
            self.trigger_writes += 1;
        }

        fn echo(&mut self) -> LineLevel {
            LineLevel::from_high(self.echo_high)
        }
    }

    #[test]
    fn machine_parks_trigger_low_and_publishes_samples() {
        let cell = SampleCell::new();
        let mut machine = RangingStateMachine::new(ScriptedLines::default(), CONFIG, &cell);
        assert_eq!(machine.lines().trigger, Some(LineLevel::Low));

        assert_eq!(machine.tick(), None);
        assert_eq!(machine.lines().trigger, Some(LineLevel::High));
        assert_eq!(machine.tick(), None);
        assert_eq!(machine.lines().trigger, Some(LineLevel::Low));

        machine.lines_mut().echo_high = true;
        for _ in 0..3 {
            assert_eq!(machine.tick(), None);
        }
        assert!(!cell.is_ready());

        machine.lines_mut().echo_high = false;
        assert_eq!(
            machine.tick(),
            Some(CycleOutcome::Sample(EchoSample::new(2)))
        );
        assert_eq!(machine.state(), RangingState::Cooldown);
        assert_eq!(cell.take(), Some(EchoSample::new(2)));
        assert_eq!(machine.lines().trigger_writes, 3);
    }

    #[test]
    fn disconnected_transceiver_never_publishes() {
        let cell = SampleCell::new();
        let mut machine = RangingStateMachine::new(DisconnectedTransceiver::new(), CONFIG, &cell);

        let mut timeouts = 0;
        for _ in 0..100 {
            if let Some(CycleOutcome::EchoTimeout { .. }) = machine.tick() {
                timeouts += 1;
            }
        }

        assert!(timeouts > 0);
        assert!(!cell.is_ready());
        assert_eq!(cell.take(), None);
    }
}
