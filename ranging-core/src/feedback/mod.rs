//! Indicator collaborators driven by converted readings.
//!
//! Classification is a pure function of the distance. The state here is the
//! buzzer cadence, which the caller advances from its own periodic tick, and
//! the push-button fan switch, which the caller feeds with raw button samples.

use core::fmt;

use crate::consumer::{Distance, Reading};
use crate::ranging::LineLevel;
use crate::timing::RangingConfig;

/// Buzzer toggle period in cadence ticks while an object is near.
pub const NEAR_TOGGLE_TICKS: u32 = 1;
/// Buzzer toggle period in cadence ticks while an object is close.
pub const CLOSE_TOGGLE_TICKS: u32 = 10;

/// Discrete classification handed to the indicator outputs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProximityBand {
    Near,
    Close,
    Clear,
    OutOfRange,
}

impl ProximityBand {
    #[must_use]
    pub const fn classify(distance: Distance, config: &RangingConfig) -> Self {
        match distance {
            Distance::OutOfRange => ProximityBand::OutOfRange,
            Distance::Centimeters(cm) if cm < config.near_threshold_cm => ProximityBand::Near,
            Distance::Centimeters(cm) if cm < config.close_threshold_cm => ProximityBand::Close,
            Distance::Centimeters(_) => ProximityBand::Clear,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ProximityBand::Near => "near",
            ProximityBand::Close => "close",
            ProximityBand::Clear => "clear",
            ProximityBand::OutOfRange => "out-of-range",
        }
    }
}

impl fmt::Display for ProximityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output lines the feedback controller writes.
pub trait IndicatorSink {
    fn set_near(&mut self, on: bool);
    fn set_approach(&mut self, on: bool);
    fn set_buzzer(&mut self, level: LineLevel);
    fn set_fan(&mut self, on: bool);
}

/// Sink that discards every write.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopIndicators;

impl IndicatorSink for NoopIndicators {
    fn set_near(&mut self, _: bool) {}

    fn set_approach(&mut self, _: bool) {}

    fn set_buzzer(&mut self, _: LineLevel) {}

    fn set_fan(&mut self, _: bool) {}
}

/// Square-wave generator for the buzzer line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BuzzerCadence {
    period_ticks: Option<u32>,
    elapsed: u32,
    level: LineLevel,
}

impl BuzzerCadence {
    pub const SILENT: Self = Self {
        period_ticks: None,
        elapsed: 0,
        level: LineLevel::Low,
    };

    #[must_use]
    pub const fn for_band(band: ProximityBand) -> Self {
        let period_ticks = match band {
            ProximityBand::Near => Some(NEAR_TOGGLE_TICKS),
            ProximityBand::Close => Some(CLOSE_TOGGLE_TICKS),
            ProximityBand::Clear | ProximityBand::OutOfRange => None,
        };
        Self {
            period_ticks,
            ..Self::SILENT
        }
    }

    #[must_use]
    pub const fn is_silent(self) -> bool {
        self.period_ticks.is_none()
    }

    #[must_use]
    pub const fn level(self) -> LineLevel {
        self.level
    }

    /// Advances one cadence tick and returns the buzzer level to drive.
    pub fn step(&mut self) -> LineLevel {
        let Some(period) = self.period_ticks else {
            self.level = LineLevel::Low;
            return self.level;
        };
        self.elapsed += 1;
        if self.elapsed >= period {
            self.elapsed = 0;
            self.level = LineLevel::from_high(!self.level.is_high());
        }
        self.level
    }
}

impl Default for BuzzerCadence {
    fn default() -> Self {
        Self::SILENT
    }
}

/// Push-button fan toggle for a pulled-up, active-low button.
///
/// The fan flips on each press edge (High to Low). Holding the button and
/// releasing it change nothing. Samples are taken as-is, without debouncing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FanSwitch {
    previous: LineLevel,
    on: bool,
}

impl FanSwitch {
    /// Fan off, button released.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            previous: LineLevel::High,
            on: false,
        }
    }

    /// Feeds one button sample. Returns `true` when the fan toggled.
    pub fn observe(&mut self, button: LineLevel) -> bool {
        let pressed = self.previous.is_high() && !button.is_high();
        self.previous = button;
        if pressed {
            self.on = !self.on;
        }
        pressed
    }

    #[must_use]
    pub const fn is_on(self) -> bool {
        self.on
    }
}

impl Default for FanSwitch {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps readings and button samples onto an [`IndicatorSink`].
pub struct FeedbackController<S> {
    sink: S,
    band: Option<ProximityBand>,
    approach: bool,
    cadence: BuzzerCadence,
    fan: FanSwitch,
}

impl<S: IndicatorSink> FeedbackController<S> {
    /// Starts with every indicator off.
    pub fn new(mut sink: S) -> Self {
        sink.set_near(false);
        sink.set_approach(false);
        sink.set_buzzer(LineLevel::Low);
        sink.set_fan(false);
        Self {
            sink,
            band: None,
            approach: false,
            cadence: BuzzerCadence::SILENT,
            fan: FanSwitch::new(),
        }
    }

    /// Updates the LEDs and, when the band changes, restarts the buzzer cadence.
    pub fn apply(&mut self, reading: &Reading) {
        let approach = reading.is_fast_approach();
        if approach != self.approach {
            self.sink.set_approach(approach);
            self.approach = approach;
        }

        if self.band == Some(reading.band) {
            return;
        }
        self.sink.set_near(reading.band == ProximityBand::Near);
        let previous = self.cadence.level();
        self.cadence = BuzzerCadence::for_band(reading.band);
        if previous.is_high() {
            self.sink.set_buzzer(LineLevel::Low);
        }
        self.band = Some(reading.band);
    }

    /// Advances the buzzer cadence by one tick, writing the line on change.
    pub fn tick(&mut self) {
        let previous = self.cadence.level();
        let level = self.cadence.step();
        if level != previous {
            self.sink.set_buzzer(level);
        }
    }

    /// Feeds one button sample, switching the fan on a press edge.
    pub fn observe_button(&mut self, button: LineLevel) {
        if self.fan.observe(button) {
            self.sink.set_fan(self.fan.is_on());
        }
    }

    #[must_use]
    pub fn fan(&self) -> FanSwitch {
        self.fan
    }

    #[must_use]
    pub fn band(&self) -> Option<ProximityBand> {
        self.band
    }

    #[must_use]
    pub fn cadence(&self) -> BuzzerCadence {
        self.cadence
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranging::EchoSample;

    #[derive(Default)]
    struct RecordingSink {
        near: bool,
        approach: bool,
        buzzer: Option<LineLevel>,
        buzzer_writes: usize,
        fan: bool,
        fan_writes: usize,
    }

    impl IndicatorSink for RecordingSink {
        fn set_near(&mut self, on: bool) {
            self.near = on;
        }

        fn set_approach(&mut self, on: bool) {
            self.approach = on;
        }

        fn set_buzzer(&mut self, level: LineLevel) {
            self.buzzer = Some(level);
            self.buzzer_writes += 1;
        }

        fn set_fan(&mut self, on: bool) {
            self.fan = on;
            self.fan_writes += 1;
        }
    }

    fn reading(cm: u32, fast: bool) -> Reading {
        let distance = Distance::Centimeters(cm);
        Reading {
            sample: EchoSample::new(0),
            distance,
            approach: Some(crate::consumer::ApproachSignal {
                delta_cm: if fast { 6 } else { 0 },
                fast,
            }),
            band: ProximityBand::classify(distance, &RangingConfig::DEFAULT),
        }
    }

    #[test]
    fn bands_follow_thresholds() {
        let config = RangingConfig::DEFAULT;
        let band = |cm| ProximityBand::classify(Distance::Centimeters(cm), &config);
        assert_eq!(band(0), ProximityBand::Near);
        assert_eq!(band(14), ProximityBand::Near);
        assert_eq!(band(15), ProximityBand::Close);
        assert_eq!(band(19), ProximityBand::Close);
        assert_eq!(band(20), ProximityBand::Clear);
        assert_eq!(
            ProximityBand::classify(Distance::OutOfRange, &config),
            ProximityBand::OutOfRange
        );
    }

    #[test]
    fn close_cadence_toggles_every_ten_ticks() {
        let mut cadence = BuzzerCadence::for_band(ProximityBand::Close);
        for _ in 0..9 {
            assert_eq!(cadence.step(), LineLevel::Low);
        }
        assert_eq!(cadence.step(), LineLevel::High);
        for _ in 0..9 {
            assert_eq!(cadence.step(), LineLevel::High);
        }
        assert_eq!(cadence.step(), LineLevel::Low);
    }

    #[test]
    fn near_cadence_toggles_every_tick_and_clear_is_silent() {
        let mut near = BuzzerCadence::for_band(ProximityBand::Near);
        assert_eq!(near.step(), LineLevel::High);
        assert_eq!(near.step(), LineLevel::Low);

        let mut clear = BuzzerCadence::for_band(ProximityBand::Clear);
        assert!(clear.is_silent());
        assert_eq!(clear.step(), LineLevel::Low);
    }

    #[test]
    fn controller_drives_leds_and_silences_buzzer_on_band_change() {
        let mut controller = FeedbackController::new(RecordingSink::default());

        controller.apply(&reading(10, true));
        assert!(controller.sink().near);
        assert!(controller.sink().approach);
        controller.tick();
        assert_eq!(controller.sink().buzzer, Some(LineLevel::High));

        controller.apply(&reading(40, false));
        assert!(!controller.sink().near);
        assert!(!controller.sink().approach);
        assert_eq!(controller.sink().buzzer, Some(LineLevel::Low));

        let writes = controller.sink().buzzer_writes;
        for _ in 0..5 {
            controller.tick();
        }
        assert_eq!(controller.sink().buzzer_writes, writes);
        assert_eq!(controller.band(), Some(ProximityBand::Clear));
    }

    #[test]
    fn near_bound_is_strict_for_led_and_buzzer() {
        let mut controller = FeedbackController::new(RecordingSink::default());

        controller.apply(&reading(15, false));
        assert_eq!(controller.band(), Some(ProximityBand::Close));
        assert!(!controller.sink().near);

        controller.apply(&reading(14, false));
        assert_eq!(controller.band(), Some(ProximityBand::Near));
        assert!(controller.sink().near);
    }

    #[test]
    fn fan_toggles_only_on_press_edges() {
        let mut fan = FanSwitch::new();
        assert!(!fan.observe(LineLevel::High));
        assert!(fan.observe(LineLevel::Low));
        assert!(fan.is_on());

        // Holding the button down does not toggle again.
        for _ in 0..5 {
            assert!(!fan.observe(LineLevel::Low));
        }
        // Neither does releasing it.
        assert!(!fan.observe(LineLevel::High));
        assert!(fan.is_on());

        assert!(fan.observe(LineLevel::Low));
        assert!(!fan.is_on());
    }

    #[test]
    fn controller_writes_fan_only_when_it_toggles() {
        let mut controller = FeedbackController::new(RecordingSink::default());
        let initial_writes = controller.sink().fan_writes;
        assert!(!controller.sink().fan);

        for level in [LineLevel::High, LineLevel::Low, LineLevel::Low, LineLevel::High] {
            controller.observe_button(level);
        }
        assert!(controller.sink().fan);
        assert!(controller.fan().is_on());
        assert_eq!(controller.sink().fan_writes, initial_writes + 1);

        controller.observe_button(LineLevel::Low);
        assert!(!controller.sink().fan);
        assert_eq!(controller.sink().fan_writes, initial_writes + 2);
    }
}
