//! GPIO adapters for the transceiver and the indicator outputs.

use embassy_stm32::gpio::{Input, Output};
use ranging_core::feedback::IndicatorSink;
use ranging_core::ranging::{LineLevel, TransceiverLines};

/// Trigger output and echo input of the ultrasonic transceiver.
pub struct HardwareTransceiver<'d> {
    trigger: Output<'d>,
    echo: Input<'d>,
}

impl<'d> HardwareTransceiver<'d> {
    pub fn new(trigger: Output<'d>, echo: Input<'d>) -> Self {
        Self { trigger, echo }
    }
}

impl TransceiverLines for HardwareTransceiver<'_> {
    fn set_trigger(&mut self, level: LineLevel) {
        match level {
            LineLevel::High => self.trigger.set_high(),
            LineLevel::Low => self.trigger.set_low(),
        }
    }

    fn echo(&mut self) -> LineLevel {
        LineLevel::from_high(self.echo.is_high())
    }
}

/// Near LED, approach LED (both active-low), the buzzer line and the fan
/// transistor base.
pub struct IndicatorPanel<'d> {
    near_led: Output<'d>,
    approach_led: Output<'d>,
    buzzer: Output<'d>,
    fan: Output<'d>,
}

impl<'d> IndicatorPanel<'d> {
    pub fn new(
        near_led: Output<'d>,
        approach_led: Output<'d>,
        buzzer: Output<'d>,
        fan: Output<'d>,
    ) -> Self {
        Self {
            near_led,
            approach_led,
            buzzer,
            fan,
        }
    }
}

fn drive_active_low(output: &mut Output<'_>, on: bool) {
    if on {
        output.set_low();
    } else {
        output.set_high();
    }
}

impl IndicatorSink for IndicatorPanel<'_> {
    fn set_near(&mut self, on: bool) {
        drive_active_low(&mut self.near_led, on);
    }

    fn set_approach(&mut self, on: bool) {
        drive_active_low(&mut self.approach_led, on);
    }

    fn set_buzzer(&mut self, level: LineLevel) {
        match level {
            LineLevel::High => self.buzzer.set_high(),
            LineLevel::Low => self.buzzer.set_low(),
        }
    }

    fn set_fan(&mut self, on: bool) {
        if on {
            self.fan.set_high();
        } else {
            self.fan.set_low();
        }
    }
}
