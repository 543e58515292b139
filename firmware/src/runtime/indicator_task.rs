use embassy_futures::select::{Either, select};
use embassy_stm32::gpio::Input;
use embassy_time::{Duration, Ticker};
use ranging_core::feedback::FeedbackController;
use ranging_core::ranging::LineLevel;

use super::ReadingReceiver;
use crate::hw::IndicatorPanel;

/// Buzzer cadence tick. Near toggles every tick (500 Hz tone), close every ten.
/// The fan button is sampled on the same tick.
const CADENCE_INTERVAL: Duration = Duration::from_millis(1);

#[embassy_executor::task]
pub async fn run(
    panel: IndicatorPanel<'static>,
    fan_button: Input<'static>,
    readings: ReadingReceiver,
) -> ! {
    let mut feedback = FeedbackController::new(panel);
    let mut cadence = Ticker::every(CADENCE_INTERVAL);

    loop {
        match select(readings.receive(), cadence.next()).await {
            Either::First(reading) => feedback.apply(&reading),
            Either::Second(()) => {
                feedback.tick();
                feedback.observe_button(LineLevel::from_high(fan_button.is_high()));
            }
        }
    }
}
