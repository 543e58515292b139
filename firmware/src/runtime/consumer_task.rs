use embassy_time::{Duration, Instant, Ticker};
use ranging_core::consumer::{ConsumerPoll, RangingConsumer};

use super::ReadingSender;
use crate::readings::ReadingForwarder;
use crate::status;
use crate::telemetry::{self, FirmwareTelemetry};

/// Well inside the cooldown window, so a sample is always taken before the
/// next cycle can publish.
const POLL_INTERVAL: Duration = Duration::from_millis(5);
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

#[embassy_executor::task]
pub async fn run(mut consumer: RangingConsumer<'static>, readings: ReadingSender) -> ! {
    let mut recorder = FirmwareTelemetry::new();
    let mut forwarder = ReadingForwarder::new(readings);
    let mut ticker = Ticker::every(POLL_INTERVAL);
    let mut seen_timeouts = 0;
    let mut seen_overruns = 0;
    let mut next_status = Instant::now() + STATUS_INTERVAL;
    let waited_quanta = consumer.config().echo_timeout_quanta + 1;

    loop {
        ticker.next().await;
        let now = Instant::now();

        if let ConsumerPoll::Reading(reading) = consumer.poll_and_convert() {
            status::record_reading(&reading);
            recorder.record_reading(&reading, now.into());
            telemetry::log_reading(&reading, now);
            forwarder.forward(reading);
        }

        let timeouts = status::timeouts();
        if timeouts != seen_timeouts {
            recorder.record_timeout(waited_quanta, now.into());
            telemetry::log_timeouts(timeouts.wrapping_sub(seen_timeouts), timeouts);
            seen_timeouts = timeouts;
        }

        let overruns = consumer.overruns();
        if overruns != seen_overruns {
            recorder.record_overrun(overruns, now.into());
            telemetry::log_overruns(overruns);
            seen_overruns = overruns;
        }

        if now >= next_status {
            telemetry::log_snapshot(&status::snapshot(overruns));
            next_status = now + STATUS_INTERVAL;
        }
    }
}
