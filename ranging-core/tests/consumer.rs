use ranging_core::consumer::{
    ApproachSignal, ApproachTracker, ConsumerPoll, Distance, RangingConsumer, quanta_to_cm,
};
use ranging_core::feedback::ProximityBand;
use ranging_core::handshake::SampleCell;
use ranging_core::ranging::{DisconnectedTransceiver, EchoSample, RangingStateMachine};
use ranging_core::timing::{RangingConfig, TickQuantum};

/// 1 µs ticks make widths read directly as round-trip microseconds.
const MICROSECOND_TICKS: RangingConfig = RangingConfig::DEFAULT
    .with_quantum(TickQuantum::from_micros(1))
    .with_max_echo(30_000);

fn width_for_cm(cm: u32) -> EchoSample {
    EchoSample::new(cm * 58)
}

#[test]
fn conversion_matches_reference_points() {
    let fine = TickQuantum::from_nanos(200);
    assert_eq!(quanta_to_cm(290, fine), 1);
    assert_eq!(quanta_to_cm(1_450, fine), 5);
    // One tick short of a full centimetre truncates down.
    assert_eq!(quanta_to_cm(289, fine), 0);
    assert_eq!(quanta_to_cm(1_449, fine), 4);
}

#[test]
fn approach_sequence_reports_delta_and_classification() {
    let cell = SampleCell::new();
    let mut consumer = RangingConsumer::new(&cell, MICROSECOND_TICKS);

    let mut approaches = Vec::new();
    for cm in [50, 50, 44] {
        cell.publish(width_for_cm(cm));
        let ConsumerPoll::Reading(reading) = consumer.poll_and_convert() else {
            panic!("expected a reading for {cm} cm");
        };
        assert_eq!(reading.distance, Distance::Centimeters(cm));
        approaches.push(reading.approach);
    }

    assert_eq!(
        approaches,
        [
            None,
            Some(ApproachSignal {
                delta_cm: 0,
                fast: false
            }),
            Some(ApproachSignal {
                delta_cm: 6,
                fast: true
            }),
        ]
    );
}

#[test]
fn tracker_always_keeps_the_latest_distance() {
    let mut tracker = ApproachTracker::new(5);
    for (cm, expected_delta) in [(60, None), (70, Some(0)), (64, Some(6)), (64, Some(0))] {
        let signal = tracker.observe(cm);
        assert_eq!(signal.map(|s| s.delta_cm), expected_delta);
        assert_eq!(tracker.previous_cm(), Some(cm));
    }
}

#[test]
fn second_poll_without_new_sample_reports_nothing() {
    let cell = SampleCell::new();
    let mut consumer = RangingConsumer::new(&cell, RangingConfig::DEFAULT);

    assert_eq!(consumer.poll_and_convert(), ConsumerPoll::NoNewData);

    cell.publish(EchoSample::new(20));
    assert!(matches!(
        consumer.poll_and_convert(),
        ConsumerPoll::Reading(_)
    ));
    assert_eq!(consumer.poll_and_convert(), ConsumerPoll::NoNewData);
    assert_eq!(consumer.poll_and_convert(), ConsumerPoll::NoNewData);
    assert!(!cell.is_ready());
}

#[test]
fn timeouts_look_like_no_new_data() {
    let config = RangingConfig::DEFAULT.with_echo_timeout(10).with_cooldown(10);
    let cell = SampleCell::new();
    let mut machine = RangingStateMachine::new(DisconnectedTransceiver::new(), config, &cell);
    let mut consumer = RangingConsumer::new(&cell, config);

    for _ in 0..500 {
        machine.tick();
        assert_eq!(consumer.poll_and_convert(), ConsumerPoll::NoNewData);
    }
    assert_eq!(consumer.readings(), 0);
    assert_eq!(consumer.last_reading(), None);
}

#[test]
fn readings_carry_band_classification() {
    let cell = SampleCell::new();
    let mut consumer = RangingConsumer::new(&cell, MICROSECOND_TICKS);

    for (cm, band) in [
        (10, ProximityBand::Near),
        (17, ProximityBand::Close),
        (120, ProximityBand::Clear),
    ] {
        cell.publish(width_for_cm(cm));
        let reading = consumer.poll_and_convert().reading().expect("reading");
        assert_eq!(reading.band, band, "{cm} cm");
    }

    cell.publish(EchoSample::new(MICROSECOND_TICKS.max_echo_quanta + 1));
    let reading = consumer.poll_and_convert().reading().expect("reading");
    assert_eq!(reading.band, ProximityBand::OutOfRange);
    assert_eq!(reading.distance.display_cm(), 999);
}
