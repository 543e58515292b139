//! Telemetry ring and logging helpers for the firmware target.
//!
//! Readings, timeouts and overruns land in the shared
//! [`TelemetryRecorder`] and are mirrored to defmt (or stdout when the crate
//! is built for the host) for quick inspection during bring-up.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use embassy_time::Instant;
use ranging_core::consumer::Reading;
use ranging_core::status::RangingSnapshot;
use ranging_core::telemetry::{TelemetryInstant, TelemetryRecorder};
use ranging_core::timing::RangingConfig;

/// `embassy-time` instant adapted for the core telemetry recorder.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> core::time::Duration {
        let micros = self.0.saturating_duration_since(earlier.0).as_micros();
        core::time::Duration::from_micros(micros)
    }
}

pub type FirmwareTelemetry = TelemetryRecorder<FirmwareInstant>;

/// Logs the ranging configuration once at boot.
pub fn log_boot(config: &RangingConfig) {
    emit_boot(
        config.quantum.as_nanos(),
        config.quantum.frequency_hz(),
        config.echo_timeout_quanta,
        config.cooldown_quanta,
    );
}

/// Logs a converted reading.
pub fn log_reading(reading: &Reading, timestamp: Instant) {
    let delta_cm = reading.approach.map(|signal| signal.delta_cm);
    emit_reading(
        reading.distance.display_cm(),
        reading.band.label(),
        reading.sample.quanta(),
        delta_cm,
        reading.is_fast_approach(),
        timestamp.as_micros(),
    );
}

/// Logs cycles that ended without an echo since the previous poll.
pub fn log_timeouts(new: u32, total: u32) {
    emit_timeouts(new, total);
}

/// Logs samples that were overwritten before the consumer read them.
pub fn log_overruns(total: u32) {
    emit_overruns(total);
}

/// Logs a reading the indicator queue had no room for.
pub fn log_reading_dropped(reading: &Reading, total: u32) {
    emit_reading_dropped(reading.distance.display_cm(), total);
}

/// Logs the aggregate status line.
pub fn log_snapshot(snapshot: &RangingSnapshot) {
    emit_snapshot(snapshot);
}

#[cfg(target_os = "none")]
fn emit_boot(quantum_ns: u32, tick_hz: u32, timeout_quanta: u32, cooldown_quanta: u32) {
    defmt::info!(
        "ranger: quantum={}ns tick={}Hz timeout={}q cooldown={}q",
        quantum_ns,
        tick_hz,
        timeout_quanta,
        cooldown_quanta
    );
}

#[cfg(not(target_os = "none"))]
fn emit_boot(quantum_ns: u32, tick_hz: u32, timeout_quanta: u32, cooldown_quanta: u32) {
    println!(
        "ranger: quantum={quantum_ns}ns tick={tick_hz}Hz timeout={timeout_quanta}q cooldown={cooldown_quanta}q"
    );
}

#[cfg(target_os = "none")]
fn emit_reading(
    distance_cm: u32,
    band: &'static str,
    width: u32,
    delta_cm: Option<u32>,
    fast: bool,
    timestamp_us: u64,
) {
    match delta_cm {
        Some(delta) if fast => defmt::warn!(
            "telemetry:ranging {}cm {} width={}q delta={}cm FAST t={}us",
            distance_cm,
            band,
            width,
            delta,
            timestamp_us
        ),
        Some(delta) => defmt::info!(
            "telemetry:ranging {}cm {} width={}q delta={}cm t={}us",
            distance_cm,
            band,
            width,
            delta,
            timestamp_us
        ),
        None => defmt::info!(
            "telemetry:ranging {}cm {} width={}q t={}us",
            distance_cm,
            band,
            width,
            timestamp_us
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_reading(
    distance_cm: u32,
    band: &'static str,
    width: u32,
    delta_cm: Option<u32>,
    fast: bool,
    timestamp_us: u64,
) {
    match delta_cm {
        Some(delta) => println!(
            "telemetry:ranging {distance_cm}cm {band} width={width}q delta={delta}cm{} t={timestamp_us}us",
            if fast { " FAST" } else { "" }
        ),
        None => println!("telemetry:ranging {distance_cm}cm {band} width={width}q t={timestamp_us}us"),
    }
}

#[cfg(target_os = "none")]
fn emit_timeouts(new: u32, total: u32) {
    defmt::debug!("telemetry:ranging no echo x{} (total {})", new, total);
}

#[cfg(not(target_os = "none"))]
fn emit_timeouts(new: u32, total: u32) {
    println!("telemetry:ranging no echo x{new} (total {total})");
}

#[cfg(target_os = "none")]
fn emit_overruns(total: u32) {
    defmt::warn!("telemetry:ranging consumer overrun (total {})", total);
}

#[cfg(not(target_os = "none"))]
fn emit_overruns(total: u32) {
    println!("telemetry:ranging consumer overrun (total {total})");
}

#[cfg(target_os = "none")]
fn emit_reading_dropped(distance_cm: u32, total: u32) {
    defmt::warn!(
        "telemetry:ranging indicator queue full, dropped {}cm (total {})",
        distance_cm,
        total
    );
}

#[cfg(not(target_os = "none"))]
fn emit_reading_dropped(distance_cm: u32, total: u32) {
    println!("telemetry:ranging indicator queue full, dropped {distance_cm}cm (total {total})");
}

#[cfg(target_os = "none")]
fn emit_snapshot(snapshot: &RangingSnapshot) {
    defmt::info!("status {}", defmt::Display2Format(snapshot));
}

#[cfg(not(target_os = "none"))]
fn emit_snapshot(snapshot: &RangingSnapshot) {
    println!("status {snapshot}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranging_core::consumer::Distance;
    use ranging_core::feedback::ProximityBand;
    use ranging_core::ranging::EchoSample;
    use ranging_core::telemetry::{RangingEventKind, RangingPayload};

    fn micros(value: u64) -> FirmwareInstant {
        Instant::from_micros(value).into()
    }

    #[test]
    fn records_elapsed_between_readings() {
        let mut recorder = FirmwareTelemetry::new();
        let reading = Reading {
            sample: EchoSample::new(58),
            distance: Distance::Centimeters(50),
            approach: None,
            band: ProximityBand::Clear,
        };

        recorder.record_reading(&reading, micros(1_000));
        recorder.record_reading(&reading, micros(62_000));

        let latest = recorder.latest().copied().unwrap();
        assert_eq!(latest.event, RangingEventKind::SamplePublished);
        match latest.details {
            RangingPayload::Sample(details) => {
                let elapsed = details.elapsed_since_previous.expect("missing elapsed");
                assert_eq!(elapsed.as_micros(), 61_000);
            }
            _ => panic!("expected sample payload"),
        }
    }

    #[test]
    fn earlier_instant_saturates_to_zero() {
        assert_eq!(
            micros(10).saturating_duration_since(micros(20)),
            core::time::Duration::ZERO
        );
    }
}
