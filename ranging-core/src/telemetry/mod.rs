//! Ranging telemetry catalog and in-memory event ring.
//!
//! Events carry compact numeric codes so they can be logged or shipped as a
//! single `u16`, and typed payloads for local inspection. The recorder keeps
//! the most recent [`TELEMETRY_RING_CAPACITY`] entries in a
//! [`heapless::HistoryBuf`].

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::consumer::{Distance, Reading};

/// Sequential identifier assigned to every recorded event.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RangingEventKind {
    SamplePublished,
    EchoTimeout,
    OutOfRange,
    SampleOverrun,
    FastApproach,
    Custom(u16),
}

impl fmt::Display for RangingEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangingEventKind::SamplePublished => f.write_str("sample"),
            RangingEventKind::EchoTimeout => f.write_str("echo-timeout"),
            RangingEventKind::OutOfRange => f.write_str("out-of-range"),
            RangingEventKind::SampleOverrun => f.write_str("overrun"),
            RangingEventKind::FastApproach => f.write_str("fast-approach"),
            RangingEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl RangingEventKind {
    const SAMPLE_CODE: u16 = 0x0001;
    const TIMEOUT_CODE: u16 = 0x0002;
    const OUT_OF_RANGE_CODE: u16 = 0x0003;
    const OVERRUN_CODE: u16 = 0x0004;
    const FAST_APPROACH_CODE: u16 = 0x0010;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            RangingEventKind::SamplePublished => Self::SAMPLE_CODE,
            RangingEventKind::EchoTimeout => Self::TIMEOUT_CODE,
            RangingEventKind::OutOfRange => Self::OUT_OF_RANGE_CODE,
            RangingEventKind::SampleOverrun => Self::OVERRUN_CODE,
            RangingEventKind::FastApproach => Self::FAST_APPROACH_CODE,
            RangingEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`RangingEventKind::Custom`].
    #[must_use]
    pub const fn from_raw(code: u16) -> Self {
        match code {
            Self::SAMPLE_CODE => RangingEventKind::SamplePublished,
            Self::TIMEOUT_CODE => RangingEventKind::EchoTimeout,
            Self::OUT_OF_RANGE_CODE => RangingEventKind::OutOfRange,
            Self::OVERRUN_CODE => RangingEventKind::SampleOverrun,
            Self::FAST_APPROACH_CODE => RangingEventKind::FastApproach,
            other => RangingEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RangingPayload {
    None,
    Sample(SampleTelemetry),
    Timeout { waited_quanta: u32 },
    Overrun { total: u32 },
    Approach { delta_cm: u32, distance_cm: u32 },
}

impl fmt::Display for RangingPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangingPayload::None => Ok(()),
            RangingPayload::Sample(sample) => {
                write!(f, "width={}q distance={}", sample.width_quanta, sample.distance)?;
                if let Some(elapsed) = sample.elapsed_since_previous {
                    write!(f, " after={}ms", elapsed.as_millis())?;
                }
                Ok(())
            }
            RangingPayload::Timeout { waited_quanta } => write!(f, "waited={waited_quanta}q"),
            RangingPayload::Overrun { total } => write!(f, "total={total}"),
            RangingPayload::Approach {
                delta_cm,
                distance_cm,
            } => write!(f, "delta={delta_cm}cm at={distance_cm}cm"),
        }
    }
}

/// Details of one converted sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SampleTelemetry {
    pub width_quanta: u32,
    pub distance: Distance,
    pub elapsed_since_previous: Option<Duration>,
}

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: RangingEventKind,
    pub details: RangingPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records ranging events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_sample_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_sample_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns up to `count` of the newest records, oldest of those first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        self.ring
            .oldest_ordered()
            .skip(self.ring.len().saturating_sub(count))
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn clear(&mut self) {
        self.ring.clear();
        self.last_sample_at = None;
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: RangingEventKind,
        payload: RangingPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }

    /// Records a converted reading, plus a [`RangingEventKind::FastApproach`]
    /// entry when the tracker flagged one. Returns the id of the sample entry.
    pub fn record_reading(&mut self, reading: &Reading, timestamp: TInstant) -> EventId {
        let elapsed = self
            .last_sample_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_sample_at = Some(timestamp);

        let event = match reading.distance {
            Distance::Centimeters(_) => RangingEventKind::SamplePublished,
            Distance::OutOfRange => RangingEventKind::OutOfRange,
        };
        let payload = RangingPayload::Sample(SampleTelemetry {
            width_quanta: reading.sample.quanta(),
            distance: reading.distance,
            elapsed_since_previous: elapsed,
        });
        let id = self.record(event, payload, timestamp);

        let fast = reading.approach.filter(|signal| signal.fast);
        if let (Some(signal), Some(distance_cm)) = (fast, reading.distance.centimeters()) {
            self.record(
                RangingEventKind::FastApproach,
                RangingPayload::Approach {
                    delta_cm: signal.delta_cm,
                    distance_cm,
                },
                timestamp,
            );
        }

        id
    }

    /// Records a cycle that ended without an echo.
    pub fn record_timeout(&mut self, waited_quanta: u32, timestamp: TInstant) -> EventId {
        self.record(
            RangingEventKind::EchoTimeout,
            RangingPayload::Timeout { waited_quanta },
            timestamp,
        )
    }

    /// Records that samples were overwritten before being read.
    pub fn record_overrun(&mut self, total: u32, timestamp: TInstant) -> EventId {
        self.record(
            RangingEventKind::SampleOverrun,
            RangingPayload::Overrun { total },
            timestamp,
        )
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}
