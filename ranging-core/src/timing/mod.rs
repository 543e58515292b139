//! Tick quantum and ranging configuration shared by firmware and host targets.
//!
//! Every duration the ranging cycle cares about is an integer number of timer
//! quanta. The constants below record the real-world duration each count
//! stands for at the default 50 µs quantum, so retuning the timer means
//! revisiting this file and nothing else.

use core::{fmt, time::Duration};

/// Fixed duration represented by one timer-interrupt firing.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct TickQuantum {
    nanos: u32,
}

impl TickQuantum {
    /// Creates a quantum from a whole number of nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: u32) -> Self {
        Self { nanos }
    }

    /// Creates a quantum from a whole number of microseconds. Values past
    /// `u32::MAX` nanoseconds saturate, which [`RangingConfig::validate`] rejects.
    #[must_use]
    pub const fn from_micros(micros: u32) -> Self {
        Self {
            nanos: micros.saturating_mul(1_000),
        }
    }

    /// Returns the quantum length in nanoseconds.
    #[must_use]
    pub const fn as_nanos(self) -> u32 {
        self.nanos
    }

    /// Real-world duration covered by `quanta` consecutive ticks.
    #[must_use]
    pub const fn duration_of(self, quanta: u32) -> Duration {
        Duration::from_nanos(quanta as u64 * self.nanos as u64)
    }

    /// Number of whole quanta that fit inside `duration`.
    #[must_use]
    pub fn quanta_in(self, duration: Duration) -> u32 {
        if self.nanos == 0 {
            return 0;
        }
        let quanta = duration.as_nanos() / u128::from(self.nanos);
        u32::try_from(quanta).unwrap_or(u32::MAX)
    }

    /// Interrupt rate the tick timer must be programmed for.
    #[must_use]
    pub const fn frequency_hz(self) -> u32 {
        if self.nanos == 0 {
            0
        } else {
            1_000_000_000 / self.nanos
        }
    }
}

impl fmt::Display for TickQuantum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos.is_multiple_of(1_000) {
            write!(f, "{}us", self.nanos / 1_000)
        } else {
            write!(f, "{}ns", self.nanos)
        }
    }
}

/// Default tick quantum. It doubles as the trigger pulse width, so it must
/// meet the transceiver's minimum trigger duration (10 µs for the HC-SR04).
pub const DEFAULT_QUANTUM: TickQuantum = TickQuantum::from_micros(50);
/// Quanta to wait for the echo rising edge: 600 × 50 µs = 30 ms.
pub const ECHO_TIMEOUT_QUANTA: u32 = 600;
/// Idle quanta between cycles: 1200 × 50 µs = 60 ms. Also the sampling period
/// the approach tracker implicitly differentiates over.
pub const COOLDOWN_QUANTA: u32 = 1_200;
/// Longest echo pulse treated as a real measurement. Anything wider is
/// reported as out of range.
pub const MAX_ECHO_QUANTA: u32 = ECHO_TIMEOUT_QUANTA;
/// Round-trip time of sound over one centimetre, in microseconds.
pub const MICROS_PER_CM_ROUND_TRIP: u32 = 58;
/// Distance drop between consecutive samples flagged as a fast approach
/// (5 cm per 60 ms, roughly 0.8 m/s).
pub const APPROACH_THRESHOLD_CM: u32 = 5;
/// Readings strictly below this distance classify as near.
pub const NEAR_THRESHOLD_CM: u32 = 15;
/// Readings strictly below this distance (and not near) classify as close.
pub const CLOSE_THRESHOLD_CM: u32 = 20;
/// Value shown in place of a distance when the echo exceeded the measurable range.
pub const OUT_OF_RANGE_SENTINEL_CM: u32 = 999;

/// Longest quantum the tick timer can be programmed for (1 Hz).
pub const MAX_QUANTUM_NANOS: u32 = 1_000_000_000;

/// Reasons a [`RangingConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    ZeroQuantum,
    QuantumTooLong { nanos: u32 },
    ZeroEchoTimeout,
    ZeroCooldown,
    ZeroEchoBound,
    ZeroApproachThreshold,
    BandsOutOfOrder { near_cm: u32, close_cm: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroQuantum => f.write_str("tick quantum must be non-zero"),
            ConfigError::QuantumTooLong { nanos } => write!(
                f,
                "tick quantum {nanos} ns exceeds {MAX_QUANTUM_NANOS} ns"
            ),
            ConfigError::ZeroEchoTimeout => f.write_str("echo timeout must be at least one quantum"),
            ConfigError::ZeroCooldown => f.write_str("cooldown must be at least one quantum"),
            ConfigError::ZeroEchoBound => f.write_str("echo bound must be at least one quantum"),
            ConfigError::ZeroApproachThreshold => {
                f.write_str("approach threshold must be at least 1 cm")
            }
            ConfigError::BandsOutOfOrder { near_cm, close_cm } => write!(
                f,
                "near threshold {near_cm} cm must be below close threshold {close_cm} cm"
            ),
        }
    }
}

/// Timing and threshold configuration for one transceiver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RangingConfig {
    pub quantum: TickQuantum,
    pub echo_timeout_quanta: u32,
    pub cooldown_quanta: u32,
    pub max_echo_quanta: u32,
    /// `None` disables the approach (velocity) tracker.
    pub approach_threshold_cm: Option<u32>,
    pub near_threshold_cm: u32,
    pub close_threshold_cm: u32,
}

impl RangingConfig {
    /// Configuration used by the firmware: 50 µs ticks, approach tracking on.
    pub const DEFAULT: Self = Self {
        quantum: DEFAULT_QUANTUM,
        echo_timeout_quanta: ECHO_TIMEOUT_QUANTA,
        cooldown_quanta: COOLDOWN_QUANTA,
        max_echo_quanta: MAX_ECHO_QUANTA,
        approach_threshold_cm: Some(APPROACH_THRESHOLD_CM),
        near_threshold_cm: NEAR_THRESHOLD_CM,
        close_threshold_cm: CLOSE_THRESHOLD_CM,
    };

    #[must_use]
    pub const fn with_quantum(mut self, quantum: TickQuantum) -> Self {
        self.quantum = quantum;
        self
    }

    #[must_use]
    pub const fn with_echo_timeout(mut self, quanta: u32) -> Self {
        self.echo_timeout_quanta = quanta;
        self
    }

    /// Changing the cooldown changes the implied sampling period of the
    /// approach tracker; retune the approach threshold alongside it.
    #[must_use]
    pub const fn with_cooldown(mut self, quanta: u32) -> Self {
        self.cooldown_quanta = quanta;
        self
    }

    #[must_use]
    pub const fn with_max_echo(mut self, quanta: u32) -> Self {
        self.max_echo_quanta = quanta;
        self
    }

    #[must_use]
    pub const fn with_approach_threshold(mut self, threshold_cm: Option<u32>) -> Self {
        self.approach_threshold_cm = threshold_cm;
        self
    }

    #[must_use]
    pub const fn with_bands(mut self, near_cm: u32, close_cm: u32) -> Self {
        self.near_threshold_cm = near_cm;
        self.close_threshold_cm = close_cm;
        self
    }

    /// Checks the configuration and hands it back unchanged when usable.
    pub const fn validate(self) -> Result<Self, ConfigError> {
        if self.quantum.as_nanos() == 0 {
            return Err(ConfigError::ZeroQuantum);
        }
        if self.quantum.as_nanos() > MAX_QUANTUM_NANOS {
            return Err(ConfigError::QuantumTooLong {
                nanos: self.quantum.as_nanos(),
            });
        }
        if self.echo_timeout_quanta == 0 {
            return Err(ConfigError::ZeroEchoTimeout);
        }
        if self.cooldown_quanta == 0 {
            return Err(ConfigError::ZeroCooldown);
        }
        if self.max_echo_quanta == 0 {
            return Err(ConfigError::ZeroEchoBound);
        }
        if let Some(0) = self.approach_threshold_cm {
            return Err(ConfigError::ZeroApproachThreshold);
        }
        if self.near_threshold_cm >= self.close_threshold_cm {
            return Err(ConfigError::BandsOutOfOrder {
                near_cm: self.near_threshold_cm,
                close_cm: self.close_threshold_cm,
            });
        }
        Ok(self)
    }

    /// Real-world length of the echo wait window.
    #[must_use]
    pub const fn echo_timeout(&self) -> Duration {
        self.quantum.duration_of(self.echo_timeout_quanta)
    }

    /// Real-world length of the inter-cycle cooldown.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.quantum.duration_of(self.cooldown_quanta)
    }

    /// Widest echo pulse converted to a distance.
    #[must_use]
    pub const fn max_echo(&self) -> Duration {
        self.quantum.duration_of(self.max_echo_quanta)
    }
}

impl Default for RangingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
