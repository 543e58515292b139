use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use ranging_core::console::{ButtonAction, ConsoleCommand, HelpTopic};
use ranging_core::consumer::{ConsumerPoll, RangingConsumer};
use ranging_core::feedback::{FeedbackController, IndicatorSink};
use ranging_core::handshake::SampleCell;
use ranging_core::ranging::{CycleOutcome, LineLevel, RangingStateMachine};
use ranging_core::status::RangingSnapshot;
use ranging_core::telemetry::{TelemetryInstant, TelemetryRecorder};
use ranging_core::timing::RangingConfig;

use crate::transceiver::SimulatedTransceiver;

/// Buzzer cadence period, matching the firmware indicator task.
const CADENCE_INTERVAL: Duration = Duration::from_millis(1);

/// Simulated time since the session started.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(Duration);

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for SimInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let micros = self.0.as_micros();
        write!(f, "[+{:>6}.{:03} ms]", micros / 1_000, micros % 1_000)
    }
}

/// Indicator lines as seen by the operator. LED edges are reported; buzzer
/// edges are only counted.
#[derive(Debug, Default)]
pub struct ConsoleIndicators {
    near: bool,
    approach: bool,
    buzzer: bool,
    buzzer_edges: u32,
    fan: bool,
    events: Vec<String>,
}

impl ConsoleIndicators {
    pub fn drain(&mut self) -> impl Iterator<Item = String> + '_ {
        self.events.drain(..)
    }

    pub fn near(&self) -> bool {
        self.near
    }

    pub fn approach(&self) -> bool {
        self.approach
    }

    pub fn fan(&self) -> bool {
        self.fan
    }
}

impl fmt::Display for ConsoleIndicators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "near-led={} approach-led={} buzzer={} buzzer-edges={} fan={}",
            on_off(self.near),
            on_off(self.approach),
            if self.buzzer { "high" } else { "low" },
            self.buzzer_edges,
            on_off(self.fan())
        )
    }
}

impl IndicatorSink for ConsoleIndicators {
    fn set_near(&mut self, on: bool) {
        if self.near != on {
            self.near = on;
            self.events.push(format!("  near LED {}", on_off(on)));
        }
    }

    fn set_approach(&mut self, on: bool) {
        if self.approach != on {
            self.approach = on;
            self.events.push(format!("  approach LED {}", on_off(on)));
        }
    }

    fn set_buzzer(&mut self, level: LineLevel) {
        if self.buzzer != level.is_high() {
            self.buzzer = level.is_high();
            self.buzzer_edges = self.buzzer_edges.wrapping_add(1);
        }
    }

    fn set_fan(&mut self, on: bool) {
        if self.fan != on {
            self.fan = on;
            self.events.push(format!("  fan {}", on_off(on)));
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

/// One emulated board: tick interrupt, foreground consumer and indicators,
/// all driven from console commands on a simulated clock.
pub struct Session<'a> {
    config: RangingConfig,
    cell: &'a SampleCell,
    machine: RangingStateMachine<'a, SimulatedTransceiver>,
    consumer: RangingConsumer<'a>,
    feedback: FeedbackController<ConsoleIndicators>,
    telemetry: TelemetryRecorder<SimInstant>,
    snapshot: RangingSnapshot,
    ticks: u64,
    cadence_quanta: u64,
    seen_overruns: u32,
    transcript: Option<TranscriptLogger>,
}

impl<'a> Session<'a> {
    pub fn new(cell: &'a SampleCell, config: RangingConfig, target_cm: Option<u32>) -> Self {
        let transceiver = SimulatedTransceiver::new(config.quantum, target_cm);
        Self {
            config,
            cell,
            machine: RangingStateMachine::new(transceiver, config, cell),
            consumer: RangingConsumer::new(cell, config),
            feedback: FeedbackController::new(ConsoleIndicators::default()),
            telemetry: TelemetryRecorder::new(),
            snapshot: RangingSnapshot::unknown(),
            ticks: 0,
            cadence_quanta: u64::from(config.quantum.quanta_in(CADENCE_INTERVAL).max(1)),
            seen_overruns: 0,
            transcript: None,
        }
    }

    /// Mirrors every command and response into a transcript file.
    pub fn with_transcript(mut self, path: &Path) -> io::Result<Self> {
        self.transcript = Some(TranscriptLogger::new(path, &self.config)?);
        Ok(self)
    }

    pub fn now(&self) -> SimInstant {
        let nanos = self.ticks * u64::from(self.config.quantum.as_nanos());
        SimInstant(Duration::from_nanos(nanos))
    }

    pub fn target_cm(&self) -> Option<u32> {
        self.machine.lines().target_cm()
    }

    pub fn snapshot(&self) -> RangingSnapshot {
        let mut snapshot = self.snapshot;
        snapshot.state = Some(self.machine.state());
        snapshot.overruns = self.consumer.overruns();
        snapshot
    }

    pub fn indicators(&self) -> &ConsoleIndicators {
        self.feedback.sink()
    }

    pub fn telemetry(&self) -> &TelemetryRecorder<SimInstant> {
        &self.telemetry
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.now();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(now, TranscriptRole::Host, trimmed)?;
        }

        let responses = match ConsoleCommand::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(error) => vec![format!("ERR {error}")],
        };

        let now = self.now();
        if let Some(transcript) = self.transcript.as_mut() {
            for response in &responses {
                transcript.append_line(now, TranscriptRole::Emulator, response)?;
            }
        }

        Ok(responses)
    }

    fn execute(&mut self, command: ConsoleCommand) -> Vec<String> {
        match command {
            ConsoleCommand::Target(target_cm) => {
                self.machine.lines_mut().set_target_cm(target_cm);
                vec![match target_cm {
                    Some(cm) => format!("target at {cm} cm"),
                    None => "target removed".to_string(),
                }]
            }
            ConsoleCommand::Tick(count) => {
                let mut out = Vec::new();
                for _ in 0..count {
                    self.step(&mut out);
                }
                let cycle = self.machine.cycle();
                out.push(format!(
                    "{} state={} counter={}",
                    self.now(),
                    cycle.state(),
                    cycle.counter()
                ));
                out
            }
            ConsoleCommand::Run(cycles) => {
                let mut out = Vec::new();
                self.run_cycles(cycles, &mut out);
                out
            }
            ConsoleCommand::Sweep {
                from_cm,
                to_cm,
                step_cm,
            } => self.sweep(from_cm, to_cm, step_cm),
            ConsoleCommand::Button(action) => self.button(action),
            ConsoleCommand::Status => self.status_lines(),
            ConsoleCommand::Log(count) => self.log_lines(count),
            ConsoleCommand::Reset => {
                self.reset();
                vec!["ranging restarted".to_string()]
            }
            ConsoleCommand::Help(topic) => help_lines(topic),
        }
    }

    /// Runs whole cycles; each ends with a sample, a timeout, or out-of-range.
    pub fn run_cycles(&mut self, cycles: u32, out: &mut Vec<String>) -> u32 {
        let bound = u64::from(cycles) * self.cycle_tick_bound();
        let mut finished = 0;
        let mut spent = 0;
        while finished < cycles && spent < bound {
            if self.step(out).is_some() {
                finished += 1;
            }
            spent += 1;
        }
        finished
    }

    fn sweep(&mut self, from_cm: u32, to_cm: u32, step_cm: u32) -> Vec<String> {
        let step = usize::try_from(step_cm).unwrap_or(usize::MAX);
        let distances: Vec<u32> = if from_cm <= to_cm {
            (from_cm..=to_cm).step_by(step).collect()
        } else {
            (to_cm..=from_cm).rev().step_by(step).collect()
        };

        let mut out = Vec::new();
        for cm in distances {
            self.machine.lines_mut().set_target_cm(Some(cm));
            out.push(format!("target at {cm} cm"));
            self.run_cycles(1, &mut out);
        }
        out
    }

    fn button(&mut self, action: ButtonAction) -> Vec<String> {
        let levels: &[LineLevel] = match action {
            ButtonAction::Click => &[LineLevel::Low, LineLevel::High],
            ButtonAction::Press => &[LineLevel::Low],
            ButtonAction::Release => &[LineLevel::High],
        };

        let mut out = Vec::new();
        for &level in levels {
            self.feedback.observe_button(level);
            out.push(format!(
                "{} button {}",
                self.now(),
                if level.is_high() { "released" } else { "pressed" }
            ));
            out.extend(self.feedback.sink_mut().drain());
        }
        out
    }

    /// Longest a single cycle can take under the current configuration.
    fn cycle_tick_bound(&self) -> u64 {
        let config = &self.config;
        u64::from(config.echo_timeout_quanta)
            + u64::from(config.max_echo_quanta)
            + u64::from(config.cooldown_quanta)
            + 8
    }

    /// One timer quantum: interrupt body, then the foreground work that
    /// would run before the next interrupt.
    fn step(&mut self, out: &mut Vec<String>) -> Option<CycleOutcome> {
        self.ticks += 1;
        let now = self.now();

        let outcome = self.machine.tick();
        if let Some(outcome) = outcome {
            self.snapshot.record_outcome(outcome);
            if let CycleOutcome::EchoTimeout { waited_quanta } = outcome {
                self.telemetry.record_timeout(waited_quanta, now);
                out.push(format!("{now} no echo after {waited_quanta} quanta"));
            }
        }

        if let ConsumerPoll::Reading(reading) = self.consumer.poll_and_convert() {
            self.snapshot.record_reading(&reading);
            self.telemetry.record_reading(&reading, now);
            self.feedback.apply(&reading);
            out.push(format!("{now} {reading}"));
        }

        let overruns = self.consumer.overruns();
        if overruns != self.seen_overruns {
            self.telemetry.record_overrun(overruns, now);
            out.push(format!("{now} {overruns} sample(s) overwritten unread"));
            self.seen_overruns = overruns;
        }

        if self.ticks.is_multiple_of(self.cadence_quanta) {
            self.feedback.tick();
        }
        out.extend(self.feedback.sink_mut().drain());

        outcome
    }

    fn status_lines(&self) -> Vec<String> {
        let config = &self.config;
        let target = match self.target_cm() {
            Some(cm) => format!("{cm} cm"),
            None => "none".to_string(),
        };
        vec![
            format!("{} {}", self.now(), self.snapshot()),
            format!(
                "target={target} triggers={} quantum={} timeout={}q cooldown={}q max-echo={}q",
                self.machine.lines().trigger_pulses(),
                config.quantum,
                config.echo_timeout_quanta,
                config.cooldown_quanta,
                config.max_echo_quanta
            ),
            self.indicators().to_string(),
        ]
    }

    fn log_lines(&self, count: usize) -> Vec<String> {
        let telemetry = self.telemetry();
        if telemetry.is_empty() {
            return vec!["telemetry empty".to_string()];
        }
        telemetry
            .recent(count)
            .map(|record| {
                format!(
                    "#{:<4} {} {} {}",
                    record.id, record.timestamp, record.event, record.details
                )
                .trim_end()
                .to_string()
            })
            .collect()
    }

    /// Restarts the pipeline on the same target and clock.
    fn reset(&mut self) {
        let target_cm = self.target_cm();
        self.cell.clear();
        self.machine = RangingStateMachine::new(
            SimulatedTransceiver::new(self.config.quantum, target_cm),
            self.config,
            self.cell,
        );
        self.consumer = RangingConsumer::new(self.cell, self.config);
        self.feedback = FeedbackController::new(ConsoleIndicators::default());
        self.telemetry.clear();
        self.snapshot = RangingSnapshot::unknown();
        self.seen_overruns = self.consumer.overruns();
    }
}

fn help_lines(topic: Option<HelpTopic>) -> Vec<String> {
    match topic {
        Some(topic) => vec![format!("{} - {}", topic.usage(), topic.summary())],
        None => {
            let mut lines = vec!["Commands:".to_string()];
            lines.extend(
                HelpTopic::ALL
                    .iter()
                    .map(|topic| format!("  {:<34} {}", topic.usage(), topic.summary())),
            );
            lines
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => ">",
            TranscriptRole::Emulator => "<",
        }
    }
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, config: &RangingConfig) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        writeln!(logger.writer, "# Ranging emulator transcript")?;
        writeln!(
            logger.writer,
            "# Timestamps are simulated time; one tick is {}",
            config.quantum
        )?;
        writeln!(logger.writer)?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(&mut self, at: SimInstant, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{at} {} {line}", role.prefix())?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranging_core::consumer::Distance;
    use ranging_core::ranging::RangingState;
    use ranging_core::telemetry::RangingEventKind;

    fn session(cell: &SampleCell, target_cm: Option<u32>) -> Session<'_> {
        Session::new(cell, RangingConfig::DEFAULT, target_cm)
    }

    #[test]
    fn run_reports_one_reading_per_cycle() {
        let cell = SampleCell::new();
        let mut session = session(&cell, Some(50));

        let responses = session.handle_command("run 3").unwrap();
        let readings: Vec<_> = responses.iter().filter(|line| line.contains(" cm [")).collect();
        assert_eq!(readings.len(), 3);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.cycles, 3);
        assert_eq!(snapshot.samples, 3);
        // 58 quanta high, the rising-edge tick is not counted: 57 * 50 / 58.
        assert_eq!(snapshot.last_distance, Some(Distance::Centimeters(49)));
        assert_eq!(snapshot.overruns, 0);
    }

    #[test]
    fn missing_target_times_out() {
        let cell = SampleCell::new();
        let mut session = session(&cell, None);

        let responses = session.handle_command("run").unwrap();
        assert_eq!(responses, vec!["[+    30.150 ms] no echo after 601 quanta"]);
        assert_eq!(session.snapshot().timeouts, 1);
        assert_eq!(
            session.telemetry().latest().map(|record| record.event),
            Some(RangingEventKind::EchoTimeout)
        );
    }

    #[test]
    fn distant_target_reads_out_of_range() {
        let cell = SampleCell::new();
        let mut session = session(&cell, Some(1_000));

        session.handle_command("run").unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.out_of_range, 1);
        assert_eq!(snapshot.last_distance, Some(Distance::OutOfRange));
    }

    #[test]
    fn sweep_flags_fast_approach_and_lights_leds() {
        let cell = SampleCell::new();
        let mut session = session(&cell, None);

        let responses = session.handle_command("sweep 40 10 10").unwrap();
        assert!(responses.iter().any(|line| line.ends_with("FAST")));
        assert!(responses.iter().any(|line| line == "  approach LED on"));
        assert!(responses.iter().any(|line| line == "  near LED on"));
        assert_eq!(session.snapshot().fast_approaches, 3);
        assert!(session.indicators().near());
        assert!(session.indicators().approach());
    }

    #[test]
    fn button_toggles_fan_on_press_only() {
        let cell = SampleCell::new();
        let mut session = session(&cell, None);

        assert_eq!(
            session.handle_command("button").unwrap(),
            vec![
                "[+     0.000 ms] button pressed",
                "  fan on",
                "[+     0.000 ms] button released",
            ]
        );
        assert!(session.indicators().fan());

        let responses = session.handle_command("button press").unwrap();
        assert!(responses.iter().any(|line| line == "  fan off"));
        // Held down, then released: no further toggles.
        for line in ["button press", "button release"] {
            let responses = session.handle_command(line).unwrap();
            assert_eq!(responses.len(), 1, "{line}");
        }
        assert!(!session.indicators().fan());
    }

    #[test]
    fn tick_reports_state_and_counter() {
        let cell = SampleCell::new();
        let mut session = session(&cell, Some(50));

        let responses = session.handle_command("tick 2").unwrap();
        assert_eq!(responses, vec!["[+     0.100 ms] state=await-echo counter=0"]);
        assert_eq!(session.snapshot().state, Some(RangingState::AwaitEcho));
    }

    #[test]
    fn reset_keeps_target_and_clears_history() {
        let cell = SampleCell::new();
        let mut session = session(&cell, Some(30));
        session.handle_command("run 2").unwrap();

        assert_eq!(
            session.handle_command("reset").unwrap(),
            vec!["ranging restarted"]
        );
        assert_eq!(session.snapshot().cycles, 0);
        assert!(session.telemetry().is_empty());
        assert_eq!(session.target_cm(), Some(30));
        assert_eq!(session.handle_command("log").unwrap(), vec!["telemetry empty"]);
    }

    #[test]
    fn parse_errors_are_reported_inline() {
        let cell = SampleCell::new();
        let mut session = session(&cell, None);

        let responses = session.handle_command("sweep 10 20").unwrap();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].starts_with("ERR invalid arguments"));

        let responses = session.handle_command("warp 9").unwrap();
        assert_eq!(responses, vec!["ERR unknown command (try `help`)"]);
    }

    #[test]
    fn help_lists_every_command() {
        let cell = SampleCell::new();
        let mut session = session(&cell, None);

        let responses = session.handle_command("help").unwrap();
        assert_eq!(responses.len(), HelpTopic::ALL.len() + 1);

        let responses = session.handle_command("help sweep").unwrap();
        assert_eq!(
            responses,
            vec!["sweep <from_cm> <to_cm> <step_cm> - move the reflector one step per cycle and print each reading"]
        );
    }
}
