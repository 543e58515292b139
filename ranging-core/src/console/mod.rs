//! Line grammar for the operator console.
//!
//! ```text
//! target <cm> | target none
//! tick [count]
//! run [cycles]
//! sweep <from_cm> <to_cm> <step_cm>
//! button [press|release]
//! status
//! log [count]
//! reset
//! help [command]
//! ```

use core::fmt;

use winnow::ascii::{dec_uint, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::ModalResult;
use winnow::prelude::*;

/// Entries shown by `log` when no count is given.
pub const DEFAULT_LOG_ENTRIES: usize = 10;

/// Parsed console command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConsoleCommand {
    /// Places a reflector at the given distance, or removes it.
    Target(Option<u32>),
    /// Advances the tick clock.
    Tick(u32),
    /// Runs whole measurement cycles.
    Run(u32),
    Sweep {
        from_cm: u32,
        to_cm: u32,
        step_cm: u32,
    },
    /// Drives the fan push-button.
    Button(ButtonAction),
    Status,
    Log(usize),
    Reset,
    Help(Option<HelpTopic>),
}

/// What `button` does to the simulated push-button.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ButtonAction {
    /// Press and release.
    Click,
    Press,
    Release,
}

/// Command names accepted by `help`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HelpTopic {
    Target,
    Tick,
    Run,
    Sweep,
    Button,
    Status,
    Log,
    Reset,
    Help,
}

impl HelpTopic {
    pub const ALL: [HelpTopic; 9] = [
        HelpTopic::Target,
        HelpTopic::Tick,
        HelpTopic::Run,
        HelpTopic::Sweep,
        HelpTopic::Button,
        HelpTopic::Status,
        HelpTopic::Log,
        HelpTopic::Reset,
        HelpTopic::Help,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            HelpTopic::Target => "target",
            HelpTopic::Tick => "tick",
            HelpTopic::Run => "run",
            HelpTopic::Sweep => "sweep",
            HelpTopic::Button => "button",
            HelpTopic::Status => "status",
            HelpTopic::Log => "log",
            HelpTopic::Reset => "reset",
            HelpTopic::Help => "help",
        }
    }

    #[must_use]
    pub const fn usage(self) -> &'static str {
        match self {
            HelpTopic::Target => "target <cm>|none",
            HelpTopic::Tick => "tick [count]",
            HelpTopic::Run => "run [cycles]",
            HelpTopic::Sweep => "sweep <from_cm> <to_cm> <step_cm>",
            HelpTopic::Button => "button [press|release]",
            HelpTopic::Status => "status",
            HelpTopic::Log => "log [count]",
            HelpTopic::Reset => "reset",
            HelpTopic::Help => "help [command]",
        }
    }

    #[must_use]
    pub const fn summary(self) -> &'static str {
        match self {
            HelpTopic::Target => "place a reflector at a distance, or remove it",
            HelpTopic::Tick => "advance the tick clock (default 1 quantum)",
            HelpTopic::Run => "run complete measurement cycles (default 1)",
            HelpTopic::Sweep => "move the reflector one step per cycle and print each reading",
            HelpTopic::Button => "press and/or release the fan button (default both)",
            HelpTopic::Status => "show counters and the last reading",
            HelpTopic::Log => "show recent telemetry (default 10 entries)",
            HelpTopic::Reset => "restart the state machine and clear history",
            HelpTopic::Help => "list commands or describe one",
        }
    }
}

impl fmt::Display for HelpTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reasons a console line is rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConsoleError {
    Empty,
    UnknownCommand,
    /// Known command with malformed arguments; `offset` is the byte where parsing stopped.
    Syntax { topic: HelpTopic, offset: usize },
    ZeroSweepStep,
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Empty => f.write_str("empty command"),
            ConsoleError::UnknownCommand => f.write_str("unknown command (try `help`)"),
            ConsoleError::Syntax { topic, offset } => write!(
                f,
                "invalid arguments at column {}; usage: {}",
                offset + 1,
                topic.usage()
            ),
            ConsoleError::ZeroSweepStep => f.write_str("sweep step must be at least 1 cm"),
        }
    }
}

impl ConsoleCommand {
    /// Parses one console line. Surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ConsoleError::Empty);
        }

        let command = parse_command.parse(line).map_err(|error| {
            let word = line.split_ascii_whitespace().next().unwrap_or(line);
            match parse_topic.parse(word) {
                Ok(topic) => ConsoleError::Syntax {
                    topic,
                    offset: error.offset(),
                },
                Err(_) => ConsoleError::UnknownCommand,
            }
        })?;

        if let ConsoleCommand::Sweep { step_cm: 0, .. } = command {
            return Err(ConsoleError::ZeroSweepStep);
        }
        Ok(command)
    }
}

fn parse_command(input: &mut &str) -> ModalResult<ConsoleCommand> {
    alt((
        preceded(("target", space1), parse_target).map(ConsoleCommand::Target),
        preceded("tick", opt(parse_argument))
            .map(|count| ConsoleCommand::Tick(count.unwrap_or(1))),
        preceded("run", opt(parse_argument))
            .map(|cycles| ConsoleCommand::Run(cycles.unwrap_or(1))),
        preceded("sweep", (parse_argument, parse_argument, parse_argument)).map(
            |(from_cm, to_cm, step_cm)| ConsoleCommand::Sweep {
                from_cm,
                to_cm,
                step_cm,
            },
        ),
        preceded("button", opt(preceded(space1, parse_button_action)))
            .map(|action| ConsoleCommand::Button(action.unwrap_or(ButtonAction::Click))),
        "status".value(ConsoleCommand::Status),
        preceded("log", opt(preceded(space1, dec_uint)))
            .map(|count| ConsoleCommand::Log(count.unwrap_or(DEFAULT_LOG_ENTRIES))),
        "reset".value(ConsoleCommand::Reset),
        preceded("help", opt(preceded(space1, parse_topic))).map(ConsoleCommand::Help),
    ))
    .parse_next(input)
}

fn parse_argument(input: &mut &str) -> ModalResult<u32> {
    preceded(space1, dec_uint).parse_next(input)
}

fn parse_target(input: &mut &str) -> ModalResult<Option<u32>> {
    alt(("none".value(None), dec_uint.map(Some))).parse_next(input)
}

fn parse_button_action(input: &mut &str) -> ModalResult<ButtonAction> {
    alt((
        "press".value(ButtonAction::Press),
        "release".value(ButtonAction::Release),
    ))
    .parse_next(input)
}

fn parse_topic(input: &mut &str) -> ModalResult<HelpTopic> {
    alt((
        "target".value(HelpTopic::Target),
        "tick".value(HelpTopic::Tick),
        "run".value(HelpTopic::Run),
        "sweep".value(HelpTopic::Sweep),
        "button".value(HelpTopic::Button),
        "status".value(HelpTopic::Status),
        "log".value(HelpTopic::Log),
        "reset".value(HelpTopic::Reset),
        "help".value(HelpTopic::Help),
    ))
    .parse_next(input)
}
