mod session;
mod transceiver;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use ranging_core::handshake::SampleCell;
use ranging_core::timing::RangingConfig;
use session::Session;

const USAGE: &str = "Usage: ranging-emulator [--target <cm|none>] [--transcript <path>]";

#[derive(Debug, Default)]
struct Options {
    target_cm: Option<u32>,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let config = RangingConfig::DEFAULT.validate().unwrap_or_else(|err| {
        eprintln!("invalid ranging configuration: {err}");
        process::exit(2);
    });

    let cell = SampleCell::new();
    let mut session = Session::new(&cell, config, options.target_cm);
    if let Some(path) = options.transcript.as_deref() {
        session = session.with_transcript(path)?;
    }

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Ranging emulator ready ({} per tick). Type `help` for commands or `exit` to quit.",
        config.quantum
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--target" => options.target_cm = parse_target(&value()?)?,
            "--transcript" => options.transcript = Some(PathBuf::from(value()?)),
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }
    Ok(options)
}

fn parse_target(value: &str) -> Result<Option<u32>, String> {
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| format!("Invalid target distance `{value}`"))
}
