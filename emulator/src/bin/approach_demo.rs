//! Scripted walk-through of the ranging pipeline: steady target, fast
//! approach, retreat, lost echo, a reflector beyond range, and the fan button.

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;
#[allow(dead_code)]
#[path = "../transceiver.rs"]
mod transceiver;

use std::io::{self, Write};

use ranging_core::handshake::SampleCell;
use ranging_core::timing::RangingConfig;
use session::Session;

const SCRIPT: &[&str] = &[
    "status",
    "target 80",
    "run 2",
    "sweep 80 12 12",
    "run 3",
    "sweep 20 60 10",
    "target none",
    "run 2",
    "target 600",
    "run",
    "target 40",
    "run 2",
    "button",
    "button press",
    "button release",
    "status",
    "log 12",
];

fn main() -> io::Result<()> {
    let cell = SampleCell::new();
    let mut session = Session::new(&cell, RangingConfig::DEFAULT, None);

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    for command in SCRIPT {
        writeln!(writer, "> {command}")?;
        for response in session.handle_command(command)? {
            writeln!(writer, "{response}")?;
        }
    }
    Ok(())
}
