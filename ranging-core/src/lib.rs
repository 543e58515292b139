#![no_std]

// Shared logic for the echo ranger.
//
// Everything here is target-independent: the firmware binds it to a hardware
// timer and GPIO, the emulator binds it to a simulated transceiver.

pub mod console;
pub mod consumer;
pub mod feedback;
pub mod handshake;
pub mod ranging;
pub mod status;
pub mod telemetry;
pub mod timing;
