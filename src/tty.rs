//! Terminal I/O utilities for CLI.
//!
//! Provides TTY detection and user prompting.

use std::io::{self, BufRead, IsTerminal, Write};
use std::process::{Command, Stdio};

pub fn is_stdin_tty() -> bool {
    io::stdin().is_terminal()
}

pub fn prompt(message: &str) -> dropship::Result<String> {
    eprint!("{}", message);
    io::stderr().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line).map_err(|e| {
        dropship::Error::new(
            dropship::ErrorCode::InternalIoError,
            format!("Failed to read input: {}", e),
            serde_json::Value::Null,
        )
    })?;

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Prompt with terminal echo turned off where `stty` is available.
pub fn prompt_password(message: &str) -> dropship::Result<String> {
    let hidden = is_stdin_tty() && set_echo(false);
    let result = prompt(message);
    if hidden {
        set_echo(true);
        eprintln!();
    }
    result
}

fn set_echo(on: bool) -> bool {
    Command::new("stty")
        .arg(if on { "echo" } else { "-echo" })
        .stdin(Stdio::inherit())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Print status message to stderr if running in a terminal.
pub fn status(message: &str) {
    if io::stderr().is_terminal() {
        eprintln!("{}", message);
    }
}

// log_status! macro is defined in lib.rs (#[macro_export]) and available crate-wide.
