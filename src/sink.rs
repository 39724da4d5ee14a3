//! Command dispatch.
//!
//! The matcher hands each fired rule's command string to a [`CommandSink`].
//! The sink must not call back into the matcher and must not block it beyond
//! the cost of dispatch itself. Tests substitute a recording closure.

use std::process::{Command, Stdio};
use std::thread;

/// Receives the command string of every fired rule.
pub trait CommandSink {
    /// Dispatch one command. Called once per fired rule, in declaration
    /// order of the matched rules.
    fn dispatch(&mut self, command: &str);
}

/// Any `FnMut(&str)` closure is a sink.
impl<F> CommandSink for F
where
    F: FnMut(&str),
{
    fn dispatch(&mut self, command: &str) {
        self(command);
    }
}

/// Runs commands through `/bin/sh -c`, fire-and-forget.
///
/// The command string is passed verbatim; environment and working directory
/// are inherited from the process. A spawn failure or non-zero exit is
/// logged and never reaches the matcher; a fired rule is fired.
#[derive(Debug, Default)]
pub struct ShellSink;

impl CommandSink for ShellSink {
    fn dispatch(&mut self, command: &str) {
        match Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .spawn()
        {
            Ok(mut child) => {
                let command = command.to_string();
                // Reap the child off the hot path; the matcher moves on.
                thread::spawn(move || match child.wait() {
                    Ok(status) if !status.success() => {
                        log::warn!("command {command:?} exited with {status}");
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("failed to wait on command {command:?}: {e}"),
                });
            }
            Err(e) => log::warn!("failed to spawn command {command:?}: {e}"),
        }
    }
}
