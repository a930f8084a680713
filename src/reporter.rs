//! Build output for the user.
//!
//! Diagnostic logging goes through `tracing`; what the user asked to see
//! (the commands being run, compiler output, failures) goes through a
//! [`BuildReporter`] so tests can record it and quiet runs can drop it.

use std::io::{self, Write};

use crate::job::Status;

/// Report build progress to the user.
pub trait BuildReporter {
    /// A job finished with `status`; `output` is what it printed.
    fn job_finished(&self, command: &str, status: Status, output: &str);

    /// A dry run would execute `command`.
    fn planned(&self, command: &str);

    /// `stage` failed for the target called `target`.
    fn stage_failed(&self, stage: &str, target: &str);
}

/// Writes commands to stdout and diagnostics to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl BuildReporter for ConsoleReporter {
    fn job_finished(&self, command: &str, status: Status, output: &str) {
        // Write failures must not abort the build.
        drop(writeln!(io::stdout(), "{command}"));
        if !output.is_empty() {
            drop(write!(io::stderr(), "{output}"));
        }
        if status != 0 {
            drop(writeln!(io::stderr(), "command failed with status {status}"));
        }
    }

    fn planned(&self, command: &str) {
        drop(writeln!(io::stdout(), "{command}"));
    }

    fn stage_failed(&self, stage: &str, target: &str) {
        drop(writeln!(io::stderr(), "{stage} failed for {target}"));
    }
}

/// Silent reporter: emits nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl BuildReporter for SilentReporter {
    fn job_finished(&self, _command: &str, _status: Status, _output: &str) {}
    fn planned(&self, _command: &str) {}
    fn stage_failed(&self, _stage: &str, _target: &str) {}
}
