//! Schedulable units of work.
//!
//! A [`Job`] wraps an opaque [`Command`] together with the bookkeeping the
//! [`JobScheduler`](crate::scheduler::JobScheduler) needs: a countdown of
//! unfinished prerequisites and the ids of the jobs waiting on this one.
//!
//! # Examples
//!
//! ```
//! use ccbuild::job::{FnCommand, Job};
//!
//! let mut compile = Job::new(FnCommand::new("compile a.cc", || 0));
//! let mut link = Job::new(FnCommand::new("link app", || 0));
//! compile.register_derivative(&mut link);
//! assert_eq!(link.count_down(), 1);
//! assert_eq!(compile.derivatives(), [link.id()]);
//! ```

use camino::Utf8PathBuf;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error};

/// Exit status reported by jobs; `0` means success.
pub type Status = i32;

/// Status recorded when a command could not be launched at all.
pub const STATUS_LAUNCH_FAILED: Status = 127;

/// Result of executing a [`Command`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Exit status, `0` on success.
    pub status: Status,
    /// Captured diagnostic output.
    pub output: String,
}

/// Work carried by a job.
///
/// Commands run on scheduler worker threads and therefore must be `Send`.
pub trait Command: Send {
    /// Human readable form of the command, e.g. the command line.
    fn text(&self) -> &str;

    /// Run the command to completion.
    fn execute(&mut self) -> Outcome;
}

/// Runs a command line through `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    line: String,
    directory: Option<Utf8PathBuf>,
}

impl ShellCommand {
    /// Create a command running `line` in the current directory.
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            directory: None,
        }
    }

    /// Run the command in `directory` instead.
    #[must_use]
    pub fn in_directory(mut self, directory: impl Into<Utf8PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

impl Command for ShellCommand {
    fn text(&self) -> &str {
        &self.line
    }

    fn execute(&mut self) -> Outcome {
        let mut cmd = process::Command::new("sh");
        cmd.arg("-c").arg(&self.line);
        if let Some(dir) = &self.directory {
            cmd.current_dir(dir);
        }
        debug!(command = %self.line, "spawning");
        match cmd.output() {
            Ok(output) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                Outcome {
                    // Signals carry no exit code; report them as a failure.
                    status: output.status.code().unwrap_or(-1),
                    output: text,
                }
            }
            Err(err) => Outcome {
                status: STATUS_LAUNCH_FAILED,
                output: format!("failed to launch `{}`: {err}\n", self.line),
            },
        }
    }
}

/// Runs a closure returning a status. Useful for in-process work and tests.
pub struct FnCommand<F> {
    label: String,
    run: F,
}

impl<F> FnCommand<F>
where
    F: FnMut() -> Status + Send,
{
    /// Wrap `run`, described by `label`.
    pub fn new(label: impl Into<String>, run: F) -> Self {
        Self {
            label: label.into(),
            run,
        }
    }
}

impl<F> Command for FnCommand<F>
where
    F: FnMut() -> Status + Send,
{
    fn text(&self) -> &str {
        &self.label
    }

    fn execute(&mut self) -> Outcome {
        Outcome {
            status: (self.run)(),
            output: String::new(),
        }
    }
}

/// Process-unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// A command plus its scheduling state.
pub struct Job {
    id: JobId,
    command: Box<dyn Command>,
    count_down: usize,
    derivatives: Vec<JobId>,
    outcome: Outcome,
}

impl Job {
    /// Wrap `command` in a job with no prerequisites.
    #[must_use]
    pub fn new(command: impl Command + 'static) -> Self {
        Self::from_boxed(Box::new(command))
    }

    /// Wrap an already boxed command.
    #[must_use]
    pub fn from_boxed(command: Box<dyn Command>) -> Self {
        Self {
            id: JobId::next(),
            command,
            count_down: 0,
            derivatives: Vec::new(),
            outcome: Outcome::default(),
        }
    }

    /// Identifier of this job.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Text of the wrapped command.
    #[must_use]
    pub fn command(&self) -> &str {
        self.command.text()
    }

    /// Number of prerequisites that have not finished yet.
    #[must_use]
    pub const fn count_down(&self) -> usize {
        self.count_down
    }

    /// Jobs that wait for this one.
    #[must_use]
    pub fn derivatives(&self) -> &[JobId] {
        &self.derivatives
    }

    /// Exit status; meaningful once the job has been collected.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.outcome.status
    }

    /// Output captured while running.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.outcome.output
    }

    /// Make `derivative` wait for this job.
    pub fn register_derivative(&mut self, derivative: &mut Self) {
        if self.derivatives.contains(&derivative.id) {
            return;
        }
        self.derivatives.push(derivative.id);
        derivative.count_down += 1;
    }

    /// Execute the command, recording its outcome. A panicking command is
    /// recorded as a launch failure so the job still reaches its collector.
    pub(crate) fn run(&mut self) {
        let command = &mut self.command;
        self.outcome = match panic::catch_unwind(AssertUnwindSafe(|| command.execute())) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(job = %self.id, reason, "command panicked");
                Outcome {
                    status: STATUS_LAUNCH_FAILED,
                    output: format!("`{}` panicked: {reason}\n", self.command.text()),
                }
            }
        };
    }

    /// Record that one prerequisite finished. Returns `true` when the job
    /// just became ready.
    pub(crate) const fn release(&mut self, count: usize) -> bool {
        let before = self.count_down;
        self.count_down = self.count_down.saturating_sub(count);
        before != 0 && self.count_down == 0
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("command", &self.command.text())
            .field("count_down", &self.count_down)
            .field("derivatives", &self.derivatives)
            .field("status", &self.outcome.status)
            .finish()
    }
}
