//! Reporter that records what it is told.

use ccbuild::job::Status;
use ccbuild::reporter::BuildReporter;
use std::sync::Mutex;

/// One reported event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A job finished.
    Finished {
        /// Command text.
        command: String,
        /// Exit status.
        status: Status,
    },
    /// A dry run listed a command.
    Planned(String),
    /// A stage failed for a target.
    StageFailed {
        /// Stage name.
        stage: String,
        /// Target name.
        target: String,
    },
}

/// Records every event in order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<Event>>,
}

impl RecordingReporter {
    /// Everything reported so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("events lock").clone()
    }

    /// Commands listed by dry runs, in order.
    pub fn planned_commands(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Planned(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl BuildReporter for RecordingReporter {
    fn job_finished(&self, command: &str, status: Status, _output: &str) {
        self.push(Event::Finished {
            command: command.to_owned(),
            status,
        });
    }

    fn planned(&self, command: &str) {
        self.push(Event::Planned(command.to_owned()));
    }

    fn stage_failed(&self, stage: &str, target: &str) {
        self.push(Event::StageFailed {
            stage: stage.to_owned(),
            target: target.to_owned(),
        });
    }
}
