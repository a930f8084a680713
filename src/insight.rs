//! `compile_commands.json` maintenance.
//!
//! Editors and language servers read the compilation database to learn how
//! every translation unit is compiled. Entries are keyed by their output
//! file so rebuilding a unit replaces its previous entry.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io;
use tracing::debug;

use crate::shell::BuildShell;

/// File name of the compilation database.
pub const INSIGHT_FILE: &str = "compile_commands.json";

/// One compilation database entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightEntry {
    /// Working directory of the command.
    pub directory: Utf8PathBuf,
    /// Source file compiled.
    pub file: Utf8PathBuf,
    /// Full command line.
    pub command: String,
    /// Object file produced.
    pub output: Utf8PathBuf,
}

/// A compilation database stored in a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightDatabase {
    path: Utf8PathBuf,
    entries: IndexMap<Utf8PathBuf, InsightEntry>,
}

impl InsightDatabase {
    /// Open the database of `project_path`. A missing or unreadable file
    /// starts an empty database.
    #[must_use]
    pub fn open(shell: &dyn BuildShell, project_path: &Utf8Path) -> Self {
        let path = project_path.join(INSIGHT_FILE);
        let entries = shell
            .read_to_string(&path)
            .ok()
            .and_then(|text| match serde_json::from_str::<Vec<InsightEntry>>(&text) {
                Ok(entries) => Some(entries),
                Err(err) => {
                    debug!(path = %path, error = %err, "ignoring unreadable compilation database");
                    None
                }
            })
            .unwrap_or_default()
            .into_iter()
            .map(|entry| (entry.output.clone(), entry))
            .collect();
        Self { path, entries }
    }

    /// Add or replace the entry producing `entry.output`.
    pub fn insert(&mut self, entry: InsightEntry) {
        self.entries.insert(entry.output.clone(), entry);
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &InsightEntry> {
        self.entries.values()
    }

    /// Write the database back.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or the write fails.
    pub fn save(&self, shell: &dyn BuildShell) -> io::Result<()> {
        let entries: Vec<&InsightEntry> = self.entries.values().collect();
        let mut text = serde_json::to_string_pretty(&entries).map_err(io::Error::other)?;
        text.push('\n');
        shell.write(&self.path, &text)
    }
}
