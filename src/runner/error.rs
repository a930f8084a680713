//! Error types for the runner module.
//!
//! This submodule isolates derive-macro-affected code to scope lint suppressions
//! narrowly. The `unused_assignments` lint fires in some Rust versions due to
//! thiserror/miette derive macro expansion.

// The unused_assignments lint fires in some Rust versions but not others.
// Since `#[expect]` fails when the lint doesn't fire, we must use `#[allow]`.
// FIXME(rust-lang/rust#130021): remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use crate::stage::StageKind;

/// Errors raised during command execution.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// The project directory holds no recipe.
    #[error("no Recipe.yml found in {project}")]
    #[diagnostic(
        code(ccbuild::runner::recipe_not_found),
        help("pass the project directory as an argument or change into it with -C")
    )]
    RecipeNotFound {
        /// Directory searched.
        project: Utf8PathBuf,
    },

    /// The working directory is not valid UTF-8.
    #[error("working directory {path} is not valid UTF-8")]
    #[diagnostic(code(ccbuild::runner::non_utf8_directory))]
    NonUtf8Directory {
        /// Lossy rendering of the directory.
        path: String,
    },

    /// A stage failed on the requested project or one of its prerequisites.
    #[error("{stage} stage failed for {target}")]
    #[diagnostic(code(ccbuild::runner::stage_failed))]
    StageFailed {
        /// The failing stage.
        stage: StageKind,
        /// The project the stage was requested for.
        target: String,
    },
}
