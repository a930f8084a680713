//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure and its subcommands, and turns
//! the parsed flags into the [`BuildOptions`] shared by every stage.

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use std::num::NonZeroUsize;

use crate::options::{BuildOptions, BuildType};

mod parsing;

use parsing::parse_jobs;

/// Maximum number of jobs accepted by the CLI.
const MAX_JOBS: usize = 64;

/// An incremental build engine for C and C++ projects described by
/// `Recipe.yml` files.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<Utf8PathBuf>,

    /// Set the number of parallel build jobs.
    ///
    /// Values must be between 1 and 64; defaults to the host's parallelism.
    #[arg(short, long, value_name = "N", value_parser = parse_jobs)]
    pub jobs: Option<NonZeroUsize>,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Apply `Debug` recipe sections and compile with debug information.
    #[arg(long, conflicts_with = "release")]
    pub debug: bool,

    /// Apply `Release` recipe sections and compile with `-DNDEBUG`.
    #[arg(long)]
    pub release: bool,

    /// Print the commands that would run without running them.
    #[arg(long)]
    pub dry_run: bool,

    /// Record compile commands into `compile_commands.json`.
    #[arg(long)]
    pub insight: bool,

    /// Build `Test` targets as well.
    #[arg(long = "test")]
    pub tests: bool,

    /// Installation prefix.
    #[arg(long, value_name = "DIR", default_value = "/usr/local")]
    pub prefix: Utf8PathBuf,

    /// Staging directory the prefix is placed below.
    #[arg(long, value_name = "DIR", default_value = "/")]
    pub root: Utf8PathBuf,

    /// Project directory built when no subcommand is given.
    #[arg(value_name = "PROJECT")]
    pub project: Option<Utf8PathBuf>,

    /// Optional subcommand to execute; defaults to `build` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Apply the default command if none was specified.
    ///
    /// A bare `ccbuild PROJECT` becomes `ccbuild build PROJECT`.
    #[must_use]
    pub fn with_default_command(mut self) -> Self {
        if self.command.is_none() {
            let args = self
                .project
                .take()
                .map_or_else(ProjectArgs::default, |project| ProjectArgs { project });
            self.command = Some(Commands::Build(args));
        }
        self
    }

    /// The project directory the command applies to.
    #[must_use]
    pub fn project(&self) -> &Utf8Path {
        match &self.command {
            Some(Commands::Build(args) | Commands::Install(args) | Commands::Uninstall(args)) => {
                &args.project
            }
            None => self.project.as_deref().unwrap_or_else(|| Utf8Path::new(".")),
        }
    }

    /// Options for the build engine.
    #[must_use]
    pub fn build_options(&self) -> BuildOptions {
        let build_type = if self.debug {
            BuildType::Debug
        } else if self.release {
            BuildType::Release
        } else {
            BuildType::Plain
        };
        BuildOptions {
            build_type,
            dry_run: self.dry_run,
            jobs: self.jobs,
            build_tests: self.tests,
            insight: self.insight,
            install_root: self.root.clone(),
            prefix: self.prefix.clone(),
        }
    }
}

/// Arguments shared by every command.
#[derive(Debug, Args, PartialEq, Eq, Clone)]
pub struct ProjectArgs {
    /// Directory holding the project's `Recipe.yml`.
    #[arg(value_name = "PROJECT", default_value = ".")]
    pub project: Utf8PathBuf,
}

impl Default for ProjectArgs {
    fn default() -> Self {
        Self {
            project: Utf8PathBuf::from("."),
        }
    }
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Compile and link the project and everything it uses `default`.
    Build(ProjectArgs),

    /// Build, then copy the products below the install prefix.
    Install(ProjectArgs),

    /// Remove previously installed products.
    Uninstall(ProjectArgs),
}
