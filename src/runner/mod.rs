//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! loads the build plan and runs the stages each command needs over it.

mod error;

pub use error::RunnerError;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::env;
use tracing::{debug, info};

use crate::cli::{Cli, Commands, ProjectArgs};
use crate::paths;
use crate::plan::BuildPlan;
use crate::recipe::{FileRecipeSource, RecipeSource};
use crate::reporter::ConsoleReporter;
use crate::shell::LocalShell;
use crate::stage::{
    CompileLinkStage, GlobStage, InstallStage, Pipeline, Stage, StageContext, UninstallStage,
};
use crate::toolchain::GnuToolChain;

/// Execute the parsed [`Cli`] command.
///
/// Products are written to the working directory (after `--directory` is
/// applied); recipes are read from the project directory.
///
/// # Errors
///
/// Returns an error if the working directory cannot be changed, the build
/// plan cannot be loaded, or any stage fails.
pub fn run(cli: &Cli) -> Result<()> {
    if let Some(directory) = &cli.directory {
        env::set_current_dir(directory)
            .with_context(|| format!("failed to change directory to {directory}"))?;
    }
    let build_dir = current_dir()?;
    let project = paths::resolve(&build_dir, cli.project());

    let recipes = FileRecipeSource;
    if !recipes.exists(&project) {
        return Err(RunnerError::RecipeNotFound { project }.into());
    }
    let plan = BuildPlan::load(&project, cli.build_options(), &recipes)?;
    info!(
        target = %plan.root().name,
        targets = plan.targets().len(),
        "loaded build plan"
    );

    let toolchain = GnuToolChain::from_env(build_dir);
    let shell = LocalShell;
    let reporter = ConsoleReporter;
    let mut pipeline = Pipeline::new(StageContext::new(&plan, &toolchain, &shell, &reporter));

    let command = cli
        .command
        .clone()
        .unwrap_or_else(|| Commands::Build(ProjectArgs::default()));
    run_stage(&mut pipeline, &GlobStage)?;
    match command {
        Commands::Build(_) => run_stage(&mut pipeline, &CompileLinkStage)?,
        Commands::Install(_) => {
            run_stage(&mut pipeline, &CompileLinkStage)?;
            run_stage(&mut pipeline, &InstallStage)?;
        }
        Commands::Uninstall(_) => run_stage(&mut pipeline, &UninstallStage)?,
    }
    Ok(())
}

fn run_stage<S: Stage>(pipeline: &mut Pipeline<'_>, stage: &S) -> Result<(), RunnerError> {
    let root = pipeline.context().plan.root();
    debug!(stage = %S::KIND, target = %root.name, "running stage");
    if pipeline.run(stage, root.id) {
        Ok(())
    } else {
        Err(RunnerError::StageFailed {
            stage: S::KIND,
            target: root.name.clone(),
        })
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = env::current_dir().context("failed to read the working directory")?;
    Utf8PathBuf::from_path_buf(cwd).map_err(|path| {
        RunnerError::NonUtf8Directory {
            path: path.display().to_string(),
        }
        .into()
    })
}
