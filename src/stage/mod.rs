//! Per-target build stages.
//!
//! A stage (glob, compile/link, install, uninstall) runs once per target and
//! recurses over the target's prerequisites first. [`Pipeline::run`] holds
//! the shared recursion: it consults a [`StageLedger`] so that targets
//! reached through several paths of the prerequisite graph are processed
//! exactly once, evaluates the stage's irrelevance guard, runs the
//! prerequisites fail-fast and finally the stage's own action.
//!
//! Stage state lives in the ledger, keyed by target and stage kind, rather
//! than inside the targets, so the plan itself stays immutable.

mod compile_link;
mod glob;
mod install;
mod uninstall;

pub use compile_link::CompileLinkStage;
pub use self::glob::GlobStage;
pub use install::InstallStage;
pub use uninstall::UninstallStage;

use camino::Utf8PathBuf;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::plan::{BuildPlan, Target, TargetId};
use crate::reporter::BuildReporter;
use crate::shell::BuildShell;
use crate::toolchain::ToolChain;

/// The kinds of stage a target passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Expand source patterns.
    Glob,
    /// Compile sources and link the product.
    CompileLink,
    /// Copy products into the install prefix.
    Install,
    /// Remove installed products.
    Uninstall,
}

impl StageKind {
    /// Lower-case name used in messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Glob => "glob",
            Self::CompileLink => "build",
            Self::Install => "install",
            Self::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress of one stage on one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StageState {
    /// Not visited yet.
    #[default]
    NotStarted,
    /// Visited; prerequisites or the action are still running.
    InProgress,
    /// Finished with the given success.
    Done(bool),
}

/// Stage states of every target.
#[derive(Debug, Default, Clone)]
pub struct StageLedger {
    states: HashMap<(TargetId, StageKind), StageState>,
}

impl StageLedger {
    /// State of `kind` on `target`.
    #[must_use]
    pub fn state(&self, target: TargetId, kind: StageKind) -> StageState {
        self.states
            .get(&(target, kind))
            .copied()
            .unwrap_or_default()
    }

    fn set(&mut self, target: TargetId, kind: StageKind, state: StageState) {
        self.states.insert((target, kind), state);
    }
}

/// Collaborators shared by every stage of one build invocation.
pub struct StageContext<'a> {
    /// The targets being built.
    pub plan: &'a BuildPlan,
    /// Paths and command lines.
    pub toolchain: &'a dyn ToolChain,
    /// Filesystem access.
    pub shell: &'a dyn BuildShell,
    /// User-facing output.
    pub reporter: &'a dyn BuildReporter,
    sources: HashMap<TargetId, Vec<Utf8PathBuf>>,
}

impl<'a> StageContext<'a> {
    /// Bundle the collaborators of a build.
    #[must_use]
    pub fn new(
        plan: &'a BuildPlan,
        toolchain: &'a dyn ToolChain,
        shell: &'a dyn BuildShell,
        reporter: &'a dyn BuildReporter,
    ) -> Self {
        Self {
            plan,
            toolchain,
            shell,
            reporter,
            sources: HashMap::new(),
        }
    }

    /// Source files found for `target`; empty before the glob stage ran.
    #[must_use]
    pub fn sources(&self, target: TargetId) -> &[Utf8PathBuf] {
        self.sources
            .get(&target)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Record the source files of `target`.
    pub fn set_sources(&mut self, target: TargetId, sources: Vec<Utf8PathBuf>) {
        self.sources.insert(target, sources);
    }
}

/// One kind of per-target work.
pub trait Stage {
    /// Ledger key of this stage.
    const KIND: StageKind;

    /// Whether the stage does not apply to `target` at all. Skipped targets
    /// succeed without visiting their prerequisites.
    fn skip(&self, _ctx: &StageContext<'_>, _target: &Target) -> bool {
        false
    }

    /// Perform the stage's own work on `target`, after its prerequisites
    /// succeeded.
    fn act(&self, ctx: &mut StageContext<'_>, target: &Target) -> bool;
}

/// Runs stages over the prerequisite graph.
pub struct Pipeline<'a> {
    ctx: StageContext<'a>,
    ledger: StageLedger,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline with an empty ledger.
    #[must_use]
    pub fn new(ctx: StageContext<'a>) -> Self {
        Self {
            ctx,
            ledger: StageLedger::default(),
        }
    }

    /// Shared collaborators.
    #[must_use]
    pub const fn context(&self) -> &StageContext<'a> {
        &self.ctx
    }

    /// Recorded stage states.
    #[must_use]
    pub const fn ledger(&self) -> &StageLedger {
        &self.ledger
    }

    /// Run `stage` on `target` and, first, on everything it uses.
    ///
    /// Repeated calls return the first outcome without repeating any work.
    pub fn run<S: Stage>(&mut self, stage: &S, target: TargetId) -> bool {
        match self.ledger.state(target, S::KIND) {
            StageState::Done(success) => return success,
            // Reached again through its own prerequisites; plans reject
            // cycles, so this only guards against endless recursion.
            StageState::InProgress => return true,
            StageState::NotStarted => {}
        }
        self.ledger.set(target, S::KIND, StageState::InProgress);

        let plan = self.ctx.plan;
        let node = plan.target(target);
        let success = if !plan.is_enabled(node) || stage.skip(&self.ctx, node) {
            debug!(stage = %S::KIND, target = %node.name, "skipped");
            true
        } else {
            self.run_prerequisites(stage, node) && self.act(stage, node)
        };

        self.ledger.set(target, S::KIND, StageState::Done(success));
        success
    }

    fn run_prerequisites<S: Stage>(&mut self, stage: &S, node: &Target) -> bool {
        for prerequisite in &node.prerequisites {
            if !self.run(stage, *prerequisite) {
                debug!(stage = %S::KIND, target = %node.name, "prerequisite failed");
                return false;
            }
        }
        true
    }

    fn act<S: Stage>(&mut self, stage: &S, node: &Target) -> bool {
        let success = stage.act(&mut self.ctx, node);
        if !success {
            warn!(stage = %S::KIND, target = %node.name, "stage failed");
            self.ctx.reporter.stage_failed(S::KIND.name(), &node.name);
        }
        success
    }
}

#[cfg(test)]
mod tests;
