//! Build plan: the graph of targets reachable from one project.
//!
//! [`BuildPlan::load`] reads the root project's recipe, follows every `use`
//! entry to the prerequisite projects and assigns each distinct project one
//! [`Target`]. Projects reached through several paths (a diamond) are loaded
//! once. Prerequisite cycles are rejected.

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use semver::Version;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::cycle;
use crate::options::BuildOptions;
use crate::params::BuildParameters;
use crate::paths;
use crate::recipe::{ConfigObject, RecipeError, RecipeSource};

/// Index of a target inside its [`BuildPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    /// Position of the target in [`BuildPlan::targets`].
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// What a target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// One executable linked from all sources.
    Application,
    /// A shared or static library.
    Library,
    /// One executable per source file.
    Tools,
    /// A test executable, only built on request.
    Test,
    /// A bundle of other targets with no product of its own.
    Package,
}

impl TargetKind {
    /// Kind named by a recipe `class` tag.
    #[must_use]
    pub fn from_class(class: &str) -> Option<Self> {
        match class {
            "Application" => Some(Self::Application),
            "Library" => Some(Self::Library),
            "Tools" => Some(Self::Tools),
            "Test" => Some(Self::Test),
            "Package" => Some(Self::Package),
            _ => None,
        }
    }
}

/// One buildable project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Identifier within the plan.
    pub id: TargetId,
    /// Product name; defaults to the project directory name.
    pub name: String,
    /// Kind of product.
    pub kind: TargetKind,
    /// Product version; `0.0.0` when the recipe names none.
    pub version: Version,
    /// Absolute, normalised project directory.
    pub project_path: Utf8PathBuf,
    /// Source glob patterns relative to the project directory.
    pub source_patterns: Vec<String>,
    /// Targets that must be processed first, in recipe order.
    pub prerequisites: Vec<TargetId>,
    /// Resolved compiler and linker settings.
    pub params: BuildParameters,
}

/// Errors raised while assembling a build plan.
#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    /// A recipe could not be read or parsed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Recipe(#[from] RecipeError),

    /// A recipe's class is not a target kind.
    #[error("{project}: unknown target class `{class}`")]
    #[diagnostic(
        code(ccbuild::plan::unknown_class),
        help("use one of Application, Library, Tools, Test or Package")
    )]
    UnknownClass {
        /// Project directory.
        project: Utf8PathBuf,
        /// Class tag found in the recipe.
        class: String,
    },

    /// A `use` entry names no project with a recipe.
    #[error("{project}: failed to locate prerequisite `{prerequisite}`")]
    #[diagnostic(code(ccbuild::plan::missing_prerequisite))]
    MissingPrerequisite {
        /// Project directory of the recipe naming the prerequisite.
        project: Utf8PathBuf,
        /// The `use` entry as written.
        prerequisite: String,
    },

    /// The recipe version is not a version number.
    #[error("{project}: invalid version `{version}`")]
    #[diagnostic(code(ccbuild::plan::version))]
    Version {
        /// Project directory.
        project: Utf8PathBuf,
        /// Version as written.
        version: String,
        /// Parser failure.
        #[source]
        source: semver::Error,
    },

    /// Prerequisites form a cycle.
    #[error("prerequisite cycle: {}", .cycle.join(" -> "))]
    #[diagnostic(code(ccbuild::plan::cycle))]
    Cycle {
        /// Target names along the cycle, starting and ending at the same one.
        cycle: Vec<String>,
    },
}

/// All targets of one build invocation.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    targets: Vec<Target>,
    root: TargetId,
    options: BuildOptions,
}

impl BuildPlan {
    /// Load the project at `project_path` and everything it uses.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] when a recipe is missing or malformed, a
    /// prerequisite cannot be located, or prerequisites form a cycle.
    pub fn load(
        project_path: &Utf8Path,
        options: BuildOptions,
        source: &dyn RecipeSource,
    ) -> Result<Self, PlanError> {
        let mut loader = Loader {
            source,
            options: &options,
            targets: Vec::new(),
            by_path: HashMap::new(),
        };
        let root = loader.visit(&paths::normalize(project_path))?;
        let targets = loader.targets;
        reject_cycles(&targets)?;
        debug!(targets = targets.len(), "build plan loaded");
        Ok(Self {
            targets,
            root,
            options,
        })
    }

    /// The project the build was started for.
    #[must_use]
    pub fn root(&self) -> &Target {
        self.target(self.root)
    }

    /// Look up a target.
    #[must_use]
    #[expect(
        clippy::indexing_slicing,
        reason = "target ids are only issued by the plan that owns the targets"
    )]
    pub fn target(&self, id: TargetId) -> &Target {
        &self.targets[id.0]
    }

    /// Every target, indexed by [`TargetId::index`].
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Options of this build invocation.
    #[must_use]
    pub const fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Whether `target` takes part in this build.
    #[must_use]
    pub const fn is_enabled(&self, target: &Target) -> bool {
        !matches!(target.kind, TargetKind::Test) || self.options.build_tests
    }

    /// Library targets `target` links against. Packages contribute the
    /// libraries they bundle.
    #[must_use]
    pub fn linked_libraries(&self, target: &Target) -> Vec<&Target> {
        let mut libraries = Vec::new();
        for prerequisite in target.prerequisites.iter().map(|id| self.target(*id)) {
            match prerequisite.kind {
                TargetKind::Library => libraries.push(prerequisite),
                TargetKind::Package => libraries.extend(
                    prerequisite
                        .prerequisites
                        .iter()
                        .map(|id| self.target(*id))
                        .filter(|child| child.kind == TargetKind::Library),
                ),
                _ => {}
            }
        }
        libraries
    }
}

struct Loader<'a> {
    source: &'a dyn RecipeSource,
    options: &'a BuildOptions,
    targets: Vec<Target>,
    by_path: HashMap<Utf8PathBuf, TargetId>,
}

impl Loader<'_> {
    #[expect(
        clippy::indexing_slicing,
        reason = "`id` was pushed just above"
    )]
    fn visit(&mut self, project_path: &Utf8Path) -> Result<TargetId, PlanError> {
        if let Some(id) = self.by_path.get(project_path) {
            return Ok(*id);
        }

        let recipe = self.source.load(project_path)?;
        let kind =
            TargetKind::from_class(&recipe.class_name).ok_or_else(|| PlanError::UnknownClass {
                project: project_path.to_owned(),
                class: recipe.class_name.clone(),
            })?;

        let id = TargetId(self.targets.len());
        self.by_path.insert(project_path.to_owned(), id);
        self.targets.push(Target {
            id,
            name: target_name(&recipe, project_path),
            kind,
            version: parse_version(&recipe, project_path)?,
            project_path: project_path.to_owned(),
            source_patterns: recipe.list("source"),
            prerequisites: Vec::new(),
            params: BuildParameters::build(&recipe, project_path, self.options),
        });
        debug!(target = %self.targets[id.0].name, path = %project_path, "loaded recipe");

        if kind == TargetKind::Test && !self.options.build_tests {
            return Ok(id);
        }

        let mut uses = Vec::new();
        if kind == TargetKind::Package {
            uses = recipe.list("include");
        }
        if uses.is_empty() {
            uses = recipe.list("use");
        }

        let mut prerequisites = Vec::with_capacity(uses.len());
        for entry in &uses {
            let path = self.locate(project_path, entry)?;
            let prerequisite = self.visit(&path)?;
            if !prerequisites.contains(&prerequisite) {
                prerequisites.push(prerequisite);
            }
        }
        self.targets[id.0].prerequisites = prerequisites;
        Ok(id)
    }

    /// Find the project a `use` entry refers to: absolute entries as is,
    /// relative ones against the project directory and then its ancestors.
    fn locate(&self, project_path: &Utf8Path, entry: &str) -> Result<Utf8PathBuf, PlanError> {
        let entry_path = Utf8Path::new(entry);
        let found = if entry_path.is_absolute() {
            let path = paths::normalize(entry_path);
            self.source.exists(&path).then_some(path)
        } else {
            project_path
                .ancestors()
                .map(|base| paths::resolve(base, entry_path))
                .find(|candidate| candidate != project_path && self.source.exists(candidate))
        };
        found.ok_or_else(|| PlanError::MissingPrerequisite {
            project: project_path.to_owned(),
            prerequisite: entry.to_owned(),
        })
    }
}

fn target_name(recipe: &ConfigObject, project_path: &Utf8Path) -> String {
    let name = recipe.text("name");
    if !name.is_empty() {
        return name;
    }
    project_path.file_name().unwrap_or("project").to_owned()
}

/// Parse the recipe version, accepting short forms such as `1.2`.
fn parse_version(recipe: &ConfigObject, project_path: &Utf8Path) -> Result<Version, PlanError> {
    let text = recipe.text("version");
    if text.is_empty() {
        return Ok(Version::new(0, 0, 0));
    }
    let mut full = text.clone();
    for _ in text.split('.').count()..3 {
        full.push_str(".0");
    }
    Version::parse(&full).map_err(|source| PlanError::Version {
        project: project_path.to_owned(),
        version: text,
        source,
    })
}

#[expect(
    clippy::indexing_slicing,
    reason = "cycle members are ids of `targets`"
)]
fn reject_cycles(targets: &[Target]) -> Result<(), PlanError> {
    let order: Vec<TargetId> = targets.iter().map(|target| target.id).collect();
    let edges: HashMap<TargetId, Vec<TargetId>> = targets
        .iter()
        .map(|target| (target.id, target.prerequisites.clone()))
        .collect();
    match cycle::find_cycle(&order, &edges) {
        Some(found) => Err(PlanError::Cycle {
            cycle: found
                .into_iter()
                .map(|id| targets[id.0].name.clone())
                .collect(),
        }),
        None => Ok(()),
    }
}
