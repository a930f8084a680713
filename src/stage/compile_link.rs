//! Incremental compilation and linking.
//!
//! Every source of a target becomes a unit of work. A unit is rebuilt when
//! its command changed, its output or dependency record is missing, any
//! file named in the record is newer than the output, or a module it
//! imports from the same target is rebuilt. Dirty units run on a
//! [`JobScheduler`], ordered by their module edges, and the link job waits
//! for all of them.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, warn};

use super::{Stage, StageContext, StageKind};
use crate::depfile::DependencyFile;
use crate::hasher::CommandHasher;
use crate::insight::{InsightDatabase, InsightEntry};
use crate::job::{Job, JobId, ShellCommand};
use crate::modules;
use crate::plan::{Target, TargetKind};
use crate::scheduler::JobScheduler;
use crate::shell::BuildShell;

/// Compiles and links each target after its prerequisites.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompileLinkStage;

impl Stage for CompileLinkStage {
    const KIND: StageKind = StageKind::CompileLink;

    fn act(&self, ctx: &mut StageContext<'_>, target: &Target) -> bool {
        match target.kind {
            TargetKind::Package => true,
            TargetKind::Tools => Build::new(ctx, target, true).run(),
            TargetKind::Application | TargetKind::Library | TargetKind::Test => {
                if ctx.sources(target.id).is_empty() {
                    warn!(target = %target.name, "no sources to build");
                    return false;
                }
                Build::new(ctx, target, false).run()
            }
        }
    }
}

#[derive(Debug)]
struct Unit {
    source: Utf8PathBuf,
    output: Utf8PathBuf,
    command: String,
    record: DependencyFile,
    dirty: bool,
}

/// What a scheduled job produces.
#[derive(Debug, Clone, Copy)]
enum Role {
    Unit(usize),
    Link,
}

struct Build<'c, 'a> {
    ctx: &'c StageContext<'a>,
    target: &'c Target,
    units: Vec<Unit>,
    link_command: Option<String>,
    insight: Option<InsightDatabase>,
}

impl<'c, 'a> Build<'c, 'a> {
    /// Gather the units of `target`. With `per_source` every source is
    /// compiled and linked on its own.
    fn new(ctx: &'c StageContext<'a>, target: &'c Target, per_source: bool) -> Self {
        let toolchain = ctx.toolchain;
        let plan = ctx.plan;
        let mut units: Vec<Unit> = ctx
            .sources(target.id)
            .iter()
            .map(|source| {
                let (output, command) = if per_source {
                    (
                        toolchain.build_dir().join(toolchain.tool_name(source)),
                        toolchain.compile_link_command(plan, target, source),
                    )
                } else {
                    (
                        toolchain.object_path(target, source),
                        toolchain.compile_command(plan, target, source),
                    )
                };
                let record =
                    DependencyFile::load(ctx.shell, &toolchain.dependency_path(target, source));
                let dirty = is_dirty(ctx.shell, &output, &command, &record);
                Unit {
                    source: source.clone(),
                    output,
                    command,
                    record,
                    dirty,
                }
            })
            .collect();
        propagate_module_changes(&mut units);

        let link_command = if per_source {
            None
        } else {
            let objects: Vec<Utf8PathBuf> = units.iter().map(|unit| unit.output.clone()).collect();
            let command = toolchain.link_command(plan, target, &objects, ctx.sources(target.id));
            let product = toolchain.product_path(target);
            let any_dirty = units.iter().any(|unit| unit.dirty);
            (any_dirty || is_link_dirty(ctx.shell, &product, &command, &objects)).then_some(command)
        };

        let insight = (plan.options().insight && !plan.options().dry_run)
            .then(|| InsightDatabase::open(ctx.shell, &target.project_path));

        Self {
            ctx,
            target,
            units,
            link_command,
            insight,
        }
    }

    #[expect(
        clippy::indexing_slicing,
        reason = "dirty indices enumerate `units`"
    )]
    fn run(mut self) -> bool {
        let dirty: Vec<usize> = (0..self.units.len())
            .filter(|index| self.units[*index].dirty)
            .collect();
        if dirty.is_empty() && self.link_command.is_none() {
            debug!(target = %self.target.name, "up to date");
            return true;
        }

        if self.ctx.plan.options().dry_run {
            for index in &dirty {
                self.ctx.reporter.planned(&self.units[*index].command);
            }
            if let Some(command) = &self.link_command {
                self.ctx.reporter.planned(command);
            }
            return true;
        }

        let objects_dir = self.ctx.toolchain.objects_dir(self.target);
        if let Err(err) = self.ctx.shell.mkdir(&objects_dir) {
            error!(path = %objects_dir, error = %err, "cannot create object directory");
            return false;
        }

        let success = self.execute(&dirty);

        if let Some(insight) = &self.insight {
            if let Err(err) = insight.save(self.ctx.shell) {
                warn!(
                    target = %self.target.name,
                    error = %err,
                    "cannot write compilation database"
                );
            }
        }
        success
    }

    #[expect(
        clippy::indexing_slicing,
        reason = "dirty indices enumerate `units`"
    )]
    fn execute(&mut self, dirty: &[usize]) -> bool {
        let build_dir = self.ctx.toolchain.build_dir();
        let mut jobs: Vec<Job> = dirty
            .iter()
            .map(|index| {
                let command = ShellCommand::new(self.units[*index].command.clone());
                Job::new(command.in_directory(build_dir))
            })
            .collect();

        let records: Vec<Option<&DependencyFile>> = dirty
            .iter()
            .map(|index| Some(&self.units[*index].record).filter(|record| record.is_valid()))
            .collect();
        if let Err(err) = modules::order_jobs(&mut jobs, &records) {
            error!(target = %self.target.name, error = %err, "cannot order module units");
            return false;
        }

        let mut roles: HashMap<JobId, Role> = jobs
            .iter()
            .zip(dirty)
            .map(|(job, index)| (job.id(), Role::Unit(*index)))
            .collect();

        let mut link = self
            .link_command
            .clone()
            .map(|command| Job::new(ShellCommand::new(command).in_directory(build_dir)));
        if let Some(link) = &mut link {
            for job in &mut jobs {
                job.register_derivative(link);
            }
            roles.insert(link.id(), Role::Link);
        }

        let mut scheduler = JobScheduler::new(self.ctx.plan.options().jobs);
        for job in jobs.into_iter().chain(link) {
            scheduler.schedule(job);
        }

        let mut success = true;
        while let Some(job) = scheduler.collect() {
            self.ctx
                .reporter
                .job_finished(job.command(), job.status(), job.output());
            if job.status() != 0 {
                continue;
            }
            let finished = match roles.get(&job.id()) {
                Some(Role::Unit(index)) => self.unit_finished(*index),
                Some(Role::Link) => self.link_finished(),
                None => true,
            };
            success &= finished;
        }
        success && scheduler.status() == 0
    }

    #[expect(
        clippy::indexing_slicing,
        reason = "roles only hold indices of `units`"
    )]
    fn unit_finished(&mut self, index: usize) -> bool {
        let unit = &self.units[index];
        if let Some(insight) = &mut self.insight {
            insight.insert(InsightEntry {
                directory: self.ctx.toolchain.build_dir().to_owned(),
                file: unit.source.clone(),
                command: unit.command.clone(),
                output: unit.output.clone(),
            });
        }
        record_stamp(self.ctx.shell, &unit.output, &unit.command)
    }

    fn link_finished(&self) -> bool {
        let toolchain = self.ctx.toolchain;
        let link_name = toolchain.link_name(self.target);
        for name in toolchain.library_symlinks(self.target) {
            let link = toolchain.build_dir().join(&name);
            if let Err(err) = self.ctx.shell.symlink(&link_name, &link) {
                error!(link = %link, error = %err, "cannot create library symlink");
                return false;
            }
        }
        self.link_command.as_ref().is_none_or(|command| {
            record_stamp(self.ctx.shell, &toolchain.product_path(self.target), command)
        })
    }
}

fn record_stamp(shell: &dyn BuildShell, output: &Utf8Path, command: &str) -> bool {
    match CommandHasher::record(shell, output, command) {
        Ok(()) => true,
        Err(err) => {
            error!(output = %output, error = %err, "cannot record command stamp");
            false
        }
    }
}

fn is_dirty(
    shell: &dyn BuildShell,
    output: &Utf8Path,
    command: &str,
    record: &DependencyFile,
) -> bool {
    if !CommandHasher::is_current(shell, output, command) {
        return true;
    }
    let Some(built) = shell.file_status(output) else {
        return true;
    };
    if !record.is_valid() {
        return true;
    }
    record.sources().iter().any(|source| {
        shell
            .file_status(Utf8Path::new(source))
            .is_none_or(|status| status.modified > built.modified)
    })
}

fn is_link_dirty(
    shell: &dyn BuildShell,
    product: &Utf8Path,
    command: &str,
    objects: &[Utf8PathBuf],
) -> bool {
    if !CommandHasher::is_current(shell, product, command) {
        return true;
    }
    let Some(linked) = shell.file_status(product) else {
        return true;
    };
    objects.iter().any(|object| {
        shell
            .file_status(object)
            .is_none_or(|status| status.modified > linked.modified)
    })
}

/// Importers of a rebuilt module read its new interface, so they are
/// rebuilt as well.
fn propagate_module_changes(units: &mut [Unit]) {
    loop {
        let rebuilt: HashSet<String> = units
            .iter()
            .filter(|unit| unit.dirty && unit.record.is_module())
            .map(|unit| unit.record.module_name().to_owned())
            .collect();
        let mut changed = false;
        for unit in units.iter_mut().filter(|unit| !unit.dirty) {
            if unit.record.imports().iter().any(|import| rebuilt.contains(import)) {
                unit.dirty = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(module: &str, imports: &str, dirty: bool) -> Unit {
        let mut text = format!("x.o: /src/x.cc\nx.o: {imports}\n");
        if !module.is_empty() {
            text.push_str(&format!(".PHONY: {module}\n"));
        }
        Unit {
            source: "/src/x.cc".into(),
            output: "x.o".into(),
            command: "cc".to_owned(),
            record: DependencyFile::parse(&text),
            dirty,
        }
    }

    #[test]
    fn module_changes_reach_transitive_importers() {
        let mut units = vec![
            unit("", "net.c++m", false),
            unit("net.c++m", "core.c++m", false),
            unit("core.c++m", "", true),
            unit("ui.c++m", "", false),
        ];
        propagate_module_changes(&mut units);
        let dirty: Vec<bool> = units.iter().map(|u| u.dirty).collect();
        assert_eq!(dirty, [true, true, true, false]);
    }
}
