//! Named-module ordering between compile jobs.
//!
//! A translation unit that imports a module must not be compiled before the
//! unit exporting that module, because the importer reads the compiled
//! module interface. [`order_jobs`] turns the import and export facts of the
//! units' dependency records into job countdowns.

use miette::Diagnostic;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::cycle;
use crate::depfile::DependencyFile;
use crate::job::Job;

/// Errors raised while deriving module edges.
#[derive(Debug, Error, Diagnostic)]
pub enum ModuleError {
    /// Two units of one batch export the same module.
    #[error("module `{module}` is exported by both `{first}` and `{second}`")]
    #[diagnostic(
        code(ccbuild::modules::ambiguous),
        help("rename one of the modules or move it to a separate target")
    )]
    Ambiguous {
        /// Module name exported twice.
        module: String,
        /// Command of the first exporting job.
        first: String,
        /// Command of the second exporting job.
        second: String,
    },

    /// Module imports form a cycle.
    #[error("module import cycle: {}", .cycle.join(" -> "))]
    #[diagnostic(code(ccbuild::modules::cycle))]
    Cycle {
        /// Module names along the cycle, starting and ending at the same one.
        cycle: Vec<String>,
    },
}

/// Register module edges between `jobs`.
///
/// `records[i]` is the dependency record of the unit compiled by `jobs[i]`,
/// or `None` when no valid record is known yet. For every import naming a
/// module exported by another job of the batch the exporter becomes a
/// prerequisite of the importer. Imports of modules the batch does not
/// export are left to the compiler (system or prerequisite modules).
///
/// # Errors
///
/// Returns [`ModuleError::Ambiguous`] when two units export one module and
/// [`ModuleError::Cycle`] when the imports cannot be ordered. No edges are
/// registered in either case.
#[expect(
    clippy::indexing_slicing,
    reason = "indices come from enumerating `records`, which is trimmed to `jobs`"
)]
pub fn order_jobs(
    jobs: &mut [Job],
    records: &[Option<&DependencyFile>],
) -> Result<(), ModuleError> {
    let records = &records[..records.len().min(jobs.len())];

    let mut exporters: HashMap<&str, usize> = HashMap::new();
    for (index, record) in records.iter().copied().enumerate() {
        let Some(record) = record.filter(|r| r.is_valid() && r.is_module()) else {
            continue;
        };
        if let Some(&first) = exporters.get(record.module_name()) {
            return Err(ModuleError::Ambiguous {
                module: record.module_name().to_owned(),
                first: jobs[first].command().to_owned(),
                second: jobs[index].command().to_owned(),
            });
        }
        exporters.insert(record.module_name(), index);
    }

    let mut edges: HashMap<usize, Vec<usize>> = HashMap::new();
    for (importer, record) in records.iter().copied().enumerate() {
        let deps = edges.entry(importer).or_default();
        let Some(record) = record.filter(|r| r.is_valid()) else {
            continue;
        };
        for import in record.imports() {
            match exporters.get(import.as_str()) {
                Some(&exporter) if exporter != importer => deps.push(exporter),
                _ => {}
            }
        }
    }

    let order: Vec<usize> = (0..records.len()).collect();
    if let Some(found) = cycle::find_cycle(&order, &edges) {
        let cycle = found
            .into_iter()
            .map(|index| module_label(records[index], &jobs[index]))
            .collect();
        return Err(ModuleError::Cycle { cycle });
    }

    for importer in order {
        for &exporter in edges.get(&importer).into_iter().flatten() {
            let (exporting, importing) = pair_mut(jobs, exporter, importer);
            debug!(
                exporter = %exporting.id(),
                importer = %importing.id(),
                "module edge"
            );
            exporting.register_derivative(importing);
        }
    }
    Ok(())
}

fn module_label(record: Option<&DependencyFile>, job: &Job) -> String {
    record
        .filter(|r| r.is_module())
        .map_or_else(|| job.command().to_owned(), |r| r.module_name().to_owned())
}

/// Borrow two distinct elements mutably.
#[expect(
    clippy::indexing_slicing,
    reason = "callers pass distinct indices within `jobs`"
)]
fn pair_mut(jobs: &mut [Job], first: usize, second: usize) -> (&mut Job, &mut Job) {
    debug_assert_ne!(first, second, "pair_mut needs distinct indices");
    if first < second {
        let (head, tail) = jobs.split_at_mut(second);
        (&mut head[first], &mut tail[0])
    } else {
        let (head, tail) = jobs.split_at_mut(first);
        (&mut tail[0], &mut head[second])
    }
}
