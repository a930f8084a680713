//! Source discovery.

use ::glob::{MatchOptions, glob_with};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{Stage, StageContext, StageKind};
use crate::paths;
use crate::plan::{Target, TargetKind};

/// Expands each target's `source` patterns relative to its project.
///
/// Matching directories contribute every file below them. The result is
/// sorted and free of duplicates.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobStage;

impl Stage for GlobStage {
    const KIND: StageKind = StageKind::Glob;

    fn act(&self, ctx: &mut StageContext<'_>, target: &Target) -> bool {
        if target.kind == TargetKind::Package {
            return true;
        }
        match expand(&target.project_path, &target.source_patterns) {
            Ok(sources) => {
                debug!(target = %target.name, count = sources.len(), "sources found");
                ctx.set_sources(target.id, sources);
                true
            }
            Err(message) => {
                warn!(target = %target.name, error = %message, "invalid source pattern");
                false
            }
        }
    }
}

fn expand(project_path: &Utf8Path, patterns: &[String]) -> Result<Vec<Utf8PathBuf>, String> {
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let mut sources = Vec::new();
    for pattern in patterns {
        let absolute = paths::resolve(project_path, Utf8Path::new(pattern));
        let matches = glob_with(absolute.as_str(), options)
            .map_err(|err| format!("{pattern}: {err}"))?;
        for entry in matches {
            let path = entry.map_err(|err| format!("{pattern}: {err}"))?;
            let Ok(path) = Utf8PathBuf::from_path_buf(path) else {
                continue;
            };
            if path.is_dir() {
                sources.extend(files_below(&path));
            } else {
                sources.push(path);
            }
        }
    }
    sources.sort();
    sources.dedup();
    Ok(sources)
}

fn files_below(dir: &Utf8Path) -> impl Iterator<Item = Utf8PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
}
