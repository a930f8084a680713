//! Removal of installed products.

use camino::Utf8Path;
use tracing::{debug, error, warn};

use super::{Stage, StageContext, StageKind};
use crate::plan::{Target, TargetKind};

/// Removes what [`InstallStage`](super::InstallStage) put in place.
///
/// A dry run or a test target is a no-op. Packages only recurse into what
/// they bundle. For libraries the version symlinks, the installed
/// `include/` mirror and the pkg-config file are removed as well.
#[derive(Debug, Default, Clone, Copy)]
pub struct UninstallStage;

impl Stage for UninstallStage {
    const KIND: StageKind = StageKind::Uninstall;

    fn skip(&self, ctx: &StageContext<'_>, target: &Target) -> bool {
        ctx.plan.options().dry_run || target.kind == TargetKind::Test
    }

    fn act(&self, ctx: &mut StageContext<'_>, target: &Target) -> bool {
        match target.kind {
            TargetKind::Package | TargetKind::Test => true,
            TargetKind::Tools => uninstall_tools(ctx, target),
            TargetKind::Application | TargetKind::Library => uninstall_product(ctx, target),
        }
    }
}

fn uninstall_tools(ctx: &StageContext<'_>, target: &Target) -> bool {
    let install_dir = ctx.toolchain.install_dir(ctx.plan, target);
    ctx.sources(target.id)
        .iter()
        .all(|source| unlink(ctx, &install_dir.join(ctx.toolchain.tool_name(source))))
}

fn uninstall_product(ctx: &StageContext<'_>, target: &Target) -> bool {
    let toolchain = ctx.toolchain;
    let install_dir = toolchain.install_dir(ctx.plan, target);
    if !unlink(ctx, &install_dir.join(toolchain.link_name(target))) {
        return false;
    }
    if target.kind != TargetKind::Library || target.params.link_static {
        return true;
    }

    // Leftovers below are removed on a best-effort basis.
    for name in toolchain.library_symlinks(target) {
        unlink(ctx, &install_dir.join(name));
    }
    let include = target.project_path.join("include");
    if ctx.shell.file_status(&include).is_some() {
        if let Err(err) = ctx
            .shell
            .unlink_tree(&include, &toolchain.include_prefix(ctx.plan))
        {
            warn!(target = %target.name, error = %err, "cannot remove installed headers");
        }
    }
    unlink(ctx, &toolchain.pkg_config_path(ctx.plan, target));
    true
}

fn unlink(ctx: &StageContext<'_>, path: &Utf8Path) -> bool {
    match ctx.shell.unlink(path) {
        Ok(()) => {
            debug!(path = %path, "uninstalled");
            true
        }
        Err(err) => {
            error!(path = %path, error = %err, "cannot remove installed file");
            false
        }
    }
}
