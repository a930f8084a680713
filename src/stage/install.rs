//! Installation of built products.

use camino::Utf8Path;
use std::io;
use tracing::{error, info};

use super::{Stage, StageContext, StageKind};
use crate::plan::{Target, TargetKind};

/// Copies products below the install prefix.
///
/// Libraries also get their version symlinks and their `include/` tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstallStage;

impl Stage for InstallStage {
    const KIND: StageKind = StageKind::Install;

    fn skip(&self, ctx: &StageContext<'_>, target: &Target) -> bool {
        ctx.plan.options().dry_run || target.kind == TargetKind::Test
    }

    fn act(&self, ctx: &mut StageContext<'_>, target: &Target) -> bool {
        let result = match target.kind {
            TargetKind::Package | TargetKind::Test => Ok(()),
            TargetKind::Tools => install_tools(ctx, target),
            TargetKind::Application | TargetKind::Library => install_product(ctx, target),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                error!(target = %target.name, error = %err, "install failed");
                false
            }
        }
    }
}

fn install_tools(ctx: &StageContext<'_>, target: &Target) -> io::Result<()> {
    let install_dir = ctx.toolchain.install_dir(ctx.plan, target);
    for source in ctx.sources(target.id) {
        let name = ctx.toolchain.tool_name(source);
        install_file(ctx, &ctx.toolchain.build_dir().join(&name), &install_dir.join(&name))?;
    }
    Ok(())
}

fn install_product(ctx: &StageContext<'_>, target: &Target) -> io::Result<()> {
    let toolchain = ctx.toolchain;
    let install_dir = toolchain.install_dir(ctx.plan, target);
    let link_name = toolchain.link_name(target);
    install_file(ctx, &toolchain.product_path(target), &install_dir.join(&link_name))?;

    if target.kind != TargetKind::Library {
        return Ok(());
    }
    for name in toolchain.library_symlinks(target) {
        ctx.shell.symlink(&link_name, &install_dir.join(name))?;
    }
    let include = target.project_path.join("include");
    if ctx.shell.file_status(&include).is_some() {
        ctx.shell
            .copy_tree(&include, &toolchain.include_prefix(ctx.plan))?;
    }
    Ok(())
}

fn install_file(ctx: &StageContext<'_>, from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    info!(from = %from, to = %to, "installing");
    ctx.shell.copy(from, to)
}
