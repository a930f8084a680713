//! Integration tests for the glob, compile/link, install and uninstall
//! stages.
//!
//! Recipes and sources live in a temporary directory so source patterns
//! expand against real files. Compilers are `true` or `false`, so jobs run
//! real shell commands without producing anything; build products are
//! simulated in a [`RecordingShell`].

use camino::{Utf8Path, Utf8PathBuf};
use ccbuild::insight::InsightDatabase;
use ccbuild::options::BuildOptions;
use ccbuild::plan::BuildPlan;
use ccbuild::recipe::FileRecipeSource;
use ccbuild::shell::BuildShell;
use ccbuild::stage::{
    CompileLinkStage, GlobStage, InstallStage, Pipeline, StageContext, UninstallStage,
};
use ccbuild::toolchain::{GnuToolChain, ToolChain};
use rstest::{fixture, rstest};
use std::fs;
use tempfile::TempDir;
use test_support::reporter::Event;
use test_support::{RecordingReporter, RecordingShell, ShellOp, write_project};

struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
    out: Utf8PathBuf,
}

impl Workspace {
    fn project(&self, name: &str, recipe: &str, files: &[&str]) -> Utf8PathBuf {
        write_project(&self.root, name, recipe, files)
    }

    fn toolchain(&self) -> GnuToolChain {
        GnuToolChain::new(self.out.clone())
    }
}

#[fixture]
fn workspace() -> Workspace {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8Path::from_path(dir.path()).expect("utf8").to_owned();
    let out = root.join("out");
    fs::create_dir_all(&out).expect("build dir");
    Workspace {
        _dir: dir,
        root,
        out,
    }
}

fn plan(project: &Utf8Path, options: BuildOptions) -> BuildPlan {
    BuildPlan::load(project, options, &FileRecipeSource).expect("plan")
}

fn build(
    plan: &BuildPlan,
    toolchain: &GnuToolChain,
    shell: &RecordingShell,
    reporter: &RecordingReporter,
) -> bool {
    let mut pipeline = Pipeline::new(StageContext::new(plan, toolchain, shell, reporter));
    let root = plan.root().id;
    pipeline.run(&GlobStage, root) && pipeline.run(&CompileLinkStage, root)
}

fn finished(reporter: &RecordingReporter) -> Vec<String> {
    reporter
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Event::Finished { command, .. } => Some(command),
            _ => None,
        })
        .collect()
}

/// Pretend the compiler and linker produced what the last build asked for.
fn simulate_outputs(
    plan: &BuildPlan,
    toolchain: &GnuToolChain,
    shell: &RecordingShell,
    sources: &[Utf8PathBuf],
) {
    let target = plan.root();
    for source in sources {
        let object = toolchain.object_path(target, source);
        shell.touch(&object);
        let record = format!("{object}: {source}\n");
        shell
            .write(&toolchain.dependency_path(target, source), &record)
            .expect("record");
    }
    shell.touch(toolchain.product_path(target));
}

const APP: &str = "class: Application\ncompiler: 'true'\nsource: ['*.cc']\n";

#[rstest]
fn dry_run_lists_commands_without_touching_files(workspace: Workspace) {
    let project = workspace.project("app", APP, &["a.cc", "b.cc"]);
    let options = BuildOptions {
        dry_run: true,
        ..BuildOptions::default()
    };
    let plan = plan(&project, options);
    let shell = RecordingShell::new();
    let reporter = RecordingReporter::default();

    assert!(build(&plan, &workspace.toolchain(), &shell, &reporter));
    let planned = reporter.planned_commands();
    assert_eq!(planned.len(), 3);
    assert!(
        planned
            .first()
            .is_some_and(|c| c.starts_with("true -c -o") && c.ends_with("a.cc"))
    );
    let link = format!("true -o {}/app", workspace.out);
    assert!(planned.last().is_some_and(|c| c.starts_with(&link)));
    assert!(shell.ops().is_empty());
}

#[rstest]
fn first_build_compiles_then_links(workspace: Workspace) {
    let project = workspace.project("app", APP, &["a.cc", "b.cc"]);
    let plan = plan(&project, BuildOptions::default());
    let toolchain = workspace.toolchain();
    let shell = RecordingShell::new();
    let reporter = RecordingReporter::default();

    assert!(build(&plan, &toolchain, &shell, &reporter));
    let commands = finished(&reporter);
    assert_eq!(commands.len(), 3);
    assert!(commands.last().is_some_and(|c| c.starts_with("true -o")));
    assert!(shell
        .ops()
        .contains(&ShellOp::Mkdir(toolchain.objects_dir(plan.root()))));
    assert!(shell.exists(format!("{}.cmd", toolchain.product_path(plan.root()))));
}

#[rstest]
fn unchanged_sources_are_not_rebuilt(workspace: Workspace) {
    let project = workspace.project("app", APP, &["a.cc", "b.cc"]);
    let plan = plan(&project, BuildOptions::default());
    let toolchain = workspace.toolchain();
    let shell = RecordingShell::new();
    let sources = [project.join("a.cc"), project.join("b.cc")];
    for source in &sources {
        shell.touch(source);
    }

    assert!(build(&plan, &toolchain, &shell, &RecordingReporter::default()));
    simulate_outputs(&plan, &toolchain, &shell, &sources);

    let quiet = RecordingReporter::default();
    assert!(build(&plan, &toolchain, &shell, &quiet));
    assert!(finished(&quiet).is_empty());

    shell.touch(project.join("b.cc"));
    let partial = RecordingReporter::default();
    assert!(build(&plan, &toolchain, &shell, &partial));
    let commands = finished(&partial);
    assert_eq!(commands.len(), 2);
    assert!(commands.first().is_some_and(|c| c.ends_with("b.cc")));
}

#[rstest]
fn changed_flags_rebuild_every_unit(workspace: Workspace) {
    let project = workspace.project("app", APP, &["a.cc"]);
    let toolchain = workspace.toolchain();
    let shell = RecordingShell::new();
    let sources = [project.join("a.cc")];
    shell.touch(&sources[0]);
    let plain = plan(&project, BuildOptions::default());
    assert!(build(&plain, &toolchain, &shell, &RecordingReporter::default()));
    simulate_outputs(&plain, &toolchain, &shell, &sources);

    let release = plan(
        &project,
        BuildOptions {
            build_type: ccbuild::options::BuildType::Release,
            ..BuildOptions::default()
        },
    );
    let reporter = RecordingReporter::default();
    assert!(build(&release, &toolchain, &shell, &reporter));
    assert_eq!(finished(&reporter).len(), 2);
}

#[rstest]
fn failing_compiler_fails_the_stage(workspace: Workspace) {
    let project = workspace.project(
        "app",
        "class: Application\ncompiler: 'false'\nsource: ['*.cc']\n",
        &["a.cc", "b.cc"],
    );
    let plan = plan(&project, BuildOptions::default());
    let reporter = RecordingReporter::default();

    assert!(!build(&plan, &workspace.toolchain(), &RecordingShell::new(), &reporter));
    assert!(finished(&reporter).iter().all(|c| c.starts_with("false -c")));
    assert!(reporter.events().contains(&Event::StageFailed {
        stage: "build".to_owned(),
        target: "app".to_owned(),
    }));
}

#[rstest]
fn insight_records_compile_commands(workspace: Workspace) {
    let project = workspace.project("app", APP, &["a.cc", "b.cc"]);
    let options = BuildOptions {
        insight: true,
        ..BuildOptions::default()
    };
    let plan = plan(&project, options);
    let shell = RecordingShell::new();

    assert!(build(&plan, &workspace.toolchain(), &shell, &RecordingReporter::default()));
    let database = InsightDatabase::open(&shell, &project);
    let mut files: Vec<&Utf8Path> = database.entries().map(|entry| entry.file.as_path()).collect();
    files.sort_unstable();
    assert_eq!(files, [project.join("a.cc"), project.join("b.cc")]);
}

#[rstest]
fn tools_are_compiled_and_linked_one_by_one(workspace: Workspace) {
    let project = workspace.project(
        "tools",
        "class: Tools\ncompiler: 'true'\nsource: ['*.c']\n",
        &["fmt.c", "lint.c"],
    );
    let plan = plan(&project, BuildOptions::default());
    let reporter = RecordingReporter::default();

    assert!(build(&plan, &workspace.toolchain(), &RecordingShell::new(), &reporter));
    let mut commands = finished(&reporter);
    commands.sort();
    assert_eq!(commands.len(), 2);
    for (command, tool) in commands.iter().zip(["fmt", "lint"]) {
        assert!(command.starts_with(&format!("true -o {}/{tool} ", workspace.out)));
    }
}

#[rstest]
fn libraries_install_and_uninstall(workspace: Workspace) {
    let project = workspace.project(
        "core",
        "class: Library\ncompiler: 'true'\nversion: 1.2.3\nsource: ['*.cc']\n",
        &["core.cc"],
    );
    let stage = workspace.root.join("stage");
    let options = BuildOptions {
        install_root: stage.clone(),
        ..BuildOptions::default()
    };
    let plan = plan(&project, options);
    let toolchain = workspace.toolchain();
    let shell = RecordingShell::new();
    let reporter = RecordingReporter::default();
    let lib = stage.join("usr/local/lib");

    let mut pipeline = Pipeline::new(StageContext::new(&plan, &toolchain, &shell, &reporter));
    let root = plan.root().id;
    assert!(pipeline.run(&GlobStage, root));
    assert!(pipeline.run(&CompileLinkStage, root));
    shell.touch(toolchain.product_path(plan.root()));
    shell.clear_ops();
    assert!(pipeline.run(&InstallStage, root));
    assert_eq!(
        shell.ops(),
        [
            ShellOp::Copy(
                workspace.out.join("libcore.so.1.2.3"),
                lib.join("libcore.so.1.2.3")
            ),
            ShellOp::Symlink("libcore.so.1.2.3".to_owned(), lib.join("libcore.so.1.2")),
            ShellOp::Symlink("libcore.so.1.2.3".to_owned(), lib.join("libcore.so.1")),
            ShellOp::Symlink("libcore.so.1.2.3".to_owned(), lib.join("libcore.so")),
        ]
    );

    shell.clear_ops();
    assert!(pipeline.run(&UninstallStage, root));
    assert!(!shell.exists(lib.join("libcore.so.1.2.3")));
    assert_eq!(
        shell.ops().last(),
        Some(&ShellOp::Unlink(lib.join("pkgconfig/libcore.pc")))
    );
}
