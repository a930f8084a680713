//! Tests for the stage pipeline and the uninstall stage.

use super::*;
use crate::options::BuildOptions;
use crate::recipe::ConfigObject;
use crate::recipe::fixtures::MemoryRecipes;
use crate::reporter::SilentReporter;
use crate::shell::MockBuildShell;
use crate::toolchain::GnuToolChain;
use camino::Utf8Path;
use mockall::predicate::eq;
use rstest::{fixture, rstest};
use std::cell::RefCell;
use std::io;
use std::sync::{Arc, Mutex};

/// Records every target it acts on; fails or skips the named ones.
#[derive(Default)]
struct Counting {
    acted: RefCell<Vec<String>>,
    fail: Option<&'static str>,
    skip: Option<&'static str>,
}

impl Stage for Counting {
    const KIND: StageKind = StageKind::Glob;

    fn skip(&self, _ctx: &StageContext<'_>, target: &Target) -> bool {
        self.skip == Some(target.name.as_str())
    }

    fn act(&self, _ctx: &mut StageContext<'_>, target: &Target) -> bool {
        self.acted.borrow_mut().push(target.name.clone());
        self.fail != Some(target.name.as_str())
    }
}

#[fixture]
fn diamond() -> MemoryRecipes {
    MemoryRecipes::default()
        .with(
            "/src/app",
            ConfigObject::new("Application").with("use", ["../net", "../ui"]),
        )
        .with("/src/net", ConfigObject::new("Library").with("use", ["../core"]))
        .with("/src/ui", ConfigObject::new("Library").with("use", ["../core"]))
        .with(
            "/src/core",
            ConfigObject::new("Library").with("version", "1.2.3"),
        )
}

fn plan(recipes: &MemoryRecipes, options: BuildOptions) -> BuildPlan {
    BuildPlan::load(Utf8Path::new("/src/app"), options, recipes).expect("plan")
}

fn id_of(plan: &BuildPlan, name: &str) -> TargetId {
    plan.targets()
        .iter()
        .find(|target| target.name == name)
        .map(|target| target.id)
        .expect("target")
}

#[rstest]
fn shared_prerequisite_runs_once(diamond: MemoryRecipes) {
    let plan = plan(&diamond, BuildOptions::default());
    let toolchain = GnuToolChain::new("/build");
    let shell = MockBuildShell::new();
    let mut pipeline = Pipeline::new(StageContext::new(&plan, &toolchain, &shell, &SilentReporter));
    let stage = Counting::default();

    assert!(pipeline.run(&stage, plan.root().id));
    assert!(pipeline.run(&stage, plan.root().id));
    assert_eq!(*stage.acted.borrow(), ["core", "net", "ui", "app"]);
    assert_eq!(
        pipeline.ledger().state(id_of(&plan, "core"), StageKind::Glob),
        StageState::Done(true)
    );
}

#[rstest]
fn failure_stops_at_first_failing_prerequisite(diamond: MemoryRecipes) {
    let plan = plan(&diamond, BuildOptions::default());
    let toolchain = GnuToolChain::new("/build");
    let shell = MockBuildShell::new();
    let mut pipeline = Pipeline::new(StageContext::new(&plan, &toolchain, &shell, &SilentReporter));
    let stage = Counting {
        fail: Some("net"),
        ..Counting::default()
    };

    assert!(!pipeline.run(&stage, plan.root().id));
    assert!(!pipeline.run(&stage, plan.root().id));
    assert_eq!(*stage.acted.borrow(), ["core", "net"]);
    assert_eq!(
        pipeline.ledger().state(id_of(&plan, "ui"), StageKind::Glob),
        StageState::NotStarted
    );
    assert_eq!(
        pipeline.ledger().state(id_of(&plan, "app"), StageKind::Glob),
        StageState::Done(false)
    );
}

#[rstest]
fn skipped_target_does_not_visit_prerequisites(diamond: MemoryRecipes) {
    let plan = plan(&diamond, BuildOptions::default());
    let toolchain = GnuToolChain::new("/build");
    let shell = MockBuildShell::new();
    let mut pipeline = Pipeline::new(StageContext::new(&plan, &toolchain, &shell, &SilentReporter));
    let stage = Counting {
        skip: Some("net"),
        ..Counting::default()
    };

    assert!(pipeline.run(&stage, id_of(&plan, "net")));
    assert!(stage.acted.borrow().is_empty());
    assert_eq!(
        pipeline.ledger().state(id_of(&plan, "core"), StageKind::Glob),
        StageState::NotStarted
    );
}

#[test]
fn disabled_test_target_succeeds_without_acting() {
    let recipes = MemoryRecipes::default().with("/src/app", ConfigObject::new("Test"));
    let plan = plan(&recipes, BuildOptions::default());
    let toolchain = GnuToolChain::new("/build");
    let shell = MockBuildShell::new();
    let mut pipeline = Pipeline::new(StageContext::new(&plan, &toolchain, &shell, &SilentReporter));
    let stage = Counting::default();

    assert!(pipeline.run(&stage, plan.root().id));
    assert!(stage.acted.borrow().is_empty());
}

fn recording_shell() -> (MockBuildShell, Arc<Mutex<Vec<String>>>) {
    let removed = Arc::new(Mutex::new(Vec::new()));
    let mut shell = MockBuildShell::new();
    let log = Arc::clone(&removed);
    shell.expect_unlink().returning(move |path| {
        log.lock().expect("log").push(path.to_string());
        Ok(())
    });
    shell.expect_file_status().returning(|_| None);
    (shell, removed)
}

#[rstest]
fn uninstall_removes_products_links_and_package_config() {
    let recipes = MemoryRecipes::default()
        .with("/src/app", ConfigObject::new("Application").with("use", ["../core"]))
        .with(
            "/src/core",
            ConfigObject::new("Library").with("version", "1.2.3"),
        );
    let plan = plan(&recipes, BuildOptions::default());
    let toolchain = GnuToolChain::new("/build");
    let (shell, removed) = recording_shell();
    let mut pipeline = Pipeline::new(StageContext::new(&plan, &toolchain, &shell, &SilentReporter));

    assert!(pipeline.run(&UninstallStage, plan.root().id));
    assert!(pipeline.run(&UninstallStage, plan.root().id));
    assert_eq!(
        *removed.lock().expect("log"),
        [
            "/usr/local/lib/libcore.so.1.2.3",
            "/usr/local/lib/libcore.so.1.2",
            "/usr/local/lib/libcore.so.1",
            "/usr/local/lib/libcore.so",
            "/usr/local/lib/pkgconfig/libcore.pc",
            "/usr/local/bin/app",
        ]
    );
}

#[rstest]
fn uninstall_mirrors_headers_when_present() {
    let recipes = MemoryRecipes::default().with(
        "/src/app",
        ConfigObject::new("Library").with("name", "core"),
    );
    let plan = plan(&recipes, BuildOptions::default());
    let toolchain = GnuToolChain::new("/build");
    let mut shell = MockBuildShell::new();
    shell.expect_unlink().returning(|_| Ok(()));
    shell
        .expect_file_status()
        .with(eq(Utf8Path::new("/src/app/include")))
        .returning(|_| {
            Some(crate::shell::FileStatus {
                modified: std::time::SystemTime::UNIX_EPOCH,
            })
        });
    shell
        .expect_unlink_tree()
        .with(
            eq(Utf8Path::new("/src/app/include")),
            eq(Utf8Path::new("/usr/local/include")),
        )
        .times(1)
        .returning(|_, _| Ok(()));
    let mut pipeline = Pipeline::new(StageContext::new(&plan, &toolchain, &shell, &SilentReporter));

    assert!(pipeline.run(&UninstallStage, plan.root().id));
}

#[rstest]
fn dry_run_uninstall_touches_nothing(diamond: MemoryRecipes) {
    let options = BuildOptions {
        dry_run: true,
        ..BuildOptions::default()
    };
    let plan = plan(&diamond, options);
    let toolchain = GnuToolChain::new("/build");
    let shell = MockBuildShell::new();
    let mut pipeline = Pipeline::new(StageContext::new(&plan, &toolchain, &shell, &SilentReporter));

    assert!(pipeline.run(&UninstallStage, plan.root().id));
}

#[test]
fn failed_product_removal_fails_dependents() {
    let recipes = MemoryRecipes::default()
        .with("/src/app", ConfigObject::new("Application").with("use", ["../core"]))
        .with("/src/core", ConfigObject::new("Library"));
    let plan = plan(&recipes, BuildOptions::default());
    let toolchain = GnuToolChain::new("/build");
    let mut shell = MockBuildShell::new();
    shell
        .expect_unlink()
        .times(1)
        .returning(|_| Err(io::Error::from(io::ErrorKind::PermissionDenied)));
    let mut pipeline = Pipeline::new(StageContext::new(&plan, &toolchain, &shell, &SilentReporter));

    assert!(!pipeline.run(&UninstallStage, plan.root().id));
    assert_eq!(
        pipeline.ledger().state(id_of(&plan, "core"), StageKind::Uninstall),
        StageState::Done(false)
    );
}
