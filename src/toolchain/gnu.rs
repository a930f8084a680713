//! GCC/Clang compatible toolchain.

use camino::{Utf8Path, Utf8PathBuf};
use std::env;

use super::{ToolChain, join_args};
use crate::options::BuildType;
use crate::plan::{BuildPlan, Target, TargetKind};

const CXX_EXTENSIONS: [&str; 9] = ["cc", "cxx", "cpp", "c++", "mm", "M", "C", "cp", "CPP"];
const PIC_FLAGS: [&str; 4] = ["-fPIC", "-fPIE", "-fpic", "-fpie"];

/// Drives `gcc`/`g++` style compilers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GnuToolChain {
    build_dir: Utf8PathBuf,
    cc: String,
    cxx: String,
    c_flags: Vec<String>,
    cxx_flags: Vec<String>,
    link_flags: Vec<String>,
}

impl GnuToolChain {
    /// Toolchain using `gcc` and `g++`, writing products to `build_dir`.
    #[must_use]
    pub fn new(build_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
            cc: "gcc".to_owned(),
            cxx: "g++".to_owned(),
            c_flags: Vec::new(),
            cxx_flags: Vec::new(),
            link_flags: Vec::new(),
        }
    }

    /// As [`new`](Self::new), honouring `CC`, `CXX`, `CFLAGS`, `CXXFLAGS`
    /// and `LFLAGS` from the environment.
    #[must_use]
    pub fn from_env(build_dir: impl Into<Utf8PathBuf>) -> Self {
        let mut toolchain = Self::new(build_dir);
        if let Some(cc) = env_text("CC") {
            toolchain.cc = cc;
        }
        if let Some(cxx) = env_text("CXX") {
            toolchain.cxx = cxx;
        }
        toolchain.c_flags = env_words("CFLAGS");
        toolchain.cxx_flags = env_words("CXXFLAGS");
        toolchain.link_flags = env_words("LFLAGS");
        toolchain
    }

    fn is_cxx(source: &Utf8Path) -> bool {
        source
            .extension()
            .is_some_and(|ext| CXX_EXTENSIONS.contains(&ext))
    }

    fn compiler(&self, target: &Target, cxx: bool) -> String {
        if !target.params.compiler.is_empty() {
            return target.params.compiler.clone();
        }
        if cxx { self.cxx.clone() } else { self.cc.clone() }
    }

    fn target_name(target: &Target) -> String {
        if target.kind == TargetKind::Library && !target.name.starts_with("lib") {
            format!("lib{}", target.name)
        } else {
            target.name.clone()
        }
    }

    fn is_shared_library(target: &Target) -> bool {
        target.kind == TargetKind::Library && !target.params.link_static
    }

    fn append_compile_options(
        &self,
        args: &mut Vec<String>,
        plan: &BuildPlan,
        target: &Target,
        cxx: bool,
    ) {
        let params = &target.params;
        match plan.options().build_type {
            BuildType::Debug => args.push("-g".to_owned()),
            BuildType::Release => args.push("-DNDEBUG".to_owned()),
            BuildType::Plain => {}
        }
        if !params.optimize.is_empty() {
            args.push(format!("-O{}", params.optimize));
        }
        if params.link_static {
            args.push("-static".to_owned());
        }
        if !params
            .custom_compile_flags
            .iter()
            .any(|flag| PIC_FLAGS.contains(&flag.as_str()))
        {
            args.push("-fPIC".to_owned());
        }
        args.extend(
            ["-Wall", "-pthread", "-pipe", "-D_FILE_OFFSET_BITS=64"]
                .map(str::to_owned),
        );
        let language_flags = if cxx { &self.cxx_flags } else { &self.c_flags };
        args.extend(language_flags.iter().cloned());
        args.push(format!("-DCCBUILD_BUNDLE_VERSION={}", target.version));
        // C++ dialect flags would make the C compiler fail.
        args.extend(
            params
                .custom_compile_flags
                .iter()
                .filter(|flag| cxx || !flag.contains("c++"))
                .cloned(),
        );
        args.extend(params.include_paths.iter().map(|path| format!("-I{path}")));
    }

    fn append_link_options(
        &self,
        args: &mut Vec<String>,
        plan: &BuildPlan,
        target: &Target,
        cxx: bool,
    ) {
        let params = &target.params;
        args.extend(params.custom_link_flags.iter().cloned());
        args.extend(self.link_flags.iter().cloned());
        if !params.library_paths.iter().any(|path| path == ".") {
            args.push(format!("-L{}", self.build_dir));
        }
        args.extend(params.library_paths.iter().map(|path| format!("-L{path}")));
        for library in plan.linked_libraries(target) {
            let name = library.name.strip_prefix("lib").unwrap_or(&library.name);
            args.push(format!("-l{name}"));
        }
        args.extend(params.libraries.iter().map(|library| format!("-l{library}")));
        let compiler = self.compiler(target, cxx);
        if cxx && !compiler.contains("++") {
            args.push("-lstdc++".to_owned());
        }
        args.push("-Wl,--enable-new-dtags,-rpath=$ORIGIN,-rpath=$ORIGIN/../lib".to_owned());
    }
}

impl ToolChain for GnuToolChain {
    fn build_dir(&self) -> &Utf8Path {
        &self.build_dir
    }

    fn objects_dir(&self, target: &Target) -> Utf8PathBuf {
        self.build_dir.join(format!(".modules-{}", target.name))
    }

    fn object_path(&self, target: &Target, source: &Utf8Path) -> Utf8PathBuf {
        let stem = source.strip_prefix(&target.project_path).map_or_else(
            |_| source.file_name().unwrap_or(source.as_str()).to_owned(),
            |relative| relative.as_str().replace('/', "_"),
        );
        self.objects_dir(target).join(format!("{stem}.o"))
    }

    fn dependency_path(&self, target: &Target, source: &Utf8Path) -> Utf8PathBuf {
        let mut path = self.object_path(target, source).into_string();
        path.push_str(".d");
        Utf8PathBuf::from(path)
    }

    fn compile_command(&self, plan: &BuildPlan, target: &Target, source: &Utf8Path) -> String {
        let cxx = Self::is_cxx(source);
        let mut args = vec![self.compiler(target, cxx), "-c".to_owned()];
        args.push("-o".to_owned());
        args.push(self.object_path(target, source).into_string());
        args.push("-MD".to_owned());
        args.push("-MF".to_owned());
        args.push(self.dependency_path(target, source).into_string());
        self.append_compile_options(&mut args, plan, target, cxx);
        args.push(source.to_string());
        join_args(&args)
    }

    fn link_command(
        &self,
        plan: &BuildPlan,
        target: &Target,
        objects: &[Utf8PathBuf],
        sources: &[Utf8PathBuf],
    ) -> String {
        let mut objects: Vec<&str> = objects.iter().map(|path| path.as_str()).collect();
        objects.sort_unstable();

        if target.kind == TargetKind::Library && target.params.link_static {
            let mut args = vec!["ar".to_owned(), "rcs".to_owned()];
            args.push(self.product_path(target).into_string());
            args.extend(objects.into_iter().map(str::to_owned));
            return join_args(&args);
        }

        let cxx = sources.iter().any(|source| Self::is_cxx(source));
        let mut args = vec![self.compiler(target, cxx), "-o".to_owned()];
        args.push(self.product_path(target).into_string());
        if target.params.link_static {
            args.push("-static".to_owned());
        }
        if Self::is_shared_library(target) {
            args.push("-shared".to_owned());
        }
        args.push("-pthread".to_owned());
        if Self::is_shared_library(target) {
            args.push(format!(
                "-Wl,-soname,{}.so.{}",
                Self::target_name(target),
                target.version.major
            ));
        }
        args.extend(objects.into_iter().map(str::to_owned));
        self.append_link_options(&mut args, plan, target, cxx);
        join_args(&args)
    }

    fn compile_link_command(&self, plan: &BuildPlan, target: &Target, source: &Utf8Path) -> String {
        let cxx = Self::is_cxx(source);
        let mut args = vec![self.compiler(target, cxx), "-o".to_owned()];
        args.push(self.build_dir.join(self.tool_name(source)).into_string());
        args.push("-MD".to_owned());
        args.push("-MF".to_owned());
        args.push(self.dependency_path(target, source).into_string());
        self.append_compile_options(&mut args, plan, target, cxx);
        args.push("-pthread".to_owned());
        args.push(source.to_string());
        self.append_link_options(&mut args, plan, target, cxx);
        join_args(&args)
    }

    fn link_name(&self, target: &Target) -> String {
        let name = Self::target_name(target);
        match target.kind {
            TargetKind::Library if target.params.link_static => format!("{name}.a"),
            TargetKind::Library => format!("{name}.so.{}", target.version),
            _ => name,
        }
    }

    fn tool_name(&self, source: &Utf8Path) -> String {
        source.file_stem().unwrap_or(source.as_str()).to_owned()
    }

    fn library_symlinks(&self, target: &Target) -> Vec<String> {
        if !Self::is_shared_library(target) {
            return Vec::new();
        }
        let mut name = self.link_name(target);
        let mut links = Vec::new();
        while let Some((shorter, _)) = name.rsplit_once('.') {
            if !shorter.contains(".so") {
                break;
            }
            links.push(shorter.to_owned());
            name = shorter.to_owned();
        }
        links
    }

    fn install_dir(&self, plan: &BuildPlan, target: &Target) -> Utf8PathBuf {
        let relative = if target.kind == TargetKind::Library { "lib" } else { "bin" };
        plan.options().install_prefix().join(relative)
    }

    fn include_prefix(&self, plan: &BuildPlan) -> Utf8PathBuf {
        plan.options().install_prefix().join("include")
    }

    fn pkg_config_path(&self, plan: &BuildPlan, target: &Target) -> Utf8PathBuf {
        self.install_dir(plan, target)
            .join("pkgconfig")
            .join(format!("{}.pc", Self::target_name(target)))
    }
}

fn env_text(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_words(key: &str) -> Vec<String> {
    env_text(key)
        .map(|value| value.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::BuildOptions;
    use crate::params::BuildParameters;
    use crate::recipe::ConfigObject;
    use crate::recipe::fixtures::MemoryRecipes;
    use rstest::{fixture, rstest};
    use semver::Version;

    fn recipes() -> MemoryRecipes {
        MemoryRecipes::default().with(
            "/src/core",
            ConfigObject::new("Library")
                .with("name", "core")
                .with("version", "1.2.3"),
        )
    }

    fn target(kind: TargetKind, name: &str) -> Target {
        let plan = BuildPlan::load(Utf8Path::new("/src/core"), BuildOptions::default(), &recipes())
            .expect("plan");
        Target {
            kind,
            name: name.to_owned(),
            version: Version::new(1, 2, 3),
            params: BuildParameters::default(),
            ..plan.root().clone()
        }
    }

    #[fixture]
    fn plan() -> BuildPlan {
        BuildPlan::load(Utf8Path::new("/src/core"), BuildOptions::default(), &recipes())
            .expect("plan")
    }

    #[fixture]
    fn toolchain() -> GnuToolChain {
        GnuToolChain::new("/build")
    }

    #[rstest]
    #[case(TargetKind::Library, "core", "libcore.so.1.2.3")]
    #[case(TargetKind::Library, "libz", "libz.so.1.2.3")]
    #[case(TargetKind::Application, "app", "app")]
    #[case(TargetKind::Test, "check", "check")]
    fn link_names(
        toolchain: GnuToolChain,
        #[case] kind: TargetKind,
        #[case] name: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(toolchain.link_name(&target(kind, name)), expected);
    }

    #[rstest]
    fn static_library_is_an_archive(toolchain: GnuToolChain) {
        let mut library = target(TargetKind::Library, "core");
        library.params.link_static = true;
        assert_eq!(toolchain.link_name(&library), "libcore.a");
        assert!(toolchain.library_symlinks(&library).is_empty());
    }

    #[rstest]
    fn shared_library_symlinks_shorten_version(toolchain: GnuToolChain) {
        let links = toolchain.library_symlinks(&target(TargetKind::Library, "core"));
        assert_eq!(links, ["libcore.so.1.2", "libcore.so.1", "libcore.so"]);
    }

    #[rstest]
    fn object_paths_flatten_project_relative_sources(toolchain: GnuToolChain) {
        let library = target(TargetKind::Library, "core");
        assert_eq!(
            toolchain.object_path(&library, Utf8Path::new("/src/core/src/a.cc")),
            "/build/.modules-core/src_a.cc.o"
        );
        assert_eq!(
            toolchain.dependency_path(&library, Utf8Path::new("/elsewhere/b.c")),
            "/build/.modules-core/b.c.o.d"
        );
    }

    #[rstest]
    fn compile_command_selects_driver_and_options(plan: BuildPlan, toolchain: GnuToolChain) {
        let mut library = target(TargetKind::Library, "core");
        library.params.optimize = "2".to_owned();
        library.params.include_paths = vec!["/src/core/include".into()];
        library.params.custom_compile_flags = vec!["-std=c++20".to_owned()];

        let cxx = toolchain.compile_command(&plan, &library, Utf8Path::new("/src/core/a.cc"));
        assert!(cxx.starts_with(
            "g++ -c -o /build/.modules-core/a.cc.o -MD -MF /build/.modules-core/a.cc.o.d"
        ));
        assert!(cxx.contains(" -O2 "));
        assert!(cxx.contains(" -fPIC "));
        assert!(cxx.contains(" -std=c++20 "));
        assert!(cxx.contains(" -I/src/core/include "));
        assert!(cxx.ends_with(" /src/core/a.cc"));

        let c = toolchain.compile_command(&plan, &library, Utf8Path::new("/src/core/b.c"));
        assert!(c.starts_with("gcc "));
        assert!(!c.contains("-std=c++20"));
    }

    #[rstest]
    fn link_command_sorts_objects_and_names_soname(plan: BuildPlan, toolchain: GnuToolChain) {
        let library = target(TargetKind::Library, "core");
        let objects = vec![Utf8PathBuf::from("b.o"), Utf8PathBuf::from("a.o")];
        let sources = vec![Utf8PathBuf::from("/src/core/a.cc")];
        let line = toolchain.link_command(&plan, &library, &objects, &sources);
        assert!(line.starts_with(
            "g++ -o /build/libcore.so.1.2.3 -shared -pthread -Wl,-soname,libcore.so.1 a.o b.o"
        ));
        assert!(line.contains(" -L/build "));
    }

    #[rstest]
    fn install_paths_follow_prefix(plan: BuildPlan, toolchain: GnuToolChain) {
        let library = target(TargetKind::Library, "core");
        let app = target(TargetKind::Application, "app");
        assert_eq!(toolchain.install_dir(&plan, &library), "/usr/local/lib");
        assert_eq!(toolchain.install_dir(&plan, &app), "/usr/local/bin");
        assert_eq!(toolchain.include_prefix(&plan), "/usr/local/include");
        assert_eq!(
            toolchain.pkg_config_path(&plan, &library),
            "/usr/local/lib/pkgconfig/libcore.pc"
        );
    }

    #[rstest]
    fn tool_names_use_the_file_stem(toolchain: GnuToolChain) {
        assert_eq!(toolchain.tool_name(Utf8Path::new("/src/tools/probe.cc")), "probe");
    }
}
