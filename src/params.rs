//! Per-target compiler and linker parameters.
//!
//! [`BuildParameters::build`] reads the parameter keys of a recipe section and
//! folds in at most one matching build-type child (`Debug`/`Release`) and at
//! most one child tagged with the host [`Platform`], in the order the children
//! appear. Scalars in an override replace the base only when set; lists are
//! appended after the base.
//!
//! # Examples
//!
//! ```
//! use camino::Utf8Path;
//! use ccbuild::options::{BuildOptions, BuildType};
//! use ccbuild::params::BuildParameters;
//! use ccbuild::recipe::ConfigObject;
//!
//! let recipe = ConfigObject::new("Application")
//!     .with("optimize", "2")
//!     .with("include-paths", ["include"])
//!     .with_child(
//!         ConfigObject::new("Release")
//!             .with("optimize", "3")
//!             .with("include-paths", ["release/include"]),
//!     );
//! let options = BuildOptions { build_type: BuildType::Release, ..BuildOptions::default() };
//! let params = BuildParameters::build(&recipe, Utf8Path::new("/src/app"), &options);
//! assert_eq!(params.optimize, "3");
//! assert_eq!(params.include_paths, ["/src/app/include", "/src/app/release/include"]);
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::options::BuildOptions;
use crate::paths;
use crate::recipe::ConfigObject;

/// Operating systems a recipe section may be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Linux.
    Linux,
    /// OpenBSD.
    OpenBSD,
    /// FreeBSD.
    FreeBSD,
    /// NetBSD.
    NetBSD,
    /// DragonFly BSD.
    DragonFly,
    /// macOS. Recognised as a tag but never selected as the host, which
    /// reports [`Mach`](Self::Mach) instead.
    MacOSX,
    /// Solaris and illumos.
    Solaris,
    /// Mach based systems, including macOS and iOS.
    Mach,
    /// HP-UX.
    HPUX,
    /// Cygwin.
    Cygwin,
    /// MinGW on Windows.
    MinGW,
}

impl Platform {
    /// Every recognised platform tag.
    pub const ALL: [Self; 11] = [
        Self::Linux,
        Self::OpenBSD,
        Self::FreeBSD,
        Self::NetBSD,
        Self::DragonFly,
        Self::MacOSX,
        Self::Solaris,
        Self::Mach,
        Self::HPUX,
        Self::Cygwin,
        Self::MinGW,
    ];

    /// Recipe class tag of the platform.
    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::OpenBSD => "OpenBSD",
            Self::FreeBSD => "FreeBSD",
            Self::NetBSD => "NetBSD",
            Self::DragonFly => "DragonFly",
            Self::MacOSX => "MacOSX",
            Self::Solaris => "Solaris",
            Self::Mach => "Mach",
            Self::HPUX => "HPUX",
            Self::Cygwin => "Cygwin",
            Self::MinGW => "MinGW",
        }
    }

    /// The platform this binary was compiled for, if it is one of the
    /// recognised tags.
    #[must_use]
    pub const fn host() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(target_os = "openbsd") {
            Some(Self::OpenBSD)
        } else if cfg!(target_os = "freebsd") {
            Some(Self::FreeBSD)
        } else if cfg!(target_os = "netbsd") {
            Some(Self::NetBSD)
        } else if cfg!(target_os = "dragonfly") {
            Some(Self::DragonFly)
        } else if cfg!(target_vendor = "apple") {
            Some(Self::Mach)
        } else if cfg!(any(target_os = "solaris", target_os = "illumos")) {
            Some(Self::Solaris)
        } else if cfg!(all(windows, target_env = "gnu")) {
            Some(Self::MinGW)
        } else {
            None
        }
    }
}

/// Resolved compiler and linker settings of one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildParameters {
    /// Compiler executable; empty means the toolchain default.
    pub compiler: String,
    /// Optimisation level; empty means the toolchain default.
    pub optimize: String,
    /// Link statically.
    pub link_static: bool,
    /// Include directories, resolved against the project path.
    pub include_paths: Vec<Utf8PathBuf>,
    /// Library search directories.
    pub library_paths: Vec<String>,
    /// Libraries to link against.
    pub libraries: Vec<String>,
    /// Extra compiler flags.
    pub custom_compile_flags: Vec<String>,
    /// Extra linker flags.
    pub custom_link_flags: Vec<String>,
}

impl BuildParameters {
    /// Read `config` and merge the sections selected by `options` and the
    /// host platform.
    #[must_use]
    pub fn build(config: &ConfigObject, project_path: &Utf8Path, options: &BuildOptions) -> Self {
        Self::build_for(config, project_path, options, Platform::host())
    }

    /// As [`build`](Self::build) with an explicit platform.
    #[must_use]
    pub fn build_for(
        config: &ConfigObject,
        project_path: &Utf8Path,
        options: &BuildOptions,
        platform: Option<Platform>,
    ) -> Self {
        let mut params = Self::read(config, project_path);

        let build_type_tag = options.build_type.class_name();
        let platform_tag = platform.map(Platform::class_name);
        let mut build_type_applied = false;
        let mut platform_applied = false;
        for child in &config.children {
            let class = Some(child.class_name.as_str());
            if !build_type_applied && class == build_type_tag {
                build_type_applied = true;
            } else if !platform_applied && class == platform_tag {
                platform_applied = true;
            } else {
                continue;
            }
            debug!(section = %child.class_name, "merging specific build parameters");
            params.merge(&Self::build_for(child, project_path, options, platform));
        }
        params
    }

    /// Fold `specific` into `self`.
    pub fn merge(&mut self, specific: &Self) {
        if !specific.compiler.is_empty() {
            self.compiler.clone_from(&specific.compiler);
        }
        if !specific.optimize.is_empty() {
            self.optimize.clone_from(&specific.optimize);
        }
        if specific.link_static {
            self.link_static = true;
        }
        self.include_paths.extend(specific.include_paths.iter().cloned());
        self.library_paths.extend(specific.library_paths.iter().cloned());
        self.libraries.extend(specific.libraries.iter().cloned());
        self.custom_compile_flags
            .extend(specific.custom_compile_flags.iter().cloned());
        self.custom_link_flags
            .extend(specific.custom_link_flags.iter().cloned());
    }

    fn read(config: &ConfigObject, project_path: &Utf8Path) -> Self {
        Self {
            compiler: config.text("compiler"),
            optimize: config.text("optimize"),
            link_static: config.flag("static"),
            include_paths: config
                .list("include-paths")
                .iter()
                .map(|path| paths::resolve(project_path, Utf8Path::new(path)))
                .collect(),
            library_paths: config.list("library-paths"),
            libraries: config.list("link"),
            custom_compile_flags: config.list("compile-flags"),
            custom_link_flags: config.list("link-flags"),
        }
    }
}
