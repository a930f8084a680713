//! Build-wide options shared by every target of one build invocation.

use camino::{Utf8Path, Utf8PathBuf};
use std::num::NonZeroUsize;

/// Which build-type specific recipe sections apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildType {
    /// Neither `Debug` nor `Release` sections apply.
    #[default]
    Plain,
    /// `Debug` sections apply.
    Debug,
    /// `Release` sections apply.
    Release,
}

impl BuildType {
    /// The recipe class tag selecting this build type, if any.
    #[must_use]
    pub const fn class_name(self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Debug => Some("Debug"),
            Self::Release => Some("Release"),
        }
    }
}

/// Options controlling one build invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Active build type.
    pub build_type: BuildType,
    /// Evaluate the build plan and report commands without running them.
    pub dry_run: bool,
    /// Worker count for job schedulers; `None` uses host parallelism.
    pub jobs: Option<NonZeroUsize>,
    /// Build `Test` targets as well.
    pub build_tests: bool,
    /// Record compile commands into `compile_commands.json`.
    pub insight: bool,
    /// Staging root prepended to every install path.
    pub install_root: Utf8PathBuf,
    /// Installation prefix below the install root.
    pub prefix: Utf8PathBuf,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            build_type: BuildType::Plain,
            dry_run: false,
            jobs: None,
            build_tests: false,
            insight: false,
            install_root: Utf8PathBuf::from("/"),
            prefix: Utf8PathBuf::from("/usr/local"),
        }
    }
}

impl BuildOptions {
    /// Effective install prefix: the prefix re-rooted below the install root.
    #[must_use]
    pub fn install_prefix(&self) -> Utf8PathBuf {
        let relative = self
            .prefix
            .strip_prefix("/")
            .unwrap_or_else(|_| Utf8Path::new(self.prefix.as_str()));
        self.install_root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/", "/usr/local", "/usr/local")]
    #[case("/tmp/stage", "/usr", "/tmp/stage/usr")]
    #[case("/tmp/stage", "opt", "/tmp/stage/opt")]
    fn install_prefix_is_rerooted(
        #[case] root: &str,
        #[case] prefix: &str,
        #[case] expected: &str,
    ) {
        let options = BuildOptions {
            install_root: root.into(),
            prefix: prefix.into(),
            ..BuildOptions::default()
        };
        assert_eq!(options.install_prefix(), Utf8PathBuf::from(expected));
    }
}
