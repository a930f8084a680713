//! Toolchain abstraction.
//!
//! A [`ToolChain`] turns targets and source files into concrete output paths
//! and command lines. The compile/link, install and uninstall stages only
//! talk to this trait, so the GNU conventions in [`GnuToolChain`] stay in one
//! place.

mod gnu;

pub use gnu::GnuToolChain;

use camino::{Utf8Path, Utf8PathBuf};
use shell_quote::{QuoteRefExt, Sh};

use crate::plan::{BuildPlan, Target};

/// Produces paths and command lines for one compiler family.
pub trait ToolChain {
    /// Directory receiving every build product.
    fn build_dir(&self) -> &Utf8Path;

    /// Directory receiving object files, dependency records and command
    /// stamps of `target`.
    fn objects_dir(&self, target: &Target) -> Utf8PathBuf;

    /// Object file compiled from `source`.
    fn object_path(&self, target: &Target, source: &Utf8Path) -> Utf8PathBuf;

    /// Dependency record the compiler writes for `source`.
    fn dependency_path(&self, target: &Target, source: &Utf8Path) -> Utf8PathBuf;

    /// Command compiling `source` into its object file.
    fn compile_command(&self, plan: &BuildPlan, target: &Target, source: &Utf8Path) -> String;

    /// Command linking `objects` into the product of `target`. `sources`
    /// select the compiler driver.
    fn link_command(
        &self,
        plan: &BuildPlan,
        target: &Target,
        objects: &[Utf8PathBuf],
        sources: &[Utf8PathBuf],
    ) -> String;

    /// Command compiling and linking `source` into a single tool.
    fn compile_link_command(&self, plan: &BuildPlan, target: &Target, source: &Utf8Path) -> String;

    /// File name of the product of `target`.
    fn link_name(&self, target: &Target) -> String;

    /// File name of the tool built from `source`.
    fn tool_name(&self, source: &Utf8Path) -> String;

    /// Names linking to the product, most specific first (for example
    /// `libcore.so.1.2`, `libcore.so.1`, `libcore.so`).
    fn library_symlinks(&self, target: &Target) -> Vec<String>;

    /// Directory the product of `target` is installed to.
    fn install_dir(&self, plan: &BuildPlan, target: &Target) -> Utf8PathBuf;

    /// Directory public headers are installed to.
    fn include_prefix(&self, plan: &BuildPlan) -> Utf8PathBuf;

    /// Installed pkg-config file of a library target.
    fn pkg_config_path(&self, plan: &BuildPlan, target: &Target) -> Utf8PathBuf;

    /// Path of the product of `target` inside the build directory.
    fn product_path(&self, target: &Target) -> Utf8PathBuf {
        self.build_dir().join(self.link_name(target))
    }
}

/// Join command arguments, quoting those the shell would split or expand.
pub(crate) fn join_args<S: AsRef<str>>(args: &[S]) -> String {
    let mut line = String::new();
    for arg in args {
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&quote(arg.as_ref()));
    }
    line
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "-_./=:,+@%".contains(ch));
    if plain {
        return arg.to_owned();
    }
    let bytes: Vec<u8> = arg.quoted(Sh);
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(&err.into_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["g++", "-c", "-o", "a.o", "a.cc"], "g++ -c -o a.o a.cc")]
    #[case(&["cc", "-DNAME=x", "-I/opt/include"], "cc -DNAME=x -I/opt/include")]
    fn plain_arguments_are_not_quoted(#[case] args: &[&str], #[case] expected: &str) {
        assert_eq!(join_args(args), expected);
    }

    #[rstest]
    #[case("-Wl,-rpath=$ORIGIN")]
    #[case("my file.cc")]
    #[case("")]
    fn special_arguments_are_quoted(#[case] arg: &str) {
        let quoted = join_args(&[arg]);
        assert_ne!(quoted, arg);
        assert!(quoted.len() > arg.len());
    }
}
