//! ccbuild core library.
//!
//! An incremental build engine for C and C++ projects. Each project is
//! described by a `Recipe.yml`; the engine loads the projects into a
//! [`plan::BuildPlan`], runs the [`stage`] pipeline over it and schedules
//! compiler and linker invocations on a [`scheduler::JobScheduler`], ordering
//! units that import named modules after the units exporting them.

pub mod cli;
pub mod depfile;
pub mod hasher;
pub mod insight;
pub mod job;
pub mod modules;
pub mod options;
pub mod params;
pub mod plan;
pub mod recipe;
pub mod reporter;
pub mod runner;
pub mod scheduler;
pub mod shell;
pub mod stage;
pub mod toolchain;

mod cycle;
mod paths;
