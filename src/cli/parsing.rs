//! CLI parsing helpers for clap value parsers.

use std::num::NonZeroUsize;

pub(super) fn parse_jobs(s: &str) -> Result<NonZeroUsize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("{s} is not a valid number"))?;
    NonZeroUsize::new(value)
        .filter(|jobs| jobs.get() <= super::MAX_JOBS)
        .ok_or_else(|| format!("jobs must be between 1 and {}", super::MAX_JOBS))
}
