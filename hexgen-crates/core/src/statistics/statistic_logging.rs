//! The process-wide sink for the statistics of the model generators.
//!
//! Every statistic is written as one line `{PREFIX} {NAME}={VALUE}`; the closing line, if any, is
//! written once a generator has logged all of its counters.

use std::fmt::Display;
use std::io::stdout;
use std::io::Write;
use std::sync::OnceLock;

use convert_case::Case;
use convert_case::Casing;
use log::debug;
use parking_lot::Mutex;

/// Where and how the statistics of the model generators are written.
pub struct StatisticOptions {
    /// Written before every statistic.
    prefix: &'static str,
    /// Written after the statistics of a generator.
    closing_line: Option<&'static str>,
    /// Applied to the names of the statistics, which are snake case otherwise.
    casing: Option<Case>,
    writer: Box<dyn Write + Send>,
}

impl std::fmt::Debug for StatisticOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticOptions")
            .field("prefix", &self.prefix)
            .field("closing_line", &self.closing_line)
            .field("casing", &self.casing)
            .finish_non_exhaustive()
    }
}

static STATISTIC_OPTIONS: OnceLock<Mutex<StatisticOptions>> = OnceLock::new();

/// Enables statistic logging. Statistics go to `writer`, or to stdout if it is `None`.
///
/// Only the first call has an effect; returns whether it was this one.
pub fn configure_statistic_logging(
    prefix: &'static str,
    closing_line: Option<&'static str>,
    casing: Option<Case>,
    writer: Option<Box<dyn Write + Send>>,
) -> bool {
    let mut configured = false;
    let _ = STATISTIC_OPTIONS.get_or_init(|| {
        configured = true;
        Mutex::new(StatisticOptions {
            prefix,
            closing_line,
            casing,
            writer: writer.unwrap_or_else(|| Box::new(stdout())),
        })
    });
    configured
}

pub fn log_statistic(name: impl Display, value: impl Display) {
    let Some(options) = STATISTIC_OPTIONS.get() else {
        return;
    };
    let mut options = options.lock();
    let name = match options.casing {
        Some(casing) => name.to_string().to_case(casing),
        None => name.to_string(),
    };
    let prefix = options.prefix;
    if let Err(error) = writeln!(options.writer, "{prefix} {name}={value}") {
        debug!("could not write statistic {name}: {error}");
    }
}

/// Writes the closing line, if one was configured.
pub fn log_statistic_postfix() {
    let Some(options) = STATISTIC_OPTIONS.get() else {
        return;
    };
    let mut options = options.lock();
    if let Some(closing_line) = options.closing_line {
        if let Err(error) = writeln!(options.writer, "{closing_line}") {
            debug!("could not write the closing line of the statistics: {error}");
        }
    }
}

pub fn should_log_statistics() -> bool {
    STATISTIC_OPTIONS.get().is_some()
}
