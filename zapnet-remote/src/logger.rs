use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Maps the number of `-v` flags to a level: warnings by default, then info, debug, trace.
pub fn verbosity_filter(occurrences: u64) -> LevelFilter {
    match occurrences {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Writes `level target: message` lines to stderr.
pub struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("{:<5} {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Installs `StderrLogger` as the global logger at the level picked by `verbosity_filter`.
pub fn init_logger(verbosity: u64) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(verbosity_filter(verbosity));
    Ok(())
}
