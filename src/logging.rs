use anyhow::{bail, Result};
use log::{LevelFilter, Metadata, Record};

/// Logs to stderr only. Stdout belongs to kubectl / docker, which parse it.
struct PluginLogger;

static LOGGER: PluginLogger = PluginLogger;

/// Installed before arguments are parsed so that usage errors get logged too, verbosity is
/// applied once it is known
pub(crate) fn init() -> Result<()> {
    match log::set_logger(&LOGGER) {
        Ok(_) => log::set_max_level(max_level(false)),
        Err(_) => bail!("Logger initalization failed"),
    };

    Ok(())
}

pub(crate) fn set_verbose(verbose: bool) {
    log::set_max_level(max_level(verbose));
}

fn max_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

impl log::Log for PluginLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", format_record(record));
        }
    }

    fn flush(&self) {}
}

fn format_record(record: &Record) -> String {
    format!(
        "{} - {} - {}:{}: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        record.level(),
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0),
        record.args()
    )
}
