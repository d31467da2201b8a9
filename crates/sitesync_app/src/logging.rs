//! Logger setup for the `sitesync` binary.
//!
//! Always logs to the terminal; `--log-file` adds `sitesync.log` in the site
//! root.

use std::fs::File;
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOG_FILENAME: &str = "sitesync.log";

pub enum LogDestination<'a> {
    Terminal,
    /// Terminal plus a log file in the given directory.
    Both(&'a Path),
}

pub fn initialize(destination: LogDestination<'_>, verbose: bool) {
    let level = site_logging::level_for(verbose);
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let LogDestination::Both(dir) = destination {
        if let Some(file_logger) = create_file_logger(dir, level, config) {
            loggers.push(file_logger);
        }
    }

    if let Err(err) = CombinedLogger::init(loggers) {
        eprintln!("Failed to initialize logger: {err}");
    }
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(
    dir: &Path,
    level: LevelFilter,
    config: Config,
) -> Option<Box<WriteLogger<File>>> {
    let path = dir.join(LOG_FILENAME);
    match File::create(&path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Failed to create log file {}: {err}", path.display());
            None
        }
    }
}
