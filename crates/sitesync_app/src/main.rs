//! `sitesync`: mirrors a shared document folder into a static site and
//! rebuilds the site's search index, Atom feed and sitemap.
//!
//! ```bash
//! sitesync --root . sync --folder-id "$DRIVE_FOLDER_ID" --creds-file creds.json
//! sitesync --root . all
//! ```

mod cli;
mod commands;
mod config;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use site_logging::site_error;

use crate::cli::Cli;
use crate::commands::App;
use crate::logging::LogDestination;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let destination = if cli.log_file {
        LogDestination::Both(&cli.root)
    } else {
        LogDestination::Terminal
    };
    logging::initialize(destination, cli.verbose);

    let config = match config::load_config(&cli.root, cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            site_error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match App::new(cli.root.clone(), config).run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            site_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
