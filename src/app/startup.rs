//! Application startup: arguments, configuration, logging, dispatch

use std::io::IsTerminal;

use clap::{CommandFactory, Parser};

use super::cli::args::Args;
use super::cli::config::load_config_file;
use super::commands;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::version;

/// Exit code for usage errors
const USAGE_EXIT_CODE: i32 = 2;

/// Run the binary and return its exit code
pub async fn startup() -> i32 {
    let mut args = Args::parse();

    // Configuration file values fill whatever the command line left unset
    let config_source = match load_config_file(args.config_file.as_deref()).await {
        Ok(Some((path, table))) => {
            if let Err(e) = args.apply_toml_values(&table) {
                eprintln!(
                    "Error in configuration file validation {}: {}",
                    path.display(),
                    e
                );
                return 1;
            }
            Some(path)
        }
        Ok(None) => None,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let settings = args.log_settings(std::io::stderr().is_terminal());
    if let Err(e) = init_logging(&settings) {
        eprintln!("Error: {}", e);
        return 1;
    }
    log::debug!("{}", version::banner());
    if let Some(path) = &config_source {
        log::debug!("Using configuration file {}", path.display());
    }

    let Some(command) = args.command.clone() else {
        let _ = Args::command().print_help();
        return USAGE_EXIT_CODE;
    };
    let use_color = match (args.color, args.no_color) {
        (true, _) => true,
        (_, true) => false,
        _ => std::io::stdout().is_terminal(),
    };

    let result = ShutdownCoordinator::guard(|cancel| {
        commands::run(&args, command, config_source.as_deref(), cancel, use_color)
    })
    .await;

    match result {
        Ok(code) => code,
        Err(e) => {
            log_error_with_context(&e, "Command failed");
            1
        }
    }
}
