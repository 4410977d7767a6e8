use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use db_backup_lib::cli::Cli;
use db_backup_lib::config::load_config;
use db_backup_lib::dispatch;
use db_backup_lib::process::SystemRunner;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // init logger
    let mut env_logger = env_logger::builder();
    match cli.verbose {
        Some(level) => {
            env_logger.filter_level(level);
        }
        None if std::env::var_os("RUST_LOG").is_none() => {
            env_logger.filter_level(LevelFilter::Info);
        }
        None => {}
    }
    if let Err(e) = env_logger.try_init() {
        eprintln!("Initializing the logger failed: {e}");
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!(target: "config", "{e}");
            return ExitCode::FAILURE;
        }
    };

    // dump failures are reported per server and don't fail the run
    match dispatch::run(&config, &SystemRunner, &cli.run_options()) {
        Ok(summary) => {
            log::debug!(target: "dispatch", "Backed up {} server(s)", summary.servers.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!(target: "dispatch", "{e}");
            ExitCode::FAILURE
        }
    }
}
