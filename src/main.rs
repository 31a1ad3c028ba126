use std::io;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use steplink_rs::{list_ports, report_ports, CancelToken, LinkError};

mod cli;
mod config;
mod driver;

use cli::Args;
use config::Config;

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter(None, log::LevelFilter::Debug);
    } else {
        builder.filter(None, log::LevelFilter::Info);
    }
    builder.format_target(false).init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list {
        return match report_ports(&list_ports(), &mut io::stdout().lock()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Could not write port list: {}", e);
                ExitCode::FAILURE
            }
        };
    }
    // clap guarantees one of --port / --list
    let Some(port) = args.port.as_deref() else {
        return ExitCode::FAILURE;
    };

    let config = match Config::load(&args.config, &args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "{} startup and {} repeating batch(es) configured",
        config.sequence.startup.len(),
        config.sequence.repeat.len()
    );

    let cancel = CancelToken::new();
    let handler = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler.cancel()) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    match driver::run_port(port, &config, &cancel) {
        Ok(()) => ExitCode::SUCCESS,
        Err(LinkError::Cancelled) => {
            println!("\nExiting...");
            ExitCode::SUCCESS
        }
        // already reported by the link layer
        Err(LinkError::Open { .. }) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
