// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::Session;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Plans go to stdout, so logs stay on stderr and quiet by default
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        config,
        root,
        command,
        ..
    } = cli;
    // Validation works on a bare file and never opens a session
    let session = || Session::open(config.as_deref(), root.clone());

    match command {
        Commands::Validate { file } => commands::cmd_validate(&file),
        Commands::List => commands::cmd_list(&session()?),
        Commands::Info { formula } => commands::cmd_info(&session()?, &formula),
        Commands::Options { formula } => commands::cmd_options(&session()?, &formula),
        Commands::Resolve { args, format } => commands::cmd_resolve(&session()?, &args, format),
        Commands::Run {
            args,
            dry_run,
            workdir,
        } => commands::cmd_run(&session()?, &args, dry_run, workdir),
    }
}

/// Exit status for the first library error in the chain
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<formulary::Error>())
        .map_or(1, |e| e.exit_code())
}
