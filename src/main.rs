mod cli;
mod commands;
mod config;
mod paths;
mod runner;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use ghkit::{ExecRunner, GitHubClient};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, &args),
        Command::Inspect(args) => commands::inspect::run(&ctx, &args),
        Command::Execute(args) => commands::execute::execute(&ctx, &args),
        Command::Backup(args) => commands::execute::backup(&ctx, &args),
        Command::Restore(args) => commands::restore::run(&ctx, &args),
        Command::Delete(args) => commands::delete::run(&ctx, &args),
        Command::Doctor => commands::doctor::run(&ctx, &GitHubClient::new(ExecRunner)),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "ghm", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = &result {
        ui::error(&format!("{e:#}"));
        std::process::exit(1);
    }
    Ok(())
}
