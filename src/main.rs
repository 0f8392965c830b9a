//! `bootconf` command-line entry point.

use std::sync::Arc;

use anyhow::Result;
use bootconf::cli::{self, Command, IdentityCommand};
use bootconf::{commands, logging};
use clap::Parser;

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();
    let name = args.command.name();
    logging::init_subscriber(args.verbose, name);
    let log = Arc::new(logging::Logger::new(name));

    match args.command {
        Command::Run(opts) => commands::run::run(&opts, &log),
        Command::Identity(IdentityCommand::Apply(opts)) => commands::identity::apply(&opts, &log),
        Command::Identity(IdentityCommand::Delete(opts)) => commands::identity::delete(&opts, &log),
        Command::Identity(IdentityCommand::Compare(opts)) => {
            commands::identity::compare(&opts, &log)
        }
        Command::Completions(opts) => {
            commands::completions::run(opts.shell);
            Ok(())
        }
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
