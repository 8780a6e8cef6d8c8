// spanmap CLI: compile provider configuration, validate artifacts.
//
// Exit code 0 on success, 1 on any failure. Diagnostics go to stderr;
// stdout carries the success summary.

mod args;
mod handlers;
mod style;

pub use args::{Cli, Commands, CompileArgs, ProcessArgs, ValidateCommands};

use anyhow::Result;

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Compile(args) => handlers::compile::run(args, cli.verbose),
        Commands::Validate { check } => handlers::validate::run(check, cli.verbose),
        Commands::Process(args) => handlers::process::run(args, cli.verbose),
        Commands::BundleInfo { bundle } => handlers::info::run(&bundle),
    }
}
