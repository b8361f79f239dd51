//! Entry point wiring for the smoothpaper daemon and its client
//! subcommands: parse the CLI, initialise tracing, then either talk to a
//! running daemon over the control socket or become the daemon.

mod cli;
mod commands;
mod files;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();

    match cli.command {
        Some(Command::Status) => {
            run::initialise_tracing(cli.debug);
            commands::status()
        }
        Some(Command::Next) => {
            run::initialise_tracing(cli.debug);
            commands::next()
        }
        Some(Command::Stop) => {
            run::initialise_tracing(cli.debug);
            commands::stop()
        }
        Some(Command::Load { wallpapers }) => {
            run::initialise_tracing(cli.debug);
            commands::load(wallpapers)
        }
        None => run::run(cli),
    }
}
