use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "smoothpaper",
    author,
    version,
    about = "A hardware accelerated wallpaper changer with smooth cross-fades"
)]
pub struct Cli {
    /// Config file (default is $XDG_CONFIG_HOME/smoothpaper/smoothpaper.toml).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Dump the resolved configuration and exit.
    #[arg(long)]
    pub show_config: bool,

    /// Install a commented default config file and exit.
    #[arg(short, long)]
    pub install_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Query the running daemon for its status.
    Status,
    /// Fade to the next wallpaper immediately.
    Next,
    /// Stop the running daemon.
    Stop,
    /// Load a new list of wallpapers into the daemon.
    Load {
        #[arg(required = true, value_name = "WALLPAPER")]
        wallpapers: Vec<PathBuf>,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
