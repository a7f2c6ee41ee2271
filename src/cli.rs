//! 命令行界面定义
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "checkind")]
#[command(version)]
#[command(about = "Gateway checkin service with per-network status storage and liveness reporting")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    /// Configuration file path (defaults to searching standard locations)
    #[arg(short, long, default_value = "config.toml")]
    pub(crate) config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Parse and validate a configuration file, then exit
    Test {
        /// Configuration file path (optional, defaults to config.toml)
        #[arg(index = 1)]
        config_file: Option<PathBuf>,
    },
}
