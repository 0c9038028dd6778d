//! Command-line interface.

mod doctor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use self::doctor::run_doctor_command;

#[derive(Parser, Debug)]
#[command(name = "leancanvas")]
#[command(version, about = "Turn a keyword into a lean canvas, one step at a time", long_about = None)]
pub struct Cli {
    /// Path to a TOML settings file (default: ~/.leancanvas/config.toml).
    #[arg(long, global = true, env = "LEANCANVAS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the BFF HTTP server.
    Serve {
        /// Override the bind port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the interactive wizard in the terminal (default).
    Run {
        /// Generate personas for this keyword right away.
        #[arg(long, short)]
        keyword: Option<String>,
    },
    /// Check configuration and upstream connectivity.
    Doctor {
        /// Exit non-zero when any check fails.
        #[arg(long)]
        strict: bool,
    },
}

impl Cli {
    /// Subcommand to run; bare `leancanvas` starts the wizard.
    pub fn resolved_command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Run { keyword: None })
    }
}
