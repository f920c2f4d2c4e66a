use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kmodprep - kernel module preparation for the local machine
#[derive(Parser)]
#[command(name = "kmodprep")]
#[command(about = "Install and remove kernel modules with dependency-aware cleanup")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a preparer configuration file
    Validate {
        /// Path to the JSON configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Install the configured modules (dependents-first pre-clean, then insmod)
    Install {
        /// Path to the JSON configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Remove the configured modules and anything depending on them, best effort
    Remove {
        /// Path to the JSON configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
