//! kmodprep - Main entry point
//!
//! Thin operational wrapper around the library: validates configs and runs
//! the preparer against the local machine's shell. Harnesses driving remote
//! devices use the library directly with their own executor.

use log::{error, info};
use std::path::Path;

use kmodprep::cli::{Cli, Commands};
use kmodprep::listing::display_module_name;
use kmodprep::preparer::{KernelModulePreparer, remove_module_with_dependents};
use kmodprep::{LocalShell, PreparerConfig};

/// Initialize the logger with appropriate settings
fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;

    Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}:{}] {}",
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env() // Allows RUST_LOG env var to override
        .init();
}

fn load_validated_config(path: &Path) -> anyhow::Result<PreparerConfig> {
    let config = PreparerConfig::load_from_file(path)?;
    config.validate()?;
    Ok(config)
}

fn main() {
    init_logger();

    let cli = Cli::parse_args();
    match cli.command {
        Commands::Validate { config } => {
            info!("validating configuration file: {:?}", config);
            match load_validated_config(&config) {
                Ok(_) => println!("✓ Configuration file is valid: {:?}", config),
                Err(e) => {
                    error!("configuration validation failed: {:#}", e);
                    eprintln!("✗ Configuration validation failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Install { config } => {
            let config = match load_validated_config(&config) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("✗ {:#}", e);
                    std::process::exit(1);
                }
            };
            let device = LocalShell::new();
            let mut preparer = match KernelModulePreparer::new(config) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("✗ {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = preparer.setup(&device) {
                error!("module installation failed: {}", e);
                eprintln!("✗ {}", e);
                std::process::exit(1);
            }
            for name in preparer.installed_modules() {
                println!("✓ Installed {}", name);
            }
        }
        Commands::Remove { config } => {
            let config = match load_validated_config(&config) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("✗ {:#}", e);
                    std::process::exit(1);
                }
            };
            let device = LocalShell::new();
            // Operator-driven cleanup: walk the configured paths in reverse,
            // best effort per module, matching teardown semantics.
            for path in config.module_paths.iter().rev() {
                let name = match display_module_name(path) {
                    Ok(n) => n,
                    Err(e) => {
                        eprintln!("✗ {}", e);
                        std::process::exit(1);
                    }
                };
                match remove_module_with_dependents(&device, &name) {
                    Ok(output) if output.success => println!("✓ Removed {}", name),
                    Ok(_) => println!("- {} not removed (may not be loaded)", name),
                    Err(e) => {
                        // Only an unreachable device lands here.
                        error!("removal aborted: {}", e);
                        eprintln!("✗ {}", e);
                        std::process::exit(1);
                    }
                }
            }
        }
    }
}
