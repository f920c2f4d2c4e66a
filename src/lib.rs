//! kmodprep Library
//!
//! Kernel module installation and teardown over a shell command channel.
//!
//! The crate has two collaborating cores: the listing inspector
//! ([`listing`]), which turns free-form `lsmod` text into loaded/dependent
//! facts, and the lifecycle controller ([`preparer`]), which drives
//! remove-then-install on setup and dependents-first removal on teardown.
//! Command execution is abstracted behind [`executor::DeviceExecutor`]; a
//! local `sh -c` implementation is provided for self-hosted runs.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod listing;
pub mod preparer;
pub mod stage;

// Re-export main types for convenience
pub use config::PreparerConfig;
pub use error::{PrepError, Result};
pub use executor::{CommandOutput, DeviceExecutor, LocalShell};
pub use listing::{ModuleEntry, ModuleListing, display_module_name};
pub use preparer::{KernelModulePreparer, remove_module_with_dependents, remove_single_module};
pub use stage::{PrepStage, StageError};
