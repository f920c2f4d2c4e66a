//! Module lifecycle orchestration: install on setup, remove on teardown.
//!
//! The preparer drives the end-to-end sequence for each configured module
//! path: clear pre-existing conflicting state (dependents first), install
//! with the configured arguments, confirm by exit status, and at teardown
//! remove everything this run installed, in reverse install order.
//!
//! Two rules shape every step:
//!
//! - The loaded-module listing is re-queried before every removal decision.
//!   The device's state is externally mutable between any two commands, so
//!   previously observed state is never trusted.
//! - Removals are best effort. `rmmod` failures are frequently false
//!   negatives ("already absent" is indistinguishable from "busy" by exit
//!   status alone) and must never block an install or mask a test failure
//!   during cleanup. Only an unreachable device stops the procedure.

use log::{debug, error, info, warn};
use std::time::Duration;

use crate::config::PreparerConfig;
use crate::error::{PrepError, Result};
use crate::executor::{CommandOutput, DeviceExecutor};
use crate::listing::{LSMOD_COMMAND, ModuleListing, display_module_name};
use crate::stage::PrepStage;

/// Timeout for individual `rmmod` commands.
const REMOVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Remove a single kernel module from the device, best effort.
///
/// Issues `rmmod <name>` and logs the outcome. A failed removal is reported
/// in the returned [`CommandOutput`], never as an error.
///
/// # Errors
///
/// `DeviceUnavailable` if the command channel is down.
pub fn remove_single_module(
    device: &dyn DeviceExecutor,
    module_name: &str,
) -> Result<CommandOutput> {
    let command = format!("rmmod {}", module_name);
    let output = device.run_command(&command, REMOVE_TIMEOUT)?;
    if output.success {
        info!("removed module '{}'", module_name);
    } else {
        warn!(
            "'{}' failed ({}); the module may already be absent",
            command,
            output.failure_summary()
        );
    }
    Ok(output)
}

/// Remove a kernel module and its current dependents from the device.
///
/// Queries a fresh listing, removes each module that depends on the target
/// (in listed order), then removes the target itself. Every removal is best
/// effort.
///
/// # Errors
///
/// `DeviceUnavailable` if the command channel is down.
pub fn remove_module_with_dependents(
    device: &dyn DeviceExecutor,
    module_name: &str,
) -> Result<CommandOutput> {
    let listing = ModuleListing::parse(&device.run_query(LSMOD_COMMAND)?);
    remove_with_dependents_from(device, &listing, module_name)
}

/// Dependents-first removal against an already-parsed listing snapshot.
fn remove_with_dependents_from(
    device: &dyn DeviceExecutor,
    listing: &ModuleListing,
    module_name: &str,
) -> Result<CommandOutput> {
    for dependent in listing.dependents_of(module_name) {
        remove_single_module(device, dependent.trim())?;
    }
    remove_single_module(device, module_name)
}

/// Installs the configured kernel modules during setup and removes them
/// during teardown.
///
/// One instance covers one setup/teardown pair. The install record (which
/// modules this run is responsible for) is owned by the instance, never
/// process-wide, so multiple preparers can run against different devices in
/// the same process.
#[derive(Debug)]
pub struct KernelModulePreparer {
    config: PreparerConfig,
    /// Stage per configured module path, index-aligned with `config.module_paths`.
    stages: Vec<PrepStage>,
    /// Modules this run installed: (path index, display name), in install order.
    installed: Vec<(usize, String)>,
}

impl KernelModulePreparer {
    /// Create a preparer for the given configuration.
    ///
    /// # Errors
    ///
    /// `Config` if the configuration fails validation.
    pub fn new(config: PreparerConfig) -> Result<Self> {
        config.validate()?;
        let stages = vec![PrepStage::NotAttempted; config.module_paths.len()];
        Ok(Self {
            config,
            stages,
            installed: Vec::new(),
        })
    }

    /// The configuration this preparer runs with.
    pub fn config(&self) -> &PreparerConfig {
        &self.config
    }

    /// Current stage of each configured module path, in configured order.
    pub fn stages(&self) -> &[PrepStage] {
        &self.stages
    }

    /// Display names of the modules this run has installed, in install order.
    pub fn installed_modules(&self) -> Vec<&str> {
        self.installed.iter().map(|(_, name)| name.as_str()).collect()
    }

    /// Install every configured module, in configured order.
    ///
    /// For each module path: query the listing, remove the module and its
    /// dependents if it is already resident (never skipped — the resident
    /// copy may hold stale parameters), then `insmod` with the configured
    /// arguments and confirm by exit status.
    ///
    /// # Errors
    ///
    /// - `DeviceUnavailable`, propagated untouched from any command.
    /// - `ModuleInstall` when an install command reports failure; setup
    ///   stops and the remaining module paths are not processed.
    pub fn setup(&mut self, device: &dyn DeviceExecutor) -> Result<()> {
        let install_args = self.config.install_args.join(" ");
        for index in 0..self.config.module_paths.len() {
            let module_path = self.config.module_paths[index].clone();
            let module_name = display_module_name(&module_path)?;

            self.pre_clean(device, &module_name)?;
            self.advance_stage(index, PrepStage::PreCleaned)?;

            let command = if install_args.is_empty() {
                format!("insmod {}", module_path)
            } else {
                format!("insmod {} {}", module_path, install_args)
            };
            info!("installing '{}' from {}", module_name, module_path);
            let output = device.run_command(&command, self.config.install_timeout())?;
            self.advance_stage(index, PrepStage::Installed)?;

            if !output.success {
                let message = format!("command '{}' failed: {}", command, output.failure_summary());
                error!("unable to install module '{}': {}", module_name, message);
                self.advance_stage(index, PrepStage::InstallFailed)?;
                return Err(PrepError::module_install(module_name, message));
            }

            self.advance_stage(index, PrepStage::Verified)?;
            self.installed.push((index, module_name));
        }
        Ok(())
    }

    /// Remove everything this run installed, in reverse install order.
    ///
    /// Runs unconditionally — callers invoke it even when setup or the test
    /// itself failed, and `prior_failure` is only recorded in the logs. The
    /// listing is re-queried per module because state may have changed since
    /// install (the test may have loaded additional dependents). Removal
    /// command failures are logged, never raised: teardown must not mask the
    /// original failure or leave other cleanup steps unexecuted.
    ///
    /// Consumes the install record entry by entry; a second teardown after a
    /// clean run is a no-op. If the device becomes unavailable mid-teardown,
    /// the entries not yet removed (including the one being processed) stay
    /// in the record, so teardown can be retried once the device returns.
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` only.
    pub fn teardown(
        &mut self,
        device: &dyn DeviceExecutor,
        prior_failure: Option<&PrepError>,
    ) -> Result<()> {
        if let Some(failure) = prior_failure {
            debug!("tearing down after failed run: {}", failure);
        }
        // Popping from the back walks the record in reverse install order.
        while let Some((index, module_name)) = self.installed.pop() {
            if let Err(e) = self.remove_installed(device, &module_name) {
                self.installed.push((index, module_name));
                return Err(e);
            }
            // Duplicate display names share one resident module; the second
            // record entry finds its stage already past Verified.
            if self.stages[index] == PrepStage::Verified {
                self.advance_stage(index, PrepStage::Removed)?;
            }
        }
        Ok(())
    }

    /// Teardown removal of one recorded module against a fresh listing.
    fn remove_installed(&self, device: &dyn DeviceExecutor, module_name: &str) -> Result<()> {
        let listing = ModuleListing::parse(&device.run_query(LSMOD_COMMAND)?);
        if listing.is_loaded(module_name) {
            remove_with_dependents_from(device, &listing, module_name)?;
        } else {
            debug!("module '{}' no longer loaded, nothing to remove", module_name);
        }
        Ok(())
    }

    /// Remove resident state that would conflict with a fresh install.
    fn pre_clean(&self, device: &dyn DeviceExecutor, module_name: &str) -> Result<()> {
        let listing = ModuleListing::parse(&device.run_query(LSMOD_COMMAND)?);
        if listing.is_loaded(module_name) {
            warn!(
                "module '{}' unexpectedly already loaded, removing before install",
                module_name
            );
            remove_with_dependents_from(device, &listing, module_name)?;
        }
        Ok(())
    }

    fn advance_stage(&mut self, index: usize, next: PrepStage) -> Result<()> {
        let current = self.stages[index];
        self.stages[index] = current.advance_to(next)?;
        debug!("module path #{}: {} -> {}", index, current, next);
        Ok(())
    }
}
