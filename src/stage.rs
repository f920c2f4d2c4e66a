//! Per-module-path preparation stage machine.
//!
//! Each configured module path moves through a fixed lifecycle during one
//! setup/teardown pair:
//!
//! ```text
//! NotAttempted
//!     ↓
//! PreCleaned        (conflicting resident state removed)
//!     ↓
//! Installed         (insmod issued)
//!     ↓
//! Verified | InstallFailed
//!     ↓ (teardown)
//! Removed
//! ```
//!
//! `InstallFailed` is terminal and aborts the remaining setup work for the
//! preparer instance. Transitions are validated; skipping or going backwards
//! is a programming error surfaced as [`StageError`].

use std::fmt;
use thiserror::Error;

/// Preparation stages for one configured module path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrepStage {
    /// Nothing has been done for this module path yet
    NotAttempted,
    /// Pre-existing conflicting state has been removed (best effort)
    PreCleaned,
    /// The install command has been issued
    Installed,
    /// The install command reported success
    Verified,
    /// The install command reported failure (terminal)
    InstallFailed,
    /// The module was removed during teardown (terminal)
    Removed,
}

impl PrepStage {
    /// Returns true if this is a terminal stage for the module path.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::InstallFailed | Self::Removed)
    }

    /// Returns a human-readable description of this stage.
    pub const fn description(self) -> &'static str {
        match self {
            Self::NotAttempted => "not attempted",
            Self::PreCleaned => "pre-cleaned",
            Self::Installed => "install command issued",
            Self::Verified => "install verified",
            Self::InstallFailed => "install failed",
            Self::Removed => "removed",
        }
    }

    /// Whether `next` is a valid successor of this stage.
    const fn allows(self, next: PrepStage) -> bool {
        matches!(
            (self, next),
            (Self::NotAttempted, Self::PreCleaned)
                | (Self::PreCleaned, Self::Installed)
                | (Self::Installed, Self::Verified)
                | (Self::Installed, Self::InstallFailed)
                | (Self::Verified, Self::Removed)
        )
    }

    /// Validated transition to the next stage.
    ///
    /// # Errors
    ///
    /// `StageError::InvalidTransition` if `next` is not the legal successor
    /// (skipped stage, backward move, or transition out of a terminal stage).
    pub fn advance_to(self, next: PrepStage) -> Result<PrepStage, StageError> {
        if self.allows(next) {
            Ok(next)
        } else {
            Err(StageError::InvalidTransition { from: self, to: next })
        }
    }
}

impl fmt::Display for PrepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors from invalid stage transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("invalid preparation stage transition from '{from}' to '{to}'")]
    InvalidTransition { from: PrepStage, to: PrepStage },
}

impl From<StageError> for crate::error::PrepError {
    fn from(err: StageError) -> Self {
        crate::error::PrepError::State(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_chain() {
        let stage = PrepStage::NotAttempted;
        let stage = stage.advance_to(PrepStage::PreCleaned).unwrap();
        let stage = stage.advance_to(PrepStage::Installed).unwrap();
        let stage = stage.advance_to(PrepStage::Verified).unwrap();
        let stage = stage.advance_to(PrepStage::Removed).unwrap();
        assert!(stage.is_terminal());
    }

    #[test]
    fn test_install_failure_is_terminal() {
        let stage = PrepStage::Installed
            .advance_to(PrepStage::InstallFailed)
            .unwrap();
        assert!(stage.is_terminal());
        assert!(stage.advance_to(PrepStage::Verified).is_err());
        assert!(stage.advance_to(PrepStage::Removed).is_err());
    }

    #[test]
    fn test_cannot_skip_stages() {
        let err = PrepStage::NotAttempted
            .advance_to(PrepStage::Installed)
            .unwrap_err();
        assert!(matches!(err, StageError::InvalidTransition { .. }));
        assert!(PrepStage::NotAttempted.advance_to(PrepStage::Verified).is_err());
        assert!(PrepStage::PreCleaned.advance_to(PrepStage::Removed).is_err());
    }

    #[test]
    fn test_cannot_go_backwards() {
        assert!(PrepStage::Verified.advance_to(PrepStage::Installed).is_err());
        assert!(PrepStage::Installed.advance_to(PrepStage::PreCleaned).is_err());
    }

    #[test]
    fn test_removed_only_from_verified() {
        assert!(PrepStage::Verified.advance_to(PrepStage::Removed).is_ok());
        assert!(PrepStage::Installed.advance_to(PrepStage::Removed).is_err());
    }

    #[test]
    fn test_display_uses_description() {
        assert_eq!(PrepStage::NotAttempted.to_string(), "not attempted");
        assert_eq!(PrepStage::InstallFailed.to_string(), "install failed");
    }

    #[test]
    fn test_stage_error_converts_to_prep_error() {
        let err = PrepStage::Removed
            .advance_to(PrepStage::NotAttempted)
            .unwrap_err();
        let prep: crate::error::PrepError = err.into();
        assert!(matches!(prep, crate::error::PrepError::State(_)));
    }
}
