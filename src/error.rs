//! Error handling for kmodprep.
//!
//! Provides centralized error handling with proper error types using thiserror.
//! The taxonomy separates infrastructure failures (the device channel is gone,
//! nothing this crate does can help) from operational failures (a module did
//! not install, the operator can act on it). Callers rely on that distinction:
//! `DeviceUnavailable` is propagated unchanged through every layer, while
//! `ModuleInstall` terminates only the current preparation step.

use thiserror::Error;

/// Main error type for kmodprep
#[derive(Error, Debug)]
pub enum PrepError {
    /// The command channel to the target device is down. Never retried,
    /// never downgraded — the whole run's environment is compromised.
    #[error("device unavailable: {message}")]
    DeviceUnavailable { message: String },

    /// A module install command reported failure. Terminal for the
    /// preparation step; names the module and the underlying command failure.
    #[error("failed to install module '{module}': {message}")]
    ModuleInstall { module: String, message: String },

    /// Configuration errors (empty path list, malformed module path)
    #[error("configuration error: {0}")]
    Config(String),

    /// Preparation stage machine errors (invalid transition)
    #[error("preparation state error: {0}")]
    State(String),

    /// IO errors (config files, local process spawning)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for kmodprep operations
pub type Result<T> = std::result::Result<T, PrepError>;

// Convenient error constructors
impl PrepError {
    /// Create a device-unavailable error
    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: msg.into(),
        }
    }

    /// Create a module-install error
    pub fn module_install(module: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ModuleInstall {
            module: module.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if this error means the device channel itself is gone
    pub fn is_device_unavailable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PrepError::device_unavailable("adb lost");
        assert_eq!(err.to_string(), "device unavailable: adb lost");

        let err = PrepError::module_install("kunit", "exit code: 1");
        assert_eq!(
            err.to_string(),
            "failed to install module 'kunit': exit code: 1"
        );

        let err = PrepError::config("no module paths configured");
        assert_eq!(
            err.to_string(),
            "configuration error: no module paths configured"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PrepError = io_err.into();
        assert!(matches!(err, PrepError::Io(_)));
    }

    #[test]
    fn test_device_unavailable_predicate() {
        assert!(PrepError::device_unavailable("gone").is_device_unavailable());
        assert!(!PrepError::config("bad path").is_device_unavailable());
        assert!(!PrepError::module_install("m", "x").is_device_unavailable());
    }
}
