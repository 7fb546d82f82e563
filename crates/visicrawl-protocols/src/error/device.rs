//! Device adapter errors.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Device unreachable: {0}")]
    Unreachable(String),

    #[error("Device command failed: {0}")]
    CommandFailed(String),

    #[error("Device command timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid device output: {0}")]
    InvalidOutput(String),
}

impl DeviceError {
    /// Whether the error means the device itself is gone, as opposed to a
    /// single command misbehaving.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, DeviceError::Unreachable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_display() {
        let err = DeviceError::Unreachable("emulator-5554 offline".to_string());
        assert_eq!(err.to_string(), "Device unreachable: emulator-5554 offline");

        let err = DeviceError::Timeout(5000);
        assert!(err.to_string().contains("5000 ms"));
    }

    #[test]
    fn test_is_unreachable() {
        assert!(DeviceError::Unreachable("gone".to_string()).is_unreachable());
        assert!(!DeviceError::CommandFailed("exit 1".to_string()).is_unreachable());
        assert!(!DeviceError::Timeout(1).is_unreachable());
        assert!(!DeviceError::InvalidOutput("garbage".to_string()).is_unreachable());
    }
}
