//! Error types for the accounting core

use thiserror::Error;

/// Main error type for the accounting core
#[derive(Error, Debug)]
pub enum Error {
    /// Accounting error
    #[error("Accounting error: {0}")]
    Accounting(#[from] AccountingError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accounting errors
///
/// Producer-side failures when talking to the accountant task. None of these
/// are fatal: overflow means the event was shed, and `Stopped` means the
/// accountant loop has already exited.
#[derive(Error, Debug)]
pub enum AccountingError {
    /// Event queue was full and the event was dropped
    #[error("Event queue full, event dropped")]
    EventQueueFull,

    /// The accountant loop has stopped
    #[error("Accountant stopped")]
    Stopped,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(AccountingError::EventQueueFull);
        assert!(err.to_string().contains("Event queue full"));
    }

    #[test]
    fn test_configuration_error() {
        let err = Error::Configuration("bad value".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad value");
    }
}
