//! Failure taxonomy for settings sources
//!
//! None of these are fatal to the host. Each one is logged where it happens
//! and leaves the service with a usable but static value.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Environment variables did not identify a supported desktop
    #[error("desktop environment could not be classified")]
    ClassificationAmbiguous,

    /// Protocol connection could not be opened, or config file is missing
    #[error("settings source unavailable: {0}")]
    SourceUnavailable(String),

    /// The queried key is not present in the source
    #[error("key '{0}' not present")]
    KeyAbsent(String),

    /// Change watching could not be armed; the value stays static
    #[error("failed to set up change watching: {0}")]
    WatchSetupFailed(String),
}

impl SourceError {
    /// Every source failure degrades to an empty/default value
    pub fn is_fatal(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_are_never_fatal() {
        let errors = [
            SourceError::ClassificationAmbiguous,
            SourceError::SourceUnavailable("no display".into()),
            SourceError::KeyAbsent("Net/IconThemeName".into()),
            SourceError::WatchSetupFailed("inotify limit".into()),
        ];
        assert!(errors.iter().all(|e| !e.is_fatal()));
    }

    #[test]
    fn test_error_messages_name_the_cause() {
        let err = SourceError::KeyAbsent("Net/IconThemeName".into());
        assert_eq!(err.to_string(), "key 'Net/IconThemeName' not present");
    }
}
