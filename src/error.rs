//! Error types for the wake-word core

use thiserror::Error;

/// Result type alias for wakeloop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the transform library, feature extractor, matcher and detector
#[derive(Debug, Error)]
pub enum Error {
    /// Transform size is zero or not a power of two
    #[error("invalid transform size {0}: must be a non-zero power of two")]
    InvalidSize(usize),

    /// Rejected configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller-provided buffer is too small for the requested operation
    #[error("{what} buffer holds {actual} values, need {expected}")]
    BufferLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Frame does not have the configured frame size
    #[error("frame has {actual} samples, expected {expected}")]
    FrameLength { expected: usize, actual: usize },

    /// Audio chunk below the minimum accepted length
    #[error("audio chunk too short: {len} bytes (minimum {min})")]
    AudioTooShort { len: usize, min: usize },

    /// Audio chunk above the maximum accepted length
    #[error("audio chunk too long: {len} bytes (maximum {max})")]
    AudioTooLong { len: usize, max: usize },

    /// Numeric failure inside a transform backend
    #[error("computation error: {0}")]
    Computation(String),

    /// Work interrupted by shutdown
    #[error("operation cancelled")]
    Cancelled,

    /// Detector no longer accepts audio
    #[error("detector is shut down")]
    ShutDown,

    /// IO error (worker thread spawn)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors caused by invalid sizes or settings. Fatal to the call, not the process.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidSize(_) | Self::Config(_) | Self::BufferLength { .. } | Self::FrameLength { .. }
        )
    }

    /// Errors about a single audio chunk. The caller should drop the chunk and continue.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::AudioTooShort { .. } | Self::AudioTooLong { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_follows_taxonomy() {
        assert!(Error::InvalidSize(1000).is_configuration());
        assert!(Error::Config("hop".into()).is_configuration());
        assert!(!Error::InvalidSize(1000).is_transient());

        let short = Error::AudioTooShort { len: 1, min: 2 };
        assert!(short.is_transient());
        assert!(!short.is_configuration());

        assert!(!Error::Computation("nan".into()).is_transient());
        assert!(!Error::ShutDown.is_configuration());
    }

    #[test]
    fn messages_are_descriptive() {
        let msg = Error::AudioTooLong { len: 10, max: 4 }.to_string();
        assert_eq!(msg, "audio chunk too long: 10 bytes (maximum 4)");
        assert!(Error::InvalidSize(1000).to_string().contains("1000"));
    }
}
