// src/error.rs
//! Typed errors for the analyzer library.
//!
//! Every variant carries a stable machine-readable code so callers can match
//! on failures without parsing messages. Construction-time errors are fatal;
//! setter-time errors leave the analyzer state untouched.

use thiserror::Error;

/// Errors raised by the analyzer and its audio plumbing.
#[derive(Debug, Error)]
pub enum WavescopeError {
    /// The audio output stream could not be created.
    #[error("could not create audio output stream: {0}")]
    AudioOutputFail(String),

    /// The supplied audio source could not be decoded or connected.
    #[error("invalid audio source: {0}")]
    InvalidAudioSource(String),

    /// A gradient name that is not registered was selected.
    #[error("unknown gradient: '{0}'")]
    UnknownGradient(String),

    /// A frequency bound below 1 Hz was supplied.
    #[error("frequency values must be at least 1Hz (got {0})")]
    FrequencyTooLow(f32),

    /// A display mode outside the valid set {0..8, 10} was supplied.
    #[error("invalid display mode: {0}")]
    InvalidMode(u8),

    /// A reflection ratio outside [0, 1) was supplied.
    #[error("reflection ratio must be >= 0 and < 1 (got {0})")]
    ReflexOutOfRange(f32),

    /// A gradient was registered with an empty name.
    #[error("gradient name must be a non-empty string")]
    GradientInvalidName,

    /// A gradient was registered with fewer than two color stops.
    #[error("gradient must define at least two color stops")]
    GradientMissingColor,
}

impl WavescopeError {
    /// Stable error code, safe to match on across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AudioOutputFail(_) => "ERR_AUDIO_OUTPUT_FAIL",
            Self::InvalidAudioSource(_) => "ERR_INVALID_AUDIO_SOURCE",
            Self::UnknownGradient(_) => "ERR_UNKNOWN_GRADIENT",
            Self::FrequencyTooLow(_) => "ERR_FREQUENCY_TOO_LOW",
            Self::InvalidMode(_) => "ERR_INVALID_MODE",
            Self::ReflexOutOfRange(_) => "ERR_REFLEX_OUT_OF_RANGE",
            Self::GradientInvalidName => "ERR_GRADIENT_INVALID_NAME",
            Self::GradientMissingColor => "ERR_GRADIENT_MISSING_COLOR",
        }
    }
}

/// Library-wide result alias.
pub type Result<T> = std::result::Result<T, WavescopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(WavescopeError::InvalidMode(9).code(), "ERR_INVALID_MODE");
        assert_eq!(
            WavescopeError::FrequencyTooLow(0.5).code(),
            "ERR_FREQUENCY_TOO_LOW"
        );
        assert_eq!(
            WavescopeError::GradientMissingColor.code(),
            "ERR_GRADIENT_MISSING_COLOR"
        );
    }
}
