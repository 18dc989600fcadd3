use thiserror::Error;

/// Errors surfaced by the tuner core.
///
/// None of these are fatal: the lifecycle turns them into a user-visible
/// message and/or an event for the logger and keeps going.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TunerError {
    /// The capture engine refused to start (or to install its analysis tap).
    #[error("Could not start the audio engine: {0}")]
    EngineStartFailure(String),

    /// The platform audio session could not be activated.
    #[error("Could not activate the audio session: {0}")]
    SessionActivationFailure(String),

    /// No audio input device found. Capture stays disabled for the session.
    #[error("No audio input device available")]
    InputDeviceMissing,

    /// An interruption notification could not be decoded.
    #[error("Unrecognized interruption payload: {0}")]
    InterruptionUnrecognized(String),

    #[error("Amplitude threshold must be a non-negative number, got {0}")]
    InvalidThreshold(f32),

    #[error("Transposition of {0} semitones is outside -12..=12")]
    TranspositionOutOfRange(i32),

    #[error("Unsupported buffer size: {0} samples")]
    UnsupportedBufferSize(usize),
}

impl TunerError {
    /// Wraps a collaborator failure, keeping the whole anyhow context chain.
    pub(crate) fn engine(err: &anyhow::Error) -> Self {
        TunerError::EngineStartFailure(format!("{err:#}"))
    }

    pub(crate) fn session(err: &anyhow::Error) -> Self {
        TunerError::SessionActivationFailure(format!("{err:#}"))
    }
}
