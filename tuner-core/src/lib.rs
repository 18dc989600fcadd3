// tuner-core/src/lib.rs

//! The core logic for a live chromatic tuner.
//! This crate turns per-frame `(frequency, amplitude)` measurements from an
//! external pitch tracker into note readings, and manages the capture
//! session around them (start/stop, OS interruptions, live
//! reconfiguration). It is completely headless and contains no GUI code.

pub mod audio;
pub mod builder;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod output;
pub mod tuning;

pub use audio::{
    AudioSession, CaptureEngine, CpalInputProbe, FrameCallback, InputProbe, InterruptionEvent,
    InterruptionPhase,
};
pub use builder::TunerBuilder;
pub use config::{BufferSize, MemoryPreferences, PreferenceStore, Transposition, TunerConfig};
pub use error::TunerError;
pub use lifecycle::{CaptureLifecycle, LifecycleState};
pub use logging::{EventLogger, LogEventLogger, NoopLogger, TunerEvent};
pub use output::TunerOutput;
pub use tuning::{NoteReading, PitchClass, classify};
