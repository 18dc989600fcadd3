//! # Audio Collaborator Interfaces
//!
//! The tuner core does not capture or analyse audio itself. It drives an
//! external capture engine that owns a pitch-tracking tap and reports one
//! `(frequency, amplitude)` pair per analysis window, and it listens to the
//! platform audio session for interruptions.
//!
//! ## Contents
//! - [`CaptureEngine`] and [`AudioSession`] contracts
//! - [`InterruptionEvent`] and decoding of raw platform payloads
//! - [`InputProbe`] with a CPAL-backed default-device check

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait};

use crate::config::BufferSize;
use crate::error::TunerError;

/// Per-frame callback handed to the engine's pitch tap.
///
/// Called on the engine's own delivery context with `(frequency_hz, amplitude)`.
pub type FrameCallback = Box<dyn FnMut(f32, f32) + Send + 'static>;

/// Control surface of the external capture engine.
///
/// The engine and its tap are started and stopped separately so the tap can
/// be replaced (for a new buffer size) while the engine keeps running.
pub trait CaptureEngine {
    /// Installs a pitch tap analysing windows of `buffer_size` samples,
    /// replacing any existing tap. The tap is installed stopped.
    fn install_tap(&mut self, buffer_size: BufferSize, callback: FrameCallback) -> Result<()>;

    /// Removes the current tap, if any. No callbacks fire after this returns.
    fn remove_tap(&mut self);

    fn start_tap(&mut self);

    /// Stops frame delivery. No callbacks fire after this returns.
    fn stop_tap(&mut self);

    fn start_capture(&mut self) -> Result<()>;

    fn stop_capture(&mut self);
}

/// Platform audio-session control.
pub trait AudioSession {
    fn activate(&mut self) -> Result<()>;
}

/// Phase of an OS-level audio interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionPhase {
    Began,
    Ended,
}

/// An interruption notification from the audio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptionEvent {
    pub phase: InterruptionPhase,
    /// Only meaningful for `Ended`: the OS suggests resuming playback/capture.
    pub should_resume: bool,
}

/// Raw interruption type code for "began".
pub const INTERRUPTION_TYPE_BEGAN: u64 = 1;
/// Raw interruption type code for "ended".
pub const INTERRUPTION_TYPE_ENDED: u64 = 0;
/// Option flag carried by "ended" when capture may resume.
pub const INTERRUPTION_OPTION_SHOULD_RESUME: u64 = 0x1;

impl InterruptionEvent {
    pub fn began() -> Self {
        Self {
            phase: InterruptionPhase::Began,
            should_resume: false,
        }
    }

    pub fn ended(should_resume: bool) -> Self {
        Self {
            phase: InterruptionPhase::Ended,
            should_resume,
        }
    }

    /// Decodes a raw platform notification.
    ///
    /// # Arguments
    /// * `type_code` - Interruption type (1 = began, 0 = ended)
    /// * `options` - Option flags; absent options mean "do not resume"
    ///
    /// # Returns
    /// * `Err(TunerError::InterruptionUnrecognized)` - Missing or unknown type code
    pub fn decode(type_code: Option<u64>, options: Option<u64>) -> Result<Self, TunerError> {
        match type_code {
            Some(INTERRUPTION_TYPE_BEGAN) => Ok(Self::began()),
            Some(INTERRUPTION_TYPE_ENDED) => {
                let flags = options.unwrap_or(0);
                Ok(Self::ended(flags & INTERRUPTION_OPTION_SHOULD_RESUME != 0))
            }
            Some(other) => Err(TunerError::InterruptionUnrecognized(format!(
                "unknown interruption type {other}"
            ))),
            None => Err(TunerError::InterruptionUnrecognized(
                "missing interruption type".to_string(),
            )),
        }
    }
}

/// Reports whether an audio input device is available.
pub trait InputProbe {
    fn has_input_device(&self) -> bool;
}

/// Checks the CPAL default host for a default input device.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalInputProbe;

impl InputProbe for CpalInputProbe {
    fn has_input_device(&self) -> bool {
        let host = cpal::default_host();
        match host.default_input_device() {
            Some(device) => {
                match device.name() {
                    Ok(name) => log::info!("[AUDIO] Using audio input device: {}", name),
                    Err(e) => log::info!("[AUDIO] Using unnamed audio input device ({})", e),
                }
                true
            }
            None => {
                log::warn!("[AUDIO] No input device available on host {:?}", host.id());
                false
            }
        }
    }
}
