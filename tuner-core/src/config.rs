//! # Tuner Configuration
//!
//! User-adjustable settings shared by the classifier and the capture
//! lifecycle, and the preference-store contract used to keep them across
//! process restarts. The storage mechanism itself belongs to the embedding
//! application.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TunerError;

/// Default amplitude gate. Frames at or below it are ignored.
pub const DEFAULT_AMPLITUDE_THRESHOLD: f32 = 0.025;

/// Largest transposition magnitude the classifier wraps correctly.
pub const MAX_TRANSPOSITION_SEMITONES: i32 = 12;

/// Analysis window size handed to the capture engine's pitch tap.
///
/// Larger windows resolve low notes better but add latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum BufferSize {
    Samples512,
    Samples1024,
    #[default]
    Samples2048,
    Samples4096,
}

impl BufferSize {
    pub const ALL: [BufferSize; 4] = [
        BufferSize::Samples512,
        BufferSize::Samples1024,
        BufferSize::Samples2048,
        BufferSize::Samples4096,
    ];

    /// Number of samples per analysis window.
    pub fn samples(self) -> usize {
        match self {
            BufferSize::Samples512 => 512,
            BufferSize::Samples1024 => 1024,
            BufferSize::Samples2048 => 2048,
            BufferSize::Samples4096 => 4096,
        }
    }

    /// Wall-clock length of one analysis window at the given sample rate.
    pub fn window_duration(self, sample_rate: u32) -> Duration {
        if sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples() as f64 / sample_rate as f64)
    }
}

impl TryFrom<usize> for BufferSize {
    type Error = TunerError;

    fn try_from(samples: usize) -> Result<Self, Self::Error> {
        BufferSize::ALL
            .into_iter()
            .find(|size| size.samples() == samples)
            .ok_or(TunerError::UnsupportedBufferSize(samples))
    }
}

impl From<BufferSize> for usize {
    fn from(size: BufferSize) -> usize {
        size.samples()
    }
}

/// Instrument-relative display shift applied after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transposition {
    semitones: i32,
    label: String,
}

impl Transposition {
    /// Creates a transposition, rejecting shifts beyond one octave.
    pub fn new(semitones: i32, label: impl Into<String>) -> Result<Self, TunerError> {
        if semitones.abs() > MAX_TRANSPOSITION_SEMITONES {
            return Err(TunerError::TranspositionOutOfRange(semitones));
        }
        Ok(Self {
            semitones,
            label: label.into(),
        })
    }

    /// Concert pitch, no shift.
    pub fn concert() -> Self {
        Self {
            semitones: 0,
            label: "C".to_string(),
        }
    }

    /// B♭ instruments (trumpet, clarinet, tenor sax) read a major second up.
    pub fn b_flat() -> Self {
        Self {
            semitones: 2,
            label: "B♭".to_string(),
        }
    }

    /// E♭ instruments (alto sax) read a major sixth up.
    pub fn e_flat() -> Self {
        Self {
            semitones: 9,
            label: "E♭".to_string(),
        }
    }

    /// F instruments (horn) read a perfect fifth up.
    pub fn f() -> Self {
        Self {
            semitones: 7,
            label: "F".to_string(),
        }
    }

    pub fn semitones(&self) -> i32 {
        self.semitones
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Default for Transposition {
    fn default() -> Self {
        Self::concert()
    }
}

/// Checks an amplitude gate value.
pub fn validate_threshold(threshold: f32) -> Result<f32, TunerError> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(threshold)
    } else {
        Err(TunerError::InvalidThreshold(threshold))
    }
}

/// Current tuner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub buffer_size: BufferSize,
    pub amplitude_threshold: f32,
    pub transposition: Transposition,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            buffer_size: BufferSize::default(),
            amplitude_threshold: DEFAULT_AMPLITUDE_THRESHOLD,
            transposition: Transposition::default(),
        }
    }
}

impl TunerConfig {
    /// Reads stored preferences over the defaults.
    ///
    /// Stored values that fail validation are skipped with a warning.
    pub fn load(store: &dyn PreferenceStore) -> Self {
        let mut config = Self::default();

        if let Some(size) = store.buffer_size() {
            config.buffer_size = size;
        }
        if let Some(threshold) = store.amplitude_threshold() {
            match validate_threshold(threshold) {
                Ok(threshold) => config.amplitude_threshold = threshold,
                Err(e) => log::warn!("[CONFIG] Ignoring stored threshold: {}", e),
            }
        }
        if let Some(transposition) = store.transposition() {
            match Transposition::new(transposition.semitones, transposition.label) {
                Ok(transposition) => config.transposition = transposition,
                Err(e) => log::warn!("[CONFIG] Ignoring stored transposition: {}", e),
            }
        }

        log::debug!("[CONFIG] Loaded {:?}", config);
        config
    }
}

/// Read/write contract of the user-preference store.
///
/// `None` means the field was never stored.
pub trait PreferenceStore: Send {
    fn buffer_size(&self) -> Option<BufferSize>;
    fn set_buffer_size(&mut self, size: BufferSize);

    fn amplitude_threshold(&self) -> Option<f32>;
    fn set_amplitude_threshold(&mut self, threshold: f32);

    fn transposition(&self) -> Option<Transposition>;
    fn set_transposition(&mut self, transposition: &Transposition);
}

/// In-process preference store. Values live as long as the store does.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    buffer_size: Option<BufferSize>,
    amplitude_threshold: Option<f32>,
    transposition: Option<Transposition>,
}

impl PreferenceStore for MemoryPreferences {
    fn buffer_size(&self) -> Option<BufferSize> {
        self.buffer_size
    }

    fn set_buffer_size(&mut self, size: BufferSize) {
        self.buffer_size = Some(size);
    }

    fn amplitude_threshold(&self) -> Option<f32> {
        self.amplitude_threshold
    }

    fn set_amplitude_threshold(&mut self, threshold: f32) {
        self.amplitude_threshold = Some(threshold);
    }

    fn transposition(&self) -> Option<Transposition> {
        self.transposition.clone()
    }

    fn set_transposition(&mut self, transposition: &Transposition) {
        self.transposition = Some(transposition.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_size_from_samples() {
        assert_eq!(BufferSize::try_from(1024).unwrap(), BufferSize::Samples1024);
        assert!(matches!(
            BufferSize::try_from(1000),
            Err(TunerError::UnsupportedBufferSize(1000))
        ));
        assert_eq!(BufferSize::default().samples(), 2048);
    }

    #[test]
    fn window_duration_scales_with_size() {
        let d = BufferSize::Samples4096.window_duration(48_000);
        assert!((d.as_secs_f64() - 0.085_333).abs() < 1e-5);
        assert_eq!(BufferSize::Samples512.window_duration(0), Duration::ZERO);
    }

    #[test]
    fn transposition_range_is_one_octave() {
        assert!(Transposition::new(12, "up").is_ok());
        assert!(Transposition::new(-12, "down").is_ok());
        assert!(matches!(
            Transposition::new(13, "too far"),
            Err(TunerError::TranspositionOutOfRange(13))
        ));
        assert_eq!(Transposition::b_flat().semitones(), 2);
        assert_eq!(Transposition::default().label(), "C");
    }

    #[test]
    fn threshold_must_be_non_negative() {
        assert_eq!(validate_threshold(0.0).unwrap(), 0.0);
        assert!(validate_threshold(-0.1).is_err());
        assert!(validate_threshold(f32::NAN).is_err());
    }

    #[test]
    fn load_prefers_stored_values() {
        let mut store = MemoryPreferences::default();
        store.set_buffer_size(BufferSize::Samples4096);
        store.set_amplitude_threshold(0.1);
        store.set_transposition(&Transposition::f());

        let config = TunerConfig::load(&store);
        assert_eq!(config.buffer_size, BufferSize::Samples4096);
        assert_eq!(config.amplitude_threshold, 0.1);
        assert_eq!(config.transposition, Transposition::f());
    }

    #[test]
    fn load_skips_invalid_stored_threshold() {
        let mut store = MemoryPreferences::default();
        store.set_amplitude_threshold(-1.0);
        let config = TunerConfig::load(&store);
        assert_eq!(config.amplitude_threshold, DEFAULT_AMPLITUDE_THRESHOLD);
    }

    #[test]
    fn partial_config_deserializes_over_defaults() {
        let config: TunerConfig =
            serde_json::from_str(r#"{ "buffer_size": 512 }"#).unwrap();
        assert_eq!(config.buffer_size, BufferSize::Samples512);
        assert_eq!(config.amplitude_threshold, DEFAULT_AMPLITUDE_THRESHOLD);

        assert!(serde_json::from_str::<TunerConfig>(r#"{ "buffer_size": 300 }"#).is_err());
    }
}
