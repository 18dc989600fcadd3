//! Builder for configuring and constructing a [`CaptureLifecycle`].

use crate::audio::{AudioSession, CaptureEngine, InputProbe};
use crate::config::{MemoryPreferences, PreferenceStore, TunerConfig};
use crate::lifecycle::CaptureLifecycle;
use crate::logging::{EventLogger, NoopLogger};

/// Readings queued between the engine context and `poll()`.
const DEFAULT_READING_QUEUE: usize = 64;

/// Without an explicit config, settings are loaded from the preference store
/// (defaults for anything it has never stored). Without a store, an
/// in-memory one is used; without a logger, events are dropped.
///
/// # Example
///
/// ```ignore
/// use tuner_core::{CpalInputProbe, TunerBuilder};
///
/// let mut tuner = TunerBuilder::new()
///     .preferences(my_store)
///     .logger(tuner_core::LogEventLogger)
///     .build(engine, session, &CpalInputProbe);
/// tuner.start()?;
/// ```
pub struct TunerBuilder {
    config: Option<TunerConfig>,
    preferences: Option<Box<dyn PreferenceStore>>,
    logger: Option<Box<dyn EventLogger>>,
    reading_queue: usize,
}

impl Default for TunerBuilder {
    fn default() -> Self {
        Self {
            config: None,
            preferences: None,
            logger: None,
            reading_queue: DEFAULT_READING_QUEUE,
        }
    }
}

impl TunerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides whatever the preference store holds.
    pub fn config(mut self, config: TunerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn preferences(mut self, store: impl PreferenceStore + 'static) -> Self {
        self.preferences = Some(Box::new(store));
        self
    }

    pub fn logger(mut self, logger: impl EventLogger + 'static) -> Self {
        self.logger = Some(Box::new(logger));
        self
    }

    /// When full, the oldest queued reading is evicted. Default: 64
    pub fn reading_queue(mut self, capacity: usize) -> Self {
        self.reading_queue = capacity;
        self
    }

    /// Probes for an input device and installs the pitch tap if one exists.
    pub fn build<E, S>(
        self,
        engine: E,
        session: S,
        probe: &dyn InputProbe,
    ) -> CaptureLifecycle<E, S>
    where
        E: CaptureEngine,
        S: AudioSession,
    {
        let preferences = self
            .preferences
            .unwrap_or_else(|| Box::new(MemoryPreferences::default()));
        let config = self
            .config
            .unwrap_or_else(|| TunerConfig::load(&*preferences));
        let logger = self.logger.unwrap_or_else(|| Box::new(NoopLogger));

        CaptureLifecycle::from_parts(
            engine,
            session,
            probe,
            config,
            preferences,
            logger,
            self.reading_queue,
        )
    }
}
