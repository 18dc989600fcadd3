//! # Capture Lifecycle
//!
//! Owns the idle/running/interrupted state of a tuner session, wires the
//! capture engine's per-frame callback to the note classifier, and keeps the
//! output record in sync.
//!
//! ## Contexts
//! - **Engine context**: the frame callback classifies with the live
//!   threshold/transposition (atomics) and queues readings on a bounded
//!   crossbeam channel. Nothing else is touched from there.
//! - **Observation context**: control calls, interruption handling and
//!   [`CaptureLifecycle::poll`], which moves queued readings into the output
//!   record. The embedding application serializes these calls.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use crate::audio::{
    AudioSession, CaptureEngine, FrameCallback, InputProbe, InterruptionEvent, InterruptionPhase,
};
use crate::config::{BufferSize, PreferenceStore, Transposition, TunerConfig, validate_threshold};
use crate::error::TunerError;
use crate::logging::{EventLogger, TunerEvent};
use crate::output::{OutputHandle, TunerOutput};
use crate::tuning::{self, NoteReading};


/// Lifecycle state of a tuner session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Running,
    Interrupted,
}

/// Classifier settings read by the frame callback.
#[derive(Debug)]
struct LiveSettings {
    threshold_bits: AtomicU32,
    transposition: AtomicI32,
}

impl LiveSettings {
    fn new(config: &TunerConfig) -> Self {
        Self {
            threshold_bits: AtomicU32::new(config.amplitude_threshold.to_bits()),
            transposition: AtomicI32::new(config.transposition.semitones()),
        }
    }

    fn threshold(&self) -> f32 {
        f32::from_bits(self.threshold_bits.load(Ordering::Relaxed))
    }

    fn set_threshold(&self, threshold: f32) {
        self.threshold_bits.store(threshold.to_bits(), Ordering::Relaxed);
    }

    fn transposition(&self) -> i32 {
        self.transposition.load(Ordering::Relaxed)
    }

    fn set_transposition(&self, semitones: i32) {
        self.transposition.store(semitones, Ordering::Relaxed);
    }
}

/// State machine driving one tuner session.
///
/// Built through [`crate::TunerBuilder`].
pub struct CaptureLifecycle<E: CaptureEngine, S: AudioSession> {
    engine: E,
    session: S,
    config: TunerConfig,
    live: Arc<LiveSettings>,
    state: LifecycleState,
    /// Set when an interruption stops a running session; consumed on `ended`.
    was_running: bool,
    capture_available: bool,
    tap_installed: bool,
    readings_tx: Sender<NoteReading>,
    readings_rx: Receiver<NoteReading>,
    output: OutputHandle,
    logger: Box<dyn EventLogger>,
    preferences: Box<dyn PreferenceStore>,
}

impl<E: CaptureEngine, S: AudioSession> CaptureLifecycle<E, S> {
    pub(crate) fn from_parts(
        engine: E,
        session: S,
        probe: &dyn InputProbe,
        config: TunerConfig,
        preferences: Box<dyn PreferenceStore>,
        logger: Box<dyn EventLogger>,
        queue_capacity: usize,
    ) -> Self {
        let (readings_tx, readings_rx) = crossbeam_channel::bounded(queue_capacity.max(1));
        let live = Arc::new(LiveSettings::new(&config));
        let capture_available = probe.has_input_device();

        let mut lifecycle = Self {
            engine,
            session,
            config,
            live,
            state: LifecycleState::Idle,
            was_running: false,
            capture_available,
            tap_installed: false,
            readings_tx,
            readings_rx,
            output: OutputHandle::default(),
            logger,
            preferences,
        };

        if capture_available {
            if let Err(e) = lifecycle.install_tap() {
                // start() retries the install.
                log::warn!("[LIFECYCLE] Initial pitch tap install failed: {}", e);
            }
        } else {
            log::error!("[LIFECYCLE] No input device, capture disabled for this session");
            lifecycle
                .logger
                .log(TunerEvent::InputDeviceMissing, &json!({}));
        }

        lifecycle
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// False when no input device was found at construction.
    pub fn capture_available(&self) -> bool {
        self.capture_available
    }

    /// Current output record.
    pub fn output(&self) -> TunerOutput {
        self.output.snapshot()
    }

    /// Receives the current output record, then a snapshot after every change.
    pub fn subscribe(&mut self) -> Receiver<TunerOutput> {
        self.output.subscribe()
    }

    /// Starts capture (`Idle → Running`).
    ///
    /// Session activation failures are reported but do not prevent the
    /// engine start. On engine failure the session stays `Idle` and the
    /// error is also written to the output record.
    pub fn start(&mut self) -> Result<(), TunerError> {
        self.start_capture(true)
    }

    /// Stops capture (`Running → Idle`) and clears the displayed reading.
    ///
    /// Also cancels a pending resume when called while interrupted.
    pub fn stop(&mut self) {
        self.was_running = false;
        match self.state {
            LifecycleState::Running => self.halt(),
            LifecycleState::Interrupted => {
                log::info!("[LIFECYCLE] Stop while interrupted, resume cancelled");
                self.state = LifecycleState::Idle;
            }
            LifecycleState::Idle => log::debug!("[LIFECYCLE] Stop while idle, nothing to do"),
        }
    }

    /// Reacts to an audio-session interruption.
    pub fn handle_interruption(&mut self, event: InterruptionEvent) {
        match event.phase {
            InterruptionPhase::Began => self.interruption_began(),
            InterruptionPhase::Ended => self.interruption_ended(event.should_resume),
        }
    }

    /// Decodes a raw interruption notification and handles it.
    ///
    /// Malformed payloads are logged and otherwise ignored.
    pub fn handle_interruption_payload(&mut self, type_code: Option<u64>, options: Option<u64>) {
        match InterruptionEvent::decode(type_code, options) {
            Ok(event) => self.handle_interruption(event),
            Err(e) => {
                log::warn!("[LIFECYCLE] {}", e);
                self.logger.log(
                    TunerEvent::InterruptionUnrecognized,
                    &json!({ "type": type_code, "options": options }),
                );
            }
        }
    }

    /// Changes the analysis window size.
    ///
    /// While running, only the pitch tap is replaced and restarted; the
    /// engine keeps capturing and the state stays `Running`.
    /// If the new tap cannot be installed while running, the previous size is
    /// restored; if even that fails, the session stops.
    pub fn set_buffer_size(&mut self, size: BufferSize) -> Result<(), TunerError> {
        let previous = self.config.buffer_size;
        self.config.buffer_size = size;
        self.preferences.set_buffer_size(size);
        self.logger.log(
            TunerEvent::BufferSizeChanged,
            &json!({
                "samples": size.samples(),
                "running": self.state == LifecycleState::Running,
            }),
        );

        if !self.capture_available {
            return Ok(());
        }

        let running = self.state == LifecycleState::Running;
        if running {
            self.engine.stop_tap();
        }
        self.engine.remove_tap();
        self.tap_installed = false;

        if let Err(e) = self.install_tap() {
            log::error!("[LIFECYCLE] Could not replace pitch tap: {}", e);
            self.output.set_error(Some(e.to_string()));
            if running {
                self.restore_tap(previous);
            }
            return Err(e);
        }
        if running {
            self.engine.start_tap();
        }
        log::info!("[LIFECYCLE] Buffer size set to {} samples", size.samples());
        Ok(())
    }

    /// Puts back a tap of the previous size after a failed replacement.
    ///
    /// If that fails too the session is halted, so a running state always
    /// has a live tap behind it.
    fn restore_tap(&mut self, previous: BufferSize) {
        let requested = self.config.buffer_size;
        self.config.buffer_size = previous;
        match self.install_tap() {
            Ok(()) => {
                self.preferences.set_buffer_size(previous);
                self.engine.start_tap();
                log::warn!(
                    "[LIFECYCLE] Kept {} sample tap after failed switch to {}",
                    previous.samples(),
                    requested.samples()
                );
            }
            Err(e) => {
                // start() installs the requested size again.
                self.config.buffer_size = requested;
                log::error!("[LIFECYCLE] Could not restore pitch tap: {}", e);
                self.halt();
            }
        }
    }

    /// Changes the amplitude gate. Takes effect from the next frame.
    pub fn set_amplitude_threshold(&mut self, threshold: f32) -> Result<(), TunerError> {
        let threshold = validate_threshold(threshold)?;
        self.config.amplitude_threshold = threshold;
        self.live.set_threshold(threshold);
        self.preferences.set_amplitude_threshold(threshold);
        self.logger
            .log(TunerEvent::ThresholdChanged, &json!({ "threshold": threshold }));
        Ok(())
    }

    /// Changes the display transposition. Takes effect from the next frame.
    pub fn set_transposition(&mut self, transposition: Transposition) {
        self.live.set_transposition(transposition.semitones());
        self.preferences.set_transposition(&transposition);
        self.logger.log(
            TunerEvent::TranspositionChanged,
            &json!({ "semitones": transposition.semitones(), "label": transposition.label() }),
        );
        self.config.transposition = transposition;
    }

    /// Moves queued readings into the output record.
    ///
    /// Call from the observation context. Readings that arrive after a stop
    /// are discarded. Returns the number of readings published.
    pub fn poll(&mut self) -> usize {
        let mut published = 0;
        while let Ok(reading) = self.readings_rx.try_recv() {
            if self.state == LifecycleState::Running {
                self.output.publish_reading(&reading);
                published += 1;
            }
        }
        published
    }

    fn start_capture(&mut self, report_errors: bool) -> Result<(), TunerError> {
        if self.state == LifecycleState::Running {
            if !self.tap_installed {
                if let Err(e) = self.install_tap() {
                    log::error!("[LIFECYCLE] {}", e);
                    if report_errors {
                        self.output.set_error(Some(e.to_string()));
                    }
                    return Err(e);
                }
                self.engine.start_tap();
                self.output.set_error(None);
                log::info!("[LIFECYCLE] Pitch tap reinstalled");
            } else {
                log::debug!("[LIFECYCLE] Start while running, nothing to do");
            }
            return Ok(());
        }
        self.was_running = false;

        if !self.capture_available {
            return Err(self.fail_start(TunerError::InputDeviceMissing, report_errors));
        }

        if let Err(e) = self.session.activate() {
            let err = TunerError::session(&e);
            log::warn!("[LIFECYCLE] {}, starting capture anyway", err);
            self.logger.log(
                TunerEvent::SessionActivationFailed,
                &json!({ "error": err.to_string() }),
            );
        }

        if !self.tap_installed {
            if let Err(e) = self.install_tap() {
                return Err(self.fail_start(e, report_errors));
            }
        }

        if let Err(e) = self.engine.start_capture() {
            return Err(self.fail_start(TunerError::engine(&e), report_errors));
        }
        self.engine.start_tap();

        self.state = LifecycleState::Running;
        self.output.set_running(true);
        self.output.set_error(None);
        self.logger.log(
            TunerEvent::CaptureStarted,
            &json!({ "buffer_size": self.config.buffer_size.samples() }),
        );
        log::info!("[LIFECYCLE] Capture started");
        Ok(())
    }

    /// Leaves the session idle after a failed start and returns the error.
    fn fail_start(&mut self, err: TunerError, report_errors: bool) -> TunerError {
        log::error!("[LIFECYCLE] {}", err);
        self.state = LifecycleState::Idle;
        self.output.set_running(false);
        if report_errors {
            self.output.set_error(Some(err.to_string()));
        }
        let event = match err {
            TunerError::InputDeviceMissing => TunerEvent::InputDeviceMissing,
            _ => TunerEvent::EngineStartFailed,
        };
        self.logger.log(
            event,
            &json!({ "error": err.to_string(), "reported": report_errors }),
        );
        err
    }

    /// Stops tap and engine and resets the display. Leaves the state `Idle`.
    fn halt(&mut self) {
        self.engine.stop_tap();
        self.engine.stop_capture();
        // Frames classified before the tap stopped must not reappear later.
        while self.readings_rx.try_recv().is_ok() {}
        self.output.reset_reading();
        self.output.set_running(false);
        self.state = LifecycleState::Idle;
        self.logger.log(TunerEvent::CaptureStopped, &json!({}));
        log::info!("[LIFECYCLE] Capture stopped");
    }

    fn interruption_began(&mut self) {
        if self.state != LifecycleState::Running {
            log::debug!("[LIFECYCLE] Interruption began while {:?}, ignored", self.state);
            return;
        }
        self.logger
            .log(TunerEvent::InterruptionBegan, &json!({ "was_running": true }));
        self.halt();
        self.was_running = true;
        self.state = LifecycleState::Interrupted;
        log::info!("[LIFECYCLE] Interrupted");
    }

    fn interruption_ended(&mut self, should_resume: bool) {
        if self.state != LifecycleState::Interrupted {
            log::debug!("[LIFECYCLE] Interruption ended while {:?}, ignored", self.state);
            return;
        }
        let resume = should_resume && self.was_running;
        self.was_running = false;
        self.state = LifecycleState::Idle;
        self.logger.log(
            TunerEvent::InterruptionEnded,
            &json!({ "should_resume": should_resume, "resuming": resume }),
        );

        if resume {
            log::info!("[LIFECYCLE] Resuming capture after interruption");
            // Failures are logged inside; the UI message stays untouched.
            let _ = self.start_capture(false);
        }
    }

    fn install_tap(&mut self) -> Result<(), TunerError> {
        let callback = self.frame_callback();
        self.engine
            .install_tap(self.config.buffer_size, callback)
            .map_err(|e| TunerError::engine(&e))?;
        self.tap_installed = true;
        Ok(())
    }

    /// Builds the callback run on the engine context for every frame.
    fn frame_callback(&self) -> FrameCallback {
        let live = Arc::clone(&self.live);
        let tx = self.readings_tx.clone();
        let stale = self.readings_rx.clone();
        Box::new(move |frequency, amplitude| {
            if let Some(reading) =
                tuning::classify(frequency, amplitude, live.threshold(), live.transposition())
            {
                queue_latest(&tx, &stale, reading);
            }
        })
    }
}

/// Queues a reading, evicting the oldest ones while the queue is full.
fn queue_latest(tx: &Sender<NoteReading>, stale: &Receiver<NoteReading>, reading: NoteReading) {
    let mut reading = reading;
    loop {
        match tx.try_send(reading) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => return,
            Err(TrySendError::Full(rejected)) => {
                let _ = stale.try_recv();
                reading = rejected;
            }
        }
    }
}

impl<E: CaptureEngine, S: AudioSession> Drop for CaptureLifecycle<E, S> {
    fn drop(&mut self) {
        if self.state == LifecycleState::Running {
            self.halt();
        }
        if self.tap_installed {
            self.engine.remove_tap();
        }
    }
}
