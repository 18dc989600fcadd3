//! Observable output record read by the UI layer.
//!
//! The lifecycle is the only writer. Readers either poll a snapshot or
//! subscribe and receive a fresh snapshot after every change.

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use crate::tuning::NoteReading;

/// Placeholder note name shown while no reading is available.
pub const NO_NOTE: &str = "-";

/// What the display shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TunerOutput {
    pub pitch: f32,
    pub note_name: &'static str,
    pub octave_number: i32,
    pub deviation_cents: f32,
    pub engine_is_running: bool,
    pub error_message: Option<String>,
}

impl Default for TunerOutput {
    fn default() -> Self {
        Self {
            pitch: 0.0,
            note_name: NO_NOTE,
            octave_number: 0,
            deviation_cents: 0.0,
            engine_is_running: false,
            error_message: None,
        }
    }
}

impl TunerOutput {
    fn apply_reading(&mut self, reading: &NoteReading) {
        self.pitch = reading.frequency_hz;
        self.note_name = reading.note_name;
        self.octave_number = reading.octave;
        self.deviation_cents = reading.deviation_cents;
    }

    fn clear_reading(&mut self) {
        let defaults = TunerOutput::default();
        self.pitch = defaults.pitch;
        self.note_name = defaults.note_name;
        self.octave_number = defaults.octave_number;
        self.deviation_cents = defaults.deviation_cents;
    }

    /// True when a note is currently displayed.
    pub fn has_reading(&self) -> bool {
        self.note_name != NO_NOTE
    }
}

/// Owns the output record and fans snapshots out to subscribers.
#[derive(Debug, Default)]
pub(crate) struct OutputHandle {
    current: TunerOutput,
    subscribers: Vec<Sender<TunerOutput>>,
}

impl OutputHandle {
    pub(crate) fn snapshot(&self) -> TunerOutput {
        self.current.clone()
    }

    pub(crate) fn subscribe(&mut self) -> Receiver<TunerOutput> {
        let (tx, rx) = crossbeam_channel::unbounded();
        // New subscribers start from the current state.
        let _ = tx.send(self.current.clone());
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn publish_reading(&mut self, reading: &NoteReading) {
        self.current.apply_reading(reading);
        self.notify();
    }

    pub(crate) fn reset_reading(&mut self) {
        self.current.clear_reading();
        self.notify();
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        if self.current.engine_is_running != running {
            self.current.engine_is_running = running;
            self.notify();
        }
    }

    pub(crate) fn set_error(&mut self, message: Option<String>) {
        if self.current.error_message != message {
            self.current.error_message = message;
            self.notify();
        }
    }

    fn notify(&mut self) {
        let current = &self.current;
        // Dropped receivers are pruned here.
        self.subscribers.retain(|tx| tx.send(current.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> NoteReading {
        NoteReading {
            frequency_hz: 880.5,
            note_name: "A",
            octave: 1,
            deviation_cents: 0.98,
        }
    }

    #[test]
    fn reading_updates_and_resets_display_fields() {
        let mut handle = OutputHandle::default();
        handle.set_running(true);
        handle.publish_reading(&reading());

        let shown = handle.snapshot();
        assert_eq!(shown.note_name, "A");
        assert_eq!(shown.octave_number, 1);
        assert!(shown.has_reading());

        handle.reset_reading();
        let shown = handle.snapshot();
        assert_eq!(shown.note_name, NO_NOTE);
        assert_eq!(shown.pitch, 0.0);
        assert!(shown.engine_is_running);
    }

    #[test]
    fn subscribers_receive_current_state_then_changes() {
        let mut handle = OutputHandle::default();
        let rx = handle.subscribe();
        assert_eq!(rx.try_recv().unwrap(), TunerOutput::default());

        handle.publish_reading(&reading());
        assert_eq!(rx.try_recv().unwrap().note_name, "A");

        // No change, no notification
        handle.set_running(false);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut handle = OutputHandle::default();
        drop(handle.subscribe());
        let _kept = handle.subscribe();
        handle.set_error(Some("boom".to_string()));
        assert_eq!(handle.subscribers.len(), 1);
    }
}
