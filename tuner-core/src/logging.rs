//! Pluggable event sink for analytics-style reporting.
//!
//! Diagnostics go through the `log` facade directly; this trait is for the
//! embedding application's own event pipeline. Absent a sink, events are
//! dropped by [`NoopLogger`].

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Events the lifecycle reports to the sink.
///
/// Serializes as its [`TunerEvent::name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerEvent {
    CaptureStarted,
    CaptureStopped,
    EngineStartFailed,
    SessionActivationFailed,
    InputDeviceMissing,
    InterruptionBegan,
    InterruptionEnded,
    InterruptionUnrecognized,
    BufferSizeChanged,
    ThresholdChanged,
    TranspositionChanged,
}

impl TunerEvent {
    pub fn name(self) -> &'static str {
        match self {
            TunerEvent::CaptureStarted => "capture_started",
            TunerEvent::CaptureStopped => "capture_stopped",
            TunerEvent::EngineStartFailed => "engine_start_failed",
            TunerEvent::SessionActivationFailed => "session_activation_failed",
            TunerEvent::InputDeviceMissing => "input_device_missing",
            TunerEvent::InterruptionBegan => "interruption_began",
            TunerEvent::InterruptionEnded => "interruption_ended",
            TunerEvent::InterruptionUnrecognized => "interruption_unrecognized",
            TunerEvent::BufferSizeChanged => "buffer_size_changed",
            TunerEvent::ThresholdChanged => "threshold_changed",
            TunerEvent::TranspositionChanged => "transposition_changed",
        }
    }
}

impl Serialize for TunerEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

pub trait EventLogger: Send {
    fn log(&self, event: TunerEvent, context: &Value);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl EventLogger for NoopLogger {
    fn log(&self, _event: TunerEvent, _context: &Value) {}
}

/// Forwards events to the `log` facade at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventLogger;

impl EventLogger for LogEventLogger {
    fn log(&self, event: TunerEvent, context: &Value) {
        log::info!(target: "tuner_core::events", "{} {}", event.name(), context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_as_their_names() {
        let expected = [
            (TunerEvent::CaptureStarted, "capture_started"),
            (TunerEvent::CaptureStopped, "capture_stopped"),
            (TunerEvent::EngineStartFailed, "engine_start_failed"),
            (TunerEvent::SessionActivationFailed, "session_activation_failed"),
            (TunerEvent::InputDeviceMissing, "input_device_missing"),
            (TunerEvent::InterruptionBegan, "interruption_began"),
            (TunerEvent::InterruptionEnded, "interruption_ended"),
            (TunerEvent::InterruptionUnrecognized, "interruption_unrecognized"),
            (TunerEvent::BufferSizeChanged, "buffer_size_changed"),
            (TunerEvent::ThresholdChanged, "threshold_changed"),
            (TunerEvent::TranspositionChanged, "transposition_changed"),
        ];
        for (event, name) in expected {
            assert_eq!(event.name(), name);
            assert_eq!(serde_json::to_value(event).unwrap(), json!(name));
        }
    }
}
