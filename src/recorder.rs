//! Input Event Recorder
//!
//! Captures raw press/release events with relative timing while a human
//! performs an action sequence. Every captured event is stamped with the
//! delay since the previous event (the first is measured from recording
//! start), so the buffer replays with the same rhythm it was performed in.
//!
//! The recorder does not own the hook: the controller feeds it events from
//! the shared [`InputHookHandle`](crate::hook::InputHookHandle) while in
//! recording mode. That keeps the capture logic deterministic and testable.

use crate::hook::InputEvent;
use crate::input::{InputId, KeyPhase};
use crate::timeline::{ActionSpec, EventPayload, RecordedEvent};
use std::time::Instant;
use tracing::{debug, info};

/// Recorder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// Buffers global input events as delay-stamped [`RecordedEvent`]s
pub struct InputEventRecorder {
    state: RecorderState,
    events: Vec<RecordedEvent>,
    last_event: Instant,
    /// Input whose release ends the recording; excluded from the buffer
    /// since it is operator intent, not part of the macro.
    stop_input: Option<InputId>,
}

impl InputEventRecorder {
    pub fn new() -> Self {
        Self {
            state: RecorderState::Idle,
            events: Vec::new(),
            last_event: Instant::now(),
            stop_input: None,
        }
    }

    /// Recorder that stops (and filters itself out) on release of `input`
    pub fn with_stop_input(input: InputId) -> Self {
        Self {
            stop_input: Some(input),
            ..Self::new()
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Clear the buffer and start capturing. A second `start()` while
    /// already recording is a no-op guard, not an error.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        if self.state == RecorderState::Recording {
            debug!("already recording, ignoring start request");
            return;
        }
        info!("recording started");
        self.events.clear();
        self.last_event = now;
        self.state = RecorderState::Recording;
    }

    /// Stop capturing; the buffer stays available via `events()`
    pub fn stop(&mut self) {
        if self.state == RecorderState::Recording {
            info!("recording stopped, {} events captured", self.events.len());
        }
        self.state = RecorderState::Idle;
    }

    /// Feed one hook event into the buffer
    pub fn handle(&mut self, event: &InputEvent) {
        self.handle_at(event, Instant::now());
    }

    pub fn handle_at(&mut self, event: &InputEvent, now: Instant) {
        if self.state != RecorderState::Recording {
            return;
        }

        // The stop input never enters the buffer; its release ends capture.
        if self.stop_input.as_ref() == Some(&event.input) {
            if event.phase == KeyPhase::Release {
                self.stop();
            }
            return;
        }

        let delay = now.duration_since(self.last_event).as_secs_f64();
        self.last_event = now;

        let action = ActionSpec {
            input: event.input.clone(),
            phase: event.phase,
            hold_seconds: 0.0,
            repeat_count: 1,
            modifiers: Default::default(),
        };
        debug!(input = %action.input, phase = ?action.phase, delay, "recorded event");
        self.events.push(RecordedEvent::new(delay, action));
    }

    /// The captured sequence, in arrival order
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Take ownership of the captured sequence, leaving the buffer empty
    pub fn take_events(&mut self) -> Vec<RecordedEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Default for InputEventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Zero out delays below `min_seconds`, merging hand jitter into
/// back-to-back events. Explicitly lossy; callers opt in after recording,
/// it is never applied silently.
pub fn coalesce_small_delays(mut events: Vec<RecordedEvent>, min_seconds: f64) -> Vec<RecordedEvent> {
    for event in &mut events {
        if event.delay_seconds < min_seconds {
            event.delay_seconds = 0.0;
        }
    }
    events.retain(|e| !(e.payload == EventPayload::DelayOnly && e.delay_seconds == 0.0));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn press(key: &str) -> InputEvent {
        InputEvent::press(InputId::new(key))
    }

    fn release(key: &str) -> InputEvent {
        InputEvent::release(InputId::new(key))
    }

    #[test]
    fn delays_are_relative_to_previous_event() {
        let t0 = Instant::now();
        let mut rec = InputEventRecorder::new();
        rec.start_at(t0);
        rec.handle_at(&press("a"), t0);
        rec.handle_at(&press("b"), t0 + Duration::from_millis(300));

        let events = rec.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].delay_seconds, 0.0);
        assert!((events[1].delay_seconds - 0.3).abs() < 1e-6);
    }

    #[test]
    fn start_clears_previous_buffer() {
        let t0 = Instant::now();
        let mut rec = InputEventRecorder::new();
        rec.start_at(t0);
        rec.handle_at(&press("a"), t0);
        rec.stop();
        rec.start_at(t0 + Duration::from_secs(1));
        assert!(rec.events().is_empty());
    }

    #[test]
    fn start_while_recording_is_noop() {
        let t0 = Instant::now();
        let mut rec = InputEventRecorder::new();
        rec.start_at(t0);
        rec.handle_at(&press("a"), t0);
        rec.start_at(t0 + Duration::from_secs(1));
        assert_eq!(rec.events().len(), 1);
        assert!(rec.is_recording());
    }

    #[test]
    fn stop_input_ends_recording_and_is_excluded() {
        let t0 = Instant::now();
        let mut rec = InputEventRecorder::with_stop_input(InputId::new("f9"));
        rec.start_at(t0);
        rec.handle_at(&press("a"), t0);
        rec.handle_at(&press("f9"), t0 + Duration::from_millis(100));
        rec.handle_at(&release("f9"), t0 + Duration::from_millis(150));
        assert!(!rec.is_recording());
        // Further events after stop are ignored
        rec.handle_at(&press("b"), t0 + Duration::from_millis(200));

        let events = rec.take_events();
        assert_eq!(events.len(), 1);
        assert!(rec.events().is_empty());
    }

    #[test]
    fn events_ignored_while_idle() {
        let mut rec = InputEventRecorder::new();
        rec.handle(&press("a"));
        assert!(rec.events().is_empty());
    }

    #[test]
    fn coalesce_zeroes_jitter_delays() {
        let events = vec![
            RecordedEvent::new(0.01, ActionSpec::press(InputId::new("a"))),
            RecordedEvent::new(0.4, ActionSpec::press(InputId::new("b"))),
        ];
        let out = coalesce_small_delays(events, 0.05);
        assert_eq!(out[0].delay_seconds, 0.0);
        assert!((out[1].delay_seconds - 0.4).abs() < 1e-9);
    }
}
