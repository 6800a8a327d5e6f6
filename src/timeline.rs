//! Timeline Items and the Wait/Action Codec
//!
//! The recorder produces a flat stream of delay-stamped events; editors
//! need "wait" and "action" as separate list entries so either kind can be
//! moved, inserted or deleted on its own. `decode` converts the event
//! stream to edit-friendly items and `encode` reconstructs a valid stream
//! before playback.
//!
//! Convention: delays lead their action. `decode` emits the `Wait` *before*
//! the action it preceded; `encode` folds waits into the *next* action's
//! delay. Trailing waits with no following action become one `DelayOnly`
//! sentinel so the player still honors a pause before a loop restarts.
//! Reversing this convention changes perceived timing.

use crate::input::{InputId, KeyPhase, ModifierSet};

/// One synthesizable action: press or release of an input, with optional
/// hold duration, repeat count and modifiers to hold around it.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub input: InputId,
    pub phase: KeyPhase,
    /// Seconds to hold before the matching release (0 = bare press)
    pub hold_seconds: f64,
    /// Times to repeat the whole press/(hold)/release cycle, minimum 1
    pub repeat_count: u32,
    /// Modifiers held for the duration of the action
    pub modifiers: ModifierSet,
}

impl ActionSpec {
    /// A bare press with no hold, no repeats, no modifiers
    pub fn press(input: InputId) -> Self {
        Self {
            input,
            phase: KeyPhase::Press,
            hold_seconds: 0.0,
            repeat_count: 1,
            modifiers: ModifierSet::new(),
        }
    }

    /// A bare release
    pub fn release(input: InputId) -> Self {
        Self {
            phase: KeyPhase::Release,
            ..Self::press(input)
        }
    }

    pub fn with_hold(mut self, seconds: f64) -> Self {
        self.hold_seconds = seconds;
        self
    }

    pub fn with_repeat(mut self, count: u32) -> Self {
        self.repeat_count = count.max(1);
        self
    }

    pub fn with_modifiers(mut self, modifiers: ModifierSet) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Edit-friendly timeline entry: a pause or an action
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineItem {
    Wait { seconds: f64 },
    Action(ActionSpec),
}

impl TimelineItem {
    pub fn wait(seconds: f64) -> Self {
        TimelineItem::Wait { seconds }
    }
}

/// What a recorded event carries besides its delay
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Action(ActionSpec),
    /// Trailing-wait sentinel: sleep for the delay, perform nothing
    DelayOnly,
}

/// One entry in the flat playback stream. The delay is relative to the
/// previous event, not absolute; the first event's delay is measured from
/// recording start.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub delay_seconds: f64,
    pub payload: EventPayload,
}

impl RecordedEvent {
    pub fn new(delay_seconds: f64, action: ActionSpec) -> Self {
        Self {
            delay_seconds,
            payload: EventPayload::Action(action),
        }
    }

    pub fn delay_only(delay_seconds: f64) -> Self {
        Self {
            delay_seconds,
            payload: EventPayload::DelayOnly,
        }
    }
}

/// Flatten a delay-stamped event stream into separately editable items.
///
/// An event with `delay > 0` contributes a `Wait` item *before* its action;
/// a zero-delay event contributes only the action. Empty in, empty out.
pub fn decode(events: &[RecordedEvent]) -> Vec<TimelineItem> {
    let mut items = Vec::new();
    for event in events {
        if event.delay_seconds > 0.0 {
            items.push(TimelineItem::wait(event.delay_seconds));
        }
        if let EventPayload::Action(action) = &event.payload {
            items.push(TimelineItem::Action(action.clone()));
        }
    }
    items
}

/// Reconstruct a delay-stamped stream from edited items.
///
/// Consecutive `Wait`s sum into the next action's delay. Unconsumed
/// trailing waits are emitted as one `DelayOnly` sentinel so the player
/// still sleeps them out. Empty in, empty out.
pub fn encode(items: &[TimelineItem]) -> Vec<RecordedEvent> {
    let mut events = Vec::new();
    let mut pending_delay = 0.0;
    for item in items {
        match item {
            TimelineItem::Wait { seconds } => pending_delay += seconds,
            TimelineItem::Action(action) => {
                events.push(RecordedEvent::new(pending_delay, action.clone()));
                pending_delay = 0.0;
            }
        }
    }
    if pending_delay > 0.0 {
        events.push(RecordedEvent::delay_only(pending_delay));
    }
    events
}

/// Sum of all delays in a stream (used by tests and progress display)
pub fn total_delay(events: &[RecordedEvent]) -> f64 {
    events.iter().map(|e| e.delay_seconds).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(key: &str) -> ActionSpec {
        ActionSpec::press(InputId::new(key))
    }

    fn actions_of(events: &[RecordedEvent]) -> Vec<ActionSpec> {
        events
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::Action(a) => Some(a.clone()),
                EventPayload::DelayOnly => None,
            })
            .collect()
    }

    #[test]
    fn empty_roundtrip() {
        assert_eq!(decode(&[]), Vec::<TimelineItem>::new());
        assert_eq!(encode(&[]), Vec::<RecordedEvent>::new());
    }

    #[test]
    fn decode_emits_wait_before_action() {
        let events = vec![
            RecordedEvent::new(0.0, press("a")),
            RecordedEvent::new(0.3, press("b")),
        ];
        let items = decode(&events);
        assert_eq!(
            items,
            vec![
                TimelineItem::Action(press("a")),
                TimelineItem::wait(0.3),
                TimelineItem::Action(press("b")),
            ]
        );
    }

    #[test]
    fn encode_sums_consecutive_waits() {
        let items = vec![
            TimelineItem::wait(0.2),
            TimelineItem::wait(0.3),
            TimelineItem::Action(press("a")),
        ];
        let events = encode(&items);
        assert_eq!(events.len(), 1);
        assert!((events[0].delay_seconds - 0.5).abs() < 1e-9);
    }

    #[test]
    fn trailing_wait_becomes_sentinel() {
        let items = vec![TimelineItem::Action(press("a")), TimelineItem::wait(2.0)];
        let events = encode(&items);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], RecordedEvent::delay_only(2.0));
    }

    #[test]
    fn lone_wait_is_representable_and_survives_encode() {
        // A 2-second pause with nothing around it, as an editable unit
        let items = vec![TimelineItem::wait(2.0)];
        let events = encode(&items);
        assert_eq!(events, vec![RecordedEvent::delay_only(2.0)]);
        assert_eq!(decode(&events), items);
    }

    #[test]
    fn roundtrip_preserves_total_time_and_action_order() {
        let original = vec![
            RecordedEvent::new(0.0, press("a")),
            RecordedEvent::new(0.25, ActionSpec::release(InputId::new("a"))),
            RecordedEvent::new(1.5, press("b").with_hold(0.05)),
            RecordedEvent::delay_only(0.75),
        ];
        let rebuilt = encode(&decode(&original));
        assert!((total_delay(&rebuilt) - total_delay(&original)).abs() < 1e-9);
        assert_eq!(actions_of(&rebuilt), actions_of(&original));
    }
}
