//! Trigger Watcher
//!
//! Single global listener state machine that tracks held modifiers and
//! matches incoming input against the registered triggers. Matches are
//! posted as [`WatchEvent`]s onto a single-consumer queue drained by the
//! control thread; the watcher never calls into shared registry state from
//! the listener thread.
//!
//! Matching rules:
//! - only non-modifier presses are evaluated; modifier keys just update the
//!   held set (left/right variants already collapsed at the hook boundary)
//! - `Combo(mods, input)` requires *exact* set equality with the held set.
//!   An extra held modifier must not match, so holding ctrl for an
//!   unrelated reason cannot fire a shift-only combo.
//! - combos are checked before simple triggers, so the more specific
//!   binding wins when both are registered for the same input
//! - the release resolves against the trigger remembered at press time,
//!   not re-derived from modifier state (modifiers may have been released
//!   mid-hold)

use crate::hook::InputEvent;
use crate::input::{InputId, KeyPhase, ModifierSet};
use crate::trigger::Trigger;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Event posted to the control thread
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Pressed(Trigger),
    Released(Trigger),
    /// "Set trigger" mode result: the next non-modifier input, with
    /// whatever modifiers were held at the time
    Captured(Trigger),
}

struct WatcherState {
    held: ModifierSet,
    triggers: HashSet<Trigger>,
    /// Per currently-matched input: which trigger it matched at press time
    matched: HashMap<InputId, Trigger>,
    capturing: bool,
}

/// Matches global input against registered triggers
pub struct TriggerWatcher {
    state: Mutex<WatcherState>,
    tx: Sender<WatchEvent>,
}

impl TriggerWatcher {
    /// Create the watcher and the queue the control thread drains
    pub fn new() -> (Self, Receiver<WatchEvent>) {
        let (tx, rx) = unbounded();
        let watcher = Self {
            state: Mutex::new(WatcherState {
                held: ModifierSet::new(),
                triggers: HashSet::new(),
                matched: HashMap::new(),
                capturing: false,
            }),
            tx,
        };
        (watcher, rx)
    }

    pub fn add_trigger(&self, trigger: Trigger) {
        info!(trigger = %trigger, "trigger registered with watcher");
        self.state.lock().triggers.insert(trigger);
    }

    pub fn remove_trigger(&self, trigger: &Trigger) {
        self.state.lock().triggers.remove(trigger);
    }

    pub fn clear_triggers(&self) {
        self.state.lock().triggers.clear();
    }

    /// Arm "set trigger" mode: the next non-modifier press is reported as
    /// `Captured` instead of being dispatched. Modifiers already held when
    /// capture is armed count toward the captured combo; the held set stays
    /// accurate because every dispatch-mode event flows through `handle`.
    pub fn begin_capture(&self) {
        self.state.lock().capturing = true;
    }

    pub fn cancel_capture(&self) {
        self.state.lock().capturing = false;
    }

    pub fn is_capturing(&self) -> bool {
        self.state.lock().capturing
    }

    /// Currently held modifiers (for UI display)
    pub fn held_modifiers(&self) -> ModifierSet {
        self.state.lock().held
    }

    /// Feed one hook event through the matcher
    pub fn handle(&self, event: &InputEvent) {
        let mut state = self.state.lock();

        if let Some(modifier) = event.input.as_modifier() {
            match event.phase {
                KeyPhase::Press => state.held.insert(modifier),
                KeyPhase::Release => state.held.remove(modifier),
            }
            return;
        }

        match event.phase {
            KeyPhase::Press => {
                if state.capturing {
                    state.capturing = false;
                    let captured = Trigger::new(state.held, event.input.clone());
                    info!(trigger = %captured, "trigger captured");
                    let _ = self.tx.send(WatchEvent::Captured(captured));
                    return;
                }
                if let Some(trigger) = match_press(&state, &event.input) {
                    debug!(trigger = %trigger, "trigger pressed");
                    // Wheel notches have no release event; pair the press
                    // ourselves so hold-mode bindings cannot wedge open
                    if event.input.is_scroll() {
                        let _ = self.tx.send(WatchEvent::Pressed(trigger.clone()));
                        let _ = self.tx.send(WatchEvent::Released(trigger));
                        return;
                    }
                    state.matched.insert(event.input.clone(), trigger.clone());
                    let _ = self.tx.send(WatchEvent::Pressed(trigger));
                }
            }
            KeyPhase::Release => {
                if let Some(trigger) = state.matched.remove(&event.input) {
                    debug!(trigger = %trigger, "trigger released");
                    let _ = self.tx.send(WatchEvent::Released(trigger));
                }
            }
        }
    }
}

/// Find the trigger a press fires, combos before simple triggers
fn match_press(state: &WatcherState, input: &InputId) -> Option<Trigger> {
    let combo = state.triggers.iter().find(|t| match t {
        Trigger::Combo(mods, i) => i == input && *mods == state.held,
        Trigger::Simple(_) => false,
    });
    combo
        .or_else(|| {
            state
                .triggers
                .iter()
                .find(|t| matches!(t, Trigger::Simple(i) if i == input))
        })
        .cloned()
}
