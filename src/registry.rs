//! Binding Registry
//!
//! Thread-safe map from trigger to macro definition. The control thread
//! mutates it while arming and disarming; dispatch looks bindings up when
//! the watcher reports a match. One trigger maps to at most one macro and
//! re-registering overwrites, so the latest binding always wins.

use crate::player::PlaybackMode;
use crate::timeline::TimelineItem;
use crate::trigger::Trigger;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::info;

/// A named, armable macro: its timeline, how it repeats, and what fires it
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    pub name: String,
    pub timeline: Vec<TimelineItem>,
    pub mode: PlaybackMode,
    pub trigger: Trigger,
}

impl MacroDef {
    pub fn new(
        name: impl Into<String>,
        timeline: Vec<TimelineItem>,
        mode: PlaybackMode,
        trigger: Trigger,
    ) -> Self {
        Self {
            name: name.into(),
            timeline,
            mode,
            trigger,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }
}

/// Trigger-to-macro bindings shared between the control and UI threads
#[derive(Default)]
pub struct BindingRegistry {
    bindings: Mutex<HashMap<Trigger, MacroDef>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a macro to its trigger. Returns the macro this binding
    /// displaced, if the trigger was already taken.
    pub fn register(&self, def: MacroDef) -> Option<MacroDef> {
        let trigger = def.trigger.clone();
        let displaced = self.bindings.lock().insert(trigger.clone(), def);
        match &displaced {
            Some(old) => info!(trigger = %trigger, displaced = %old.name, "binding replaced"),
            None => info!(trigger = %trigger, "binding registered"),
        }
        displaced
    }

    /// Remove a binding, returning the macro it held
    pub fn unregister(&self, trigger: &Trigger) -> Option<MacroDef> {
        self.bindings.lock().remove(trigger)
    }

    /// The macro bound to a trigger, if any
    pub fn lookup(&self, trigger: &Trigger) -> Option<MacroDef> {
        self.bindings.lock().get(trigger).cloned()
    }

    /// All currently bound triggers
    pub fn triggers(&self) -> Vec<Trigger> {
        self.bindings.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.lock().is_empty()
    }

    pub fn clear(&self) {
        self.bindings.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputId;

    fn def(name: &str, trigger: &str) -> MacroDef {
        MacroDef::new(
            name,
            Vec::new(),
            PlaybackMode::Once,
            Trigger::Simple(InputId::new(trigger)),
        )
    }

    #[test]
    fn register_lookup_unregister() {
        let registry = BindingRegistry::new();
        let t = Trigger::Simple(InputId::new("f9"));
        assert!(registry.register(def("heal", "f9")).is_none());
        assert_eq!(registry.lookup(&t).unwrap().name, "heal");
        assert_eq!(registry.len(), 1);

        let removed = registry.unregister(&t).unwrap();
        assert_eq!(removed.name, "heal");
        assert!(registry.lookup(&t).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn last_registration_wins() {
        let registry = BindingRegistry::new();
        let t = Trigger::Simple(InputId::new("f9"));
        registry.register(def("first", "f9"));
        let displaced = registry.register(def("second", "f9")).unwrap();
        assert_eq!(displaced.name, "first");
        assert_eq!(registry.lookup(&t).unwrap().name, "second");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_missing_is_none() {
        let registry = BindingRegistry::new();
        assert!(registry
            .unregister(&Trigger::Simple(InputId::new("f9")))
            .is_none());
    }

    #[test]
    fn triggers_lists_all_bound() {
        let registry = BindingRegistry::new();
        registry.register(def("a", "f9"));
        registry.register(def("b", "mouse_x1"));
        let mut triggers: Vec<String> = registry.triggers().iter().map(Trigger::format).collect();
        triggers.sort();
        assert_eq!(triggers, vec!["f9", "mouse_x1"]);
    }
}
