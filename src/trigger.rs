//! Trigger Descriptors
//!
//! A trigger is what arms or disarms a macro: either a single key/button or
//! a (modifier-set, key) combination. Triggers have a canonical string form
//! (`"f9"`, `"mouse_x1"`, `"ctrl+shift+k"`) used in persisted files;
//! `parse` and `format` are exact inverses for every valid trigger.

use crate::error::EngineError;
use crate::input::{InputId, Modifier, ModifierSet};
use std::fmt;

/// Immutable descriptor of what activates a macro.
///
/// Invariant: a `Combo`'s modifier set is never empty; [`Trigger::new`]
/// collapses an empty set to `Simple`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trigger {
    Simple(InputId),
    Combo(ModifierSet, InputId),
}

impl Trigger {
    /// Build a trigger, normalizing an empty modifier set to `Simple`
    pub fn new(modifiers: ModifierSet, input: InputId) -> Self {
        if modifiers.is_empty() {
            Trigger::Simple(input)
        } else {
            Trigger::Combo(modifiers, input)
        }
    }

    /// The non-modifier input that fires this trigger
    pub fn input(&self) -> &InputId {
        match self {
            Trigger::Simple(input) => input,
            Trigger::Combo(_, input) => input,
        }
    }

    /// Required modifiers (empty for `Simple`)
    pub fn modifiers(&self) -> ModifierSet {
        match self {
            Trigger::Simple(_) => ModifierSet::new(),
            Trigger::Combo(mods, _) => *mods,
        }
    }

    /// Canonical string form, e.g. `"ctrl+shift+k"`
    pub fn format(&self) -> String {
        match self {
            Trigger::Simple(input) => input.to_string(),
            Trigger::Combo(mods, input) => format!("{mods}+{input}"),
        }
    }

    /// Parse the canonical string form back into a trigger.
    ///
    /// Modifier prefixes are consumed left to right; everything from the
    /// first non-modifier segment onward is the key, so identifiers that
    /// themselves contain `'+'` (the keypad plus records as `"num+"`)
    /// survive a round trip. Also accepts the legacy `"Button.x1"` /
    /// `"Key.f9"` spellings found in old save files, normalizing them to
    /// canonical identifiers. Malformed strings are
    /// [`EngineError::InvalidTriggerString`].
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EngineError::InvalidTriggerString(s.to_string()));
        }

        let mut mods = ModifierSet::new();
        let mut rest = s;
        while let Some((head, tail)) = rest.split_once('+') {
            let Some(m) = Modifier::from_name(head) else {
                break;
            };
            if tail.is_empty() {
                // "ctrl+" names no key
                return Err(EngineError::InvalidTriggerString(s.to_string()));
            }
            mods.insert(m);
            rest = tail;
        }

        let input = parse_single_input(rest)
            .ok_or_else(|| EngineError::InvalidTriggerString(s.to_string()))?;
        Ok(Trigger::new(mods, input))
    }
}

impl Default for Trigger {
    /// The safe fallback trigger used when a persisted string is malformed
    fn default() -> Self {
        Trigger::Simple(InputId::new("mouse_x1"))
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Parse one non-modifier identifier, handling legacy prefixes
fn parse_single_input(s: &str) -> Option<InputId> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let lower = s.to_lowercase();

    // Legacy pynput-style spellings from old combo files
    if let Some(button) = lower.strip_prefix("button.") {
        return match button {
            "left" | "right" | "middle" | "x1" | "x2" => {
                Some(InputId::new(format!("mouse_{button}")))
            }
            _ => None,
        };
    }
    if let Some(key) = lower.strip_prefix("key.") {
        if key.is_empty() {
            return None;
        }
        return Some(InputId::new(key));
    }

    Some(InputId::new(lower))
}
