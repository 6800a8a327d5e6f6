//! Input Identifiers and Modifier State
//!
//! Data types shared by the recorder, watcher and player:
//! - InputId: normalized name of a key, mouse button or wheel step
//! - Modifier / ModifierSet: the three combo modifiers and held-state tracking
//! - KeyPhase: press vs release

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque identifier for a keyboard key or mouse button.
///
/// Stored in normalized (lowercase) form so that equality is by name, e.g.
/// `"a"`, `"f9"`, `"mouse_x1"`, `"scroll_down"`. There is no ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputId(String);

impl InputId {
    /// Create an identifier, normalizing to lowercase
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identifier names a mouse button
    pub fn is_mouse(&self) -> bool {
        self.0.starts_with("mouse_")
    }

    /// Whether this identifier names a wheel step (no matching release)
    pub fn is_scroll(&self) -> bool {
        self.0 == "scroll_up" || self.0 == "scroll_down"
    }

    /// The modifier this key is, if it is one of the canonical three
    pub fn as_modifier(&self) -> Option<Modifier> {
        Modifier::from_name(&self.0)
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Modifier> for InputId {
    fn from(m: Modifier) -> Self {
        InputId(m.name().to_string())
    }
}

/// One of the three combo modifiers. Left/right keyboard variants are
/// normalized to these canonical names at the hook boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
}

impl Modifier {
    pub fn name(self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Shift => "shift",
            Modifier::Alt => "alt",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "shift" => Some(Modifier::Shift),
            "alt" => Some(Modifier::Alt),
            _ => None,
        }
    }
}

/// Unordered set of {ctrl, shift, alt}.
///
/// Used both inside a combo [`Trigger`](crate::trigger::Trigger) and as the
/// watcher's transient "currently held" state. Two sets are equal iff
/// identical as sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModifierSet {
    ctrl: bool,
    shift: bool,
    alt: bool,
}

impl ModifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, m: Modifier) {
        match m {
            Modifier::Ctrl => self.ctrl = true,
            Modifier::Shift => self.shift = true,
            Modifier::Alt => self.alt = true,
        }
    }

    pub fn remove(&mut self, m: Modifier) {
        match m {
            Modifier::Ctrl => self.ctrl = false,
            Modifier::Shift => self.shift = false,
            Modifier::Alt => self.alt = false,
        }
    }

    pub fn contains(&self, m: Modifier) -> bool {
        match m {
            Modifier::Ctrl => self.ctrl,
            Modifier::Shift => self.shift,
            Modifier::Alt => self.alt,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.ctrl || self.shift || self.alt)
    }

    pub fn len(&self) -> usize {
        self.ctrl as usize + self.shift as usize + self.alt as usize
    }

    /// Members in a fixed (alphabetical) order, for display and iteration
    pub fn to_vec(&self) -> Vec<Modifier> {
        let mut out = Vec::with_capacity(3);
        if self.alt {
            out.push(Modifier::Alt);
        }
        if self.ctrl {
            out.push(Modifier::Ctrl);
        }
        if self.shift {
            out.push(Modifier::Shift);
        }
        out
    }
}

impl FromIterator<Modifier> for ModifierSet {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        let mut set = ModifierSet::new();
        for m in iter {
            set.insert(m);
        }
        set
    }
}

impl fmt::Display for ModifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.to_vec().into_iter().map(Modifier::name).collect();
        f.write_str(&names.join("+"))
    }
}

// Persisted as a plain list of names: ["ctrl", "shift"]
impl Serialize for ModifierSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names: Vec<&str> = self.to_vec().into_iter().map(Modifier::name).collect();
        names.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ModifierSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        let mut set = ModifierSet::new();
        for name in names {
            let m = Modifier::from_name(&name)
                .ok_or_else(|| D::Error::custom(format!("unknown modifier {name:?}")))?;
            set.insert(m);
        }
        Ok(set)
    }
}

/// Whether an input event is a press or a release
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPhase {
    #[default]
    Press,
    Release,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_id_normalizes_case() {
        assert_eq!(InputId::new("A"), InputId::new("a"));
        assert_eq!(InputId::new(" F9 ").as_str(), "f9");
    }

    #[test]
    fn modifier_set_equality_is_set_equality() {
        let a: ModifierSet = [Modifier::Ctrl, Modifier::Shift].into_iter().collect();
        let b: ModifierSet = [Modifier::Shift, Modifier::Ctrl].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, ModifierSet::from_iter([Modifier::Shift]));
    }

    #[test]
    fn modifier_set_insert_remove() {
        let mut set = ModifierSet::new();
        assert!(set.is_empty());
        set.insert(Modifier::Alt);
        set.insert(Modifier::Alt);
        assert_eq!(set.len(), 1);
        set.remove(Modifier::Alt);
        assert!(set.is_empty());
    }

    #[test]
    fn scroll_and_mouse_classification() {
        assert!(InputId::new("scroll_down").is_scroll());
        assert!(InputId::new("mouse_x1").is_mouse());
        assert!(!InputId::new("k").is_mouse());
        assert_eq!(InputId::new("CTRL").as_modifier(), Some(Modifier::Ctrl));
    }
}
