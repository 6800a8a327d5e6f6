//! Macro File Persistence
//!
//! Saves and loads macros as pretty-printed JSON. The on-disk shape is a
//! flat item list plus a settings block:
//!
//! ```json
//! {
//!   "items": [
//!     {"type": "skill", "key": "q", "hold": 0.05, "click_count": 1, "modifiers": []},
//!     {"type": "delay", "value": 1.5}
//!   ],
//!   "settings": {"mode": "loop", "trigger": "mouse_x1"}
//! }
//! ```
//!
//! Item order in the array is the sole source of execution order. The macro
//! name is the file stem, not a field. A malformed trigger string falls
//! back to the default trigger with a warning so one bad file never blocks
//! loading.

use crate::error::EngineError;
use crate::input::{InputId, KeyPhase, ModifierSet};
use crate::player::PlaybackMode;
use crate::registry::MacroDef;
use crate::timeline::{ActionSpec, TimelineItem};
use crate::trigger::Trigger;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One persisted timeline entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoredItem {
    Skill {
        key: String,
        #[serde(default)]
        phase: KeyPhase,
        #[serde(default = "default_hold")]
        hold: f64,
        #[serde(default = "default_click_count")]
        click_count: u32,
        #[serde(default)]
        modifiers: ModifierSet,
    },
    Delay {
        value: f64,
    },
}

fn default_hold() -> f64 {
    0.05
}

fn default_click_count() -> u32 {
    1
}

/// Playback settings persisted alongside the items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(default)]
    pub mode: PlaybackMode,
    pub trigger: String,
}

/// Root of a persisted macro file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroFile {
    pub items: Vec<StoredItem>,
    pub settings: StoredSettings,
}

impl From<&TimelineItem> for StoredItem {
    fn from(item: &TimelineItem) -> Self {
        match item {
            TimelineItem::Wait { seconds } => StoredItem::Delay { value: *seconds },
            TimelineItem::Action(action) => StoredItem::Skill {
                key: action.input.to_string(),
                phase: action.phase,
                hold: action.hold_seconds,
                click_count: action.repeat_count,
                modifiers: action.modifiers,
            },
        }
    }
}

impl From<&StoredItem> for TimelineItem {
    fn from(item: &StoredItem) -> Self {
        match item {
            StoredItem::Delay { value } => TimelineItem::wait(*value),
            StoredItem::Skill {
                key,
                phase,
                hold,
                click_count,
                modifiers,
            } => TimelineItem::Action(ActionSpec {
                input: InputId::new(key),
                phase: *phase,
                hold_seconds: *hold,
                repeat_count: (*click_count).max(1),
                modifiers: *modifiers,
            }),
        }
    }
}

/// Default directory for saved macro files, created on first use
pub fn default_combos_dir() -> Result<PathBuf, EngineError> {
    let project_dirs = ProjectDirs::from("", "", "ComboKit").ok_or_else(|| {
        EngineError::Io(std::io::Error::other("no user data directory available"))
    })?;
    let dir = project_dirs.data_dir().join("combos");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Reduce a macro name to a safe file stem: path separators and other
/// characters filesystems reject become underscores, leading dots go, and
/// a name with nothing left falls back to "macro". Keeps the file inside
/// the target directory no matter what the name contains.
fn sanitize_stem(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "macro".to_string()
    } else {
        cleaned
    }
}

/// Write a macro to `<dir>/<name>.json`
pub fn save_macro(dir: &Path, def: &MacroDef) -> Result<PathBuf, EngineError> {
    let file = MacroFile {
        items: def.timeline.iter().map(StoredItem::from).collect(),
        settings: StoredSettings {
            mode: def.mode,
            trigger: def.trigger.format(),
        },
    };
    let path = dir.join(format!("{}.json", sanitize_stem(&def.name)));
    let json = serde_json::to_string_pretty(&file)?;
    fs::write(&path, json)?;
    info!(path = %path.display(), items = file.items.len(), "macro saved");
    Ok(path)
}

/// Read a macro back; the file stem becomes the macro name
pub fn load_macro(path: &Path) -> Result<MacroDef, EngineError> {
    let contents = fs::read_to_string(path)?;
    let file: MacroFile = serde_json::from_str(&contents)?;

    let trigger = Trigger::parse(&file.settings.trigger).unwrap_or_else(|_| {
        warn!(
            path = %path.display(),
            trigger = %file.settings.trigger,
            "malformed trigger string, using default"
        );
        Trigger::default()
    });

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let timeline = file.items.iter().map(TimelineItem::from).collect();
    Ok(MacroDef::new(name, timeline, file.settings.mode, trigger))
}

/// List every `.json` macro file in a directory, sorted by name
pub fn list_macro_files(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifier;

    fn sample_def(name: &str) -> MacroDef {
        let mods: ModifierSet = [Modifier::Ctrl].into_iter().collect();
        MacroDef::new(
            name,
            vec![
                TimelineItem::Action(
                    ActionSpec::press(InputId::new("q"))
                        .with_hold(0.05)
                        .with_modifiers(mods),
                ),
                TimelineItem::wait(1.5),
                TimelineItem::Action(ActionSpec::press(InputId::new("mouse_left")).with_repeat(3)),
            ],
            PlaybackMode::Loop,
            Trigger::Simple(InputId::new("mouse_x1")),
        )
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let def = sample_def("burst");
        let path = save_macro(dir.path(), &def).unwrap();
        let loaded = load_macro(&path).unwrap();

        assert_eq!(loaded.name, "burst");
        assert_eq!(loaded.timeline, def.timeline);
        assert_eq!(loaded.mode, PlaybackMode::Loop);
        assert_eq!(loaded.trigger, def.trigger);
    }

    #[test]
    fn item_order_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_macro(dir.path(), &sample_def("order")).unwrap();
        let loaded = load_macro(&path).unwrap();
        assert!(matches!(loaded.timeline[0], TimelineItem::Action(_)));
        assert!(matches!(loaded.timeline[1], TimelineItem::Wait { .. }));
        assert!(matches!(loaded.timeline[2], TimelineItem::Action(_)));
    }

    #[test]
    fn malformed_trigger_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"items":[],"settings":{"mode":"once","trigger":"bogus+nope+"}}"#,
        )
        .unwrap();
        let loaded = load_macro(&path).unwrap();
        assert_eq!(loaded.trigger, Trigger::default());
    }

    #[test]
    fn legacy_trigger_spelling_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        fs::write(
            &path,
            r#"{"items":[{"type":"skill","key":"q"}],"settings":{"mode":"hold","trigger":"Button.x1"}}"#,
        )
        .unwrap();
        let loaded = load_macro(&path).unwrap();
        assert_eq!(loaded.trigger, Trigger::Simple(InputId::new("mouse_x1")));
        assert_eq!(loaded.mode, PlaybackMode::Hold);
        // Defaults fill the omitted skill fields
        match &loaded.timeline[0] {
            TimelineItem::Action(a) => {
                assert_eq!(a.hold_seconds, 0.05);
                assert_eq!(a.repeat_count, 1);
                assert!(a.modifiers.is_empty());
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn hostile_macro_names_stay_inside_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["../escape", "a/b", "..", "con:aux?*"] {
            let path = save_macro(dir.path(), &sample_def(name)).unwrap();
            assert_eq!(path.parent().unwrap(), dir.path());
            assert!(path.exists());
        }
        // Nothing was written outside the directory
        assert!(!dir.path().parent().unwrap().join("escape.json").exists());
    }

    #[test]
    fn list_finds_only_json_files() {
        let dir = tempfile::tempdir().unwrap();
        save_macro(dir.path(), &sample_def("a")).unwrap();
        save_macro(dir.path(), &sample_def("b")).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let files = list_macro_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
    }
}
