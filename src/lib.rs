//! combokit
//!
//! Input recording, trigger matching and timed playback for game macros.
//! The pipeline: a global [`hook`] feeds raw press/release events either to
//! the [`recorder`] (while capturing a new macro) or to the [`watcher`]
//! (while dispatching); matched triggers look their macro up in the
//! [`registry`] and hand its timeline to the [`player`]. The [`controller`]
//! owns all of it behind one start/shutdown lifecycle, and [`storage`]
//! persists macros as JSON.
//!
//! The library never installs a tracing subscriber or touches the OS hook
//! until [`controller::MacroController::start`] is called with a backend.

pub mod controller;
pub mod error;
pub mod hook;
pub mod input;
pub mod player;
pub mod recorder;
pub mod registry;
pub mod storage;
pub mod timeline;
pub mod trigger;
pub mod watcher;

pub use controller::{default_alias_table, AliasTable, MacroController};
pub use error::EngineError;
pub use hook::{HookBackend, InputHookHandle, RdevBackend};
pub use input::{InputId, KeyPhase, Modifier, ModifierSet};
pub use player::{InjectorFactory, InputInjector, PlaybackEngine, PlaybackMode, PlaybackOptions};
pub use recorder::InputEventRecorder;
pub use registry::{BindingRegistry, MacroDef};
pub use timeline::{decode, encode, ActionSpec, RecordedEvent, TimelineItem};
pub use trigger::Trigger;
pub use watcher::{TriggerWatcher, WatchEvent};
