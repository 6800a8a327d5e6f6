//! Macro Controller
//!
//! Owns the whole pipeline: the global hook, the recorder, the trigger
//! watcher, the binding registry and the playback engine. One pump thread
//! drains the hook's event stream and routes every event to exactly one
//! consumer: the recorder while in recording mode, the watcher otherwise.
//! The recorder and watcher therefore never observe the same event, by
//! construction rather than by flag checks scattered across callbacks.
//!
//! Watch events (trigger pressed/released/captured) are drained on the
//! same thread and dispatched against the registry:
//! - hold-mode macro: press plays if idle, release stops
//! - once/loop-mode macro: press toggles (stop if running, else play)

use crate::hook::{HookBackend, HookEvent, InputHookHandle};
use crate::input::InputId;
use crate::player::{PlaybackEngine, PlaybackMode};
use crate::recorder::InputEventRecorder;
use crate::registry::{BindingRegistry, MacroDef};
use crate::timeline::{self, RecordedEvent, TimelineItem};
use crate::trigger::Trigger;
use crate::watcher::{TriggerWatcher, WatchEvent};
use crossbeam_channel::Receiver;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Equivalence groups for input names that refer to the same physical
/// button across vendors and save-file generations.
pub struct AliasTable {
    groups: Vec<Vec<InputId>>,
}

impl AliasTable {
    pub fn new(groups: Vec<Vec<InputId>>) -> Self {
        Self { groups }
    }

    pub fn empty() -> Self {
        Self { groups: Vec::new() }
    }

    /// Whether two identifiers name the same input
    pub fn equivalent(&self, a: &InputId, b: &InputId) -> bool {
        a == b || self.groups.iter().any(|g| g.contains(a) && g.contains(b))
    }
}

/// The stock alias groups: side buttons and the three main buttons under
/// their common vendor spellings.
pub fn default_alias_table() -> &'static AliasTable {
    static TABLE: Lazy<AliasTable> = Lazy::new(|| {
        let group = |names: &[&str]| names.iter().map(InputId::new).collect::<Vec<_>>();
        AliasTable::new(vec![
            group(&["mouse_x1", "x1", "mouse4", "back"]),
            group(&["mouse_x2", "x2", "mouse5", "forward"]),
            group(&["mouse_left", "lmb", "left_click", "mouse1"]),
            group(&["mouse_right", "rmb", "right_click", "mouse2"]),
            group(&["mouse_middle", "mmb", "middle_click", "mouse3"]),
        ])
    });
    &TABLE
}

/// Drop the leading actions a recording picked up from its own trigger
/// press. Leading waits are kept; stripping stops at the first action that
/// is not an alias of the trigger input, so only the activation itself is
/// removed, never a genuine use of the same button later on.
pub fn strip_self_trigger(
    items: Vec<TimelineItem>,
    trigger: &Trigger,
    aliases: &AliasTable,
) -> Vec<TimelineItem> {
    let mut out = Vec::with_capacity(items.len());
    let mut stripping = true;
    for item in items {
        if stripping {
            if let TimelineItem::Action(action) = &item {
                if aliases.equivalent(&action.input, trigger.input()) {
                    debug!(input = %action.input, "stripped self-trigger action");
                    continue;
                }
                stripping = false;
            }
        }
        out.push(item);
    }
    out
}

/// Which consumer the pump routes hook events to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Dispatch,
    Recording,
}

type FinishObserver = Arc<dyn Fn() + Send + Sync>;

struct Shared {
    registry: Arc<BindingRegistry>,
    player: Arc<PlaybackEngine>,
    watcher: Arc<TriggerWatcher>,
    watch_rx: Receiver<WatchEvent>,
    recorder: Mutex<InputEventRecorder>,
    mode: Mutex<ControlMode>,
    captured: Mutex<Option<Trigger>>,
    hook_error: Mutex<Option<String>>,
    on_finished: Mutex<Option<FinishObserver>>,
}

impl Shared {
    /// Route one hook event to its single consumer
    fn route(&self, event: &crate::hook::InputEvent) {
        let mode = *self.mode.lock();
        match mode {
            ControlMode::Recording => {
                let mut recorder = self.recorder.lock();
                recorder.handle(event);
                // The stop input ends the recording from inside; fall back
                // to dispatch so triggers work again immediately.
                if !recorder.is_recording() {
                    drop(recorder);
                    *self.mode.lock() = ControlMode::Dispatch;
                    info!("recording ended by stop input, back to dispatch");
                }
            }
            ControlMode::Dispatch => self.watcher.handle(event),
        }
    }

    /// Drain and act on pending watch events
    fn dispatch(&self) {
        while let Ok(event) = self.watch_rx.try_recv() {
            match event {
                WatchEvent::Pressed(trigger) => self.on_pressed(&trigger),
                WatchEvent::Released(trigger) => self.on_released(&trigger),
                WatchEvent::Captured(trigger) => {
                    info!(trigger = %trigger, "trigger captured");
                    *self.captured.lock() = Some(trigger);
                }
            }
        }
    }

    fn on_pressed(&self, trigger: &Trigger) {
        let Some(def) = self.registry.lookup(trigger) else {
            warn!(trigger = %trigger, "pressed trigger has no binding");
            return;
        };
        match def.mode {
            PlaybackMode::Hold => {
                if !self.player.is_playing() {
                    self.play(&def);
                }
            }
            PlaybackMode::Once | PlaybackMode::Loop => {
                if self.player.is_playing() {
                    self.player.stop();
                } else {
                    self.play(&def);
                }
            }
        }
    }

    fn on_released(&self, trigger: &Trigger) {
        if let Some(def) = self.registry.lookup(trigger) {
            if def.mode == PlaybackMode::Hold {
                self.player.stop();
            }
        }
    }

    fn play(&self, def: &MacroDef) {
        info!(name = %def.name, mode = ?def.mode, "dispatching macro");
        let events = timeline::encode(&def.timeline);
        let observer = self.on_finished.lock().clone();
        self.player.play(events, def.mode, move || {
            if let Some(observer) = observer {
                observer();
            }
        });
    }
}

/// Top-level engine facade with an explicit start/shutdown lifecycle
pub struct MacroController {
    shared: Arc<Shared>,
    aliases: &'static AliasTable,
    running: Arc<AtomicBool>,
    hook: Option<InputHookHandle>,
    pump: Option<JoinHandle<()>>,
}

impl MacroController {
    pub fn new() -> Self {
        Self::with_player(Arc::new(PlaybackEngine::new()))
    }

    /// Controller around a caller-built engine (tests inject a scripted one)
    pub fn with_player(player: Arc<PlaybackEngine>) -> Self {
        let (watcher, watch_rx) = TriggerWatcher::new();
        Self {
            shared: Arc::new(Shared {
                registry: Arc::new(BindingRegistry::new()),
                player,
                watcher: Arc::new(watcher),
                watch_rx,
                recorder: Mutex::new(InputEventRecorder::new()),
                mode: Mutex::new(ControlMode::Dispatch),
                captured: Mutex::new(None),
                hook_error: Mutex::new(None),
                on_finished: Mutex::new(None),
            }),
            aliases: default_alias_table(),
            running: Arc::new(AtomicBool::new(false)),
            hook: None,
            pump: None,
        }
    }

    /// Install the hook and start the pump thread. Idempotent.
    pub fn start(&mut self, backend: Box<dyn HookBackend>) {
        if self.pump.is_some() {
            return;
        }
        let hook = InputHookHandle::install(backend);
        let hook_rx = hook.events().clone();
        self.hook = Some(hook);
        self.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        self.pump = thread::Builder::new()
            .name("macro-pump".into())
            .spawn(move || {
                info!("controller pump started");
                while running.load(Ordering::SeqCst) {
                    match hook_rx.recv_timeout(Duration::from_millis(100)) {
                        Ok(HookEvent::Input(event)) => shared.route(&event),
                        Ok(HookEvent::Unavailable(reason)) => {
                            error!("input hook unavailable: {reason}");
                            *shared.hook_error.lock() = Some(reason);
                        }
                        Err(_) => {}
                    }
                    shared.dispatch();
                }
                info!("controller pump stopped");
            })
            .ok();
    }

    /// Stop the pump, release the hook and cancel any playback
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
        }
        if let Some(hook) = self.hook.take() {
            hook.release();
        }
        self.shared.player.stop();
        info!("controller shut down");
    }

    /// Bind a macro: its timeline is cleaned of the recorded self-trigger
    /// press, then registered with the watcher and the registry.
    pub fn arm(&self, mut def: MacroDef) {
        def.timeline = strip_self_trigger(def.timeline, &def.trigger, self.aliases);
        self.shared.watcher.add_trigger(def.trigger.clone());
        self.shared.registry.register(def);
    }

    pub fn disarm(&self, trigger: &Trigger) -> Option<MacroDef> {
        self.shared.watcher.remove_trigger(trigger);
        self.shared.registry.unregister(trigger)
    }

    /// Switch the pump's consumer to the recorder and start capturing.
    /// Until the recording ends, no triggers dispatch.
    pub fn begin_recording(&self, stop_input: Option<InputId>) {
        let mut recorder = self.shared.recorder.lock();
        *recorder = match stop_input {
            Some(input) => InputEventRecorder::with_stop_input(input),
            None => InputEventRecorder::new(),
        };
        recorder.start();
        drop(recorder);
        *self.shared.mode.lock() = ControlMode::Recording;
    }

    /// End the recording (if still running) and take the captured events
    pub fn finish_recording(&self) -> Vec<RecordedEvent> {
        let mut recorder = self.shared.recorder.lock();
        recorder.stop();
        let events = recorder.take_events();
        drop(recorder);
        *self.shared.mode.lock() = ControlMode::Dispatch;
        events
    }

    pub fn is_recording(&self) -> bool {
        self.shared.recorder.lock().is_recording()
    }

    /// Arm "set trigger" capture; the result appears via `take_captured`
    pub fn begin_trigger_capture(&self) {
        self.shared.watcher.begin_capture();
    }

    pub fn cancel_trigger_capture(&self) {
        self.shared.watcher.cancel_capture();
    }

    /// The trigger captured since the last call, if any
    pub fn take_captured(&self) -> Option<Trigger> {
        self.shared.captured.lock().take()
    }

    /// Observer invoked on the playback thread each time a run finishes.
    /// It must not call back into `play`.
    pub fn set_on_playback_finished(&self, observer: impl Fn() + Send + Sync + 'static) {
        *self.shared.on_finished.lock() = Some(Arc::new(observer));
    }

    /// Install-failure reason, if the hook reported one
    pub fn hook_error(&self) -> Option<String> {
        self.shared.hook_error.lock().clone()
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.shared.registry
    }

    pub fn player(&self) -> &PlaybackEngine {
        &self.shared.player
    }

    pub fn watcher(&self) -> &TriggerWatcher {
        &self.shared.watcher
    }

    /// Drain pending watch events without the pump (deterministic tests)
    pub fn dispatch_pending(&self) {
        self.shared.dispatch();
    }
}

impl Default for MacroController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MacroController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::InputEvent;
    use crate::timeline::ActionSpec;

    fn action(key: &str) -> TimelineItem {
        TimelineItem::Action(ActionSpec::press(InputId::new(key)))
    }

    #[test]
    fn alias_table_groups_side_button_spellings() {
        let table = default_alias_table();
        assert!(table.equivalent(&InputId::new("mouse_x1"), &InputId::new("back")));
        assert!(table.equivalent(&InputId::new("x1"), &InputId::new("mouse4")));
        assert!(!table.equivalent(&InputId::new("mouse_x1"), &InputId::new("mouse_x2")));
        assert!(table.equivalent(&InputId::new("q"), &InputId::new("q")));
    }

    #[test]
    fn strip_removes_only_leading_trigger_actions() {
        let trigger = Trigger::Simple(InputId::new("mouse_x1"));
        let items = vec![
            action("back"),
            TimelineItem::wait(0.2),
            action("q"),
            action("mouse_x1"),
        ];
        let stripped = strip_self_trigger(items, &trigger, default_alias_table());
        // The later mouse_x1 is a genuine part of the macro and survives
        assert_eq!(
            stripped,
            vec![TimelineItem::wait(0.2), action("q"), action("mouse_x1")]
        );
    }

    #[test]
    fn strip_with_empty_table_matches_exact_only() {
        let trigger = Trigger::Simple(InputId::new("mouse_x1"));
        let table = AliasTable::empty();
        let items = vec![action("back"), action("q")];
        let stripped = strip_self_trigger(items.clone(), &trigger, &table);
        assert_eq!(stripped, items);
    }

    #[test]
    fn arm_strips_and_registers() {
        let controller = MacroController::new();
        let trigger = Trigger::Simple(InputId::new("mouse_x1"));
        let def = MacroDef::new(
            "m",
            vec![action("mouse_x1"), action("q")],
            PlaybackMode::Once,
            trigger.clone(),
        );
        controller.arm(def);

        let stored = controller.registry().lookup(&trigger).unwrap();
        assert_eq!(stored.timeline, vec![action("q")]);

        assert!(controller.disarm(&trigger).is_some());
        assert!(controller.registry().is_empty());
    }

    #[test]
    fn recording_mode_routes_events_to_recorder() {
        let controller = MacroController::new();
        controller.begin_recording(None);
        assert!(controller.is_recording());

        controller
            .shared
            .route(&InputEvent::press(InputId::new("a")));
        controller
            .shared
            .route(&InputEvent::release(InputId::new("a")));

        let events = controller.finish_recording();
        assert_eq!(events.len(), 2);
        assert!(!controller.is_recording());
    }

    #[test]
    fn stop_input_release_returns_to_dispatch() {
        let controller = MacroController::new();
        controller.begin_recording(Some(InputId::new("f9")));
        controller
            .shared
            .route(&InputEvent::press(InputId::new("a")));
        controller
            .shared
            .route(&InputEvent::press(InputId::new("f9")));
        controller
            .shared
            .route(&InputEvent::release(InputId::new("f9")));

        assert!(!controller.is_recording());
        assert_eq!(*controller.shared.mode.lock(), ControlMode::Dispatch);
        // The stop input itself never entered the buffer
        assert_eq!(controller.finish_recording().len(), 1);
    }

    #[test]
    fn trigger_capture_flows_through_dispatch() {
        let controller = MacroController::new();
        controller.begin_trigger_capture();
        controller
            .shared
            .route(&InputEvent::press(InputId::new("f6")));
        controller.dispatch_pending();

        assert_eq!(
            controller.take_captured(),
            Some(Trigger::Simple(InputId::new("f6")))
        );
        assert!(controller.take_captured().is_none());
    }

    #[test]
    fn pressed_trigger_without_binding_is_ignored() {
        let controller = MacroController::new();
        controller
            .shared
            .watcher
            .add_trigger(Trigger::Simple(InputId::new("f9")));
        controller
            .shared
            .route(&InputEvent::press(InputId::new("f9")));
        // Lookup misses; dispatch must not panic or start playback
        controller.dispatch_pending();
        assert!(!controller.player().is_playing());
    }
}
