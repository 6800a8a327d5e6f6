//! Playback Engine
//!
//! Replays an encoded event stream with faithful timing on a dedicated
//! thread, synthesizing input through an [`InputInjector`]. Supports one
//! pass (`Once`) or repeat-until-stopped (`Loop`/`Hold`) and cooperative
//! cancellation: waits sleep in short slices and re-check the stop flag,
//! so `stop()` takes effect within tens of milliseconds instead of waiting
//! out a long delay.
//!
//! The engine knows nothing about triggers. In hold mode the controller
//! calls `stop()` on trigger release.

use crate::error::EngineError;
use crate::input::{InputId, KeyPhase};
use crate::timeline::{ActionSpec, EventPayload, RecordedEvent};
use enigo::{
    Direction::{Press, Release},
    Enigo, Keyboard, Mouse, Settings,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Cancellation checks happen at this granularity during waits and holds
const CANCEL_POLL: Duration = Duration::from_millis(25);

/// How a macro repeats once started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Execute the timeline once, then finish
    #[default]
    Once,
    /// Repeat until `stop()`
    Loop,
    /// Same execution as `Loop`; the caller stops it on trigger release
    Hold,
}

/// Seam for input synthesis so tests can script a fake device
pub trait InputInjector: Send {
    fn press(&mut self, input: &InputId) -> Result<(), EngineError>;
    fn release(&mut self, input: &InputId) -> Result<(), EngineError>;
    /// One wheel step; `scroll_down` is positive per enigo's convention
    fn scroll(&mut self, input: &InputId) -> Result<(), EngineError>;
}

/// Factory invoked on the playback thread; the device handle is created
/// per run, never shared across threads.
pub type InjectorFactory =
    Arc<dyn Fn() -> Result<Box<dyn InputInjector>, EngineError> + Send + Sync>;

/// Optional knobs for a playback run
#[derive(Clone)]
pub struct PlaybackOptions {
    /// Wait/hold durations are divided by this (1.0 = recorded speed)
    pub speed: f64,
    /// Observer invoked before waits of at least one second, with the
    /// scaled duration (drives the original's delay-countdown overlay)
    pub on_wait: Option<Arc<dyn Fn(f64) + Send + Sync>>,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            on_wait: None,
        }
    }
}

struct RunHandle {
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Replays timelines; `Idle → Playing → Idle`
pub struct PlaybackEngine {
    factory: InjectorFactory,
    current: Mutex<Option<RunHandle>>,
    /// Serializes `play` calls with each other. Never held while joining a
    /// thread that might call `stop()`, and `stop()` never takes it, so a
    /// finishing run can stop the engine without deadlocking a replacement.
    start_gate: Mutex<()>,
}

impl PlaybackEngine {
    /// Engine that synthesizes real input through enigo
    pub fn new() -> Self {
        Self::with_injector(Arc::new(|| {
            Ok(Box::new(EnigoInjector::new()?) as Box<dyn InputInjector>)
        }))
    }

    /// Engine with a custom injector (tests use a scripted one)
    pub fn with_injector(factory: InjectorFactory) -> Self {
        Self {
            factory,
            current: Mutex::new(None),
            start_gate: Mutex::new(()),
        }
    }

    /// Start playback. A call while already playing stops the current run
    /// first (last-call-wins); two runs never execute concurrently.
    ///
    /// `on_finished` fires exactly once when the run ends (after the final
    /// item for `Once`, after `stop()` for `Loop`/`Hold`), on the playback
    /// thread. An empty stream is a no-op that still fires the callback.
    pub fn play(
        &self,
        events: Vec<RecordedEvent>,
        mode: PlaybackMode,
        on_finished: impl FnOnce() + Send + 'static,
    ) {
        self.play_with(events, mode, PlaybackOptions::default(), on_finished);
    }

    pub fn play_with(
        &self,
        events: Vec<RecordedEvent>,
        mode: PlaybackMode,
        options: PlaybackOptions,
        on_finished: impl FnOnce() + Send + 'static,
    ) {
        let gate = self.start_gate.lock();

        // Take the displaced run out before joining: its `on_finished` may
        // call `stop()`, which locks `current`, so the join must happen
        // with that lock free.
        let previous = self.current.lock().take();
        if let Some(run) = previous {
            info!("playback already running, stopping it first");
            run.cancel.store(true, Ordering::SeqCst);
            let _ = run.thread.join();
        }

        if events.is_empty() {
            info!("empty timeline, nothing to play");
            drop(gate);
            // Callers waiting on the callback are never left hanging
            on_finished();
            return;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = Arc::clone(&cancel);
        let factory = Arc::clone(&self.factory);
        let thread = thread::Builder::new()
            .name("playback".into())
            .spawn(move || {
                run_timeline(&events, mode, &options, &factory, &thread_cancel);
                on_finished();
            })
            .expect("spawn playback thread");
        *self.current.lock() = Some(RunHandle { cancel, thread });
    }

    /// Set the cooperative cancellation flag. Idempotent, safe from any
    /// thread, and a no-op when nothing is playing (including before the
    /// first `play`). The in-progress wait returns within the polling
    /// granularity; no further actions execute.
    pub fn stop(&self) {
        if let Some(run) = self.current.lock().take() {
            info!("playback stop requested");
            run.cancel.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|run| !run.thread.is_finished())
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn run_timeline(
    events: &[RecordedEvent],
    mode: PlaybackMode,
    options: &PlaybackOptions,
    factory: &InjectorFactory,
    cancel: &AtomicBool,
) {
    let mut injector = match factory() {
        Ok(injector) => injector,
        Err(e) => {
            error!("could not create input injector: {e}");
            return;
        }
    };

    let speed = if options.speed > 0.0 { options.speed } else { 1.0 };
    let passes = match mode {
        PlaybackMode::Once => Some(1u32),
        PlaybackMode::Loop | PlaybackMode::Hold => None,
    };

    info!(?mode, events = events.len(), "playback started");
    let mut iterations = 0u32;
    'outer: while !cancel.load(Ordering::SeqCst) {
        if passes.is_some_and(|n| iterations >= n) {
            break;
        }
        for event in events {
            if cancel.load(Ordering::SeqCst) {
                break 'outer;
            }
            if event.delay_seconds > 0.0 {
                let scaled = event.delay_seconds / speed;
                if scaled >= 1.0 {
                    if let Some(on_wait) = &options.on_wait {
                        on_wait(scaled);
                    }
                }
                if !sleep_cancellable(scaled, cancel) {
                    break 'outer;
                }
            }
            if let EventPayload::Action(action) = &event.payload {
                if let Err(e) = run_action(injector.as_mut(), action, cancel, speed) {
                    error!("aborting playback, {e}");
                    break 'outer;
                }
            }
        }
        iterations += 1;
    }
    info!(iterations, "playback finished");
}

/// Execute one action item. An item runs to completion even when the stop
/// flag is raised mid-hold, so pressed keys and modifiers are always paired
/// with their release; cancellation only skips whole items and repeats.
fn run_action(
    injector: &mut dyn InputInjector,
    action: &ActionSpec,
    cancel: &AtomicBool,
    speed: f64,
) -> Result<(), EngineError> {
    let repeats = action.repeat_count.max(1);
    for rep in 0..repeats {
        if rep > 0 && cancel.load(Ordering::SeqCst) {
            return Ok(());
        }
        debug!(input = %action.input, phase = ?action.phase, rep, "executing action");

        if action.input.is_scroll() {
            injector.scroll(&action.input)?;
            if action.hold_seconds > 0.0 {
                sleep_cancellable(action.hold_seconds / speed, cancel);
            }
            continue;
        }

        match action.phase {
            KeyPhase::Press => {
                let modifiers = action.modifiers.to_vec();
                for m in &modifiers {
                    injector.press(&InputId::from(*m))?;
                }
                injector.press(&action.input)?;
                if action.hold_seconds > 0.0 {
                    sleep_cancellable(action.hold_seconds / speed, cancel);
                    injector.release(&action.input)?;
                }
                for m in modifiers.iter().rev() {
                    injector.release(&InputId::from(*m))?;
                }
            }
            KeyPhase::Release => {
                injector.release(&action.input)?;
            }
        }
    }
    Ok(())
}

/// Sleep in short slices, re-checking the stop flag each slice.
/// Returns false if cancelled before the duration elapsed.
fn sleep_cancellable(seconds: f64, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + Duration::from_secs_f64(seconds);
    loop {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(CANCEL_POLL));
    }
}

/// enigo-backed injector; one instance per playback run
pub struct EnigoInjector {
    enigo: Enigo,
}

impl EnigoInjector {
    pub fn new() -> Result<Self, EngineError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| EngineError::Injection(format!("enigo init: {e}")))?;
        Ok(Self { enigo })
    }

    fn apply(&mut self, input: &InputId, direction: enigo::Direction) -> Result<(), EngineError> {
        if let Some(button) = button_for(input) {
            self.enigo
                .button(button, direction)
                .map_err(|e| EngineError::Injection(format!("button {input}: {e}")))
        } else {
            let key = key_for(input);
            self.enigo
                .key(key, direction)
                .map_err(|e| EngineError::Injection(format!("key {input}: {e}")))
        }
    }
}

impl InputInjector for EnigoInjector {
    fn press(&mut self, input: &InputId) -> Result<(), EngineError> {
        self.apply(input, Press)
    }

    fn release(&mut self, input: &InputId) -> Result<(), EngineError> {
        self.apply(input, Release)
    }

    fn scroll(&mut self, input: &InputId) -> Result<(), EngineError> {
        let step = if input.as_str() == "scroll_up" { -1 } else { 1 };
        self.enigo
            .scroll(step, enigo::Axis::Vertical)
            .map_err(|e| EngineError::Injection(format!("scroll {input}: {e}")))
    }
}

fn button_for(input: &InputId) -> Option<enigo::Button> {
    match input.as_str() {
        "mouse_left" => Some(enigo::Button::Left),
        "mouse_right" => Some(enigo::Button::Right),
        "mouse_middle" => Some(enigo::Button::Middle),
        "mouse_x1" => Some(enigo::Button::Back),
        "mouse_x2" => Some(enigo::Button::Forward),
        _ => None,
    }
}

fn key_for(input: &InputId) -> enigo::Key {
    use enigo::Key;
    match input.as_str() {
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "space" => Key::Space,
        "enter" => Key::Return,
        "esc" => Key::Escape,
        "tab" => Key::Tab,
        "backspace" => Key::Backspace,
        "delete" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "page_up" => Key::PageUp,
        "page_down" => Key::PageDown,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "shift" => Key::Shift,
        "ctrl" => Key::Control,
        "alt" => Key::Alt,
        "meta" => Key::Meta,
        "caps_lock" => Key::CapsLock,
        other => {
            // Single characters and anything unrecognized go through the
            // unicode path, matching how they were recorded
            let ch = other.chars().next().unwrap_or(' ');
            Key::Unicode(ch)
        }
    }
}
