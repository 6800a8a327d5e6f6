//! Global Input Hook
//!
//! One OS-level listener shared by the recorder and the trigger watcher.
//! The hook is modeled as a single owned resource with an explicit
//! install/release lifecycle; events flow out over a crossbeam channel and
//! the controller decides which consumer they reach.
//!
//! The default backend is rdev. An rdev listener thread cannot be torn
//! down once started, so `release()` gates delivery with an atomic instead:
//! after release the thread keeps running but drops every event.

use crate::input::{InputId, KeyPhase};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// One raw input occurrence seen by the global hook
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub input: InputId,
    pub phase: KeyPhase,
}

impl InputEvent {
    pub fn press(input: InputId) -> Self {
        Self {
            input,
            phase: KeyPhase::Press,
        }
    }

    pub fn release(input: InputId) -> Self {
        Self {
            input,
            phase: KeyPhase::Release,
        }
    }
}

/// Message from the hook thread
#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    Input(InputEvent),
    /// The listener could not be installed; sent once, then the thread ends
    Unavailable(String),
}

/// Backend seam so tests can drive the pipeline without an OS hook
pub trait HookBackend: Send + 'static {
    /// Run the listener, sending events for as long as `active` holds.
    /// Blocks for the lifetime of the hook.
    fn listen(self: Box<Self>, tx: Sender<HookEvent>, active: Arc<AtomicBool>);
}

/// The single owned global-hook resource
pub struct InputHookHandle {
    rx: Receiver<HookEvent>,
    active: Arc<AtomicBool>,
    _thread: Option<JoinHandle<()>>,
}

impl InputHookHandle {
    /// Install the hook on a dedicated listener thread
    pub fn install(backend: Box<dyn HookBackend>) -> Self {
        let (tx, rx) = unbounded();
        let active = Arc::new(AtomicBool::new(true));
        let thread_active = Arc::clone(&active);
        let thread = thread::Builder::new()
            .name("input-hook".into())
            .spawn(move || {
                info!("input hook listener thread started");
                backend.listen(tx, thread_active);
                info!("input hook listener thread ended");
            })
            .ok();
        Self {
            rx,
            active,
            _thread: thread,
        }
    }

    /// Receiver for the hook's event stream
    pub fn events(&self) -> &Receiver<HookEvent> {
        &self.rx
    }

    /// Stop event delivery. Idempotent; the listener thread may outlive the
    /// handle but sends nothing further.
    pub fn release(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for InputHookHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// rdev-backed global listener for keyboard and mouse
pub struct RdevBackend;

impl HookBackend for RdevBackend {
    fn listen(self: Box<Self>, tx: Sender<HookEvent>, active: Arc<AtomicBool>) {
        let cb_tx = tx.clone();
        let result = rdev::listen(move |event| {
            if !active.load(Ordering::SeqCst) {
                return;
            }
            if let Some(input_event) = convert(&event.event_type) {
                debug!(?input_event, "hook event");
                let _ = cb_tx.send(HookEvent::Input(input_event));
            }
        });
        if let Err(e) = result {
            error!("failed to install global input listener: {e:?}");
            let _ = tx.send(HookEvent::Unavailable(format!("{e:?}")));
        }
    }
}

/// Map an rdev event to the engine's input model. Mouse moves are ignored;
/// each wheel notch becomes a press of `scroll_up`/`scroll_down`.
fn convert(event_type: &rdev::EventType) -> Option<InputEvent> {
    use rdev::EventType;
    match event_type {
        EventType::KeyPress(key) => Some(InputEvent::press(key_to_input(*key))),
        EventType::KeyRelease(key) => Some(InputEvent::release(key_to_input(*key))),
        EventType::ButtonPress(button) => Some(InputEvent::press(button_to_input(*button))),
        EventType::ButtonRelease(button) => Some(InputEvent::release(button_to_input(*button))),
        EventType::Wheel { delta_y, .. } => {
            let id = if *delta_y < 0 { "scroll_down" } else { "scroll_up" };
            Some(InputEvent::press(InputId::new(id)))
        }
        EventType::MouseMove { .. } => None,
    }
}

fn button_to_input(button: rdev::Button) -> InputId {
    use rdev::Button;
    match button {
        Button::Left => InputId::new("mouse_left"),
        Button::Right => InputId::new("mouse_right"),
        Button::Middle => InputId::new("mouse_middle"),
        // Side buttons arrive as raw codes; 1 and 2 are back/forward
        Button::Unknown(1) => InputId::new("mouse_x1"),
        Button::Unknown(2) => InputId::new("mouse_x2"),
        Button::Unknown(code) => InputId::new(format!("mouse_{code}")),
    }
}

/// Canonical name for an rdev key. Left/right modifier variants collapse
/// to one name so held-modifier tracking stays symmetric.
fn key_to_input(key: rdev::Key) -> InputId {
    use rdev::Key;
    let name: String = match key {
        Key::KeyA => "a".into(),
        Key::KeyB => "b".into(),
        Key::KeyC => "c".into(),
        Key::KeyD => "d".into(),
        Key::KeyE => "e".into(),
        Key::KeyF => "f".into(),
        Key::KeyG => "g".into(),
        Key::KeyH => "h".into(),
        Key::KeyI => "i".into(),
        Key::KeyJ => "j".into(),
        Key::KeyK => "k".into(),
        Key::KeyL => "l".into(),
        Key::KeyM => "m".into(),
        Key::KeyN => "n".into(),
        Key::KeyO => "o".into(),
        Key::KeyP => "p".into(),
        Key::KeyQ => "q".into(),
        Key::KeyR => "r".into(),
        Key::KeyS => "s".into(),
        Key::KeyT => "t".into(),
        Key::KeyU => "u".into(),
        Key::KeyV => "v".into(),
        Key::KeyW => "w".into(),
        Key::KeyX => "x".into(),
        Key::KeyY => "y".into(),
        Key::KeyZ => "z".into(),
        Key::Num0 => "0".into(),
        Key::Num1 => "1".into(),
        Key::Num2 => "2".into(),
        Key::Num3 => "3".into(),
        Key::Num4 => "4".into(),
        Key::Num5 => "5".into(),
        Key::Num6 => "6".into(),
        Key::Num7 => "7".into(),
        Key::Num8 => "8".into(),
        Key::Num9 => "9".into(),
        Key::F1 => "f1".into(),
        Key::F2 => "f2".into(),
        Key::F3 => "f3".into(),
        Key::F4 => "f4".into(),
        Key::F5 => "f5".into(),
        Key::F6 => "f6".into(),
        Key::F7 => "f7".into(),
        Key::F8 => "f8".into(),
        Key::F9 => "f9".into(),
        Key::F10 => "f10".into(),
        Key::F11 => "f11".into(),
        Key::F12 => "f12".into(),
        Key::Space => "space".into(),
        Key::Return => "enter".into(),
        Key::Escape => "esc".into(),
        Key::Tab => "tab".into(),
        Key::Backspace => "backspace".into(),
        Key::Delete => "delete".into(),
        Key::Insert => "insert".into(),
        Key::Home => "home".into(),
        Key::End => "end".into(),
        Key::PageUp => "page_up".into(),
        Key::PageDown => "page_down".into(),
        Key::UpArrow => "up".into(),
        Key::DownArrow => "down".into(),
        Key::LeftArrow => "left".into(),
        Key::RightArrow => "right".into(),
        Key::ShiftLeft | Key::ShiftRight => "shift".into(),
        Key::ControlLeft | Key::ControlRight => "ctrl".into(),
        Key::Alt | Key::AltGr => "alt".into(),
        Key::MetaLeft | Key::MetaRight => "meta".into(),
        Key::CapsLock => "caps_lock".into(),
        Key::NumLock => "num_lock".into(),
        Key::ScrollLock => "scroll_lock".into(),
        Key::PrintScreen => "print_screen".into(),
        Key::Pause => "pause".into(),
        Key::Minus => "-".into(),
        Key::Equal => "=".into(),
        Key::LeftBracket => "[".into(),
        Key::RightBracket => "]".into(),
        Key::SemiColon => ";".into(),
        Key::Quote => "'".into(),
        Key::BackQuote => "`".into(),
        Key::BackSlash => "\\".into(),
        Key::IntlBackslash => "\\".into(),
        Key::Comma => ",".into(),
        Key::Dot => ".".into(),
        Key::Slash => "/".into(),
        Key::Kp0 => "num0".into(),
        Key::Kp1 => "num1".into(),
        Key::Kp2 => "num2".into(),
        Key::Kp3 => "num3".into(),
        Key::Kp4 => "num4".into(),
        Key::Kp5 => "num5".into(),
        Key::Kp6 => "num6".into(),
        Key::Kp7 => "num7".into(),
        Key::Kp8 => "num8".into(),
        Key::Kp9 => "num9".into(),
        Key::KpReturn => "num_enter".into(),
        Key::KpMinus => "num-".into(),
        Key::KpPlus => "num+".into(),
        Key::KpMultiply => "num*".into(),
        Key::KpDivide => "num/".into(),
        Key::KpDelete => "num_del".into(),
        Key::Function => "fn".into(),
        Key::Unknown(code) => format!("key{code}"),
    };
    InputId::new(name)
}
