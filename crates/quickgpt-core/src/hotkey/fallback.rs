//! User-space keyboard hook used when the OS refuses a native registration.
//!
//! `rdev::listen` cannot be stopped once started, so the listener thread is
//! spawned once and stays alive; registering and unregistering only swap the
//! shortcut it is watching for.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use rdev::{EventType, Key};

use super::{BaseKey, EventSender, HotkeySource, HotkeySpec, Modifiers, RawHotkeyEvent};

/// How long to wait for `rdev::listen` to fail before assuming the hook is live
const STARTUP_GRACE: Duration = Duration::from_millis(250);

const LETTER_KEYS: [Key; 26] = [
    Key::KeyA, Key::KeyB, Key::KeyC, Key::KeyD, Key::KeyE, Key::KeyF, Key::KeyG,
    Key::KeyH, Key::KeyI, Key::KeyJ, Key::KeyK, Key::KeyL, Key::KeyM, Key::KeyN,
    Key::KeyO, Key::KeyP, Key::KeyQ, Key::KeyR, Key::KeyS, Key::KeyT, Key::KeyU,
    Key::KeyV, Key::KeyW, Key::KeyX, Key::KeyY, Key::KeyZ,
];

const DIGIT_KEYS: [Key; 10] = [
    Key::Num0, Key::Num1, Key::Num2, Key::Num3, Key::Num4,
    Key::Num5, Key::Num6, Key::Num7, Key::Num8, Key::Num9,
];

// rdev only knows F1-F12
const FUNCTION_KEYS: [Key; 12] = [
    Key::F1, Key::F2, Key::F3, Key::F4, Key::F5, Key::F6,
    Key::F7, Key::F8, Key::F9, Key::F10, Key::F11, Key::F12,
];

fn hook_key(key: BaseKey) -> Option<Key> {
    match key {
        BaseKey::Letter(c) => LETTER_KEYS.get((c as usize).checked_sub('a' as usize)?).copied(),
        BaseKey::Digit(d) => DIGIT_KEYS.get(d as usize).copied(),
        BaseKey::Function(n) => FUNCTION_KEYS.get((n as usize).checked_sub(1)?).copied(),
        BaseKey::Space => Some(Key::Space),
        BaseKey::Tab => Some(Key::Tab),
        BaseKey::Escape => Some(Key::Escape),
        BaseKey::Enter => Some(Key::Return),
    }
}

fn modifier_of(key: Key) -> Option<Modifiers> {
    match key {
        Key::ControlLeft | Key::ControlRight => Some(Modifiers::CONTROL),
        Key::Alt | Key::AltGr => Some(Modifiers::ALT),
        Key::ShiftLeft | Key::ShiftRight => Some(Modifiers::SHIFT),
        Key::MetaLeft | Key::MetaRight => Some(Modifiers::META),
        _ => None,
    }
}

struct Target {
    spec: HotkeySpec,
    key: Key,
    events: EventSender,
}

/// Tracks held modifiers and reports presses matching the current target
struct HookState {
    held: Modifiers,
    target: Arc<Mutex<Option<Target>>>,
}

impl HookState {
    fn handle(&mut self, event_type: EventType) {
        match event_type {
            EventType::KeyPress(key) => {
                if let Some(flag) = modifier_of(key) {
                    self.held |= flag;
                    return;
                }
                let Ok(target) = self.target.lock() else {
                    return;
                };
                if let Some(target) = target.as_ref() {
                    if target.key == key && self.held == target.spec.modifiers {
                        let _ = target.events.send(RawHotkeyEvent {
                            modifiers: target.spec.modifiers,
                            key: target.spec.key,
                        });
                    }
                }
            }
            EventType::KeyRelease(key) => {
                if let Some(flag) = modifier_of(key) {
                    self.held.remove(flag);
                }
            }
            _ => {}
        }
    }
}

pub struct KeyboardHookSource {
    target: Arc<Mutex<Option<Target>>>,
    listening: bool,
}

impl KeyboardHookSource {
    pub fn new() -> Self {
        Self {
            target: Arc::new(Mutex::new(None)),
            listening: false,
        }
    }

    fn start_listener(&mut self) -> anyhow::Result<()> {
        if self.listening {
            return Ok(());
        }

        let (err_tx, err_rx) = mpsc::channel();
        let mut state = HookState {
            held: Modifiers::NONE,
            target: self.target.clone(),
        };
        thread::Builder::new()
            .name("quickgpt-keyboard-hook".into())
            .spawn(move || {
                if let Err(e) = rdev::listen(move |event| state.handle(event.event_type)) {
                    let _ = err_tx.send(format!("{e:?}"));
                }
            })?;

        match err_rx.recv_timeout(STARTUP_GRACE) {
            Ok(e) => Err(anyhow!("keyboard hook failed to start: {e}")),
            Err(_) => {
                self.listening = true;
                Ok(())
            }
        }
    }
}

impl Default for KeyboardHookSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HotkeySource for KeyboardHookSource {
    fn name(&self) -> &'static str {
        "keyboard-hook"
    }

    fn register(&mut self, spec: &HotkeySpec, events: EventSender) -> anyhow::Result<()> {
        let key = hook_key(spec.key)
            .ok_or_else(|| anyhow!("key '{}' is not supported by the keyboard hook", spec.key))?;
        self.start_listener()?;

        let mut target = self.target.lock().map_err(|_| anyhow!("keyboard hook state poisoned"))?;
        *target = Some(Target { spec: *spec, key, events });
        Ok(())
    }

    fn unregister(&mut self) {
        if let Ok(mut target) = self.target.lock() {
            target.take();
        }
    }
}
