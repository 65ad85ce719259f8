//! OS-native global hotkey registration via the `global-hotkey` crate

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::anyhow;
use crossbeam_channel::{Receiver, Sender};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers as NativeModifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};

use super::{BaseKey, EventSender, HotkeySource, HotkeySpec, Modifiers, RawHotkeyEvent};

const LETTER_CODES: [Code; 26] = [
    Code::KeyA, Code::KeyB, Code::KeyC, Code::KeyD, Code::KeyE, Code::KeyF, Code::KeyG,
    Code::KeyH, Code::KeyI, Code::KeyJ, Code::KeyK, Code::KeyL, Code::KeyM, Code::KeyN,
    Code::KeyO, Code::KeyP, Code::KeyQ, Code::KeyR, Code::KeyS, Code::KeyT, Code::KeyU,
    Code::KeyV, Code::KeyW, Code::KeyX, Code::KeyY, Code::KeyZ,
];

const DIGIT_CODES: [Code; 10] = [
    Code::Digit0, Code::Digit1, Code::Digit2, Code::Digit3, Code::Digit4,
    Code::Digit5, Code::Digit6, Code::Digit7, Code::Digit8, Code::Digit9,
];

const FUNCTION_CODES: [Code; 24] = [
    Code::F1, Code::F2, Code::F3, Code::F4, Code::F5, Code::F6, Code::F7, Code::F8,
    Code::F9, Code::F10, Code::F11, Code::F12, Code::F13, Code::F14, Code::F15, Code::F16,
    Code::F17, Code::F18, Code::F19, Code::F20, Code::F21, Code::F22, Code::F23, Code::F24,
];

fn native_code(key: BaseKey) -> Option<Code> {
    match key {
        BaseKey::Letter(c) => LETTER_CODES.get((c as usize).checked_sub('a' as usize)?).copied(),
        BaseKey::Digit(d) => DIGIT_CODES.get(d as usize).copied(),
        BaseKey::Function(n) => FUNCTION_CODES.get((n as usize).checked_sub(1)?).copied(),
        BaseKey::Space => Some(Code::Space),
        BaseKey::Tab => Some(Code::Tab),
        BaseKey::Escape => Some(Code::Escape),
        BaseKey::Enter => Some(Code::Enter),
    }
}

fn native_modifiers(modifiers: Modifiers) -> Option<NativeModifiers> {
    if modifiers.is_empty() {
        return None;
    }
    let mut native = NativeModifiers::empty();
    if modifiers.contains(Modifiers::CONTROL) {
        native |= NativeModifiers::CONTROL;
    }
    if modifiers.contains(Modifiers::ALT) {
        native |= NativeModifiers::ALT;
    }
    if modifiers.contains(Modifiers::SHIFT) {
        native |= NativeModifiers::SHIFT;
    }
    if modifiers.contains(Modifiers::META) {
        native |= NativeModifiers::META;
    }
    Some(native)
}

/// Sleep between message pumps on the hotkey thread
const PUMP_INTERVAL: Duration = Duration::from_millis(10);

/// How long registration waits for the hotkey thread to report back
const REGISTER_TIMEOUT: Duration = Duration::from_secs(2);

/// Dispatch pending window messages for this thread. The Windows manager
/// delivers hotkeys through a hidden window owned by the thread that created it.
#[cfg(windows)]
fn pump_messages() {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
    };

    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).into() {
            let _ = TranslateMessage(&msg);
            let _ = DispatchMessageW(&msg);
        }
    }
}

/// On Linux the manager runs its own X11 thread
#[cfg(not(windows))]
fn pump_messages() {}

/// Forward presses of `id` from the crate's event queue; releases are dropped
fn forward_presses(
    queue: &Receiver<GlobalHotKeyEvent>,
    id: u32,
    spec: &HotkeySpec,
    events: &EventSender,
) {
    while let Ok(event) = queue.try_recv() {
        if event.id == id && event.state == HotKeyState::Pressed {
            let _ = events.send(RawHotkeyEvent { modifiers: spec.modifiers, key: spec.key });
        }
    }
}

fn pump_until_stopped(stop: &AtomicBool, mut step: impl FnMut()) {
    while !stop.load(Ordering::Acquire) {
        pump_messages();
        step();
        thread::sleep(PUMP_INTERVAL);
    }
}

/// Body of the hotkey thread: owns the manager for its whole life
fn run_hotkey_thread(
    hotkey: HotKey,
    spec: HotkeySpec,
    events: EventSender,
    ready: Sender<Result<(), String>>,
    stop: Arc<AtomicBool>,
) {
    let manager = match GlobalHotKeyManager::new() {
        Ok(manager) => manager,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };
    if let Err(e) = manager.register(hotkey) {
        let _ = ready.send(Err(e.to_string()));
        return;
    }
    let _ = ready.send(Ok(()));

    let queue = GlobalHotKeyEvent::receiver();
    pump_until_stopped(&stop, || forward_presses(queue, hotkey.id(), &spec, &events));

    if let Err(e) = manager.unregister(hotkey) {
        tracing::warn!("failed to unregister native hotkey: {e}");
    }
}

struct HotkeyThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Registers the shortcut with the OS hotkey facility.
///
/// The manager lives on a dedicated thread that pumps its messages, since the
/// interaction thread only waits on terminal events. macOS needs the process
/// main-thread event loop, which a terminal app does not run, so registration
/// fails there and the bridge moves on to the fallback.
#[derive(Default)]
pub struct NativeHotkeySource {
    thread: Option<HotkeyThread>,
}

impl NativeHotkeySource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HotkeySource for NativeHotkeySource {
    fn name(&self) -> &'static str {
        "native"
    }

    fn register(&mut self, spec: &HotkeySpec, events: EventSender) -> anyhow::Result<()> {
        if cfg!(target_os = "macos") {
            return Err(anyhow!("native hotkeys need an application event loop on macOS"));
        }

        let code = native_code(spec.key)
            .ok_or_else(|| anyhow!("key '{}' has no native key code", spec.key))?;
        let hotkey = HotKey::new(native_modifiers(spec.modifiers), code);

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new()
            .name("quickgpt-hotkey".to_string())
            .spawn({
                let spec = *spec;
                let stop = stop.clone();
                move || run_hotkey_thread(hotkey, spec, events, ready_tx, stop)
            })?;

        match ready_rx.recv_timeout(REGISTER_TIMEOUT) {
            Ok(Ok(())) => {
                self.thread = Some(HotkeyThread { stop, handle });
                Ok(())
            }
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(anyhow!(reason))
            }
            Err(_) => {
                // Left detached; it exits on its own once it sees the flag
                stop.store(true, Ordering::Release);
                Err(anyhow!("hotkey thread did not report back"))
            }
        }
    }

    fn unregister(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        thread.stop.store(true, Ordering::Release);
        if thread.handle.join().is_err() {
            tracing::warn!("native hotkey thread panicked");
        }
    }
}

impl Drop for NativeHotkeySource {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_parsable_key_has_a_native_code() {
        for token in ["a", "z", "0", "9", "f1", "f24", "space", "tab", "esc", "enter"] {
            let spec = HotkeySpec::parse(token).unwrap();
            assert!(native_code(spec.key).is_some(), "no code for {token}");
        }
        assert_eq!(native_code(BaseKey::Letter('g')), Some(Code::KeyG));
        assert_eq!(native_code(BaseKey::Function(13)), Some(Code::F13));
    }

    #[test]
    fn test_modifier_translation() {
        assert_eq!(native_modifiers(Modifiers::NONE), None);
        let native = native_modifiers(Modifiers::CONTROL | Modifiers::ALT).unwrap();
        assert_eq!(native, NativeModifiers::CONTROL | NativeModifiers::ALT);
    }

    #[test]
    fn test_unregister_without_registration_is_noop() {
        let mut source = NativeHotkeySource::new();
        source.unregister();
        source.unregister();
    }

    fn event(id: u32, state: HotKeyState) -> GlobalHotKeyEvent {
        GlobalHotKeyEvent { id, state }
    }

    #[test]
    fn test_forward_presses_keeps_only_our_presses() {
        let spec = HotkeySpec::parse("ctrl+alt+space").unwrap();
        let (queue_tx, queue) = crossbeam_channel::unbounded();
        let (events, raw) = crossbeam_channel::unbounded();

        queue_tx.send(event(7, HotKeyState::Pressed)).unwrap();
        queue_tx.send(event(7, HotKeyState::Released)).unwrap();
        queue_tx.send(event(8, HotKeyState::Pressed)).unwrap();
        queue_tx.send(event(7, HotKeyState::Pressed)).unwrap();
        forward_presses(&queue, 7, &spec, &events);

        let forwarded: Vec<RawHotkeyEvent> = raw.try_iter().collect();
        assert_eq!(forwarded.len(), 2);
        assert!(forwarded.iter().all(|e| e.key == BaseKey::Space && e.modifiers == spec.modifiers));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pump_loop_runs_until_stopped_from_another_thread() {
        let stop = Arc::new(AtomicBool::new(false));
        let (steps_tx, steps) = crossbeam_channel::unbounded();

        let worker = thread::spawn({
            let stop = stop.clone();
            move || pump_until_stopped(&stop, || steps_tx.send(()).unwrap())
        });

        // The loop keeps stepping on its own thread until told to stop
        for _ in 0..3 {
            steps.recv_timeout(Duration::from_secs(2)).unwrap();
        }
        stop.store(true, Ordering::Release);
        worker.join().unwrap();
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_macos_declines_so_the_fallback_is_tried() {
        let mut source = NativeHotkeySource::new();
        let (events, _raw) = crossbeam_channel::unbounded();
        let spec = HotkeySpec::parse("ctrl+alt+space").unwrap();
        assert!(source.register(&spec, events).is_err());
    }
}
