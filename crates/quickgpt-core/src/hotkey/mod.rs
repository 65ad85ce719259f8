//! Global hotkey bridge
//!
//! A [`HotkeySource`] is one way of getting a system-wide shortcut out of the
//! operating system. The bridge tries the native source first and the
//! keyboard-hook fallback second, and turns whatever the winning source
//! reports into toggle requests for the interaction thread.

pub mod native;
#[cfg(feature = "keyboard-hook")]
pub mod fallback;
pub mod spec;

use crossbeam_channel::{Receiver, Sender};

use crate::error::{Error, Result};
use crate::state::HotkeyStatus;

pub use native::NativeHotkeySource;
pub use spec::{BaseKey, HotkeySpec, Modifiers};

/// Key press reported by a source once it matched the registered shortcut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHotkeyEvent {
    pub modifiers: Modifiers,
    pub key: BaseKey,
}

pub type EventSender = Sender<RawHotkeyEvent>;

/// One OS-level path for delivering a global shortcut.
///
/// Sources only forward key presses of the registered shortcut; releases and
/// unrelated keys never reach the channel.
pub trait HotkeySource {
    fn name(&self) -> &'static str;

    fn register(&mut self, spec: &HotkeySpec, events: EventSender) -> anyhow::Result<()>;

    /// Must be safe to call repeatedly and without a prior registration
    fn unregister(&mut self);
}

/// What the popup currently has focused, used to guard typing keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputFocus {
    pub popup_visible: bool,
    pub text_entry_focused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Toggle(RawHotkeyEvent),
    /// A bare Enter/Space fired while the user was typing in the popup
    Suppressed(RawHotkeyEvent),
}

pub struct HotkeyBridge {
    native: Box<dyn HotkeySource>,
    fallback: Option<Box<dyn HotkeySource>>,
    status: HotkeyStatus,
    spec: Option<HotkeySpec>,
    notes: Vec<String>,
    tx: EventSender,
    rx: Receiver<RawHotkeyEvent>,
}

impl HotkeyBridge {
    pub fn new(native: Box<dyn HotkeySource>, fallback: Option<Box<dyn HotkeySource>>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            native,
            fallback,
            status: HotkeyStatus::Unregistered,
            spec: None,
            notes: Vec::new(),
            tx,
            rx,
        }
    }

    /// Native `global-hotkey` source plus the keyboard hook when compiled in
    pub fn with_platform_sources() -> Self {
        #[cfg(feature = "keyboard-hook")]
        let fallback: Option<Box<dyn HotkeySource>> =
            Some(Box::new(fallback::KeyboardHookSource::new()));
        #[cfg(not(feature = "keyboard-hook"))]
        let fallback: Option<Box<dyn HotkeySource>> = None;

        Self::new(Box::new(NativeHotkeySource::new()), fallback)
    }

    pub fn status(&self) -> HotkeyStatus {
        self.status
    }

    pub fn spec(&self) -> Option<&HotkeySpec> {
        self.spec.as_ref()
    }

    /// Non-fatal notes from the last registration attempt (e.g. the native
    /// failure that made us fall back)
    pub fn take_notes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notes)
    }

    pub fn register(&mut self, spec: &str) -> Result<HotkeyStatus> {
        self.unregister();
        self.notes.clear();

        let parsed = HotkeySpec::parse(spec)?;

        match self.native.register(&parsed, self.tx.clone()) {
            Ok(()) => {
                tracing::info!(hotkey = %parsed, source = self.native.name(), "global hotkey registered");
                return Ok(self.activate(parsed, HotkeyStatus::NativeRegistered));
            }
            Err(e) => {
                tracing::warn!(hotkey = %parsed, "native hotkey failed: {e:#}");
                self.notes.push(format!("Native hotkey failed ({e}). Will try fallback library."));
            }
        }

        let attempt = self
            .fallback
            .as_mut()
            .map(|fallback| (fallback.name(), fallback.register(&parsed, self.tx.clone())));

        let reason = match attempt {
            Some((name, Ok(()))) => {
                tracing::info!(hotkey = %parsed, source = name, "global hotkey registered");
                return Ok(self.activate(parsed, HotkeyStatus::FallbackRegistered));
            }
            Some((_, Err(e))) => {
                format!("{e}. Try running with more privileges or pick another shortcut")
            }
            None => "no keyboard hook library is available; global hotkey disabled".to_string(),
        };

        tracing::warn!(hotkey = %parsed, "{reason}");
        Err(Error::HotkeyRegistrationFailed { spec: spec.to_string(), reason })
    }

    fn activate(&mut self, spec: HotkeySpec, status: HotkeyStatus) -> HotkeyStatus {
        self.spec = Some(spec);
        self.status = status;
        status
    }

    /// Drain pending OS events and decide which of them become toggles
    pub fn poll(&self, focus: InputFocus) -> Vec<Dispatch> {
        self.rx.try_iter().map(|event| Self::dispatch(event, focus)).collect()
    }

    fn dispatch(event: RawHotkeyEvent, focus: InputFocus) -> Dispatch {
        let typing = focus.popup_visible && focus.text_entry_focused;
        if typing && event.modifiers.is_empty() && event.key.is_typing_key() {
            tracing::debug!(key = %event.key, "ignored hotkey while typing");
            Dispatch::Suppressed(event)
        } else {
            Dispatch::Toggle(event)
        }
    }

    pub fn unregister(&mut self) {
        match self.status {
            HotkeyStatus::NativeRegistered => self.native.unregister(),
            HotkeyStatus::FallbackRegistered => {
                if let Some(fallback) = self.fallback.as_mut() {
                    fallback.unregister();
                }
            }
            HotkeyStatus::Unregistered => return,
        }
        tracing::info!("global hotkey unregistered");
        self.status = HotkeyStatus::Unregistered;
        self.spec = None;
        // Anything still queued belongs to the old registration
        while self.rx.try_recv().is_ok() {}
    }
}

impl Drop for HotkeyBridge {
    fn drop(&mut self) {
        self.unregister();
    }
}
