//! The popup state machine.
//!
//! ```text
//! Hidden ──toggle──▶ VisibleIdle ──submit──▶ VisibleWorking
//!    ▲                  │    ▲                     │
//!    └──────toggle──────┘    └──success/failure────┘
//! ```
//!
//! A toggle while working is ignored, so the popup cannot be hidden with a
//! request in flight. All mutation happens on the interaction thread; the
//! request itself runs on a background task and is collected by polling.

use crate::error::{Error, Result};
use crate::hotkey::{Dispatch, HotkeyBridge};
use crate::orchestrator::{RequestHandle, RequestOrchestrator, UPSTREAM_WINDOW};
use crate::state::{AppState, DisplayLine, HotkeyStatus, Visibility, WORKING_PLACEHOLDER};
use crate::transcript::TranscriptStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupPhase {
    Hidden,
    VisibleIdle,
    VisibleWorking,
}

pub struct PopupController {
    state: AppState,
    store: TranscriptStore,
    orchestrator: RequestOrchestrator,
    in_flight: Option<RequestHandle>,
    models: Vec<String>,
    debug: bool,
    dirty: bool,
}

impl PopupController {
    pub fn new(
        store: TranscriptStore,
        orchestrator: RequestOrchestrator,
        models: Vec<String>,
        debug: bool,
    ) -> Self {
        let mut controller = Self {
            state: AppState::default(),
            store,
            orchestrator,
            in_flight: None,
            models,
            debug,
            dirty: true,
        };
        controller.remember_model();
        controller
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    pub fn phase(&self) -> PopupPhase {
        match (self.state.visibility, self.state.working) {
            (Visibility::Hidden, _) => PopupPhase::Hidden,
            (Visibility::Visible, false) => PopupPhase::VisibleIdle,
            (Visibility::Visible, true) => PopupPhase::VisibleWorking,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state.visibility == Visibility::Visible
    }

    pub fn is_working(&self) -> bool {
        self.state.working
    }

    pub fn model(&self) -> &str {
        self.store.model()
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn visible_lines(&self) -> impl Iterator<Item = &DisplayLine> {
        self.store.visible_lines(self.state.show_system_lines)
    }

    /// Re-render signal for the view; reading it resets it
    pub fn take_render_request(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn debug_line(&mut self, text: impl AsRef<str>) {
        if self.debug {
            self.store.append_system(format!("[debug] {}", text.as_ref()), false);
            self.dirty = true;
        }
    }

    pub fn toggle(&mut self) -> bool {
        match self.phase() {
            PopupPhase::Hidden => self.state.visibility = Visibility::Visible,
            PopupPhase::VisibleIdle => self.state.visibility = Visibility::Hidden,
            PopupPhase::VisibleWorking => {
                self.debug_line("Toggle blocked while working");
                return false;
            }
        }
        self.dirty = true;
        true
    }

    /// Close button / Esc. Same rules as a toggle from the visible side.
    pub fn hide(&mut self) -> bool {
        self.is_visible() && self.toggle()
    }

    pub fn show(&mut self) -> bool {
        !self.is_visible() && self.toggle()
    }

    pub fn register_hotkey(&mut self, bridge: &mut HotkeyBridge, spec: &str) -> HotkeyStatus {
        let result = bridge.register(spec);
        for note in bridge.take_notes() {
            self.store.append_system(note, false);
        }

        let line = match &result {
            Ok(status) => format!("Global hotkey registered ({}): {spec}", status.as_str()),
            Err(Error::InvalidHotkeySpec(_)) => {
                format!("Invalid hotkey '{spec}'. Example: ctrl+alt+space or ctrl+shift+g")
            }
            Err(e) => e.to_string(),
        };
        self.store.append_system(line, false);

        self.state.hotkey_status = bridge.status();
        self.dirty = true;
        self.state.hotkey_status
    }

    pub fn handle_hotkey(&mut self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Suppressed(_) => {
                self.debug_line("Ignored hotkey while typing (bare Enter/Space)");
            }
            Dispatch::Toggle(event) => {
                self.debug_line(format!("Hotkey fired: modifiers={} key={}", event.modifiers.bits(), event.key));
                self.toggle();
            }
        }
    }

    /// Accepted only while visible and idle. Returns whether a request started.
    pub fn submit(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || self.phase() != PopupPhase::VisibleIdle {
            return false;
        }

        if self.debug {
            let preview: String = text.chars().take(60).collect();
            self.debug_line(format!("Submit: {preview}"));
        }

        self.store.append_user(text);
        self.store.append_system(WORKING_PLACEHOLDER, true);
        self.state.working = true;

        let turns = self.store.recent_for_upstream(UPSTREAM_WINDOW);
        self.in_flight = Some(self.orchestrator.start(turns, self.store.model()));
        self.dirty = true;
        true
    }

    /// Collect the outcome of the in-flight request if it has arrived
    pub fn poll_request(&mut self) -> bool {
        let outcome = match self.in_flight.as_mut() {
            Some(handle) => handle.try_finish(),
            None => return false,
        };
        match outcome {
            Some(result) => {
                self.finish_request(result);
                true
            }
            None => false,
        }
    }

    /// Wait for the in-flight request, if any, and apply its outcome
    pub async fn wait_request(&mut self) -> bool {
        let Some(handle) = self.in_flight.as_mut() else {
            return false;
        };
        let result = handle.finish().await;
        self.finish_request(result);
        true
    }

    fn finish_request(&mut self, result: Result<String>) {
        // Dropping the handle releases the background task
        self.in_flight = None;
        self.state.working = false;
        self.store.remove_last_ephemeral_system();

        match result {
            Ok(reply) => self.store.append_assistant(reply),
            Err(e) => {
                tracing::warn!("completion failed: {e}");
                self.store.append_system(format!("Error: {e}"), false);
            }
        }
        self.dirty = true;
    }

    /// Not accepted while a request is in flight
    pub fn clear_history(&mut self) -> bool {
        if self.state.working {
            return false;
        }
        self.store.clear();
        tracing::info!("history cleared");
        self.dirty = true;
        true
    }

    /// Takes effect on the next submit
    pub fn change_model(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() || name == self.store.model() {
            return;
        }
        self.store.set_model(name);
        self.remember_model();
        self.dirty = true;
    }

    pub fn cycle_model(&mut self) {
        if self.models.is_empty() {
            return;
        }
        let current = self.models.iter().position(|m| m == self.store.model());
        let next = current.map_or(0, |i| (i + 1) % self.models.len());
        let name = self.models[next].clone();
        self.change_model(&name);
    }

    fn remember_model(&mut self) {
        let model = self.store.model();
        if !self.models.iter().any(|m| m == model) {
            self.models.insert(0, model.to_string());
        }
    }

    pub fn toggle_system_visibility(&mut self) {
        self.state.show_system_lines = !self.state.show_system_lines;
        self.dirty = true;
    }
}
