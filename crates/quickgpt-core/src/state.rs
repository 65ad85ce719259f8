//! UI-agnostic application state types
//!
//! These types are shared between the controller and whatever surface renders
//! the popup, and don't depend on any specific UI framework.

use serde::{Deserialize, Serialize};

/// Placeholder shown while a request is in flight. Never persisted.
pub const WORKING_PLACEHOLDER: &str = "Thinking…";

/// One role-tagged message of the conversation sent upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    System,
    You,
    Assistant,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::System => "System",
            Speaker::You => "You",
            Speaker::Assistant => "Assistant",
        }
    }
}

impl From<ChatRole> for Speaker {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::System => Speaker::System,
            ChatRole::User => Speaker::You,
            ChatRole::Assistant => Speaker::Assistant,
        }
    }
}

/// A rendered transcript entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub speaker: Speaker,
    pub text: String,
    /// Display-only notice that is retracted once a real result arrives
    pub ephemeral: bool,
}

impl DisplayLine {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self { speaker, text: text.into(), ephemeral: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Hidden,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HotkeyStatus {
    NativeRegistered,
    FallbackRegistered,
    #[default]
    Unregistered,
}

impl HotkeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HotkeyStatus::NativeRegistered => "native",
            HotkeyStatus::FallbackRegistered => "fallback",
            HotkeyStatus::Unregistered => "off",
        }
    }
}

/// Process-wide popup state, owned by the controller.
///
/// The selected model is not a field here: it lives with the transcript store
/// because it is persisted alongside the history. Read it through
/// [`PopupController::model`](crate::controller::PopupController::model).
#[derive(Debug, Clone)]
pub struct AppState {
    pub visibility: Visibility,
    pub working: bool,
    pub show_system_lines: bool,
    pub hotkey_status: HotkeyStatus,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            visibility: Visibility::Hidden,
            working: false,
            show_system_lines: true,
            hotkey_status: HotkeyStatus::Unregistered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_turn_serializes_lowercase_role() {
        let json = serde_json::to_string(&ChatTurn::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let parsed: Result<ChatTurn, _> = serde_json::from_str(r#"{"role":"tool","content":"x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_speaker_from_role() {
        assert_eq!(Speaker::from(ChatRole::User), Speaker::You);
        assert_eq!(Speaker::from(ChatRole::Assistant).label(), "Assistant");
    }
}
