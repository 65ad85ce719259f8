pub mod ai;
pub mod config;
pub mod controller;
pub mod error;
pub mod hotkey;
pub mod orchestrator;
pub mod state;
pub mod transcript;

// Re-export main types for convenience
pub use ai::{CompletionClient, OpenAIClient};
pub use config::Config;
pub use controller::{PopupController, PopupPhase};
pub use error::{Error, Result};
pub use hotkey::{Dispatch, HotkeyBridge, HotkeySpec, InputFocus};
pub use orchestrator::{RequestHandle, RequestOrchestrator};
pub use state::{AppState, ChatRole, ChatTurn, DisplayLine, HotkeyStatus, Speaker, Visibility};
pub use transcript::TranscriptStore;
