//! Conversation history: the turns sent upstream, the lines shown on screen,
//! and the JSON file that keeps the former across restarts.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::state::{ChatRole, ChatTurn, DisplayLine, Speaker, WORKING_PLACEHOLDER};

/// Number of persisted turns echoed into the view on startup
const WARM_START_LINES: usize = 10;

#[derive(Serialize)]
struct HistoryRef<'a> {
    messages: &'a [ChatTurn],
    model: &'a str,
}

#[derive(Deserialize)]
struct HistoryFile {
    #[serde(default)]
    messages: Vec<ChatTurn>,
    model: Option<String>,
}

pub struct TranscriptStore {
    path: PathBuf,
    turns: Vec<ChatTurn>,
    lines: Vec<DisplayLine>,
    model: String,
    save_failing: bool,
}

impl TranscriptStore {
    pub fn new(path: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            turns: Vec::new(),
            lines: Vec::new(),
            model: model.into(),
            save_failing: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn lines(&self) -> &[DisplayLine] {
        &self.lines
    }

    /// Lines for the view, with System lines hidden when the filter is off
    pub fn visible_lines(&self, show_system: bool) -> impl Iterator<Item = &DisplayLine> {
        self.lines
            .iter()
            .filter(move |line| show_system || line.speaker != Speaker::System)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
        self.save();
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.push_turn(ChatTurn::user(text));
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.push_turn(ChatTurn::assistant(text));
    }

    fn push_turn(&mut self, turn: ChatTurn) {
        self.lines.push(DisplayLine::new(turn.role.into(), turn.content.clone()));
        self.turns.push(turn);
        self.save();
    }

    /// Display-only notice. Never persisted, never sent upstream.
    pub fn append_system(&mut self, text: impl Into<String>, ephemeral: bool) {
        self.lines.push(DisplayLine {
            speaker: Speaker::System,
            text: text.into(),
            ephemeral,
        });
    }

    /// Retract the most recent working placeholder, if any
    pub fn remove_last_ephemeral_system(&mut self) -> bool {
        let found = self.lines.iter().rposition(|line| {
            line.ephemeral && line.speaker == Speaker::System && line.text == WORKING_PLACEHOLDER
        });
        match found {
            Some(idx) => {
                self.lines.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.lines.clear();
        self.save();
    }

    /// Trailing window of turns for the next request, oldest first
    pub fn recent_for_upstream(&self, n: usize) -> &[ChatTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Restore history from disk. A missing file is a fresh start; an
    /// unreadable one degrades to an empty history with a visible notice.
    pub fn load(&mut self) {
        match self.read_history() {
            Ok(None) => {}
            Ok(Some(history)) => {
                self.turns = history.messages;
                if let Some(model) = history.model {
                    self.model = model;
                }
                let start = self.turns.len().saturating_sub(WARM_START_LINES);
                for turn in &self.turns[start..] {
                    if turn.role != ChatRole::System {
                        self.lines.push(DisplayLine::new(turn.role.into(), turn.content.clone()));
                    }
                }
                tracing::info!(turns = self.turns.len(), model = %self.model, "history loaded");
            }
            Err(e) => {
                tracing::warn!("{e}");
                self.turns.clear();
                self.append_system("History file was unreadable; starting with an empty history.", false);
            }
        }
    }

    fn read_history(&self) -> Result<Option<HistoryFile>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let read_failed = |reason: String| Error::PersistenceReadFailed {
            path: self.path.clone(),
            reason,
        };
        let content = fs::read_to_string(&self.path).map_err(|e| read_failed(e.to_string()))?;
        let history = serde_json::from_str(&content).map_err(|e| read_failed(e.to_string()))?;
        Ok(Some(history))
    }

    /// Best-effort write-through. Failures are logged and shown once per
    /// failure streak but never propagated.
    pub fn save(&mut self) {
        match self.write_history() {
            Ok(()) => self.save_failing = false,
            Err(e) => {
                tracing::warn!("{e}");
                if !self.save_failing {
                    self.save_failing = true;
                    self.append_system(format!("Could not save history: {e}"), false);
                }
            }
        }
    }

    fn write_history(&self) -> Result<()> {
        let write_failed = |source: std::io::Error| Error::PersistenceWriteFailed {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(write_failed)?;

        let body = serde_json::to_string_pretty(&HistoryRef {
            messages: &self.turns,
            model: &self.model,
        })
        .map_err(|e| write_failed(e.into()))?;

        // Write next to the target, then rename over it
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_failed)?;
        tmp.write_all(body.as_bytes()).map_err(write_failed)?;
        tmp.as_file().sync_all().map_err(write_failed)?;
        tmp.persist(&self.path).map_err(|e| write_failed(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store_in(dir: &tempfile::TempDir) -> TranscriptStore {
        TranscriptStore::new(dir.path().join("QuickGPT").join("history.json"), "gpt-5")
    }

    fn read_file(store: &TranscriptStore) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap()
    }

    #[test]
    fn test_append_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        store.append_user("x");
        store.append_assistant("y");

        assert_eq!(store.turns(), &[ChatTurn::user("x"), ChatTurn::assistant("y")]);
        let file = read_file(&store);
        assert_eq!(
            file,
            serde_json::json!({
                "messages": [
                    {"role": "user", "content": "x"},
                    {"role": "assistant", "content": "y"}
                ],
                "model": "gpt-5"
            })
        );
    }

    #[test]
    fn test_system_lines_are_display_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        store.append_user("hello");
        store.append_system("Global hotkey registered", false);
        store.append_system(WORKING_PLACEHOLDER, true);

        assert_eq!(store.turns().len(), 1);
        assert_eq!(store.lines().len(), 3);
        assert_eq!(read_file(&store)["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_last_ephemeral_system() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        store.append_system(WORKING_PLACEHOLDER, false);
        store.append_user("q");
        store.append_system(WORKING_PLACEHOLDER, true);
        store.append_system("unrelated", true);

        assert!(store.remove_last_ephemeral_system());
        let texts: Vec<&str> = store.lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec![WORKING_PLACEHOLDER, "q", "unrelated"]);

        // The remaining placeholder is persistent text, not a transient notice
        assert!(!store.remove_last_ephemeral_system());
    }

    #[test]
    fn test_recent_for_upstream_is_bounded_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TranscriptStore::new(dir.path().join("h.json"), "gpt-5");
        for i in 0..2500 {
            store.turns.push(ChatTurn::user(format!("m{i}")));
        }

        let recent = store.recent_for_upstream(20);
        assert_eq!(recent.len(), 20);
        assert_eq!(recent.first().unwrap().content, "m2480");
        assert_eq!(recent.last().unwrap().content, "m2499");

        store.turns.truncate(3);
        assert_eq!(store.recent_for_upstream(20).len(), 3);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.append_user("first");
        store.append_assistant("reply");
        store.set_model("o4-mini");

        let mut restarted = TranscriptStore::new(store.path().to_path_buf(), "gpt-5");
        restarted.load();

        assert_eq!(restarted.turns(), store.turns());
        assert_eq!(restarted.model(), "o4-mini");
    }

    #[test]
    fn test_load_echoes_last_ten_turns() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        for i in 0..8 {
            store.append_user(format!("q{i}"));
            store.append_assistant(format!("a{i}"));
        }

        let mut restarted = TranscriptStore::new(store.path().to_path_buf(), "gpt-5");
        restarted.load();

        assert_eq!(restarted.turns().len(), 16);
        assert_eq!(restarted.lines().len(), 10);
        assert_eq!(restarted.lines()[0].text, "q3");
        assert_eq!(restarted.lines()[0].speaker, Speaker::You);
        assert_eq!(restarted.lines()[9].speaker, Speaker::Assistant);
    }

    #[test]
    fn test_load_missing_file_is_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.load();

        assert!(store.turns().is_empty());
        assert!(store.lines().is_empty());
        assert_eq!(store.model(), "gpt-5");
    }

    #[test]
    fn test_load_malformed_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ \"messages\": [ {\"role\": \"user\" ").unwrap();

        let mut store = TranscriptStore::new(&path, "gpt-5");
        store.load();

        assert!(store.turns().is_empty());
        assert_eq!(store.lines().len(), 1);
        assert_eq!(store.lines()[0].speaker, Speaker::System);
    }

    #[test]
    fn test_load_without_model_keeps_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, r#"{ "messages": [ {"role": "user", "content": "hi"} ] }"#).unwrap();

        let mut store = TranscriptStore::new(&path, "o4-mini");
        store.load();

        assert_eq!(store.turns(), &[ChatTurn::user("hi")]);
        assert_eq!(store.model(), "o4-mini");
    }

    #[test]
    fn test_clear_empties_everything_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.append_user("x");
        store.append_system("note", false);

        store.clear();

        assert!(store.turns().is_empty());
        assert!(store.lines().is_empty());
        assert_eq!(read_file(&store)["messages"], serde_json::json!([]));
    }

    #[test]
    fn test_visible_lines_filter_only_hides_system() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.append_system("notice", false);
        store.append_user("u");
        store.append_assistant("a");

        assert_eq!(store.visible_lines(true).count(), 3);
        let speakers: Vec<Speaker> = store.visible_lines(false).map(|l| l.speaker).collect();
        assert_eq!(speakers, vec![Speaker::You, Speaker::Assistant]);
        assert_eq!(store.lines().len(), 3);
    }

    #[test]
    fn test_save_failure_is_swallowed_and_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let mut store = TranscriptStore::new(blocker.join("history.json"), "gpt-5");

        store.append_user("one");
        store.append_user("two");

        assert_eq!(store.turns().len(), 2);
        let notices = store
            .lines()
            .iter()
            .filter(|l| l.speaker == Speaker::System)
            .count();
        assert_eq!(notices, 1);
    }
}
