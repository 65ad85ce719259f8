use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use quickgpt_core::HotkeyBridge;
use crate::app::App;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, bridge: &HotkeyBridge, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => on_tick(app, bridge),
    }
}

/// Drain global hotkey presses, then collect a finished request
fn on_tick(app: &mut App, bridge: &HotkeyBridge) {
    for dispatch in bridge.poll(app.input_focus()) {
        app.popup.handle_hotkey(dispatch);
    }
    app.popup.poll_request();
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any state
    if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
        app.should_quit = true;
        return;
    }

    if app.popup.is_visible() {
        handle_visible(app, key, ctrl);
    } else if key.code == KeyCode::Enter {
        app.popup.show();
    }
}

fn handle_visible(app: &mut App, key: KeyEvent, ctrl: bool) {
    match key.code {
        KeyCode::Esc => {
            app.popup.hide();
        }

        // Most terminals only report Alt+Enter; Shift+Enter needs keyboard enhancement
        KeyCode::Enter if key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) => {
            app.insert_char('\n');
        }
        KeyCode::Enter => {
            app.submit_input();
        }

        KeyCode::Char('l') if ctrl => {
            app.popup.clear_history();
            app.scroll_back = 0;
        }
        KeyCode::Char('s') if ctrl => app.popup.toggle_system_visibility(),
        KeyCode::Char('n') if ctrl => app.popup.cycle_model(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),

        KeyCode::Backspace => app.delete_back(),
        KeyCode::Delete => app.delete_forward(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Up | KeyCode::PageUp => app.scroll_up(),
        KeyCode::Down | KeyCode::PageDown => app.scroll_down(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use pretty_assertions::assert_eq;
    use quickgpt_core::hotkey::{EventSender, HotkeySource};
    use quickgpt_core::{ChatTurn, HotkeySpec, PopupPhase};
    use std::time::Duration;

    struct SilentSource;

    impl HotkeySource for SilentSource {
        fn name(&self) -> &'static str {
            "silent"
        }

        fn register(&mut self, _spec: &HotkeySpec, _events: EventSender) -> anyhow::Result<()> {
            Ok(())
        }

        fn unregister(&mut self) {}
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn chord(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, modifiers))
    }

    fn bridge() -> HotkeyBridge {
        HotkeyBridge::new(Box::new(SilentSource), None)
    }

    #[test]
    fn test_enter_shows_and_esc_hides() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        let bridge = bridge();

        handle_event(&mut app, &bridge, key(KeyCode::Char('x')));
        assert_eq!(app.popup.phase(), PopupPhase::Hidden);
        assert!(app.input.is_empty());

        handle_event(&mut app, &bridge, key(KeyCode::Enter));
        assert_eq!(app.popup.phase(), PopupPhase::VisibleIdle);

        handle_event(&mut app, &bridge, key(KeyCode::Esc));
        assert_eq!(app.popup.phase(), PopupPhase::Hidden);
    }

    #[test]
    fn test_ctrl_q_quits_from_any_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        handle_event(&mut app, &bridge(), chord(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn test_alt_enter_inserts_newline() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        let bridge = bridge();
        app.popup.show();

        handle_event(&mut app, &bridge, key(KeyCode::Char('a')));
        handle_event(&mut app, &bridge, chord(KeyCode::Enter, KeyModifiers::ALT));
        handle_event(&mut app, &bridge, key(KeyCode::Char('b')));
        assert_eq!(app.input, "a\nb");
        assert_eq!(app.popup.phase(), PopupPhase::VisibleIdle);
    }

    #[test]
    fn test_ctrl_shortcuts_do_not_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        let bridge = bridge();
        app.popup.show();

        handle_event(&mut app, &bridge, chord(KeyCode::Char('s'), KeyModifiers::CONTROL));
        assert!(!app.popup.state().show_system_lines);
        handle_event(&mut app, &bridge, chord(KeyCode::Char('n'), KeyModifiers::CONTROL));
        assert_eq!(app.popup.model(), "o4-mini");
        handle_event(&mut app, &bridge, chord(KeyCode::Char(' '), KeyModifiers::CONTROL | KeyModifiers::ALT));
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_enter_sends_and_tick_collects_reply() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        let bridge = bridge();
        app.popup.show();

        for c in "ping".chars() {
            handle_event(&mut app, &bridge, key(KeyCode::Char(c)));
        }
        handle_event(&mut app, &bridge, key(KeyCode::Enter));
        assert!(app.input.is_empty());
        assert_eq!(app.popup.phase(), PopupPhase::VisibleWorking);

        // Esc is ignored while the request is running
        handle_event(&mut app, &bridge, key(KeyCode::Esc));
        assert_eq!(app.popup.phase(), PopupPhase::VisibleWorking);

        for _ in 0..100 {
            handle_event(&mut app, &bridge, AppEvent::Tick);
            if !app.popup.is_working() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(app.popup.phase(), PopupPhase::VisibleIdle);
        assert_eq!(
            app.popup.store().turns(),
            &[ChatTurn::user("ping"), ChatTurn::assistant("ping")]
        );

        handle_event(&mut app, &bridge, chord(KeyCode::Char('l'), KeyModifiers::CONTROL));
        assert!(app.popup.store().turns().is_empty());
    }
}
