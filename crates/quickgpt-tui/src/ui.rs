use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use quickgpt_core::{DisplayLine, HotkeyStatus, Speaker};
use crate::app::App;

/// Tallest the input box grows before it scrolls, borders included
const MAX_INPUT_HEIGHT: u16 = 8;

pub fn hidden_hint(app: &App) -> String {
    match app.popup.state().hotkey_status {
        HotkeyStatus::Unregistered => {
            "QuickGPT is hidden. Press Enter to show it, Ctrl+Q to quit.".to_string()
        }
        _ => format!(
            "QuickGPT is hidden. Press {} or Enter to show it, Ctrl+Q to quit.",
            app.hotkey
        ),
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let input_height = (app.input.split('\n').count() as u16 + 2).min(MAX_INPUT_HEIGHT);

    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let state = app.popup.state();
    let status_color = match state.hotkey_status {
        HotkeyStatus::Unregistered => Color::Red,
        _ => Color::Green,
    };
    let filter = if state.show_system_lines { "shown" } else { "hidden" };

    let title = Line::from(vec![
        Span::styled(" QuickGPT ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("[{}] ", app.popup.model()), Style::default().fg(Color::Yellow)),
        Span::styled(
            format!("hotkey: {} ", state.hotkey_status.as_str()),
            Style::default().fg(status_color),
        ),
        Span::styled(format!("system: {filter}"), Style::default().fg(Color::Gray)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn speaker_style(speaker: Speaker) -> Style {
    match speaker {
        Speaker::You => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        Speaker::Assistant => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        Speaker::System => Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    }
}

/// One display line becomes a labelled first row plus continuation rows
fn transcript_lines<'a>(lines: impl Iterator<Item = &'a DisplayLine>) -> Vec<Line<'a>> {
    let mut out = Vec::new();
    for line in lines {
        let style = speaker_style(line.speaker);
        let body_style = match line.speaker {
            Speaker::System => Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            _ => Style::default(),
        };

        let mut rows = line.text.split('\n');
        let first = rows.next().unwrap_or_default();
        out.push(Line::from(vec![
            Span::styled(format!("{}: ", line.speaker.label()), style),
            Span::styled(first, body_style),
        ]));
        out.extend(rows.map(|row| Line::from(Span::styled(row, body_style))));
    }
    out
}

/// Rows the lines occupy once wrapped to `width` columns
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    if width == 0 {
        return 0;
    }
    let width = width as usize;
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    rows.min(u16::MAX as usize) as u16
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let lines = transcript_lines(app.popup.visible_lines());
    if lines.is_empty() {
        let empty = Paragraph::new(Span::styled(
            "Ask anything...",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        frame.render_widget(empty, area);
        return;
    }

    // Stick to the bottom unless the user scrolled back
    let inner_height = area.height.saturating_sub(2);
    let content_height = wrapped_height(&lines, area.width.saturating_sub(2));
    let max_scroll = content_height.saturating_sub(inner_height);
    app.scroll_back = app.scroll_back.min(max_scroll);
    let scroll = max_scroll - app.scroll_back;

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(chat, area);
}

/// Row and column of the cursor inside the (possibly multi-line) input
fn cursor_row_col(input: &str, cursor: usize) -> (usize, usize) {
    let before: String = input.chars().take(cursor).collect();
    let row = before.matches('\n').count();
    let col = before.rsplit('\n').next().map_or(0, |s| s.chars().count());
    (row, col)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let working = app.popup.is_working();
    let border_color = if working { Color::DarkGray } else { Color::Yellow };
    let title = if working { " Working... " } else { " Message (Enter to send, Alt+Enter for newline) " };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_height = area.height.saturating_sub(2) as usize;
    let inner_width = area.width.saturating_sub(2) as usize;
    let (row, col) = cursor_row_col(&app.input, app.cursor);

    // Keep the cursor inside the box in both directions
    let row_offset = (row + 1).saturating_sub(inner_height);
    let col_offset = (col + 1).saturating_sub(inner_width);

    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(Color::Cyan))
        .block(block)
        .scroll((row_offset as u16, col_offset as u16));
    frame.render_widget(input, area);

    if !working {
        frame.set_cursor_position((
            area.x + 1 + col.saturating_sub(col_offset) as u16,
            area.y + 1 + row.saturating_sub(row_offset) as u16,
        ));
    }
}

fn render_footer(frame: &mut Frame, area: Rect) {
    let hints = [
        ("Esc", "hide"),
        ("^L", "clear"),
        ("^S", "system lines"),
        ("^N", "model"),
        ("^Q", "quit"),
    ];

    let mut spans = Vec::new();
    for (key, action) in hints {
        spans.push(Span::styled(format!(" {key} "), Style::default().fg(Color::Black).bg(Color::Gray)));
        spans.push(Span::styled(format!(" {action} "), Style::default().fg(Color::DarkGray)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
