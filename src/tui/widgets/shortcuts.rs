//! Shortcuts bar widget

use crate::tui::state::{AppState, Screen};
use crate::tui::theme::Styles;
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

/// Render shortcuts bar at the bottom of the screen
pub fn render_shortcuts(f: &mut Frame, area: Rect, shortcuts: &[(&str, &str)]) {
    if shortcuts.is_empty() {
        return;
    }

    let available_width = area.width.saturating_sub(2) as usize;

    let mut spans: Vec<Span> = vec![];
    let mut current_width = 0;

    for (i, (key, desc)) in shortcuts.iter().enumerate() {
        let separator = if i > 0 { " • " } else { "" };
        let key_text = format!("[{}]", key);
        let desc_text = format!(" {}", desc);
        let item_width = separator.width() + key_text.width() + desc_text.width();

        if i > 0 && current_width + item_width > available_width {
            spans.push(Span::styled(" ...", Styles::secondary()));
            break;
        }

        if i > 0 {
            spans.push(Span::styled(separator, Styles::secondary()));
        }
        spans.push(Span::styled(key_text, Styles::emphasis()));
        spans.push(Span::styled(desc_text, Styles::secondary()));

        current_width += item_width;
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Styles::border())
                .padding(ratatui::widgets::Padding::new(1, 1, 0, 0)),
        )
        .style(Styles::secondary());

    f.render_widget(paragraph, area);
}

/// Shortcuts that apply to the current screen
pub fn get_shortcuts(app_state: &AppState) -> Vec<(&'static str, &'static str)> {
    match &app_state.screen {
        Screen::Scanning => vec![("←/B", "Back"), ("Q", "Quit")],
        Screen::Deleting { .. } => vec![("Q", "Quit")],
        Screen::DeleteConfirm { .. } => vec![("Del", "Confirm"), ("Any Key", "Cancel")],
        Screen::OverviewBrowsing => vec![
            ("↑↓", "Navigate"),
            ("Enter/→", "Open"),
            ("R", "Re-measure"),
            ("O", "Open"),
            ("F", "Reveal"),
            ("Q", "Quit"),
        ],
        Screen::BrowsingLargeFiles => vec![
            ("↑↓", "Navigate"),
            ("Del", "Delete"),
            ("O", "Open"),
            ("F", "Reveal"),
            ("L/Esc", "Back to Folders"),
            ("Q", "Quit"),
        ],
        Screen::Browsing => vec![
            ("↑↓", "Navigate"),
            ("Enter/→", "Open"),
            ("←/B", "Back"),
            ("L", "Large Files"),
            ("Del", "Delete"),
            ("R", "Refresh"),
            ("O", "Open"),
            ("F", "Reveal"),
            ("Q", "Quit"),
        ],
    }
}
