//! Scanning and deleting screens with live counters

use crate::size::{format_bytes, format_number};
use crate::tui::{
    state::{AppState, Screen},
    theme::Styles,
    widgets::shortcuts::{get_shortcuts, render_shortcuts},
};
use crate::utils::{display_path, truncate_middle};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use std::sync::atomic::Ordering;

fn bordered(is_small: bool) -> Borders {
    // Simpler borders on small viewports avoid rendering artifacts
    if is_small {
        Borders::TOP | Borders::BOTTOM
    } else {
        Borders::ALL
    }
}

fn layout(area: Rect, is_small: bool) -> std::rc::Rc<[Rect]> {
    let status_height = if is_small { 2 } else { 3 };
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(status_height), // Status with spinner
            Constraint::Min(3),                // Counters
            Constraint::Length(3),             // Current path
            Constraint::Length(2),             // Shortcuts
        ])
        .split(area)
}

pub fn render(f: &mut Frame, app_state: &AppState) {
    let area = f.area();
    let is_small = area.height < 20 || area.width < 60;
    let chunks = layout(area, is_small);
    let spinner = app_state.spinner_frame();
    let progress = app_state.progress.snapshot();

    let status = Paragraph::new(Line::from(vec![Span::styled(
        format!("{}  Scanning {}", spinner, display_path(&app_state.path)),
        Styles::emphasis(),
    )]))
    .block(
        Block::default()
            .borders(bordered(is_small))
            .border_style(Styles::border())
            .title("SCANNING"),
    );
    f.render_widget(status, chunks[0]);

    let counters = vec![
        Line::from(vec![
            Span::styled("Files   ", Styles::secondary()),
            Span::styled(format_number(progress.files), Styles::primary()),
        ]),
        Line::from(vec![
            Span::styled("Folders ", Styles::secondary()),
            Span::styled(format_number(progress.dirs), Styles::primary()),
        ]),
        Line::from(vec![
            Span::styled("Size    ", Styles::secondary()),
            Span::styled(format_bytes(progress.bytes), Styles::emphasis()),
        ]),
    ];
    let counters = Paragraph::new(counters).block(
        Block::default()
            .borders(bordered(is_small))
            .border_style(Styles::border())
            .title("PROGRESS"),
    );
    f.render_widget(counters, chunks[1]);

    let width = (chunks[2].width as usize).saturating_sub(14);
    let current_text = if progress.current.is_empty() {
        format!("{}  Preparing...", spinner)
    } else {
        format!("{}  Reading: {}", spinner, truncate_middle(&progress.current, width))
    };
    let current = Paragraph::new(Line::from(vec![Span::styled(
        current_text,
        Styles::primary(),
    )]))
    .block(
        Block::default()
            .borders(bordered(is_small))
            .border_style(Styles::border())
            .title("CURRENT"),
    );
    f.render_widget(current, chunks[2]);

    render_shortcuts(f, chunks[3], &get_shortcuts(app_state));
}

/// Render delete progress (similar to scanning)
pub fn render_deleting(f: &mut Frame, app_state: &AppState) {
    let Screen::Deleting { target } = &app_state.screen else {
        return;
    };
    let area = f.area();
    let is_small = area.height < 20 || area.width < 60;
    let chunks = layout(area, is_small);
    let spinner = app_state.spinner_frame();
    let removed = app_state.delete_count.load(Ordering::Relaxed);

    let header = Paragraph::new(Line::from(vec![Span::styled(
        format!("{}  Deleting {}...", spinner, target.name),
        Styles::warning(),
    )]))
    .block(
        Block::default()
            .borders(bordered(is_small))
            .border_style(Styles::border())
            .title("DELETING"),
    );
    f.render_widget(header, chunks[0]);

    let kind = if target.is_dir { "folder" } else { "file" };
    let lines = vec![
        Line::from(vec![
            Span::styled("Target  ", Styles::secondary()),
            Span::styled(format!("{} ({})", target.name, kind), Styles::primary()),
        ]),
        Line::from(vec![
            Span::styled("Size    ", Styles::secondary()),
            Span::styled(format_bytes(target.size), Styles::emphasis()),
        ]),
        Line::from(vec![
            Span::styled("Removed ", Styles::secondary()),
            Span::styled(format!("{} items", format_number(removed)), Styles::primary()),
        ]),
    ];
    let body = Paragraph::new(lines).block(
        Block::default()
            .borders(bordered(is_small))
            .border_style(Styles::border()),
    );
    f.render_widget(body, chunks[1]);

    let width = (chunks[2].width as usize).saturating_sub(4);
    let path = Paragraph::new(Line::from(vec![Span::styled(
        truncate_middle(&display_path(&target.path), width),
        Styles::secondary(),
    )]))
    .block(
        Block::default()
            .borders(bordered(is_small))
            .border_style(Styles::border())
            .title("PATH"),
    );
    f.render_widget(path, chunks[2]);

    render_shortcuts(f, chunks[3], &get_shortcuts(app_state));
}
