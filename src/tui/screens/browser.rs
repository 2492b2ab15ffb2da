//! Directory browser: entries, large files and the overview share one layout

use crate::disk_usage::display_name;
use crate::model::{Entry, FileRecord};
use crate::size::format_bytes;
use crate::tui::{
    screens::RenderContext,
    state::{AppState, DeleteTarget, Screen},
    theme::Styles,
    widgets::shortcuts::{get_shortcuts, render_shortcuts},
};
use crate::utils::{display_path, format_unused_time, pad_name, truncate_middle};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

const BAR_WIDTH: usize = 16;
const SIZE_WIDTH: usize = 11;

pub fn render(f: &mut Frame, app_state: &AppState, ctx: &RenderContext) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(3),    // Content
            Constraint::Length(1), // Status
            Constraint::Length(2), // Shortcuts
        ])
        .split(area);

    render_header(f, chunks[0], app_state);
    if app_state.show_large_files {
        render_large_files(f, chunks[1], app_state);
    } else {
        render_entries(f, chunks[1], app_state, ctx);
    }
    render_status(f, chunks[2], app_state);
    render_shortcuts(f, chunks[3], &get_shortcuts(app_state));

    if let Screen::DeleteConfirm { target } = &app_state.screen {
        render_confirm(f, area, target);
    }
}

fn render_header(f: &mut Frame, area: Rect, app_state: &AppState) {
    let (title, location) = if app_state.is_overview {
        ("Overview", "System roots".to_string())
    } else if app_state.show_large_files {
        ("Large Files", display_path(&app_state.path))
    } else {
        ("Disk Usage", display_path(&app_state.path))
    };

    let count = if app_state.show_large_files {
        app_state.large_files.len()
    } else {
        app_state.entries.len()
    };
    let header_text = format!(
        "{}  |  Total: {}  |  {} items",
        location,
        format_bytes(app_state.total_size),
        count
    );

    let header = Paragraph::new(Line::from(vec![
        Span::styled(title, Styles::header()),
        Span::raw("  "),
        Span::styled(header_text, Styles::secondary()),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Styles::border()),
    );
    f.render_widget(header, area);
}

/// First row to draw so that `selected` is visible in `rows` lines.
fn window_start(offset: usize, selected: usize, rows: usize) -> usize {
    let rows = rows.max(1);
    if selected >= offset + rows {
        selected + 1 - rows
    } else {
        offset.min(selected)
    }
}

fn usage_bar(size: u64, max: u64) -> (String, String) {
    let filled = if max == 0 {
        0
    } else {
        ((size as f64 / max as f64) * BAR_WIDTH as f64).round() as usize
    };
    let filled = if size > 0 && filled == 0 {
        1
    } else {
        filled.min(BAR_WIDTH)
    };
    ("█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

fn percent(size: u64, total: u64) -> String {
    if total == 0 {
        return "  0.0%".to_string();
    }
    format!("{:>5.1}%", size as f64 / total as f64 * 100.0)
}

fn entry_line<'a>(
    entry: &Entry,
    index: usize,
    is_selected: bool,
    app_state: &AppState,
    ctx: &RenderContext,
    name_width: usize,
) -> Line<'a> {
    let style = if is_selected {
        Styles::selected()
    } else {
        Style::default()
    };
    let prefix = if is_selected { "> " } else { "  " };
    let max = app_state
        .entries
        .iter()
        .filter_map(|e| e.size)
        .max()
        .unwrap_or(0);

    let (size_text, bar_filled, bar_empty, pct) = match entry.size {
        Some(size) => {
            let (filled, empty) = usage_bar(size, max);
            (format_bytes(size), filled, empty, percent(size, app_state.total_size))
        }
        None => (
            format!("{} ...", app_state.spinner_frame()),
            String::new(),
            "░".repeat(BAR_WIDTH),
            "     -".to_string(),
        ),
    };

    let kind = if entry.is_dir && !entry.is_symlink { "/" } else { " " };
    let name = format!("{}{}", display_name(entry), kind);

    let mut spans = vec![
        Span::styled(prefix.to_string(), style),
        Span::styled(format!("{:>3} ", index + 1), style),
        Span::styled(bar_filled, Styles::emphasis()),
        Span::styled(bar_empty, Styles::muted()),
        Span::raw(" "),
        Span::styled(pct, Styles::emphasis()),
        Span::raw("  "),
        Span::styled(format!("{:>width$}", size_text, width = SIZE_WIDTH), Styles::emphasis()),
        Span::raw("  "),
        Span::styled(pad_name(&name, name_width), style),
    ];

    if let Some(unused) = format_unused_time(entry.last_access_or_read(), ctx.now) {
        spans.push(Span::styled(format!(" {}", unused), Styles::warning()));
    }
    if entry.is_dir && !app_state.is_overview && ctx.rules.is_cleanable_dir(&entry.path) {
        spans.push(Span::styled(" (cleanable)", Styles::success()));
    }

    Line::from(spans)
}

fn render_entries(f: &mut Frame, area: Rect, app_state: &AppState, ctx: &RenderContext) {
    let rows = area.height.saturating_sub(2) as usize;
    let selection = app_state.selection;
    let start = window_start(selection.offset, selection.selected, rows);
    // prefix, index, bar, percent, size and gaps
    let fixed = 2 + 4 + BAR_WIDTH + 1 + 6 + 2 + SIZE_WIDTH + 2;
    let name_width = (area.width as usize)
        .saturating_sub(fixed + 2 + 18)
        .max(12);

    let items: Vec<ListItem> = app_state
        .entries
        .iter()
        .enumerate()
        .skip(start)
        .take(rows)
        .map(|(i, entry)| {
            ListItem::new(entry_line(
                entry,
                i,
                i == selection.selected,
                app_state,
                ctx,
                name_width,
            ))
        })
        .collect();

    let title = if app_state.is_overview {
        "Locations"
    } else if app_state.entries.is_empty() {
        "Empty"
    } else {
        "Folders & Files"
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Styles::border())
            .title(title),
    );
    f.render_widget(list, area);
}

fn large_file_line<'a>(file: &FileRecord, index: usize, is_selected: bool, width: usize) -> Line<'a> {
    let style = if is_selected {
        Styles::selected()
    } else {
        Style::default()
    };
    let prefix = if is_selected { "> " } else { "  " };
    let path_width = width.saturating_sub(2 + 4 + SIZE_WIDTH + 2).max(12);

    Line::from(vec![
        Span::styled(prefix.to_string(), style),
        Span::styled(format!("{:>3} ", index + 1), style),
        Span::styled(format!("{:>width$}", format_bytes(file.size), width = SIZE_WIDTH), Styles::emphasis()),
        Span::raw("  "),
        Span::styled(truncate_middle(&display_path(&file.path), path_width), style),
    ])
}

fn render_large_files(f: &mut Frame, area: Rect, app_state: &AppState) {
    let rows = area.height.saturating_sub(2) as usize;
    let selection = app_state.selection;
    let start = window_start(selection.large_offset, selection.large_selected, rows);
    let width = area.width.saturating_sub(2) as usize;

    let items: Vec<ListItem> = app_state
        .large_files
        .iter()
        .enumerate()
        .skip(start)
        .take(rows)
        .map(|(i, file)| ListItem::new(large_file_line(file, i, i == selection.large_selected, width)))
        .collect();

    let title = if app_state.large_files.is_empty() {
        "No large files found"
    } else {
        "Largest Files"
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Styles::border())
            .title(title),
    );
    f.render_widget(list, area);
}

fn render_status(f: &mut Frame, area: Rect, app_state: &AppState) {
    let style = if app_state.status.starts_with("Scan failed")
        || app_state.status.starts_with("Failed")
        || app_state.status.starts_with("Unable")
    {
        Styles::error()
    } else {
        Styles::secondary()
    };
    let text = if app_state.overview_active() {
        format!("{} {}", app_state.spinner_frame(), app_state.status)
    } else {
        app_state.status.clone()
    };
    let width = area.width.saturating_sub(2) as usize;
    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(truncate_middle(&text, width), style),
    ]));
    f.render_widget(status, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn render_confirm(f: &mut Frame, area: Rect, target: &DeleteTarget) {
    let popup = centered_rect(60, 8, area);
    let kind = if target.is_dir { "folder" } else { "file" };
    let lines = vec![
        Line::from(vec![
            Span::styled("Delete ", Styles::primary()),
            Span::styled(target.name.clone(), Styles::title()),
            Span::styled(format!(" ({}, {})?", kind, format_bytes(target.size)), Styles::primary()),
        ]),
        Line::from(Span::styled(
            truncate_middle(&display_path(&target.path), popup.width.saturating_sub(4) as usize),
            Styles::secondary(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("[Del]", Styles::danger()),
            Span::styled(" confirm  ", Styles::secondary()),
            Span::styled("[any key]", Styles::emphasis()),
            Span::styled(" cancel", Styles::secondary()),
        ]),
    ];

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Styles::danger())
                .title("CONFIRM DELETE"),
        );
    f.render_widget(Clear, popup);
    f.render_widget(paragraph, popup);
}
