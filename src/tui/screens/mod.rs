//! Screen rendering modules

pub mod browser;
pub mod scanning;

use crate::rules::ScanRules;
use crate::tui::state::{AppState, Screen};
use chrono::{DateTime, Utc};
use ratatui::Frame;

/// Read-only inputs a screen needs beyond the model itself.
pub struct RenderContext<'a> {
    pub rules: &'a ScanRules,
    pub now: DateTime<Utc>,
}

/// Main render function that dispatches to the appropriate screen
pub fn render(f: &mut Frame, app_state: &AppState, ctx: &RenderContext) {
    match app_state.screen {
        Screen::Scanning => scanning::render(f, app_state),
        Screen::Deleting { .. } => scanning::render_deleting(f, app_state),
        Screen::Browsing
        | Screen::BrowsingLargeFiles
        | Screen::OverviewBrowsing
        | Screen::DeleteConfirm { .. } => browser::render(f, app_state, ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::model::{Entry, FileRecord, ScanResult};
    use crate::tui::state::{Action, Effect, Message, Settings};
    use ratatui::{backend::TestBackend, Terminal};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn draw(app: &AppState) -> String {
        let rules = ScanRules::from_config(&ScanConfig::default());
        let ctx = RenderContext {
            rules: &rules,
            now: Utc::now(),
        };
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, app, &ctx)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>()
    }

    fn browsing_app() -> AppState {
        let mut app = AppState::new(
            Some(PathBuf::from("/data")),
            Settings::default(),
            Vec::new(),
            HashMap::new(),
        );
        let generation = app
            .init()
            .into_iter()
            .find_map(|e| match e {
                Effect::Scan { generation, .. } => Some(generation),
                _ => None,
            })
            .unwrap();
        app.update(Message::ScanFinished {
            generation,
            path: PathBuf::from("/data"),
            result: Ok(ScanResult {
                entries: vec![
                    Entry::dir("node_modules", "/data/node_modules", 4096),
                    Entry::file("movie.mkv", "/data/movie.mkv", 1024),
                ],
                large_files: vec![FileRecord {
                    name: "movie.mkv".into(),
                    path: "/data/movie.mkv".into(),
                    size: 1024,
                }],
                total_size: 5120,
            }),
        });
        app
    }

    #[test]
    fn test_scanning_screen_renders() {
        let app = AppState::new(
            Some(PathBuf::from("/data")),
            Settings::default(),
            Vec::new(),
            HashMap::new(),
        );
        let screen = draw(&app);
        assert!(screen.contains("SCANNING"));
        assert!(screen.contains("/data"));
    }

    #[test]
    fn test_browser_lists_entries_and_hints() {
        let app = browsing_app();
        let screen = draw(&app);
        assert!(screen.contains("node_modules/"));
        assert!(screen.contains("movie.mkv"));
        assert!(screen.contains("(cleanable)"));
    }

    #[test]
    fn test_confirm_popup_and_large_view() {
        let mut app = browsing_app();
        app.update(Message::Key(Action::ToggleLargeFiles));
        assert!(draw(&app).contains("Largest Files"));

        app.update(Message::Key(Action::Delete));
        assert!(draw(&app).contains("CONFIRM DELETE"));
    }

    #[test]
    fn test_overview_renders_pending_rows() {
        let mut app = AppState::new(
            None,
            Settings::default(),
            vec![Entry::pending_dir("Home (~)", "/home/me")],
            HashMap::new(),
        );
        app.init();
        let screen = draw(&app);
        assert!(screen.contains("Overview"));
        assert!(screen.contains("Home (~)"));
    }

    #[test]
    fn test_stale_entries_show_unused_hint() {
        let mut app = browsing_app();
        app.entries[1].last_access = Some(Utc::now() - chrono::Duration::days(400));
        assert!(draw(&app).contains(">1y"));
    }
}
