//! Terminal styles shared by every screen

use ratatui::style::{Color, Modifier, Style};

pub struct Styles;

impl Styles {
    pub fn primary() -> Style {
        Style::default().fg(Color::White)
    }

    pub fn secondary() -> Style {
        Style::default().fg(Color::Gray)
    }

    pub fn muted() -> Style {
        Style::default().fg(Color::DarkGray)
    }

    pub fn emphasis() -> Style {
        Style::default().fg(Color::Cyan)
    }

    pub fn header() -> Style {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    }

    pub fn title() -> Style {
        Style::default().add_modifier(Modifier::BOLD)
    }

    pub fn border() -> Style {
        Style::default().fg(Color::DarkGray)
    }

    /// Highlighted row in a list.
    pub fn selected() -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    }

    pub fn success() -> Style {
        Style::default().fg(Color::Green)
    }

    pub fn warning() -> Style {
        Style::default().fg(Color::Yellow)
    }

    pub fn error() -> Style {
        Style::default().fg(Color::Red)
    }

    pub fn danger() -> Style {
        Style::default()
            .fg(Color::Red)
            .add_modifier(Modifier::BOLD)
    }
}
