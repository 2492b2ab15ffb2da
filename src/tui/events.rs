//! Event handling for TUI
//!
//! Key presses are translated into [`Action`]s here and nowhere else, so the
//! navigation model never sees a terminal type.

use crate::tui::state::Action;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind};

/// Map a keyboard event to an action. Key releases map to `None`.
pub fn key_action(key: KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }

    let action = match key.code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Esc => Action::Escape,
        KeyCode::Up | KeyCode::Char('k') => Action::Up,
        KeyCode::Down | KeyCode::Char('j') => Action::Down,
        KeyCode::Enter | KeyCode::Right => Action::Enter,
        KeyCode::Left | KeyCode::Char('b') => Action::Back,
        KeyCode::Char('r') => Action::Refresh,
        KeyCode::Char('l') => Action::ToggleLargeFiles,
        KeyCode::Char('o') => Action::Open,
        KeyCode::Char('f') | KeyCode::Char('F') => Action::Reveal,
        KeyCode::Delete | KeyCode::Backspace => Action::Delete,
        _ => Action::Other,
    };
    Some(action)
}

/// Wheel scrolling moves the cursor like the arrow keys.
pub fn mouse_action(mouse: MouseEvent) -> Option<Action> {
    match mouse.kind {
        MouseEventKind::ScrollDown => Some(Action::Down),
        MouseEventKind::ScrollUp => Some(Action::Up),
        _ => None,
    }
}
