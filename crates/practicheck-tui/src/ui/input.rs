//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use practicheck_core::SessionEvent;

use crate::app::{
    can_add_identifier_char, can_add_password_char, login_fields, login_roles, App, AppState,
    LoginFocus,
};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Bring the idle timer up to date before this key counts as activity
    if app.tick() == Some(SessionEvent::Expired) {
        return Ok(false);
    }

    // The timeout prompt sits above everything else and swallows input
    if app.show_timeout_warning() {
        handle_timeout_warning_input(app, key);
        return Ok(false);
    }

    app.record_activity();

    match app.state {
        AppState::SelectingRole => Ok(handle_role_input(app, key)),
        AppState::LoggingIn => {
            handle_login_input(app, key).await;
            Ok(false)
        }
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            Ok(false)
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = if app.is_authenticated() {
                        AppState::Normal
                    } else {
                        AppState::SelectingRole
                    };
                }
                _ => {}
            }
            Ok(false)
        }
        AppState::Normal => Ok(handle_dashboard_input(app, key)),
        AppState::Quitting => Ok(true),
    }
}

fn handle_timeout_warning_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Char('e') | KeyCode::Char('E') => app.extend_session(),
        KeyCode::Char('l') | KeyCode::Char('L') | KeyCode::Esc => app.logout(),
        _ => {}
    }
}

fn handle_role_input(app: &mut App, key: KeyEvent) -> bool {
    let count = login_roles().len();
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            app.role_selection = app.role_selection.checked_sub(1).unwrap_or(count - 1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.role_selection = (app.role_selection + 1) % count;
        }
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            if index < count {
                app.role_selection = index;
                app.start_login();
            }
        }
        KeyCode::Enter => app.start_login(),
        KeyCode::Char('q') | KeyCode::Esc => {
            app.state = AppState::ConfirmingQuit;
        }
        _ => {}
    }
    false
}

fn handle_dashboard_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
        }
        KeyCode::Char('r') => {
            app.status_message = None;
            app.load_dashboard();
        }
        KeyCode::Char('L') => app.logout(),
        _ => {}
    }
    false
}

fn move_focus(app: &mut App, forward: bool) {
    let fields = login_fields(app.login_step, &app.login_role);
    let current = fields
        .iter()
        .position(|f| *f == app.login_focus)
        .unwrap_or(0);
    let next = if forward {
        (current + 1) % fields.len()
    } else {
        current.checked_sub(1).unwrap_or(fields.len() - 1)
    };
    app.login_focus = fields[next];
}

async fn handle_login_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.login_back(),
        KeyCode::Down | KeyCode::Tab => move_focus(app, true),
        KeyCode::Up | KeyCode::BackTab => move_focus(app, false),
        KeyCode::Left if app.login_focus == LoginFocus::University => app.cycle_university(false),
        KeyCode::Right if app.login_focus == LoginFocus::University => app.cycle_university(true),
        KeyCode::Enter => {
            if app.login_focus == LoginFocus::Button {
                app.submit_login_form().await;
            } else {
                move_focus(app, true);
            }
        }
        KeyCode::Backspace => {
            if let Some((field, _)) = app.focused_input() {
                field.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some((field, masked)) = app.focused_input() {
                let len = field.chars().count();
                let allowed = if masked {
                    can_add_password_char(len, c)
                } else {
                    can_add_identifier_char(len, c)
                };
                if allowed {
                    field.push(c);
                }
            }
        }
        _ => {}
    }
}
