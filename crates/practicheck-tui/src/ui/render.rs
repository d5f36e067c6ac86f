use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use serde_json::Value;

use practicheck_core::models::{DashboardOverview, Role, User};

use crate::app::{
    identifier_label, login_fields, login_roles, App, AppState, LoginFocus, LoginStep,
};
use crate::utils::{format_countdown, format_currency, format_expiry, truncate_string};

use super::styles;

const LOGO: [&str; 3] = [
    "   ╔═╗╦═╗╔═╗╔═╗╔╦╗╦╔═╗╦ ╦╔═╗╔═╗╦╔═",
    "   ╠═╝╠╦╝╠═╣║   ║ ║║  ╠═╣║╣ ║  ╠╩╗",
    "   ╩  ╩╚═╩ ╩╚═╝ ╩ ╩╚═╝╩ ╩╚═╝╚═╝╩ ╩",
];

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_main_content(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);

    // Render overlays
    match app.state {
        AppState::LoggingIn => render_login_overlay(frame, app),
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        _ => {}
    }

    if app.show_timeout_warning() {
        render_timeout_overlay(frame, app);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  PractiCheck";
    let right = match app.ctx.user() {
        Some(user) => format!("{} ({})", user.name, user.role.display_name()),
        None => app.ctx.route().path(),
    };

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + right.chars().count() + 2),
        )),
        Span::styled(right, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.ctx.user() {
        Some(user) => render_dashboard(frame, app, user, area),
        None => render_role_selection(frame, app, area),
    }
}

fn render_role_selection(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = LOGO
        .iter()
        .map(|l| Line::from(Span::styled(*l, styles::title_style())))
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "   Choose how you want to sign in",
        styles::highlight_style(),
    )));
    lines.push(Line::from(""));

    for (i, role) in login_roles().iter().enumerate() {
        let selected = i == app.role_selection && app.state == AppState::SelectingRole;
        let marker = if selected { "▶" } else { " " };
        let style = if selected {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };
        lines.push(Line::from(vec![
            Span::raw(format!("   {} ", marker)),
            Span::styled(format!("[{}] ", i + 1), styles::help_key_style()),
            Span::styled(role.display_name().to_string(), style),
        ]));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(app.state == AppState::SelectingRole));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_dashboard(frame: &mut Frame, app: &App, user: &User, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);

    render_profile(frame, app, user, chunks[0]);

    match user.role {
        Role::CompanyAdmin(_) => render_overview(frame, app, chunks[1]),
        _ => render_welcome(frame, user, chunks[1]),
    }
}

fn field_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!(" {:<12}", label), styles::muted_style()),
        Span::styled(value, styles::list_item_style()),
    ])
}

fn render_profile(frame: &mut Frame, app: &App, user: &User, area: Rect) {
    // The server's view of the user wins once loaded
    let user = app.profile.as_ref().unwrap_or(user);
    let width = area.width.saturating_sub(16) as usize;

    let mut lines = vec![
        Line::from(vec![
            Span::styled(format!(" [{}] ", user.initial()), styles::title_style()),
            Span::styled(truncate_string(&user.name, width), styles::title_style()),
        ]),
        Line::from(""),
        field_line("Role", user.role.display_name().to_string()),
    ];
    if let Some(ref email) = user.email {
        lines.push(field_line("Email", truncate_string(email, width)));
    }
    if let Some(university) = user.university_name() {
        lines.push(field_line("University", truncate_string(university, width)));
    }

    lines.push(Line::from(""));
    if let Some(session) = app.ctx.session() {
        lines.push(field_line("Idle logout", format_expiry(session.expires_at)));
    }
    lines.push(field_line(
        "Remaining",
        format_countdown(app.ctx.time_remaining()),
    ));

    let block = Block::default()
        .title(" Profile ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_welcome(frame: &mut Frame, user: &User, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!(" Welcome back, {}", user.name),
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(" Signed in to the {} dashboard.", user.role.display_name()),
            styles::list_item_style(),
        )),
    ];

    let block = Block::default()
        .title(" Dashboard ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_overview(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Company Dashboard ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let Some(ref overview) = app.overview else {
        let text = if app.loading {
            " Loading dashboard..."
        } else {
            " No data. Press [r] to reload."
        };
        frame.render_widget(
            Paragraph::new(Span::styled(text, styles::muted_style())).block(block),
            area,
        );
        return;
    };

    frame.render_widget(Paragraph::new(overview_lines(overview, area.width)).block(block), area);
}

fn overview_lines(overview: &DashboardOverview, width: u16) -> Vec<Line<'static>> {
    let stats = &overview.stats;
    let growth = &stats.monthly_growth;
    let text_width = width.saturating_sub(6) as usize;

    let mut lines = vec![
        Line::from(""),
        field_line(
            "Universities",
            format!("{} (+{:.1}%)", stats.total_universities, growth.universities),
        ),
        field_line(
            "Students",
            format!("{} (+{:.1}%)", stats.active_students, growth.students),
        ),
        field_line(
            "Attachments",
            format!("{} (+{:.1}%)", stats.active_attachments, growth.attachments),
        ),
        field_line(
            "Revenue",
            format!("{} (+{:.1}%)", format_currency(stats.monthly_revenue), growth.revenue),
        ),
        Line::from(vec![
            Span::styled(format!(" {:<12}", "Health"), styles::muted_style()),
            Span::styled(
                format!("{:.1}%", stats.system_health),
                styles::health_style(stats.system_health),
            ),
        ]),
        Line::from(""),
    ];

    let alerts = overview.open_alerts();
    lines.push(Line::from(Span::styled(
        format!(" Alerts ({})", alerts.len()),
        styles::highlight_style(),
    )));
    if alerts.is_empty() {
        lines.push(Line::from(Span::styled("  None", styles::muted_style())));
    }
    for alert in alerts {
        let text = ["title", "message"]
            .iter()
            .find_map(|k| alert.get(*k).and_then(Value::as_str))
            .unwrap_or("(untitled alert)");
        let severity = alert.get("severity").and_then(Value::as_str).unwrap_or("");
        let style = if severity == "critical" || severity == "error" {
            styles::error_style()
        } else {
            styles::list_item_style()
        };
        lines.push(Line::from(Span::styled(
            format!("  • {}", truncate_string(text, text_width)),
            style,
        )));
    }

    lines
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None if app.is_authenticated() => format!(
            " Session: {} ",
            format_countdown(app.ctx.time_remaining())
        ),
        None => " Not signed in ".to_string(),
    };

    let shortcuts = if app.is_authenticated() {
        "[r]eload | [L]ogout | [?] help | [q]uit"
    } else {
        "[↑/↓] select | [Enter] sign in | [q]uit"
    };
    let right_text = format!(" {} ", shortcuts);

    let status_style = if app.status_message.is_some() {
        styles::error_style()
    } else {
        styles::muted_style()
    };

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let status_line = Line::from(vec![
        Span::styled(left_text, status_style),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn form_field(label: &str, value: &str, focused: bool) -> Line<'static> {
    let style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let cursor = if focused { "▌" } else { "" };
    Line::from(vec![
        Span::styled(format!("  {:>12}: [", label), styles::muted_style()),
        Span::styled(format!("{:<20}{}", value, cursor), style),
        Span::styled("]", styles::muted_style()),
    ])
}

/// Rough wrapped height of `text` inside the login box
fn wrapped_height(text: &str, width: usize) -> u16 {
    (text.chars().count().div_ceil(width)).max(1) as u16
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    const WIDTH: u16 = 50;
    let fields = login_fields(app.login_step, &app.login_role);
    let text_width = (WIDTH - 4) as usize;

    let mut height = 8 + fields.len() as u16;
    if let Some(ref notice) = app.login_notice {
        height += 1 + wrapped_height(notice, text_width);
    }
    if let Some(ref error) = app.login_error {
        height += 1 + wrapped_height(error, text_width);
    }
    let area = centered_rect_fixed(WIDTH, height, frame.area());

    frame.render_widget(Clear, area);

    let title = match app.login_step {
        LoginStep::ChangePassword => "  Set a new password".to_string(),
        _ => format!("  Sign in as {}", app.login_role.display_name()),
    };
    let mut lines = vec![
        Line::from(Span::styled(title, styles::title_style())),
        Line::from(""),
    ];

    for field in fields.iter().filter(|f| **f != LoginFocus::Button) {
        let focused = app.login_focus == *field;
        let (label, value) = match field {
            LoginFocus::Email => ("Email", app.login_email.clone()),
            LoginFocus::Identifier => (identifier_label(&app.login_role), app.login_identifier.clone()),
            LoginFocus::University if app.universities.is_empty() => {
                ("University", app.login_university.clone())
            }
            LoginFocus::University => ("University", format!("◀ {} ▶", app.university_display())),
            LoginFocus::Password => ("Password", mask(&app.login_password)),
            LoginFocus::NewPassword => ("New password", mask(&app.login_new_password)),
            LoginFocus::ConfirmPassword => ("Confirm", mask(&app.login_confirm_password)),
            LoginFocus::Button => continue,
        };
        lines.push(form_field(label, &truncate_string(&value, 20), focused));
    }

    lines.push(Line::from(""));
    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let action = match app.login_step {
        LoginStep::Email => "Continue",
        LoginStep::Credentials => "Login",
        LoginStep::ChangePassword => "Save",
    };
    let label = if button_focused {
        format!(" ▶ {:^8} ◀ ", action)
    } else {
        format!("   {:^8}   ", action)
    };
    lines.push(Line::from(vec![
        Span::raw("                ["),
        Span::styled(label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref notice) = app.login_notice {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", notice), styles::success_style())));
    }
    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    lines.push(Line::from(""));
    let mut help = vec![
        Span::styled("  [Tab]", styles::help_key_style()),
        Span::styled(" next field  ", styles::muted_style()),
    ];
    if app.login_focus == LoginFocus::University && !app.universities.is_empty() {
        help.push(Span::styled("[←/→]", styles::help_key_style()));
        help.push(Span::styled(" pick  ", styles::muted_style()));
    }
    help.push(Span::styled("[Esc]", styles::help_key_style()));
    help.push(Span::styled(" back", styles::muted_style()));
    lines.push(Line::from(help));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count().min(20))
}

fn render_timeout_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(52, 9, frame.area());
    frame.render_widget(Clear, area);

    let remaining = app.ctx.time_remaining();
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!(
                " Your session will expire in {} seconds due to inactivity",
                remaining
            ),
            styles::warning_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("                     {}", format_countdown(remaining)),
            styles::warning_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   [E]", styles::help_key_style()),
            Span::styled(" stay logged in   ", styles::muted_style()),
            Span::styled("[L]", styles::help_key_style()),
            Span::styled(" log out now", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .title(" Session Timeout ")
        .borders(Borders::ALL)
        .border_style(styles::warning_style());

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(50, 16, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let mut lines: Vec<Line> = LOGO
        .iter()
        .map(|l| Line::from(Span::styled(*l, styles::title_style())))
        .collect();
    lines.push(Line::from(Span::styled(
        format!("                version {}", version),
        styles::muted_style(),
    )));
    lines.push(Line::from(""));

    for (key, desc) in [
        ("r", "Reload dashboard"),
        ("L", "Log out"),
        ("q", "Quit"),
        ("?", "Toggle this help"),
    ] {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<10}", key), styles::help_key_style()),
            Span::styled(desc, styles::help_desc_style()),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " Idle sessions are warned, then logged out.",
        styles::muted_style(),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("       Press ", styles::muted_style()),
        Span::styled("?", styles::help_key_style()),
        Span::styled(" or ", styles::muted_style()),
        Span::styled("Esc", styles::help_key_style()),
        Span::styled(" to close", styles::muted_style()),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_centered_rect_fixed() {
        let outer = Rect::new(0, 0, 100, 40);
        assert_eq!(centered_rect_fixed(50, 10, outer), Rect::new(25, 15, 50, 10));

        // Clamped to a small terminal
        let small = Rect::new(0, 0, 30, 5);
        assert_eq!(centered_rect_fixed(50, 10, small), Rect::new(0, 0, 30, 5));
    }

    #[test]
    fn test_overview_lists_open_alerts_only() {
        let overview = DashboardOverview {
            alerts: json!([
                {"title": "Invoice overdue", "severity": "warning"},
                {"title": "Dismissed", "is_dismissed": true},
                {"message": "Sync failed", "severity": "critical"}
            ]),
            ..DashboardOverview::default()
        };

        let text: Vec<String> = overview_lines(&overview, 80)
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();

        assert!(text.iter().any(|l| l == " Alerts (2)"));
        assert!(text.iter().any(|l| l.contains("Invoice overdue")));
        assert!(text.iter().any(|l| l.contains("Sync failed")));
        assert!(!text.iter().any(|l| l.contains("Dismissed")));
    }
}
