//! PractiCheck - terminal client for the PractiCheck attachment platform.
//!
//! Signs a user in against the auth service, keeps the session alive while
//! they work and logs them out after a period of inactivity.

mod app;
mod ui;
mod utils;

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use practicheck_core::config::{ENV_EMAIL, ENV_PASSWORD};
use practicheck_core::models::{LoginCredentials, Role};
use practicheck_core::Config;

use app::{login_roles, App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_PREFIX: &str = "practicheck.log";

/// Log to a daily file in the cache directory; the terminal belongs to the UI.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=practicheck_core=debug).
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = config.cache_dir().ok()?;
    std::fs::create_dir_all(&log_dir).ok()?;

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Some(guard)
}

fn load_config() -> Config {
    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config ({:#}), using defaults", e);
            Config::default()
        }
    };
    config.apply_env();
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = load_config();
    let _log_guard = init_tracing(&config);

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--status") => return print_status(config),
        Some("--logout") => return logout(config),
        Some("--login") => return login_cli(config, args.get(2).map(String::as_str)).await,
        Some("--help") | Some("-h") => {
            print_usage();
            return Ok(());
        }
        Some(other) => {
            print_usage();
            bail!("Unknown argument: {}", other);
        }
        None => {}
    }

    info!("PractiCheck starting");

    let mut app = App::new(config)?;
    if app.is_authenticated() {
        app.load_dashboard();
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("PractiCheck shutting down");
    Ok(())
}

fn print_usage() {
    eprintln!("Usage: practicheck [--status | --logout | --login <role>]");
    eprintln!();
    eprintln!("  (no args)        start the terminal UI");
    eprintln!("  --status         show the stored session");
    eprintln!("  --logout         clear the stored session");
    eprintln!("  --login <role>   sign in without the UI");
    eprintln!();
    let roles: Vec<String> = login_roles().iter().map(role_arg).collect();
    eprintln!("Roles: {}", roles.join(", "));
}

/// Command-line spelling of a role
fn role_arg(role: &Role) -> String {
    role.slug().unwrap_or("admin").to_string()
}

fn parse_role(arg: &str) -> Option<Role> {
    let arg = arg.trim().to_lowercase();
    login_roles()
        .into_iter()
        .find(|role| role_arg(role) == arg || role.as_str() == arg)
}

/// Print the stored session's user and exit
fn print_status(config: Config) -> Result<()> {
    let mut ctx = config.auth_context()?;
    match ctx.restore()? {
        Some(session) => {
            let user = &session.user;
            println!("Signed in as {} ({})", user.name, user.role.display_name());
            if let Some(ref email) = user.email {
                println!("  Email:      {}", email);
            }
            if let Some(university) = user.university_name() {
                println!("  University: {}", university);
            }
            println!("  Dashboard:  {}", ctx.route());
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

/// Clear the stored session and exit
fn logout(config: Config) -> Result<()> {
    let store = config.token_store()?;
    store.clear().context("Failed to clear stored session")?;
    println!("Logged out");
    Ok(())
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Sign in without the UI. Email/ID and password come from the environment
/// when set, otherwise from prompts.
async fn login_cli(mut config: Config, role: Option<&str>) -> Result<()> {
    let Some(role) = role.and_then(parse_role) else {
        print_usage();
        bail!("--login needs a role");
    };

    println!("\n=== PractiCheck Login: {} ===\n", role.display_name());

    let credentials = match role {
        Role::Student => {
            let student_id = prompt_line("Student ID")?;
            let university_id = prompt_line("University ID")?;
            LoginCredentials::student(student_id, university_id, read_password()?)
        }
        Role::Lecturer => {
            let staff_id = prompt_line("Staff ID")?;
            let university_id = prompt_line("University ID (optional)")?;
            LoginCredentials::lecturer(
                staff_id,
                Some(university_id).filter(|u| !u.is_empty()),
                read_password()?,
            )
        }
        role => {
            let email = match std::env::var(ENV_EMAIL).ok().filter(|e| !e.is_empty()) {
                Some(email) => email,
                None => match config.last_email {
                    Some(ref last) => {
                        let input = prompt_line(&format!("Email [{}]", last))?;
                        if input.is_empty() {
                            last.clone()
                        } else {
                            input
                        }
                    }
                    None => prompt_line("Email")?,
                },
            };
            LoginCredentials::email(role, email, read_password()?)
        }
    };

    let remember_email = credentials.email.clone();

    println!("\nAuthenticating...");
    let mut ctx = config.auth_context()?;
    match ctx.login(credentials).await {
        Ok(session) => {
            if remember_email.is_some() {
                config.last_email = remember_email;
                if let Err(e) = config.save() {
                    warn!(error = %e, "Failed to save config");
                }
            }
            println!(
                "Login successful! Signed in as {} ({})\n",
                session.user.name,
                session.user.role.display_name()
            );
            Ok(())
        }
        Err(e) => bail!("{}", e.user_message()),
    }
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    Ok(rpassword::prompt_password("Password: ")?)
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout so the idle timer keeps moving
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        app.tick();

        // Check for completed background tasks
        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
