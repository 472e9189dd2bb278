// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;

use schoolhub::config::{load_config, AppConfig};
use schoolhub::error::{describe, SessionError};
use schoolhub::notifications::TerminalSurface;
use schoolhub::preferences::{Preferences, Theme};
use schoolhub::security::{password_strength, Credentials, Role, Session, StrengthLevel};
use schoolhub::storage::FileStore;
use schoolhub::SchoolHub;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code for user-facing failures (bad credentials, no session).
const USER_ERROR: i32 = 1;

/// SchoolHub - student and teacher portal sessions from the terminal.
#[derive(Parser)]
#[command(name = "schoolhub")]
#[command(version = VERSION)]
#[command(about = "SchoolHub portal: demo logins, sessions and security log.")]
#[command(long_about = "SchoolHub - school portal sessions\n\n\
    Log in:              schoolhub login STU001 --password student123\n\
    Check session:       schoolhub status\n\
    Stay active:         schoolhub touch (or: schoolhub watch)\n\
    Security log:        schoolhub logs\n\
    Demo accounts:       schoolhub credentials\n\
    Toast sounds:        schoolhub sound --toggle\n\n\
    Sessions end after 30 minutes without activity.")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Store file (default: ~/.schoolhub/storage.json)
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Quiet mode: errors only, no toasts
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Verbose mode: debug logging on stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with a demo account
    ///
    /// Examples:
    ///   schoolhub login STU001 --password student123
    ///   schoolhub login sarah.wilson@school.edu -p teacher123 --role teacher
    Login {
        /// Account id or email
        id: String,

        #[arg(short, long)]
        password: String,

        #[arg(short, long, default_value = "student")]
        role: Role,
    },

    /// End the current session
    Logout,

    /// Show the current session
    #[command(alias = "s")]
    Status,

    /// Record activity, pushing the expiry deadline out
    Touch,

    /// Show the security log
    Logs {
        /// Newest entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or change the theme
    Theme {
        /// light or dark
        theme: Option<Theme>,

        #[arg(long, conflicts_with = "theme")]
        toggle: bool,
    },

    /// Show or change notification sounds (terminal bell)
    Sound {
        /// on or off
        #[arg(value_parser = ["on", "off"])]
        state: Option<String>,

        #[arg(long, conflicts_with = "state")]
        toggle: bool,
    },

    /// Keep the session open: Enter counts as activity, expiry is reported
    Watch,

    /// Rate a password against the portal's strength rules
    CheckPassword { password: String },

    /// List the demo accounts
    Credentials,

    /// Restore demo accounts and clear session and security log
    Reset,
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_hub(cli: &Cli, config: &AppConfig) -> SchoolHub {
    let path = cli
        .store
        .clone()
        .or_else(|| config.storage_path.clone())
        .unwrap_or_else(FileStore::default_path);
    tracing::debug!("STORE_OPENED | path={}", path.display());

    let store = Arc::new(FileStore::new(path));
    let bell = Preferences::new(store.clone()).notification_sound();
    SchoolHub::new(
        config.clone(),
        store,
        Arc::new(TerminalSurface::new(cli.quiet).with_bell(bell)),
    )
}

fn fail(error: &SessionError) -> ! {
    eprintln!("{}", describe(error).red());
    std::process::exit(USER_ERROR);
}

fn format_remaining(session: &Session) -> String {
    let remaining = session.remaining_millis(chrono::Utc::now().timestamp_millis()) / 1000;
    format!("{}m {:02}s", remaining / 60, remaining % 60)
}

fn format_deadline(session: &Session) -> String {
    session
        .expires_at_utc()
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn show_status(hub: &SchoolHub, session: Option<Session>) {
    println!("{}", "SchoolHub Status".bold());
    println!();
    match session {
        Some(session) => {
            let principal = &session.principal;
            println!("  User:     {} ({})", principal.name.green(), principal.id);
            println!("  Role:     {}", principal.role);
            if let Some(email) = &principal.email {
                println!("  Email:    {}", email);
            }
            println!(
                "  Expires:  {} (in {})",
                format_deadline(&session),
                format_remaining(&session).cyan()
            );
        }
        None => println!("  Session:  {}", "not logged in".yellow()),
    }
    println!("  Theme:    {}", hub.theme());
    println!("  Sounds:   {}", on_off(hub.preferences().notification_sound()));
    println!(
        "  Log:      {} security events",
        hub.sessions().security_log().read_all().len()
    );
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn show_logs(hub: &SchoolHub, limit: usize, json: bool) -> Result<()> {
    let entries = hub.sessions().security_log().read_all();
    let skip = entries.len().saturating_sub(limit);
    let recent = &entries[skip..];

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(recent).context("Failed to encode security log")?
        );
        return Ok(());
    }

    if recent.is_empty() {
        println!("{}", "No security events recorded.".dimmed());
        return Ok(());
    }
    for entry in recent {
        println!("{}", entry.to_log_line());
    }
    Ok(())
}

fn show_password_strength(password: &str) {
    let result = password_strength(password);
    let level = match result.strength {
        StrengthLevel::Weak => "weak".red(),
        StrengthLevel::Medium => "medium".yellow(),
        StrengthLevel::Strong => "strong".green(),
    };
    println!("Strength: {} ({}/5)", level, result.score);

    let requirements = result.requirements;
    for (met, label) in [
        (requirements.min_length, "at least 8 characters"),
        (requirements.has_uppercase, "an uppercase letter"),
        (requirements.has_lowercase, "a lowercase letter"),
        (requirements.has_numbers, "a digit"),
        (requirements.has_special_chars, "a special character"),
    ] {
        let mark = if met { "[✓]".green() } else { "[✗]".red() };
        println!("  {} {}", mark, label);
    }

    if !result.is_valid {
        println!("{}", "Password does not meet the minimum of 3 requirements.".yellow());
    }
}

fn show_credentials(hub: &SchoolHub) {
    println!("{}", "Demo accounts".bold());
    for account in hub.directory().all_accounts() {
        let principal = &account.principal;
        println!(
            "  {:<8} {:<9} {:<26} {}",
            principal.role.as_str(),
            principal.id,
            principal.email.as_deref().unwrap_or("-"),
            account.password.dimmed()
        );
    }
}

async fn watch(hub: SchoolHub) -> Result<()> {
    let session = match hub.sessions().require_session() {
        Ok(session) => session,
        Err(e) => fail(&e),
    };

    let (tx, mut expired) = tokio::sync::mpsc::unbounded_channel();
    hub.sessions().on_expiry(move |event| {
        let _ = tx.send(event.clone());
    });

    println!(
        "Watching session for {} (expires {}). Press Enter to stay active, Ctrl+C to stop.",
        session.principal.id.green(),
        format_deadline(&session)
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            Some(event) = expired.recv() => {
                println!(
                    "{}",
                    format!("Session for {} ended at {}", event.principal.id, event.expired_at.format("%H:%M:%S")).red()
                );
                break;
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("Failed to read stdin")? {
                    Some(_) => match hub.activity() {
                        Some(session) => println!("Session extended until {}", format_deadline(&session)),
                        None => {
                            println!("{}", "Session is no longer active.".yellow());
                            break;
                        }
                    },
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped watching.");
                break;
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = load_config()?;

    let hub = build_hub(&cli, &config);
    let restored = hub.start();

    match &cli.command {
        Commands::Login { id, password, role } => {
            let credentials = Credentials::new(id.as_str(), password.as_str(), *role);
            match hub.login(&credentials) {
                Ok(session) => println!(
                    "Logged in as {} ({}). Session expires at {}.",
                    session.principal.name.green(),
                    session.principal.id,
                    format_deadline(&session)
                ),
                Err(e) => fail(&e),
            }
        }
        Commands::Logout => {
            if !hub.logout() {
                println!("{}", "No active session.".dimmed());
            }
        }
        Commands::Status => show_status(&hub, restored),
        Commands::Touch => match hub.activity() {
            Some(session) => println!("Session extended until {}", format_deadline(&session)),
            None => fail(&SessionError::NoActiveSession),
        },
        Commands::Logs { limit, json } => show_logs(&hub, *limit, *json)?,
        Commands::Theme { theme, toggle } => {
            if *toggle {
                hub.toggle_theme();
            } else if let Some(theme) = theme {
                hub.set_theme(*theme);
            } else {
                println!("Theme: {}", hub.theme());
            }
        }
        Commands::Sound { state, toggle } => {
            if *toggle {
                hub.toggle_notification_sound();
            } else if let Some(state) = state {
                hub.set_notification_sound(state == "on");
            } else {
                println!(
                    "Notification sounds: {}",
                    on_off(hub.preferences().notification_sound())
                );
            }
        }
        Commands::CheckPassword { password } => show_password_strength(password),
        Commands::Credentials => show_credentials(&hub),
        Commands::Reset => hub.reset_demo_data(),
        Commands::Watch => {
            let runtime =
                tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
            runtime.block_on(async move {
                // Expiry timers only run inside the runtime; re-arm here.
                hub.sessions().restore_session();
                watch(hub).await
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_every_command_parses() {
        let cli = Cli::try_parse_from(["schoolhub", "watch"]).unwrap();
        assert!(matches!(cli.command, Commands::Watch));

        let cli = Cli::try_parse_from(["schoolhub", "sound", "off"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Sound { state: Some(ref s), toggle: false } if s == "off"
        ));

        assert!(Cli::try_parse_from(["schoolhub", "sound", "loud"]).is_err());
        assert!(Cli::try_parse_from(["schoolhub", "sound", "on", "--toggle"]).is_err());
    }
}
