mod app;
mod command;
mod config;
mod event;
mod git;
mod keymap;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;

use app::App;
use config::{AppInfo, Config};
use event::EventHandler;
use git::GitClient;

/// Input poll timeout; also how quickly the poller notices shutdown
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// tigr - terminal browser for git repositories
#[derive(Parser, Debug)]
#[command(name = "tigr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path inside a git repository
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Configuration file to use instead of the default locations
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn init_logging() {
    // Log to a file so the TUI is not corrupted by stderr output
    let path = std::env::var("TIGR_LOG_FILE").unwrap_or_else(|_| "/tmp/tigr.log".to_string());
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    builder.init();
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("tigr: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    let path = args.path.canonicalize().unwrap_or(args.path);
    let client = GitClient::discover(&path).with_context_lines(config.views.diff.context_lines);
    let repo_path = client.path().to_path_buf();
    let mut app = App::new(Rc::new(client), &config, &repo_path, AppInfo::default())?;

    // Initialize terminal
    enable_raw_mode().context("Failed to initialize terminal")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e).context("Failed to initialize terminal");
    }
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let mut events = EventHandler::new()
        .with_input(POLL_TIMEOUT)
        .with_ticker(config.refresh_interval());
    if config.general.watch_files && repo_path.is_dir() {
        events = events.with_watcher(&repo_path);
    }

    let result = app.run(&mut terminal, &events);

    // Restore terminal even when the loop failed
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    drop(events);
    result
}
