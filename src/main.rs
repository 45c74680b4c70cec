mod commands;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use log::{error, LevelFilter};
use ratatui::prelude::*;

use mailscope::app::{App, AppError, AppResult};
use mailscope::config::Config;
use mailscope::ui::ui;

/// Terminal client for the email analysis service
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to config file
    #[clap(short, long, default_value = "~/.config/mailscope/config.json")]
    config: String,

    /// Analysis service base URL (overrides the config file)
    #[clap(long)]
    api_url: Option<String>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    #[clap(subcommand)]
    command: Option<Commands>,
}

/// Form fields shared by the commands that send email text
#[derive(clap::Args, Debug, Default)]
pub struct FormArgs {
    /// Read the email content from this file (defaults to stdin when piped)
    #[clap(long)]
    body_file: Option<PathBuf>,

    /// Scenario for response generation (General, Customer Support, Business Proposal, Complaint)
    #[clap(short, long)]
    scenario: Option<String>,

    /// Comma-separated feature keys to turn off
    #[clap(long, value_delimiter = ',')]
    disable: Vec<String>,

    /// Comma-separated feature keys to run; all others are turned off
    #[clap(long, value_delimiter = ',', conflicts_with = "disable")]
    only: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze email content
    Analyze {
        #[clap(flatten)]
        form: FormArgs,
    },

    /// Analyze an email attachment (PDF, DOCX, TXT, EML, MSG)
    Attachment {
        /// File to upload
        file: PathBuf,
    },

    /// Extract metadata from an email file (EML or MSG)
    Metadata {
        /// File to upload
        file: PathBuf,
    },

    /// Download the analysis as JSON
    DownloadJson {
        #[clap(flatten)]
        form: FormArgs,

        /// Directory to save analysis.json in (defaults to the configured download dir)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Download the analysis as PDF
    DownloadPdf {
        #[clap(flatten)]
        form: FormArgs,

        /// Directory to save analysis.pdf in (defaults to the configured download dir)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

fn log_file_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("mailscope").join("mailscope.log"))
}

/// The TUI owns the terminal, so its logs go to a file instead of stderr
fn init_logging(debug: bool, to_file: bool) {
    let level = if debug { LevelFilter::Debug } else { LevelFilter::Info };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);

    if to_file {
        let file = log_file_path().and_then(|path| {
            std::fs::create_dir_all(path.parent()?).ok()?;
            OpenOptions::new().create(true).append(true).open(path).ok()
        });
        match file {
            Some(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            None => {
                builder.filter_level(LevelFilter::Off);
            }
        }
    }

    builder.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.debug, args.command.is_none());

    let config_path = shellexpand::tilde(&args.config).into_owned();
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    if let Some(cmd) = args.command {
        let config = config.with_api_url(args.api_url);
        if let Err(e) = commands::run(cmd, &config).await {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    // Write a default config on first run so there is a file to edit
    if !Path::new(&config_path).exists() {
        if let Err(e) = config.save(&config_path) {
            println!("Failed to save config: {}", e);
        }
    }

    let config = config.with_api_url(args.api_url);
    let mut app = App::new(config).context("Failed to initialize form")?;

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    io::stdout()
        .execute(EnterAlternateScreen)
        .context("Failed to enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("Failed to create terminal")?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode().context("Failed to disable raw mode")?;
    io::stdout()
        .execute(LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;

    if let Err(err) = result {
        error!("Error: {:?}", err);
        println!("Error: {}", err);
    }

    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> AppResult<()> {
    let mut consecutive_errors = 0;
    const MAX_CONSECUTIVE_ERRORS: u32 = 10;

    loop {
        if let Err(e) = terminal.draw(|frame| ui(frame, app)) {
            consecutive_errors += 1;
            if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                return Err(AppError::IoError(e));
            }
            continue;
        }

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match app.handle_key_event(key) {
                        Ok(Some(action)) => {
                            // Show the pending request before blocking on it
                            app.begin(&action);
                            terminal.draw(|frame| ui(frame, app))?;
                            app.dispatch(action).await;
                            consecutive_errors = 0;
                        }
                        Ok(None) => consecutive_errors = 0,
                        Err(e) => {
                            app.show_error(&format!("Error: {}", e));
                            consecutive_errors += 1;

                            if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                                return Err(e);
                            }
                        }
                    }

                    if app.should_quit {
                        return Ok(());
                    }
                }
            }
        }

        if let Err(e) = app.tick() {
            app.show_error(&format!("Update error: {}", e));
            consecutive_errors += 1;

            if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                return Err(e);
            }
        }
    }
}
