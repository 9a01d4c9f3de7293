//! gridcalc - formula-driven grid calculator
//!
//! Opens an interactive terminal grid, or prints a saved grid with its
//! computed values.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use gridcalc::application::App;
use gridcalc::domain::{Spreadsheet, DEFAULT_COLS, DEFAULT_ROWS};
use gridcalc::infrastructure::FileRepository;
use gridcalc::presentation::{plain_table, render_ui, viewport_for, InputHandler};

#[derive(Parser)]
#[command(name = "gridcalc", author, version, about = "Formula-driven grid calculator")]
struct Cli {
    /// Write log records to this file (RUST_LOG sets the level, default warn)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive grid (the default)
    Edit(EditArgs),

    /// Print a saved grid with its computed values
    Show {
        /// Grid file written by the interactive grid
        file: PathBuf,

        /// Print raw expressions instead of values
        #[arg(long)]
        formulas: bool,
    },
}

#[derive(Args)]
struct EditArgs {
    /// Grid file to open; also the default target for save and load
    file: Option<PathBuf>,

    /// Rows of a new grid
    #[arg(long, default_value_t = DEFAULT_ROWS, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    rows: usize,

    /// Columns of a new grid
    #[arg(long, default_value_t = DEFAULT_COLS, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    cols: usize,
}

impl Default for EditArgs {
    fn default() -> Self {
        Self {
            file: None,
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Edit(EditArgs::default())) {
        Commands::Edit(args) => {
            init_logging(cli.log_file.as_deref(), false)?;
            edit(args)
        }
        Commands::Show { file, formulas } => {
            init_logging(cli.log_file.as_deref(), true)?;
            show(&file, formulas)
        }
    }
}

/// Installs `env_logger`. The interactive grid owns the terminal, so it only
/// logs when a log file is given.
fn init_logging(log_file: Option<&Path>, stderr_fallback: bool) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None if stderr_fallback => {}
        None => return Ok(()),
    }

    builder.try_init()?;
    Ok(())
}

fn show(file: &Path, formulas: bool) -> Result<()> {
    let mut sheet = Spreadsheet::new(1, 1);
    FileRepository::load_spreadsheet(&mut sheet, file)
        .with_context(|| format!("cannot load {}", file.display()))?;
    if formulas {
        sheet.toggle_formula_view();
    }
    print!("{}", plain_table(&sheet));
    Ok(())
}

/// Sets up the terminal, runs the interactive grid and restores the
/// terminal afterwards.
fn edit(args: EditArgs) -> Result<()> {
    let mut app = App::new(Spreadsheet::new(args.rows, args.cols));
    if let Some(path) = args.file {
        if path.exists() {
            FileRepository::load_spreadsheet(&mut app.spreadsheet, &path)
                .with_context(|| format!("cannot load {}", path.display()))?;
            app.status_message = Some(format!("Loaded from {}", path.display()));
        }
        app.filename = Some(path);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res.context("terminal error")
}

/// Main event loop: redraw, then dispatch one key press, until the user
/// confirms quitting.
fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        let size = terminal.size()?;
        let (rows, cols) = viewport_for(size.width, size.height);
        app.update_viewport_size(rows, cols);

        terminal.draw(|f| render_ui(f, app))?;

        if app.should_quit {
            return Ok(());
        }

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                InputHandler::handle_key_event(app, key.code, key.modifiers);
            }
        }
    }
}
