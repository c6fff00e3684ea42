mod codes;
mod config;
mod data;
mod detail;
mod error;
mod figure;
mod filter;
mod logging;
mod map_draw;
mod state;
mod toggle;
mod ui;

use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Write};
use tracing::{error, info, warn};

use config::{Cli, Command, FigureArgs, FigureFormat};
use data::{CaseBook, load_boundaries};
use figure::Figure;
use filter::filter_cases;
use map_draw::AreaLayer;
use state::AppState;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = logging::init(&cli.log_dir)?;

    let jitter = cli.jitter()?;
    let mut rng = cli.rng();
    let book = CaseBook::load(&cli.areas_path(), &cli.cases_path(), &jitter, &mut rng).inspect_err(|e| {
        error!(error = %e, "failed to load case studies");
    })?;
    info!(
        cases = book.cases.len(),
        areas = book.areas.len(),
        jittered = book.jittered,
        "case book ready"
    );

    match &cli.command {
        Some(Command::Figure(args)) => print_figure(&cli, args, &book),
        None => run_dashboard(&cli, book),
    }
}

fn print_figure(cli: &Cli, args: &FigureArgs, book: &CaseBook) -> Result<(), Box<dyn std::error::Error>> {
    let selection = args.selection()?;
    let figure = Figure::build(filter_cases(&book.cases, &selection), &cli.tiles());
    info!(markers = figure.markers().len(), format = ?args.format, "exporting figure");
    let out = match args.format {
        FigureFormat::Json => serde_json::to_string_pretty(&figure)?,
        FigureFormat::Geojson => serde_json::to_string_pretty(&figure.to_geojson())?,
    };
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{out}")?;
    Ok(())
}

fn run_dashboard(cli: &Cli, book: CaseBook) -> Result<(), Box<dyn std::error::Error>> {
    let layer = match load_boundaries(&cli.boundaries_path())? {
        Some(raw) => match AreaLayer::new(raw, &book.areas) {
            Ok(layer) => {
                info!(features = layer.feature_count(), "area layer ready");
                Some(layer)
            }
            Err(e) => {
                warn!(error = %e, "area boundaries unusable, background layer disabled");
                None
            }
        },
        None => None,
    };
    let mut state = AppState::new(book, cli.tiles(), layer);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut state);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    info!("dashboard closed");
    result
}

fn event_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    state: &mut AppState,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, state))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) => {
                    if state.handle_input(code) {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => state.handle_mouse(mouse),
                _ => {}
            }
        }
    }
}
