use std::{
    io::{self, BufRead},
    sync::Arc,
    thread,
};

use anyhow::Context;
use clap::Parser;
use crossterm::{
    execute,
    style::{Color, ResetColor, SetBackgroundColor, SetForegroundColor},
};
use sodium::{Listener, SodiumCtx};
use tokio::sync::mpsc;
use tracing::warn;

use tictactoe::{
    config::{Args, Config},
    setup::{init_tracing, rejection_message, App, AppEvent, Command},
    store::FileStore,
    theme::{Theme, ThemeApplier},
    visits::HttpVisitTracker,
    Board, Error, Mark, Status,
};

/// Colours the whole terminal to match the theme.
struct TerminalColors;

impl ThemeApplier for TerminalColors {
    fn apply(&self, theme: Theme) {
        let (fg, bg) = match theme {
            Theme::Light => (Color::Black, Color::White),
            Theme::Dark => (Color::Grey, Color::Black),
        };
        if let Err(err) = execute!(io::stdout(), SetForegroundColor(fg), SetBackgroundColor(bg)) {
            warn!(%err, theme = %theme, "could not apply terminal colours");
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args).context("failed to load config")?;
    init_tracing(&config.log_level, args.log_file.as_deref())?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let store = Arc::new(FileStore::open(config.preferences_path()?));

    let ctx = SodiumCtx::new();
    let app = App::new(&ctx, config.project.clone(), store, Arc::new(TerminalColors));
    let _listeners = ctx.transaction(|| print_updates(&app));

    println!("Welcome to Tic Tac Toe!\n");
    println!("Squares are numbered 1-9 from the top left.");
    println!("Commands: r = reset, t = toggle theme, q = quit\n");
    println!("{}", app.game.board.sample());
    println!("{}", app.game.status.sample());

    let (events, mut inbox) = mpsc::unbounded_channel();

    if config.tracker.enabled {
        let tracker = HttpVisitTracker::new(&config.tracker.endpoint, config.tracker.timeout())?;
        app.track_visit(runtime.handle(), Arc::new(tracker), events.clone());
    }

    thread::spawn(move || {
        let stdin = io::stdin().lock();
        for line in stdin.lines() {
            let Ok(line) = line else { break };
            if events.send(AppEvent::Line(line)).is_err() {
                return;
            }
        }
        let _ = events.send(AppEvent::InputClosed);
    });

    while let Some(event) = inbox.blocking_recv() {
        match event {
            AppEvent::Line(line) => match line.parse::<Command>() {
                Ok(command) => {
                    if !app.execute(command) {
                        break;
                    }
                }
                Err(err) => println!("{}", err),
            },
            AppEvent::VisitReported(outcome) => app.visit_reported(outcome),
            AppEvent::InputClosed => break,
        }
    }

    runtime.shutdown_background();
    execute!(io::stdout(), ResetColor)?;

    Ok(())
}

fn print_updates(app: &App) -> Vec<Listener> {
    let game = &app.game;
    let mut listeners = Vec::new();

    listeners.push(game.moves.listen(|(index, mark): &(usize, Mark)| {
        println!("\n{}s took space {}:", mark, index + 1)
    }));
    listeners.push(
        game.board
            .updates()
            .listen(|board: &Board| println!("{}", board)),
    );
    listeners.push(
        game.status
            .updates()
            .listen(|status: &Status| println!("{}", status)),
    );
    listeners.push(
        game.rejected
            .listen(|err: &Error| println!("{}", rejection_message(err))),
    );

    listeners.push(
        app.theme
            .theme
            .updates()
            .listen(|theme: &Theme| println!("Switched to the {} theme", theme)),
    );

    listeners.push(
        app.visits
            .count
            .updates()
            .listen(|count: &u64| println!("Visitors: {}", count)),
    );
    listeners.push(
        app.visits
            .error
            .updates()
            .filter_option()
            .listen(|message: &String| println!("{}", message)),
    );

    listeners
}
