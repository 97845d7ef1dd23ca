use std::{fs::File, io, path::Path, str::FromStr, sync::Arc};

use sodium::{Listener, SodiumCtx, StreamSink};
use tokio::{runtime::Handle, sync::mpsc::UnboundedSender, task::JoinHandle};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::{
    store::PreferenceStore,
    theme::{ThemeApplier, ThemeManager},
    visits::{Visit, VisitCounter, VisitTracker},
    Error, Mark, TicTacToe,
};

/// A line of player input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Move(usize),
    Reset,
    ToggleTheme,
    Quit,
}

impl FromStr for Command {
    type Err = Error;

    /// Squares are numbered 1 to 9 for players and 0 to 8 internally.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        match line.to_ascii_lowercase().as_str() {
            "r" | "reset" => return Ok(Command::Reset),
            "t" | "theme" => return Ok(Command::ToggleTheme),
            "q" | "quit" | "exit" => return Ok(Command::Quit),
            _ => {}
        }

        if !line.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+') {
            return Err(Error::UnknownCommand(line.to_string()));
        }
        let square = line.parse::<usize>().map_err(Error::InvalidInteger)?;
        match square.checked_sub(1) {
            Some(index) => Ok(Command::Move(index)),
            None => Err(Error::InvalidIndex(square)),
        }
    }
}

/// Describes a rejected move with squares numbered 1 to 9, the way players
/// type them.
pub fn rejection_message(err: &Error) -> String {
    match err {
        Error::InvalidMove(index) => Error::InvalidMove(index + 1).to_string(),
        Error::InvalidIndex(index) => Error::InvalidIndex(index + 1).to_string(),
        other => other.to_string(),
    }
}

/// Things the UI thread reacts to besides keystrokes.
#[derive(Debug)]
pub enum AppEvent {
    Line(String),
    InputClosed,
    VisitReported(Result<Visit, Error>),
}

pub struct App {
    moves: StreamSink<usize>,
    resets: StreamSink<()>,
    theme_toggles: StreamSink<()>,
    visit_started: StreamSink<()>,
    visit_outcomes: StreamSink<Result<Visit, Error>>,
    project: String,
    pub game: TicTacToe,
    pub theme: ThemeManager,
    pub visits: VisitCounter,
    _listeners: Vec<Listener>,
}

impl App {
    pub fn new(
        ctx: &SodiumCtx,
        project: impl Into<String>,
        store: Arc<dyn PreferenceStore>,
        applier: Arc<dyn ThemeApplier>,
    ) -> App {
        let project = project.into();

        ctx.transaction(|| {
            let moves: StreamSink<usize> = ctx.new_stream_sink();
            let resets: StreamSink<()> = ctx.new_stream_sink();
            let theme_toggles: StreamSink<()> = ctx.new_stream_sink();
            let visit_started: StreamSink<()> = ctx.new_stream_sink();
            let visit_outcomes: StreamSink<Result<Visit, Error>> = ctx.new_stream_sink();

            let game = TicTacToe::new(ctx, &moves.stream(), &resets.stream());
            let theme = ThemeManager::new(ctx, &theme_toggles.stream(), store, applier);
            let visits = VisitCounter::new(ctx, &visit_started.stream(), &visit_outcomes.stream());

            let mut listeners = Vec::new();
            listeners.push(game.moves.listen(|(index, mark): &(usize, Mark)| {
                debug!(index, mark = %mark, "move accepted")
            }));
            listeners.push(
                game.rejected
                    .listen(|err: &Error| debug!(%err, "move ignored")),
            );
            listeners.push(
                game.winner_found
                    .listen(|mark: &Mark| info!(winner = %mark, "game won")),
            );
            listeners.push(
                game.is_draw
                    .updates()
                    .filter(|draw: &bool| *draw)
                    .listen(|_: &bool| info!("game drawn")),
            );
            listeners.push(resets.stream().listen(|_: &()| debug!("game reset")));

            App {
                moves,
                resets,
                theme_toggles,
                visit_started,
                visit_outcomes,
                project,
                game,
                theme,
                visits,
                _listeners: listeners,
            }
        })
    }

    pub fn make_move(&self, index: usize) {
        self.moves.send(index);
    }

    pub fn reset_game(&self) {
        self.resets.send(());
    }

    pub fn toggle_theme(&self) {
        self.theme_toggles.send(());
    }

    /// Applies a parsed command. Returns `false` once the player quits.
    pub fn execute(&self, command: Command) -> bool {
        match command {
            Command::Move(index) => self.make_move(index),
            Command::Reset => self.reset_game(),
            Command::ToggleTheme => self.toggle_theme(),
            Command::Quit => return false,
        }
        true
    }

    /// Starts the single visit report for this run.
    ///
    /// The result comes back as [`AppEvent::VisitReported`] on `events`
    /// and must be handed to [`App::visit_reported`] on the UI thread. If
    /// the receiver is gone by then the result is dropped.
    pub fn track_visit(
        &self,
        runtime: &Handle,
        tracker: Arc<dyn VisitTracker>,
        events: UnboundedSender<AppEvent>,
    ) -> JoinHandle<()> {
        self.visit_started.send(());

        let project = self.project.clone();
        runtime.spawn(async move {
            let outcome = tracker.report_visit(&project).await;
            if events.send(AppEvent::VisitReported(outcome)).is_err() {
                debug!("visit report finished after shutdown");
            }
        })
    }

    pub fn visit_reported(&self, outcome: Result<Visit, Error>) {
        self.visit_outcomes.send(outcome);
    }
}

/// Installs the global subscriber, writing to `log_file` when given and to
/// stderr otherwise.
pub fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| Error::Io(e.to_string()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_ansi(false)
            .with_target(false)
            .compact()
            .try_init(),
    };

    result.map_err(|e| Error::Io(e.to_string()))
}
