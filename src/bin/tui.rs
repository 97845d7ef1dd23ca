use std::{io, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use parking_lot::Mutex;
use sodium::SodiumCtx;
use tictactoe::{
    config::{self, Args, Config},
    setup::{init_tracing, App, AppEvent},
    store::FileStore,
    theme::{Theme, ThemeApplier},
    visits::HttpVisitTracker,
    Mark, Status, SQUARES,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::info;
use tui::{
    backend::{Backend, CrosstermBackend},
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
    Frame, Terminal,
};

const TICK: Duration = Duration::from_millis(100);

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args).context("failed to load config")?;

    let log_file = match &args.log_file {
        Some(path) => path.clone(),
        None => config::data_dir()?.join("ttt-tui.log"),
    };
    init_tracing(&config.log_level, Some(&log_file))?;
    info!(log_file = %log_file.display(), "starting tic-tac-toe TUI");

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let store = Arc::new(FileStore::open(config.preferences_path()?));
    let palette = PaletteSlot::default();

    let ctx = SodiumCtx::new();
    let app = App::new(&ctx, config.project.clone(), store, Arc::new(palette.clone()));

    let (events, inbox) = mpsc::unbounded_channel();
    if config.tracker.enabled {
        let tracker = HttpVisitTracker::new(&config.tracker.endpoint, config.tracker.timeout())?;
        app.track_visit(runtime.handle(), Arc::new(tracker), events);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut ui = Ui::new(palette);
    let result = run(&mut terminal, &mut ui, &app, inbox);

    // restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    runtime.shutdown_background();

    result
}

fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    ui: &mut Ui,
    app: &App,
    mut inbox: UnboundedReceiver<AppEvent>,
) -> anyhow::Result<()> {
    loop {
        while let Ok(event) = inbox.try_recv() {
            if let AppEvent::VisitReported(outcome) = event {
                app.visit_reported(outcome);
            }
        }

        terminal.draw(|f| ui.draw(f, app))?;

        if !event::poll(TICK)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if !ui.on_key(key, app) {
                    return Ok(());
                }
            }
            Event::Mouse(mouse) => ui.on_mouse(mouse, app),
            _ => {}
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Palette {
    background: Color,
    foreground: Color,
    accent: Color,
    dim: Color,
    x: Color,
    o: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Palette {
        match theme {
            Theme::Light => Palette {
                background: Color::White,
                foreground: Color::Black,
                accent: Color::Blue,
                dim: Color::DarkGray,
                x: Color::Red,
                o: Color::Blue,
            },
            Theme::Dark => Palette {
                background: Color::Black,
                foreground: Color::Gray,
                accent: Color::Yellow,
                dim: Color::DarkGray,
                x: Color::LightRed,
                o: Color::LightCyan,
            },
        }
    }

    fn base(&self) -> Style {
        Style::default().fg(self.foreground).bg(self.background)
    }

    fn mark(&self, mark: Mark) -> Style {
        let color = match mark {
            Mark::X => self.x,
            Mark::O => self.o,
        };
        self.base().fg(color).add_modifier(Modifier::BOLD)
    }
}

/// The palette the renderer reads on every frame.
#[derive(Clone)]
struct PaletteSlot(Arc<Mutex<Palette>>);

impl Default for PaletteSlot {
    fn default() -> Self {
        PaletteSlot(Arc::new(Mutex::new(Palette::for_theme(Theme::default()))))
    }
}

impl PaletteSlot {
    fn get(&self) -> Palette {
        *self.0.lock()
    }
}

impl ThemeApplier for PaletteSlot {
    fn apply(&self, theme: Theme) {
        *self.0.lock() = Palette::for_theme(theme);
    }
}

struct Ui {
    palette: PaletteSlot,
    cursor: usize,
    squares: [Rect; SQUARES],
}

impl Ui {
    fn new(palette: PaletteSlot) -> Ui {
        Ui {
            palette,
            cursor: 4,
            squares: [Rect::default(); SQUARES],
        }
    }

    /// Handles a key press. Returns `false` when the player quits.
    fn on_key(&mut self, key: KeyEvent, app: &App) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char('r') => app.reset_game(),
            KeyCode::Char('t') => app.toggle_theme(),
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                self.cursor = index;
                app.make_move(index);
            }
            KeyCode::Enter | KeyCode::Char(' ') => app.make_move(self.cursor),
            KeyCode::Left if self.cursor % 3 > 0 => self.cursor -= 1,
            KeyCode::Right if self.cursor % 3 < 2 => self.cursor += 1,
            KeyCode::Up if self.cursor >= 3 => self.cursor -= 3,
            KeyCode::Down if self.cursor < 6 => self.cursor += 3,
            _ => {}
        }
        true
    }

    fn on_mouse(&mut self, mouse: MouseEvent, app: &App) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        if let Some(index) = self.square_at(mouse.column, mouse.row) {
            self.cursor = index;
            app.make_move(index);
        }
    }

    fn square_at(&self, column: u16, row: u16) -> Option<usize> {
        self.squares.iter().position(|r| {
            r.width > 0
                && column >= r.x
                && column < r.x + r.width
                && row >= r.y
                && row < r.y + r.height
        })
    }

    fn draw<B: Backend>(&mut self, f: &mut Frame<B>, app: &App) {
        let palette = self.palette.get();
        f.render_widget(Block::default().style(palette.base()), f.size());

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .margin(1)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)].as_ref())
            .split(f.size());

        let block = Block::default()
            .title("Board")
            .borders(Borders::ALL)
            .style(palette.base());
        self.draw_board(f, block.inner(chunks[0]), app, &palette);
        f.render_widget(block, chunks[0]);

        let block = Block::default()
            .title("Game Info")
            .borders(Borders::ALL)
            .style(palette.base());
        let info = self.info_text(app, &palette);
        f.render_widget(
            Paragraph::new(info)
                .block(block)
                .style(palette.base())
                .wrap(Wrap { trim: true }),
            chunks[1],
        );
    }

    fn draw_board<B: Backend>(&mut self, f: &mut Frame<B>, area: Rect, app: &App, palette: &Palette) {
        let thirds = [
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ];
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(thirds.as_ref())
            .split(area);

        let board = app.game.board.sample();
        let game_over = app.game.status.sample().is_over();

        for (r, row) in rows.iter().enumerate() {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(thirds.as_ref())
                .split(*row);

            for (c, square) in columns.iter().enumerate() {
                let index = r * 3 + c;
                self.squares[index] = *square;

                let border_style = if index == self.cursor && !game_over {
                    palette.base().fg(palette.accent).add_modifier(Modifier::BOLD)
                } else {
                    palette.base().fg(palette.dim)
                };
                let block = Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title(Span::styled(format!("{}", index + 1), border_style));

                let inner = block.inner(*square);
                f.render_widget(block, *square);
                if let Some(mark) = board.get(index) {
                    f.render_widget(RenderMark(mark, palette.mark(mark)), inner);
                }
            }
        }
    }

    fn info_text(&self, app: &App, palette: &Palette) -> Vec<Spans<'static>> {
        let status = app.game.status.sample();
        let status_style = match status {
            Status::InProgress(mark) => palette.mark(mark),
            Status::Won(_) | Status::Draw => palette.base().fg(palette.accent).add_modifier(Modifier::BOLD),
        };
        let visitors_style = if app.visits.error.sample().is_some() {
            palette.base().fg(palette.x)
        } else {
            palette.base()
        };
        let help = palette.base().fg(palette.dim);

        vec![
            Spans::from(Span::styled(status.to_string(), status_style)),
            Spans::from(""),
            Spans::from(Span::styled(app.visits.display_line(), visitors_style)),
            Spans::from(format!("Theme: {}", app.theme.theme.sample())),
            Spans::from(""),
            Spans::from(Span::styled("click / 1-9  play", help)),
            Spans::from(Span::styled("arrows      move", help)),
            Spans::from(Span::styled("enter       play", help)),
            Spans::from(Span::styled("r           reset", help)),
            Spans::from(Span::styled("t           theme", help)),
            Spans::from(Span::styled("q           quit", help)),
        ]
    }
}

struct RenderMark(Mark, Style);

impl Widget for RenderMark {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        match self.0 {
            Mark::X => render_x(area, buf, self.1),
            Mark::O => render_o(area, buf, self.1),
        }
    }
}

fn render_x(area: Rect, buf: &mut Buffer, style: Style) {
    let last_col = area.width - 1;
    let last_row = area.height.saturating_sub(1).max(1);
    for y in 0..area.height {
        let x_left = (u32::from(y) * u32::from(last_col) / u32::from(last_row)) as u16;
        let x_right = last_col - x_left.min(last_col);
        buf.set_string(area.x + x_left.min(last_col), area.y + y, "\\", style);
        buf.set_string(area.x + x_right, area.y + y, "/", style);
    }
}

fn render_o(area: Rect, buf: &mut Buffer, style: Style) {
    let rx = f32::from(area.width.saturating_sub(1)) / 2.0;
    let ry = f32::from(area.height.saturating_sub(1)) / 2.0;
    let cx = f32::from(area.x) + rx;
    let cy = f32::from(area.y) + ry;

    let steps = 4 * (area.width + area.height).max(8);
    for step in 0..steps {
        let angle = f32::from(step) / f32::from(steps) * std::f32::consts::TAU;
        let (sin, cos) = angle.sin_cos();
        let x = (cx + rx * cos).round() as u16;
        let y = (cy + ry * sin).round() as u16;
        let x = x.clamp(area.x, area.x + area.width - 1);
        let y = y.clamp(area.y, area.y + area.height - 1);
        buf.set_string(x, y, "o", style);
    }
}
