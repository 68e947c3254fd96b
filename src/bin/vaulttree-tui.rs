use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use std::fs;
use std::io::{self, stdout};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vaulttree::config::VaultConfig;
use vaulttree::render_tree::{
    Expander, FilePreview, Inspector, MetadataRecord, RenderRow, RowKind, ViewModel, Workspace,
};
use vaulttree::source::{load_tree, JsonFileSource, StaticSource};
use vaulttree::{Intent, LoadError, NavKey, Session, VaultTree};

const DEMO_TREE: &str = include_str!("../../demos/vault.json");
const INDENT_WIDTH: u16 = 2;

type LoadResult = Result<VaultTree, LoadError>;

/// Where a tree row landed on screen, for mouse hit-testing.
#[derive(Clone)]
struct RowHit {
    id: String,
    y: u16,
    twisty_x: u16,
}

#[derive(Default, Clone, Copy)]
struct UiLayoutState {
    search_area: Option<Rect>,
    tree_inner_area: Option<Rect>,
}

struct App {
    session: Session,
    source_label: String,
    search_input: String,
    input_mode: bool,
    status: String,
    load_rx: Option<Receiver<LoadResult>>,
    loaded_at: Option<Instant>,
    tree_offset: usize,
    row_hits: Vec<RowHit>,
    ui_layout: UiLayoutState,
    should_quit: bool,
}

impl App {
    fn new(config: &VaultConfig) -> Self {
        let source_label = config
            .tree_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "bundled demo".to_string());
        Self {
            session: Session::Loading,
            status: format!("Loading {} ...", source_label),
            source_label,
            search_input: String::new(),
            input_mode: false,
            load_rx: None,
            loaded_at: None,
            tree_offset: 0,
            row_hits: Vec::new(),
            ui_layout: UiLayoutState::default(),
            should_quit: false,
        }
    }

    fn start_load(&mut self, config: &VaultConfig) {
        let (tx, rx) = mpsc::channel::<LoadResult>();
        self.load_rx = Some(rx);
        let tree_file = config.tree_file.clone();

        thread::spawn(move || {
            let result = std::panic::catch_unwind(|| match tree_file {
                Some(path) => load_tree(&JsonFileSource::new(path)),
                None => StaticSource::from_json("bundled demo", DEMO_TREE)
                    .and_then(|source| load_tree(&source)),
            });

            let event = match result {
                Ok(loaded) => loaded,
                Err(_) => Err(LoadError::Unavailable("loader thread panicked".to_string())),
            };

            let _ = tx.send(event);
        });
    }

    fn poll_load(&mut self) {
        let Some(rx) = self.load_rx.as_ref() else {
            return;
        };

        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                Err(LoadError::Unavailable("loader channel disconnected".to_string()))
            }
        };
        self.load_rx = None;
        self.session.finish_load(result);

        match &self.session {
            Session::Ready(explorer) => {
                self.loaded_at = Some(Instant::now());
                self.status = format!(
                    "Loaded {}: {} folders, {} files",
                    self.source_label,
                    explorer.tree().folder_count(),
                    explorer.tree().file_count(),
                );
            }
            Session::Failed(message) => {
                self.status = format!("Load failed: {}", message);
            }
            Session::Loading => {}
        }
    }

    fn dispatch(&mut self, intent: Intent) {
        self.session.dispatch(intent);
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        let Some(view) = self.session.view() else {
            if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                self.should_quit = true;
            }
            return;
        };

        if self.input_mode {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.input_mode = false,
                KeyCode::Backspace => {
                    self.search_input.pop();
                    self.dispatch(Intent::QueryChange(self.search_input.clone()));
                }
                KeyCode::Char(ch) => {
                    self.search_input.push(ch);
                    self.dispatch(Intent::QueryChange(self.search_input.clone()));
                }
                _ => {}
            }
            return;
        }

        if matches!(view.workspace, Workspace::ConfirmDelete { .. }) {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.dispatch(Intent::ConfirmDelete),
                KeyCode::Char('n') | KeyCode::Esc => self.dispatch(Intent::CancelDelete),
                _ => {}
            }
            return;
        }

        if let Some(menu_id) = view.open_menu.clone() {
            match key.code {
                KeyCode::Char('v') => return self.dispatch(Intent::ChooseViewDetails(menu_id)),
                KeyCode::Char('d') => return self.dispatch(Intent::ChooseDelete(menu_id)),
                KeyCode::Esc => return self.dispatch(Intent::ClickOutsideMenu),
                _ => {}
            }
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => self.input_mode = true,
            KeyCode::Up | KeyCode::Char('k') => self.dispatch(Intent::Key(NavKey::Up)),
            KeyCode::Down | KeyCode::Char('j') => self.dispatch(Intent::Key(NavKey::Down)),
            KeyCode::Left | KeyCode::Char('h') => self.dispatch(Intent::Key(NavKey::Left)),
            KeyCode::Right | KeyCode::Char('l') => self.dispatch(Intent::Key(NavKey::Right)),
            KeyCode::Enter => self.dispatch(Intent::Key(NavKey::Enter)),
            KeyCode::Char('m') => {
                if let Some(id) = view.focused.clone() {
                    self.dispatch(Intent::OpenMenu(id));
                }
            }
            _ => {}
        }
    }

    fn on_mouse(&mut self, event: MouseEvent) {
        let Some(view) = self.session.view() else {
            return;
        };
        let (x, y) = (event.column, event.row);

        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(area) = self.ui_layout.search_area {
                    if point_in_rect(area, x, y) {
                        self.input_mode = true;
                        return;
                    }
                }
                if view.open_menu.is_some() {
                    self.dispatch(Intent::ClickOutsideMenu);
                }
                if let Some(hit) = self.row_at(y).cloned() {
                    let is_folder = view.row(&hit.id).is_some_and(|r| r.kind == RowKind::Folder);
                    if is_folder && x <= hit.twisty_x {
                        self.dispatch(Intent::ToggleExpand(hit.id));
                    } else {
                        self.dispatch(Intent::Activate(hit.id));
                    }
                }
            }
            MouseEventKind::Down(MouseButton::Right) => {
                if let Some(hit) = self.row_at(y).cloned() {
                    self.dispatch(Intent::OpenMenu(hit.id));
                }
            }
            MouseEventKind::ScrollDown => self.dispatch(Intent::Key(NavKey::Down)),
            MouseEventKind::ScrollUp => self.dispatch(Intent::Key(NavKey::Up)),
            _ => {}
        }
    }

    fn row_at(&self, y: u16) -> Option<&RowHit> {
        let area = self.ui_layout.tree_inner_area?;
        if y < area.y || y >= area.y.saturating_add(area.height) {
            return None;
        }
        self.row_hits.iter().find(|hit| hit.y == y)
    }

    /// Keep the focused row inside the viewport.
    fn scroll_to_focus(&mut self, view: &ViewModel, height: usize) {
        let height = height.max(1);
        let Some(idx) = view
            .focused
            .as_ref()
            .and_then(|id| view.visible_order.iter().position(|v| v == id))
        else {
            self.tree_offset = 0;
            return;
        };
        if idx < self.tree_offset {
            self.tree_offset = idx;
        } else if idx >= self.tree_offset + height {
            self.tree_offset = idx + 1 - height;
        }
        self.tree_offset = self.tree_offset.min(view.rows.len().saturating_sub(1));
    }
}

fn point_in_rect(rect: Rect, x: u16, y: u16) -> bool {
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn label(key: &str) -> Span<'static> {
    Span::styled(format!("{key}: "), Style::default().fg(Color::Gray))
}

fn row_line(row: &RenderRow) -> Line<'static> {
    let indent = " ".repeat(row.depth * INDENT_WIDTH as usize);
    let twisty = match row.expander {
        Expander::Expanded => "▾ ",
        Expander::Collapsed => "▸ ",
        Expander::Leaf => "  ",
    };

    let base = match row.kind {
        RowKind::Folder => Style::default().fg(Color::Rgb(120, 170, 230)),
        RowKind::File => Style::default().fg(Color::White),
    };
    let base = if row.selected {
        base.add_modifier(Modifier::BOLD).fg(Color::Rgb(246, 211, 101))
    } else {
        base
    };
    let hit = base.bg(Color::Rgb(90, 70, 20)).add_modifier(Modifier::UNDERLINED);

    let mut spans = vec![Span::raw(indent), Span::raw(twisty)];
    match row.highlight.clone() {
        Some(range) => {
            spans.push(Span::styled(row.name[..range.start].to_string(), base));
            spans.push(Span::styled(row.name[range.clone()].to_string(), hit));
            spans.push(Span::styled(row.name[range.end..].to_string(), base));
        }
        None => spans.push(Span::styled(row.name.clone(), base)),
    }
    if let Some(size) = &row.size {
        spans.push(Span::styled(format!("  {size}"), Style::default().fg(Color::DarkGray)));
    }
    if row.menu_open {
        spans.push(Span::styled("  [menu]", Style::default().fg(Color::Yellow)));
    }

    let line = Line::from(spans);
    if row.focused {
        line.style(Style::default().add_modifier(Modifier::REVERSED))
    } else {
        line
    }
}

fn preview_lines(preview: &FilePreview) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            preview.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![label("Path"), Span::raw(preview.path.clone())]),
        Line::from(vec![label("Size"), Span::raw(preview.size.clone())]),
        Line::from(vec![label("Type"), Span::raw(preview.mime.clone())]),
        Line::from(""),
    ];
    if preview.previewable {
        lines.push(Line::from(format!("{:?} preview", preview.kind)));
    } else {
        lines.push(Line::from(Span::styled(
            format!("No preview available ({:?})", preview.kind),
            Style::default().fg(Color::Gray),
        )));
    }
    lines
}

fn metadata_lines(record: &MetadataRecord) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        record.name.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    for (key, value) in [
        ("Path", &record.path),
        ("Size", &record.size),
        ("Owner", &record.owner),
        ("Encryption", &record.encryption),
        ("Checksum", &record.checksum),
        ("Created", &record.created),
        ("Modified", &record.modified),
        ("Accessed", &record.accessed),
        ("MIME", &record.mime),
        ("Permissions", &record.permissions),
        ("Status", &record.status),
    ] {
        lines.push(Line::from(vec![label(key), Span::raw(value.clone())]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Activity", Style::default().fg(Color::Gray))));
    for entry in &record.activity {
        lines.push(Line::from(format!(
            "[{}] {} {} ({})",
            entry.avatar, entry.who, entry.what, entry.when
        )));
    }
    lines
}

fn workspace_lines(workspace: &Workspace) -> Vec<Line<'static>> {
    match workspace {
        Workspace::Empty => vec![Line::from(Span::styled(
            "Select a file to preview it.",
            Style::default().fg(Color::Gray),
        ))],
        Workspace::FolderPlaceholder {
            name, child_count, ..
        } => vec![
            Line::from(Span::styled(name.clone(), Style::default().add_modifier(Modifier::BOLD))),
            Line::from(format!("{child_count} item(s). Press Enter to expand or collapse.")),
        ],
        Workspace::FilePreview(preview) => preview_lines(preview),
        Workspace::FileDetails(record) => metadata_lines(record),
        Workspace::ConfirmDelete { underlying, .. } => workspace_lines(underlying),
    }
}

fn draw_tree(frame: &mut Frame, app: &mut App, view: &ViewModel, area: Rect) {
    let block = Block::default().title(" Vault ").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    app.ui_layout.tree_inner_area = Some(inner);

    app.scroll_to_focus(view, inner.height as usize);
    app.row_hits.clear();

    if view.rows.is_empty() {
        frame.render_widget(
            Paragraph::new("No matches.").style(Style::default().fg(Color::Gray)),
            inner,
        );
        return;
    }

    let lines: Vec<Line> = view
        .rows
        .iter()
        .skip(app.tree_offset)
        .take(inner.height as usize)
        .enumerate()
        .map(|(i, row)| {
            app.row_hits.push(RowHit {
                id: row.id.clone(),
                y: inner.y + i as u16,
                twisty_x: inner.x + (row.depth as u16 + 1) * INDENT_WIDTH,
            });
            row_line(row)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);

    if let Some(menu_id) = view.open_menu.as_ref() {
        let Some(hit) = app.row_hits.iter().find(|h| &h.id == menu_id) else {
            return;
        };
        let menu_area = Rect::new(
            hit.twisty_x + 2,
            (hit.y + 1).min(inner.y + inner.height.saturating_sub(4)),
            20,
            4,
        )
        .intersection(inner);
        frame.render_widget(Clear, menu_area);
        frame.render_widget(
            Paragraph::new(vec![Line::from("v  View details"), Line::from("d  Delete")])
                .block(Block::default().borders(Borders::ALL).title(" Actions ")),
            menu_area,
        );
    }
}

fn draw_ready(frame: &mut Frame, app: &mut App, view: &ViewModel, area: Rect) {
    let columns = Layout::horizontal([
        Constraint::Length(44),
        Constraint::Min(30),
        Constraint::Length(44),
    ])
    .split(area);

    let left = Layout::vertical([Constraint::Length(3), Constraint::Min(5)]).split(columns[0]);

    let search_title = if app.input_mode { " Search (typing) " } else { " Search (/) " };
    let search_block = Block::default().title(search_title).borders(Borders::ALL);
    let search_inner = search_block.inner(left[0]);
    frame.render_widget(search_block, left[0]);
    let search_style = if app.input_mode {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    };
    frame.render_widget(Paragraph::new(view.query.clone()).style(search_style), search_inner);
    app.ui_layout.search_area = Some(search_inner);

    draw_tree(frame, app, view, left[1]);

    let workspace_block = Block::default()
        .title(format!(" Workspace ({:?}) ", view.mode))
        .borders(Borders::ALL);
    frame.render_widget(
        Paragraph::new(workspace_lines(&view.workspace))
            .block(workspace_block)
            .wrap(Wrap { trim: false }),
        columns[1],
    );

    if let Workspace::ConfirmDelete { target, .. } = &view.workspace {
        let popup = centered_rect(columns[1], 40, 6);
        let mut lines = vec![Line::from(format!("Delete {}?", target.name))];
        if target.descendant_count > 0 {
            lines.push(Line::from(format!(
                "{} nested item(s) go with it.",
                target.descendant_count
            )));
        }
        lines.push(Line::from("y: delete   n: cancel"));
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Confirm ")
                    .border_style(Style::default().fg(Color::Red)),
            ),
            popup,
        );
    }

    let inspector_lines = match &view.inspector {
        Inspector::Placeholder => vec![Line::from(Span::styled(
            "Nothing selected. Open a file's menu (m) and choose View details.",
            Style::default().fg(Color::Gray),
        ))],
        Inspector::Metadata(record) => metadata_lines(record),
    };
    frame.render_widget(
        Paragraph::new(inspector_lines)
            .block(Block::default().title(" Inspector ").borders(Borders::ALL))
            .wrap(Wrap { trim: false }),
        columns[2],
    );
}

fn draw_ui(frame: &mut Frame, app: &mut App) {
    let root = frame.area();
    let rows = Layout::vertical([Constraint::Min(8), Constraint::Length(3)]).split(root);

    match app.session.view() {
        Some(view) => draw_ready(frame, app, &view, rows[0]),
        None => {
            let (title, style) = match app.session {
                Session::Failed(_) => (" Load failed ", Style::default().fg(Color::Red)),
                _ => (" Loading ", Style::default().fg(Color::Gray)),
            };
            frame.render_widget(
                Paragraph::new(app.status.clone())
                    .style(style)
                    .block(Block::default().title(title).borders(Borders::ALL))
                    .wrap(Wrap { trim: false }),
                rows[0],
            );
        }
    }

    let mut status = app.status.clone();
    if let Some(instant) = app.loaded_at {
        status.push_str(&format!("  (loaded {}s ago)", instant.elapsed().as_secs()));
    }
    let help = Line::from(vec![
        Span::raw(status),
        Span::styled(
            "   arrows/Enter: navigate  /: search  m: menu  q: quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(
        Paragraph::new(help).block(Block::default().borders(Borders::ALL)),
        rows[1],
    );
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, config: &VaultConfig) -> io::Result<()> {
    let mut app = App::new(config);
    app.start_load(config);

    loop {
        app.poll_load();

        terminal.draw(|frame| {
            draw_ui(frame, &mut app);
        })?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => app.on_key(key),
                Event::Mouse(mouse) => app.on_mouse(mouse),
                _ => {}
            }
        }
    }

    Ok(())
}

/// Log to a file: the terminal belongs to the UI.
fn init_logging(config: &VaultConfig) -> Option<WorkerGuard> {
    if let Err(err) = fs::create_dir_all(&config.log_dir) {
        eprintln!("logging disabled, cannot create {}: {}", config.log_dir.display(), err);
        return None;
    }
    let file_appender = tracing_appender::rolling::never(&config.log_dir, &config.log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    Some(guard)
}

fn main() -> io::Result<()> {
    let config = VaultConfig::from_env()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    let _guard = init_logging(&config);
    tracing::info!(?config, "starting vaulttree");

    enable_raw_mode()?;
    crossterm::execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let app_result = run_app(&mut terminal, &config);

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    app_result
}
