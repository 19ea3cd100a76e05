use crate::refill::{next_request, RequestAmount};
use crate::registry::ApplicationFile;
use crate::units::format_from_bytes;
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use std::io;

struct Entry {
    file: ApplicationFile,
    requested: Option<u64>,
    granted: Option<u64>,
    suggested: Option<RequestAmount>,
}

impl Entry {
    fn new(file: ApplicationFile) -> Self {
        let app = &file.application;
        let requested = app.total_requested_bytes().ok();
        let granted = app.total_granted_bytes().ok();
        let suggested = next_request(app).ok();
        Self {
            file,
            requested,
            granted,
            suggested,
        }
    }

    fn refill_due(&self) -> bool {
        self.suggested.as_ref().map_or(false, |s| !s.is_zero())
    }

    fn invalid(&self) -> bool {
        self.suggested.is_none()
    }
}

struct App {
    entries: Vec<Entry>,
    /// Indexes into `entries` currently listed
    visible: Vec<usize>,
    list_state: ListState,
    refills_only: bool,
    show_help: bool,
}

impl App {
    fn new(applications: Vec<ApplicationFile>) -> Self {
        let entries: Vec<Entry> = applications.into_iter().map(Entry::new).collect();
        let visible = (0..entries.len()).collect();

        let mut app = Self {
            entries,
            visible,
            list_state: ListState::default(),
            refills_only: false,
            show_help: false,
        };

        if !app.visible.is_empty() {
            app.list_state.select(Some(0));
        }

        app
    }

    fn next(&mut self) {
        if self.visible.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => {
                if i >= self.visible.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    fn previous(&mut self) {
        if self.visible.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => {
                if i == 0 {
                    self.visible.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    fn toggle_refills_only(&mut self) {
        self.refills_only = !self.refills_only;
        let refills_only = self.refills_only;
        self.visible = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !refills_only || e.refill_due())
            .map(|(i, _)| i)
            .collect();
        self.list_state
            .select(if self.visible.is_empty() { None } else { Some(0) });
    }

    fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    fn selected_entry(&self) -> Option<&Entry> {
        let i = self.list_state.selected()?;
        self.visible.get(i).map(|&idx| &self.entries[idx])
    }

    fn due_count(&self) -> usize {
        self.entries.iter().filter(|e| e.refill_due()).count()
    }
}

/// Launch the interactive dashboard over a registry snapshot.
pub fn run(applications: Vec<ApplicationFile>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app and run
    let app = App::new(applications);
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {}", err);
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, &mut app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Char('r') => app.toggle_refills_only(),
                KeyCode::Char('?') | KeyCode::Char('h') => app.toggle_help(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    if app.show_help {
        draw_help(f);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(4),
        ])
        .split(f.size());

    draw_header(f, chunks[0], app);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);

    draw_application_list(f, panes[0], app);
    draw_detail(f, panes[1], app);

    draw_footer(f, chunks[2], app);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let text = vec![
        Line::from(Span::styled(
            "Datacap Planner - Registry Dashboard",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::raw(format!(
            "{} applications | {} with a refill due{}",
            app.entries.len(),
            app.due_count(),
            if app.refills_only {
                " | filter: refills due"
            } else {
                ""
            }
        ))),
    ];

    let paragraph =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Info"));

    f.render_widget(paragraph, area);
}

fn draw_application_list(f: &mut Frame, area: Rect, app: &mut App) {
    let items: Vec<ListItem> = app
        .visible
        .iter()
        .map(|&idx| {
            let entry = &app.entries[idx];
            let state = entry.file.application.lifecycle.state.as_str();

            let content = format!(
                "{} [{}] {}",
                if entry.refill_due() { "●" } else { " " },
                state,
                entry.file.label()
            );

            let style = if entry.invalid() {
                Style::default().fg(Color::Red)
            } else if entry.refill_due() {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };

            ListItem::new(content).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Applications"))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    f.render_stateful_widget(list, area, &mut app.list_state);
}

fn draw_detail(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = Vec::new();

    if let Some(entry) = app.selected_entry() {
        let record = &entry.file.application;
        let client = &record.client;

        lines.push(Line::from(vec![
            Span::styled(
                client.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("  ({})", client.region)),
        ]));
        lines.push(Line::from(Span::raw(format!(
            "State: {}",
            record.lifecycle.state.display_name()
        ))));
        lines.push(Line::from(Span::raw(format!(
            "Datacap: {} total, {} weekly",
            record.datacap.total_requested_amount, record.datacap.weekly_allocation
        ))));
        if let (Some(granted), Some(requested)) = (entry.granted, entry.requested) {
            lines.push(Line::from(Span::raw(format!(
                "Granted: {} of {}",
                format_from_bytes(granted, true),
                format_from_bytes(requested, true)
            ))));
        }
        lines.push(Line::from(""));

        lines.push(Line::from(Span::styled(
            format!("Tranches ({})", record.request_count()),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for request in &record.allocation_requests {
            lines.push(Line::from(Span::raw(format!(
                "  {:?} {} {}{}",
                request.request_type,
                request.allocation_amount.as_deref().unwrap_or("-"),
                if request.active { "[active]" } else { "" },
                if request.signers.len() == 2 {
                    " [signed]"
                } else {
                    ""
                }
            ))));
        }
        lines.push(Line::from(""));

        match &entry.suggested {
            Some(suggested) if !suggested.is_zero() => {
                lines.push(Line::from(Span::styled(
                    format!("Suggested next request: {}", suggested),
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                )));
            }
            Some(_) => {
                lines.push(Line::from(Span::styled(
                    "No further allocation due",
                    Style::default().fg(Color::Yellow),
                )));
            }
            None => {
                lines.push(Line::from(Span::styled(
                    "Malformed capacity fields on record",
                    Style::default().fg(Color::Red),
                )));
            }
        }
    } else {
        lines.push(Line::from("No application selected"));
    }

    let paragraph =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Detail"));

    f.render_widget(paragraph, area);
}

fn draw_footer(f: &mut Frame, area: Rect, app: &App) {
    let text = vec![
        Line::from(Span::raw(format!(
            "Showing {} of {} applications",
            app.visible.len(),
            app.entries.len()
        ))),
        Line::from(vec![
            Span::raw("r: "),
            Span::styled(
                "Refills-due filter",
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(" | ?: "),
            Span::styled("Help", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" | q: "),
            Span::styled("Quit", Style::default().add_modifier(Modifier::BOLD)),
        ]),
    ];

    let paragraph =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Controls"));

    f.render_widget(paragraph, area);
}

fn draw_help(f: &mut Frame) {
    let help_text = vec![
        Line::from(Span::styled(
            "Help - Keyboard Shortcuts",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Navigation:"),
        Line::from("  ↑/k      - Move up"),
        Line::from("  ↓/j      - Move down"),
        Line::from(""),
        Line::from("View:"),
        Line::from("  r        - Toggle refills-due filter"),
        Line::from("  ?/h      - Toggle this help"),
        Line::from("  q/Esc    - Quit"),
        Line::from(""),
        Line::from("Press any key to close this help..."),
    ];

    let paragraph =
        Paragraph::new(help_text).block(Block::default().borders(Borders::ALL).title("Help"));

    f.render_widget(paragraph, f.size());
}
