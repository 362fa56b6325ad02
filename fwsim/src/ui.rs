use std::time::{Duration, Instant};
use std::{io, sync::Arc};

use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::stream::StreamExt;
use fwsim_engine::{Classifier, Direction, NewRule, Packet, Rule, RuleId, SharedRuleStore};
use tui::layout::Rect;
use tui::style::Style;
use tui::widgets::Paragraph;
use tui::{
    backend::{Backend, CrosstermBackend},
    layout::{self, Constraint, Layout},
    Frame, Terminal,
};

use crate::scanner::{ScanRequest, Scanner};

use self::flow::FlowView;
use self::line_editor::{Edit, LineEditor};
use self::rule_table::RuleTableView;
use self::scan::ScanView;

mod flow;
mod line_editor;
mod rule_table;
mod scan;
mod styles;

pub struct App {
    store: SharedRuleStore,
    classifier: Classifier,
    scanner: Scanner,
}

impl App {
    pub fn new(store: SharedRuleStore, classifier: Classifier, scanner: Scanner) -> Self {
        Self {
            store,
            classifier,
            scanner,
        }
    }

    pub fn store(&self) -> &SharedRuleStore {
        &self.store
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }
}

#[derive(Debug, Clone)]
enum UiEvent {
    Quit,
    Change,
    AddRule(NewRule),
    RemoveRule(RuleId),
    MoveRule(RuleId, Direction),
    TestPacket(Packet),
    Scan(ScanRequest),
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: Arc<App>,
    tick_rate: Duration,
) -> Result<(), anyhow::Error> {
    let mut last_update = Instant::now();
    let mut ui = Ui::default();

    let mut events = event::EventStream::new();

    loop {
        if ui.needs_display() || last_update.elapsed() > tick_rate {
            terminal.draw(|f| ui.render(f, &app))?;
            last_update = Instant::now();
        }

        let timeout = tokio::time::sleep(tick_rate.saturating_sub(last_update.elapsed()));

        tokio::select! {
            event = events.next() => {
                match event {
                    Some(Ok(event)) => {
                        if matches!(ui.handle_event(&event, &app), Some(UiEvent::Quit)) {
                            return Ok(());
                        }
                    }
                    Some(Err(err)) => return Err(err.into()),
                    None => return Ok(()),
                }
            }
            _ = timeout => {}
        };
    }
}

pub async fn run_ui(app: Arc<App>, tick_rate: Duration) -> Result<(), anyhow::Error> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.clear()?;

    let res = run_app(&mut terminal, app, tick_rate).await;

    // restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    res
}

#[derive(Debug, Default)]
struct FooterBar {}

impl FooterBar {
    fn render<B: Backend>(&self, frame: &mut Frame<B>, rect: Rect, mode: Mode, editing: bool) {
        let paragraph = if editing {
            Paragraph::new(" EDITING -- accept: Enter - abort: Esc")
                .style(Style::default().bg(tui::style::Color::Blue))
        } else {
            let text = match mode {
                Mode::Firewall => {
                    " FIREWALL -- UP/DOWN: k/j - MOVE: K/J - DELETE: d - ADD RULE: a - TEST PACKET: t - SCANNER: s - QUIT: q"
                }
                Mode::Scanner => " SCANNER -- EDIT SCAN: e - UP/DOWN: k/j - FIREWALL: s - QUIT: q",
            };
            Paragraph::new(text).style(Style::default().bg(tui::style::Color::DarkGray))
        };

        frame.render_widget(paragraph, rect);
    }
}

struct UiContext<'a> {
    rules: &'a [Rule],
    classifier: &'a Classifier,
}

trait View {
    fn handle_event(&mut self, event: &Event, ctx: &UiContext<'_>) -> Option<UiEvent> {
        let _ = (event, ctx);
        None
    }

    fn render<B: Backend>(&mut self, f: &mut Frame<B>, rect: Rect, ctx: &UiContext<'_>);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Firewall,
    Scanner,
}

struct Ui {
    dirty: bool,
    mode: Mode,
    rule_table: RuleTableView,
    rule_editor: LineEditor<NewRule>,
    packet_editor: LineEditor<Packet>,
    flow: FlowView,
    scan: ScanView,
    footer: FooterBar,
}

impl Default for Ui {
    fn default() -> Self {
        let flow = FlowView::default();

        Self {
            dirty: true,
            mode: Mode::default(),
            rule_table: RuleTableView::default(),
            rule_editor: LineEditor::new(
                "Rule",
                "Add rule (press 'a'), ex: \"deny tcp from any to 10.0.0.0/8 port 1-1024\"",
            )
            .clear_on_commit(),
            packet_editor: LineEditor::new(
                "Packet",
                "Test packet (press 't'), ex: \"udp from 10.0.0.2 to 8.8.8.8 port 53\"",
            )
            .with_content(&flow.packet().to_string()),
            flow,
            scan: ScanView::default(),
            footer: FooterBar::default(),
        }
    }
}

impl Ui {
    fn render<B: Backend>(&mut self, frame: &mut Frame<B>, app: &App) {
        self.dirty = false;

        let rules = app.store().snapshot();
        let ctx = UiContext {
            rules: &rules,
            classifier: app.classifier(),
        };

        let rects = Layout::default()
            .constraints(vec![Constraint::Min(1), Constraint::Length(1)])
            .split(frame.size());

        match self.mode {
            Mode::Firewall => self.render_firewall(frame, rects[0], &ctx),
            Mode::Scanner => self.scan.render(frame, rects[0], &ctx),
        }
        self.footer
            .render(frame, rects[1], self.mode, self.is_editing());
    }

    fn render_firewall<B: Backend>(&mut self, frame: &mut Frame<B>, rect: Rect, ctx: &UiContext<'_>) {
        let columns = Layout::default()
            .direction(layout::Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
            .split(rect);
        let left = Layout::default()
            .constraints([Constraint::Min(5), Constraint::Length(3)].as_ref())
            .split(columns[0]);
        let right = Layout::default()
            .constraints([Constraint::Length(3), Constraint::Min(5)].as_ref())
            .split(columns[1]);

        self.rule_table.set_matched(
            self.flow
                .verdict(ctx)
                .ok()
                .and_then(|verdict| verdict.rule_id()),
        );

        self.rule_table.render(frame, left[0], ctx);
        self.rule_editor.render(frame, left[1]);
        self.packet_editor.render(frame, right[0]);
        self.flow.render(frame, right[1], ctx);
    }
}

impl Ui {
    #[inline]
    fn set_dirty(&mut self) {
        self.dirty = true;
    }

    fn needs_display(&self) -> bool {
        self.dirty
    }

    fn is_editing(&self) -> bool {
        self.rule_editor.is_editing() || self.packet_editor.is_editing() || self.scan.is_editing()
    }

    fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            Mode::Firewall => Mode::Scanner,
            Mode::Scanner => Mode::Firewall,
        };
    }

    fn handle_event(&mut self, event: &Event, app: &App) -> Option<UiEvent> {
        let rules = app.store().snapshot();
        let ctx = UiContext {
            rules: &rules,
            classifier: app.classifier(),
        };

        let ui_event = match self.mode {
            Mode::Firewall => self.handle_firewall_event(event, &ctx),
            Mode::Scanner => self.scan.handle_event(event, &ctx),
        };

        if let Some(ui_event) = ui_event {
            self.set_dirty();
            return self.apply(ui_event, app);
        }

        if let Event::Key(key) = event {
            match key.code {
                KeyCode::Char('q') => {
                    return UiEvent::Quit.into();
                }
                KeyCode::Char('s') | KeyCode::Tab => {
                    self.set_dirty();
                    self.toggle_mode();
                    return UiEvent::Change.into();
                }
                _ => {}
            }
        }

        None
    }

    fn handle_firewall_event(&mut self, event: &Event, ctx: &UiContext<'_>) -> Option<UiEvent> {
        if self.rule_editor.is_editing() {
            return self.rule_editor.handle_event(event).map(|edit| match edit {
                Edit::Committed(rule) => UiEvent::AddRule(rule),
                Edit::Changed | Edit::Aborted => UiEvent::Change,
            });
        }

        if self.packet_editor.is_editing() {
            return self.packet_editor.handle_event(event).map(|edit| match edit {
                Edit::Committed(packet) => UiEvent::TestPacket(packet),
                Edit::Changed | Edit::Aborted => UiEvent::Change,
            });
        }

        if let Event::Key(key) = event {
            match key.code {
                KeyCode::Char('a') => {
                    self.rule_editor.set_editing();
                    return UiEvent::Change.into();
                }
                KeyCode::Char('t') => {
                    self.packet_editor.set_editing();
                    return UiEvent::Change.into();
                }
                _ => {}
            }
        }

        self.rule_table.handle_event(event, ctx)
    }

    fn apply(&mut self, ui_event: UiEvent, app: &App) -> Option<UiEvent> {
        match ui_event {
            UiEvent::AddRule(rule) => {
                app.store().insert(rule);
                self.rule_table.select_last(app.store().len());
            }
            UiEvent::RemoveRule(id) => {
                app.store().remove(id);
                self.rule_table.clamp(app.store().len());
            }
            UiEvent::MoveRule(id, direction) => {
                if app.store().move_rule(id, direction) {
                    self.rule_table.follow(direction);
                }
            }
            UiEvent::TestPacket(packet) => {
                self.flow.set_packet(packet);
            }
            UiEvent::Scan(request) => {
                self.scan.start(*app.scanner(), request);
            }
            UiEvent::Quit => return UiEvent::Quit.into(),
            UiEvent::Change => {}
        }
        None
    }
}
