use crossterm::event::{Event, KeyCode};
use human_repr::HumanDuration;
use tui::{
    backend::Backend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use crate::promise::Promise;
use crate::scanner::{PortStatus, ScanReport, ScanRequest, Scanner};

use super::{
    line_editor::{Edit, LineEditor},
    styles::Styled,
    UiContext, UiEvent, View,
};

/// Port scanner form and results. Scan results never reach the rule set.
#[derive(Debug)]
pub(super) struct ScanView {
    editor: LineEditor<ScanRequest>,
    scan: Option<Promise<Result<ScanReport, anyhow::Error>>>,
    table_state: TableState,
}

impl Default for ScanView {
    fn default() -> Self {
        Self {
            editor: LineEditor::new(
                "Scan",
                "Scan (press 'e'), ex: \"192.168.1.1 tcp 1-1000\", \"scanme.example udp 53,123\"",
            )
            .with_content("192.168.1.1 tcp 1-1000"),
            scan: None,
            table_state: TableState::default(),
        }
    }
}

impl ScanView {
    pub(super) fn is_editing(&self) -> bool {
        self.editor.is_editing()
    }

    pub(super) fn start(&mut self, scanner: Scanner, request: ScanRequest) {
        self.table_state.select(None);
        self.scan = Some(Promise::spawn(scanner.scan(request)));
    }

    fn result_count(&mut self) -> usize {
        match self.scan.as_mut().and_then(|scan| scan.value()) {
            Some(Ok(report)) => report.results.len(),
            _ => 0,
        }
    }

    fn down(&mut self) {
        let len = self.result_count();
        let selected = if len == 0 {
            None
        } else {
            self.table_state
                .selected()
                .map_or(0, |selected| selected.saturating_add(1).min(len - 1))
                .into()
        };
        self.table_state.select(selected);
    }

    fn up(&mut self) {
        let selected = self
            .table_state
            .selected()
            .map(|selected| selected.saturating_sub(1));
        self.table_state.select(selected);
    }
}

fn report_table(report: &ScanReport) -> Table<'static> {
    let header_cells = ["port", "service", "status"]
        .into_iter()
        .map(|h| Cell::from(h).style(Style::default().fg(Color::Yellow)));
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = report
        .results
        .iter()
        .map(|result| {
            Row::new([
                Cell::from(result.port.to_string()),
                Cell::from(result.service),
                Cell::from(result.status.to_string()).style(Styled::status_style(result.status)),
            ])
        })
        .collect::<Vec<_>>();

    let address = report
        .results
        .first()
        .map(|result| result.address.to_string())
        .unwrap_or_default();

    let title = format!(
        "{} ({}) - {} - {} open, {} filtered, {} closed - {}",
        report.target,
        address,
        report.scan_type,
        report.count(PortStatus::Open),
        report.count(PortStatus::Filtered),
        report.count(PortStatus::Closed),
        report.elapsed.human_duration(),
    );

    Table::new(rows)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .widths(&[
            Constraint::Length(8),
            Constraint::Length(18),
            Constraint::Length(10),
        ])
}

fn message(text: String, style: Style) -> Paragraph<'static> {
    Paragraph::new(Spans::from(vec![Span::styled(text, style)]))
        .block(Block::default().borders(Borders::ALL).title("Results"))
        .wrap(Wrap { trim: true })
}

impl View for ScanView {
    fn handle_event(&mut self, event: &Event, _ctx: &UiContext<'_>) -> Option<UiEvent> {
        if self.editor.is_editing() {
            return self.editor.handle_event(event).map(|edit| match edit {
                Edit::Committed(request) => UiEvent::Scan(request),
                Edit::Changed | Edit::Aborted => UiEvent::Change,
            });
        }

        if let Event::Key(key) = event {
            match key.code {
                KeyCode::Char('e') | KeyCode::Char('/') => {
                    self.editor.set_editing();
                    return UiEvent::Change.into();
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.up();
                    return UiEvent::Change.into();
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.down();
                    return UiEvent::Change.into();
                }
                _ => {}
            }
        }

        None
    }

    fn render<B: Backend>(&mut self, frame: &mut Frame<B>, rect: Rect, _ctx: &UiContext<'_>) {
        let rects = Layout::default()
            .constraints([Constraint::Length(3), Constraint::Min(1)].as_ref())
            .split(rect);

        self.editor.render(frame, rects[0]);

        let Some(scan) = self.scan.as_mut() else {
            let hint = message(
                "No scan yet. Press 'e' to edit the target, then Enter to run.".to_owned(),
                Style::default(),
            );
            frame.render_widget(hint, rects[1]);
            return;
        };

        match scan.value() {
            Some(Ok(report)) => {
                let table = report_table(report);
                frame.render_stateful_widget(table, rects[1], &mut self.table_state);
            }
            Some(Err(err)) => {
                let paragraph = message(
                    format!("scan failed: {:#}", err),
                    Style::default().fg(Color::LightRed),
                );
                frame.render_widget(paragraph, rects[1]);
            }
            None => {
                let text = if scan.is_pending() {
                    "[SCANNING]"
                } else {
                    "[FAILED: scan task aborted]"
                };
                frame.render_widget(message(text.to_owned(), Styled::label_style()), rects[1]);
            }
        }
    }
}
