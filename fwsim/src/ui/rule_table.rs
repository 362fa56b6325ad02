use crossterm::event::{Event, KeyCode, KeyModifiers};
use fwsim_engine::{Direction, Rule, RuleId};
use tui::{
    backend::Backend,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use super::{styles::Styled, UiContext, UiEvent, View};

#[derive(Debug, Default)]
pub(super) struct RuleTableView {
    table_state: TableState,
    matched: Option<RuleId>,
}

impl RuleTableView {
    fn selected<'a>(&self, rules: &'a [Rule]) -> Option<&'a Rule> {
        self.table_state
            .selected()
            .and_then(|selected| rules.get(selected))
    }

    /// Highlights the rule that decided the current test packet.
    pub(super) fn set_matched(&mut self, matched: Option<RuleId>) {
        self.matched = matched;
    }

    pub(super) fn down(&mut self, len: usize) {
        let selected = if len == 0 {
            None
        } else {
            self.table_state
                .selected()
                .map_or(0, |selected| {
                    selected.saturating_add(1).min(len.saturating_sub(1))
                })
                .into()
        };
        self.table_state.select(selected);
    }

    pub(super) fn up(&mut self, len: usize) {
        let selected = match self.table_state.selected() {
            Some(selected) if len > 0 => selected.saturating_sub(1).min(len - 1).into(),
            _ => None,
        };
        self.table_state.select(selected);
    }

    pub(super) fn select_last(&mut self, len: usize) {
        self.table_state.select(len.checked_sub(1));
    }

    /// Keeps the selection inside a table of `len` rows.
    pub(super) fn clamp(&mut self, len: usize) {
        let selected = self
            .table_state
            .selected()
            .and_then(|selected| len.checked_sub(1).map(|last| selected.min(last)));
        self.table_state.select(selected);
    }

    /// Keeps the selection on a rule that was just moved.
    pub(super) fn follow(&mut self, direction: Direction) {
        let selected = self.table_state.selected().map(|selected| match direction {
            Direction::Up => selected.saturating_sub(1),
            Direction::Down => selected.saturating_add(1),
        });
        self.table_state.select(selected);
    }

    fn move_selected(&self, rules: &[Rule], direction: Direction) -> Option<UiEvent> {
        self.selected(rules)
            .map(|rule| UiEvent::MoveRule(rule.id(), direction))
    }
}

impl View for RuleTableView {
    fn handle_event(&mut self, event: &Event, ctx: &UiContext<'_>) -> Option<UiEvent> {
        let Event::Key(key) = event else {
            return None;
        };
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);

        match key.code {
            KeyCode::Char('K') => self.move_selected(ctx.rules, Direction::Up),
            KeyCode::Char('J') => self.move_selected(ctx.rules, Direction::Down),
            KeyCode::Up if shift => self.move_selected(ctx.rules, Direction::Up),
            KeyCode::Down if shift => self.move_selected(ctx.rules, Direction::Down),
            KeyCode::Up | KeyCode::Char('k') => {
                self.up(ctx.rules.len());
                UiEvent::Change.into()
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.down(ctx.rules.len());
                UiEvent::Change.into()
            }
            KeyCode::Char('d') | KeyCode::Delete => self
                .selected(ctx.rules)
                .map(|rule| UiEvent::RemoveRule(rule.id())),
            _ => None,
        }
    }

    fn render<B: Backend>(&mut self, frame: &mut Frame<B>, rect: Rect, ctx: &UiContext<'_>) {
        if self.table_state.selected().is_none() && !ctx.rules.is_empty() {
            self.table_state.select(Some(0));
        }
        self.clamp(ctx.rules.len());

        let selected_style = Style::default().add_modifier(Modifier::REVERSED);
        let normal_style = Style::default().bg(Color::DarkGray);

        let header_cells = [
            "priority",
            "id",
            "action",
            "protocol",
            "source",
            "destination",
            "port",
        ]
        .into_iter()
        .map(|h| Cell::from(h).style(Style::default().fg(Color::Yellow)));
        let header = Row::new(header_cells).style(normal_style).height(1);

        let rows = ctx.rules.iter().map(|rule| {
            let row = Row::new([
                Cell::from(rule.priority().to_string()),
                Cell::from(rule.id().to_string()),
                Cell::from(rule.action().to_string()).style(Styled::action_style(rule.action())),
                Cell::from(rule.protocol().to_string()),
                Cell::from(rule.source().to_string()),
                Cell::from(rule.destination().to_string()),
                Cell::from(rule.port().to_string()),
            ]);

            if Some(rule.id()) == self.matched {
                row.style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED))
            } else {
                row
            }
        });

        let title = format!(
            "Rules ({}) - default policy: {}",
            ctx.rules.len(),
            ctx.classifier.default_policy()
        );

        let table = Table::new(rows)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(selected_style)
            .highlight_symbol("> ")
            .widths(&[
                Constraint::Length(8),
                Constraint::Length(6),
                Constraint::Length(6),
                Constraint::Length(8),
                Constraint::Min(18),
                Constraint::Min(18),
                Constraint::Length(11),
            ]);

        frame.render_stateful_widget(table, rect, &mut self.table_state);
    }
}
