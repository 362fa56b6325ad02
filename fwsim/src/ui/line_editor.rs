use crossterm::event::Event;
use std::fmt::{self, Debug};
use std::str::FromStr;
use tui::backend::Backend;
use tui::layout::Rect;
use tui::style::{Color, Modifier, Style};
use tui::widgets::{Block, Borders};
use tui::Frame;
use tui_textarea::{CursorMove, Input, Key, TextArea};

/// Outcome of a key press in an active editor.
#[derive(Debug)]
pub(super) enum Edit<T> {
    Changed,
    Committed(T),
    Aborted,
}

/// One line text input validated on every keystroke by parsing it as `T`.
pub(super) struct LineEditor<T> {
    title: &'static str,
    hint: &'static str,
    content: String,
    draft_error: Option<String>,
    textarea: TextArea<'static>,
    editing: bool,
    clear_on_commit: bool,
    _value: std::marker::PhantomData<fn() -> T>,
}

impl<T> Debug for LineEditor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineEditor")
            .field("title", &self.title)
            .field("active", &self.editing)
            .field("content", &self.content)
            .field("draft_error", &self.draft_error)
            .finish_non_exhaustive()
    }
}

impl<T> LineEditor<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    pub(super) fn new(title: &'static str, hint: &'static str) -> Self {
        Self {
            title,
            hint,
            content: String::new(),
            draft_error: None,
            textarea: TextArea::default(),
            editing: false,
            clear_on_commit: false,
            _value: std::marker::PhantomData,
        }
    }

    pub(super) fn with_content(mut self, content: &str) -> Self {
        self.content = content.to_owned();
        self.textarea = TextArea::new(vec![self.content.clone()]);
        self
    }

    /// Empties the input once a value is accepted.
    pub(super) fn clear_on_commit(mut self) -> Self {
        self.clear_on_commit = true;
        self
    }

    pub(super) fn is_editing(&self) -> bool {
        self.editing
    }

    pub(super) fn set_editing(&mut self) {
        self.editing = true;
        self.textarea = TextArea::new(vec![self.content.clone()]);
        self.textarea.move_cursor(CursorMove::End);
        self.update();
    }

    fn commit(&mut self) {
        self.editing = false;
        self.draft_error = None;
        self.content = if self.clear_on_commit {
            String::new()
        } else {
            self.draft_content().unwrap_or_default().to_owned()
        };
        self.textarea = TextArea::new(vec![self.content.clone()]);
    }

    fn abort(&mut self) {
        self.editing = false;
        self.draft_error = None;
        self.textarea = TextArea::new(vec![self.content.clone()]);
    }

    fn draft_content(&self) -> Option<&str> {
        self.textarea
            .lines()
            .get(0)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    fn update(&mut self) {
        self.draft_error = self
            .draft_content()
            .and_then(|content| content.parse::<T>().err())
            .map(|err| err.to_string());
    }

    /// Feeds `event` to the editor. Returns `None` when it is not active.
    pub(super) fn handle_event(&mut self, event: &Event) -> Option<Edit<T>> {
        if !self.is_editing() {
            return None;
        }

        match (event.clone()).into() {
            Input { key: Key::Esc, .. } => {
                self.abort();
                Edit::Aborted.into()
            }
            Input {
                key: Key::Char('m'),
                ctrl: true,
                ..
            }
            | Input {
                key: Key::Enter, ..
            } => {
                let parsed = self.draft_content().map(|content| content.parse::<T>());
                match parsed {
                    Some(Ok(value)) => {
                        self.commit();
                        Edit::Committed(value).into()
                    }
                    Some(Err(_)) => Edit::Changed.into(),
                    None => {
                        self.abort();
                        Edit::Aborted.into()
                    }
                }
            }
            input => {
                if self.textarea.input(input) {
                    self.update()
                }
                Edit::Changed.into()
            }
        }
    }

    pub(super) fn render<B: Backend>(&mut self, f: &mut Frame<B>, rect: Rect) {
        self.textarea.set_cursor_line_style(Style::default());

        if self.is_editing() {
            self.textarea
                .set_cursor_style(Style::default().add_modifier(Modifier::REVERSED));

            match &self.draft_error {
                None => {
                    self.textarea
                        .set_style(Style::default().fg(Color::LightGreen));
                    self.textarea.set_block(
                        Block::default()
                            .borders(Borders::ALL)
                            .title(format!("{} OK - accept: Enter abort: Esc", self.title)),
                    );
                }
                Some(err) => {
                    self.textarea
                        .set_style(Style::default().fg(Color::LightRed));
                    self.textarea.set_block(
                        Block::default()
                            .borders(Borders::ALL)
                            .title(format!("ERROR: {}", err)),
                    );
                }
            }
        } else {
            self.textarea.set_style(Style::default());
            self.textarea.set_cursor_style(Style::default());
            self.textarea
                .set_block(Block::default().title(self.hint).borders(Borders::ALL));
        }

        f.render_widget(self.textarea.widget(), rect);
    }
}
