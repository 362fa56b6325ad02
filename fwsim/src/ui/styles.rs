use std::borrow::Cow;

use fwsim_engine::{Action, Decision};
use tui::{
    style::{Color, Modifier, Style},
    text::Span,
};

use crate::scanner::PortStatus;

pub(crate) struct Styled;

impl Styled {
    #[inline]
    pub(crate) fn label_style() -> Style {
        Style::default().add_modifier(Modifier::BOLD)
    }

    #[inline]
    pub(crate) fn label_span<'a, T>(text: T) -> Span<'a>
    where
        T: Into<Cow<'a, str>>,
    {
        Span::styled(text, Self::label_style())
    }

    pub(crate) fn action_style(action: Action) -> Style {
        Self::decision_style(action.decision())
    }

    pub(crate) fn decision_style(decision: Decision) -> Style {
        match decision {
            Decision::Allowed => Style::default().fg(Color::LightGreen),
            Decision::Blocked => Style::default().fg(Color::LightRed),
        }
    }

    pub(crate) fn status_style(status: PortStatus) -> Style {
        match status {
            PortStatus::Open => Style::default().fg(Color::LightGreen),
            PortStatus::Filtered => Style::default().fg(Color::Yellow),
            PortStatus::Closed => Style::default().fg(Color::Gray),
        }
    }
}
