use std::net::{IpAddr, Ipv4Addr};

use fwsim_engine::{InvalidPacket, Packet, Protocol, Verdict};
use tui::{
    backend::Backend,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::{styles::Styled, UiContext, View};

/// Test packet and the verdict of the current rule set on it.
#[derive(Debug)]
pub(super) struct FlowView {
    packet: Packet,
}

impl Default for FlowView {
    fn default() -> Self {
        Self {
            packet: Packet::new(
                Protocol::Tcp,
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)),
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                80,
            ),
        }
    }
}

impl FlowView {
    pub(super) fn packet(&self) -> &Packet {
        &self.packet
    }

    pub(super) fn set_packet(&mut self, packet: Packet) {
        self.packet = packet;
    }

    pub(super) fn verdict(&self, ctx: &UiContext<'_>) -> Result<Verdict, InvalidPacket> {
        ctx.classifier.evaluate(ctx.rules, &self.packet)
    }

    fn service(&self) -> String {
        let protocol = self.packet.protocol.to_string().to_uppercase();
        if self.packet.protocol.has_ports() {
            format!("{}:{}", protocol, self.packet.destination_port)
        } else {
            protocol
        }
    }

    fn flow_text(&self, verdict: &Verdict, ctx: &UiContext<'_>) -> Vec<Spans<'static>> {
        let style = Styled::decision_style(verdict.decision);
        let (link, destination_style) = if verdict.is_allowed() {
            ("  ───▶  ", Style::default())
        } else {
            ("  ───✕  ", Style::default().fg(Color::DarkGray))
        };

        let reason = match verdict.matched {
            Some(matched) => ctx
                .rules
                .iter()
                .find(|rule| rule.id() == matched.id)
                .map(|rule| format!("rule {} (priority {}): {}", rule.id(), rule.priority(), rule))
                .unwrap_or_else(|| format!("rule {}", matched.id)),
            None => format!("default policy ({})", ctx.classifier.default_policy()),
        };

        vec![
            Spans::from(vec![
                Styled::label_span("packet: "),
                Span::raw(self.packet.to_string()),
            ]),
            Spans::default(),
            Spans::from(vec![
                Span::raw(self.packet.source.to_string()),
                Span::styled("  ───▶  ", style),
                Span::styled("[ FIREWALL ]", style.add_modifier(Modifier::BOLD)),
                Span::styled(link, style),
                Span::styled(self.packet.destination.to_string(), destination_style),
            ]),
            Spans::from(vec![Span::styled(
                self.service(),
                Style::default().fg(Color::Cyan),
            )]),
            Spans::default(),
            Spans::from(vec![Span::styled(
                verdict.decision.to_string().to_uppercase(),
                style.add_modifier(Modifier::BOLD | Modifier::REVERSED),
            )]),
            Spans::from(vec![Styled::label_span("by: "), Span::raw(reason)]),
        ]
    }
}

impl View for FlowView {
    fn render<B: Backend>(&mut self, frame: &mut Frame<B>, rect: Rect, ctx: &UiContext<'_>) {
        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            "Traffic flow",
            Style::default().add_modifier(Modifier::BOLD),
        ));

        let text = match self.verdict(ctx) {
            Ok(verdict) => self.flow_text(&verdict, ctx),
            Err(err) => vec![
                Spans::from(vec![
                    Styled::label_span("packet: "),
                    Span::raw(self.packet.to_string()),
                ]),
                Spans::from(vec![Span::styled(
                    format!("invalid packet: {}", err),
                    Style::default().fg(Color::LightRed),
                )]),
            ],
        };

        let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, rect);
    }
}
