pub mod court;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use footwork::{audio::AudioPlayer, session::SessionPhase};

use crate::{limit_label, App, StatusLevel};

use court::CourtView;

const MIN_WIDTH: u16 = 40;
const MIN_HEIGHT: u16 = 16;
const PANEL_WIDTH: u16 = 34;

const HELP: &str =
    "space start/stop · 1-8 show · m/M mode · +/- cadence · [/] time · a audio · l lock · r reset · R defaults · q quit";

impl<A: AudioPlayer> Widget for &App<A> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            Paragraph::new(Span::styled(
                "Terminal too small",
                Style::default().fg(Color::Yellow),
            ))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(area, buf);
            return;
        }

        let snapshot = self.controller.snapshot();
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        // header: phase, clock and scores
        let (phase_text, phase_style) = match snapshot.phase {
            // Starting never outlives start(), so it renders as Running
            SessionPhase::Running | SessionPhase::Starting => {
                ("RUNNING", bold_style.fg(Color::Green))
            }
            SessionPhase::Idle => ("IDLE", bold_style.fg(Color::DarkGray)),
        };
        let clock = snapshot
            .countdown_label()
            .unwrap_or_else(|| "∞".to_string());
        let clock_style = if snapshot.is_running()
            && snapshot.time_limit_secs > 0
            && snapshot.time_remaining_secs <= 10
        {
            bold_style.fg(Color::Red)
        } else {
            bold_style
        };
        let header = Paragraph::new(Line::from(vec![
            Span::styled(phase_text, phase_style),
            Span::raw("   "),
            Span::styled(clock, clock_style),
            Span::raw("   "),
            Span::styled("Score ", dim_style),
            Span::styled(snapshot.score.to_string(), bold_style.fg(Color::Cyan)),
            Span::raw("   "),
            Span::styled("Total ", dim_style),
            Span::styled(snapshot.total_score.to_string(), bold_style),
        ]))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(" Footwork ", bold_style.fg(Color::Magenta))),
        );
        header.render(chunks[0], buf);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(PANEL_WIDTH)])
            .split(chunks[1]);

        CourtView {
            active: snapshot.active_position,
            allowed: self.catalog().allowed(&snapshot.mode),
            flashing: self.is_flashing(),
        }
        .render(body[0], buf);

        let active_label = snapshot
            .active_position
            .map(|id| format!("{id} · {}", self.catalog().position(id).label))
            .unwrap_or_else(|| "-".to_string());
        let lock_text = if snapshot.controls_locked {
            "locked"
        } else {
            "open"
        };
        let row = |name: &'static str, value: String| {
            Line::from(vec![
                Span::styled(format!("{name:<11}"), dim_style),
                Span::styled(value, bold_style),
            ])
        };
        let panel = Paragraph::new(vec![
            row("Mode", self.mode_label()),
            row("Cadence", format!("{}s", snapshot.cadence_secs)),
            row("Time limit", limit_label(snapshot.time_limit_secs)),
            row("Audio", snapshot.audio_mode.to_string()),
            row("Controls", lock_text.to_string()),
            row(
                "Best",
                self.best_score
                    .map_or_else(|| "-".to_string(), |best| best.to_string()),
            ),
            Line::default(),
            row("Position", active_label),
        ])
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Session "));
        panel.render(body[1], buf);

        if let Some(status) = &self.status {
            let style = match status.level {
                StatusLevel::Info => Style::default().fg(Color::Cyan),
                StatusLevel::Warning => bold_style.fg(Color::Yellow),
            };
            Paragraph::new(Span::styled(status.text.as_str(), style))
                .alignment(Alignment::Center)
                .render(chunks[2], buf);
        }

        Paragraph::new(Span::styled(
            HELP,
            Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
        ))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
    }
}
