use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::Span,
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Rectangle},
        Block, Borders, Widget,
    },
};

use footwork::catalog::{PositionId, COURT_CENTER, COURT_HEIGHT, COURT_WIDTH, POSITIONS};

/// Distance of the net from the front edge, in court units
const NET_Y: f64 = 8.0;
/// Short service line
const SERVICE_Y: f64 = 200.0;

/// Top-down court with the eight positions, the active one highlighted
pub struct CourtView<'a> {
    pub active: Option<PositionId>,
    pub allowed: &'a [PositionId],
    pub flashing: bool,
}

/// Court coordinates grow downwards from the net; the canvas grows upwards
fn flip(y: f64) -> f64 {
    COURT_HEIGHT - y
}

impl Widget for CourtView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let active_style = {
            let style = Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD);
            if self.flashing {
                style.add_modifier(Modifier::REVERSED)
            } else {
                style
            }
        };

        Canvas::default()
            .block(Block::default().borders(Borders::ALL).title(" Court "))
            .marker(Marker::Braille)
            .x_bounds([0.0, COURT_WIDTH])
            .y_bounds([0.0, COURT_HEIGHT])
            .paint(|ctx| {
                ctx.draw(&Rectangle {
                    x: 0.0,
                    y: 0.0,
                    width: COURT_WIDTH,
                    height: COURT_HEIGHT,
                    color: Color::DarkGray,
                });
                ctx.draw(&CanvasLine {
                    x1: 0.0,
                    y1: flip(NET_Y),
                    x2: COURT_WIDTH,
                    y2: flip(NET_Y),
                    color: Color::White,
                });
                ctx.draw(&CanvasLine {
                    x1: 0.0,
                    y1: flip(SERVICE_Y),
                    x2: COURT_WIDTH,
                    y2: flip(SERVICE_Y),
                    color: Color::DarkGray,
                });
                ctx.draw(&CanvasLine {
                    x1: COURT_WIDTH / 2.0,
                    y1: flip(SERVICE_Y),
                    x2: COURT_WIDTH / 2.0,
                    y2: 0.0,
                    color: Color::DarkGray,
                });

                if let Some(id) = self.active {
                    let target = &POSITIONS[usize::from(id.get() - 1)];
                    ctx.draw(&CanvasLine {
                        x1: COURT_CENTER.0,
                        y1: flip(COURT_CENTER.1),
                        x2: target.x,
                        y2: flip(target.y),
                        color: Color::Yellow,
                    });
                }
                ctx.layer();

                ctx.print(
                    COURT_CENTER.0,
                    flip(COURT_CENTER.1),
                    Span::styled("●", Style::default().fg(Color::Cyan)),
                );
                for position in POSITIONS.iter() {
                    let label = position.id.to_string();
                    let style = if self.active == Some(position.id) {
                        active_style
                    } else if self.allowed.contains(&position.id) {
                        Style::default().fg(Color::White)
                    } else {
                        Style::default().fg(Color::DarkGray)
                    };
                    ctx.print(position.x, flip(position.y), Span::styled(label, style));
                }
            })
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(view: CourtView) -> Buffer {
        let area = Rect::new(0, 0, 40, 20);
        let mut buf = Buffer::empty(area);
        view.render(area, &mut buf);
        buf
    }

    fn find(buf: &Buffer, symbol: &str) -> Option<(u16, u16)> {
        let area = buf.area;
        (area.top()..area.bottom())
            .flat_map(|y| (area.left()..area.right()).map(move |x| (x, y)))
            .find(|&(x, y)| buf[(x, y)].symbol() == symbol)
    }

    #[test]
    fn every_position_is_labelled() {
        let buf = rendered(CourtView {
            active: None,
            allowed: &[],
            flashing: false,
        });
        for n in 1..=8 {
            assert!(find(&buf, &n.to_string()).is_some(), "missing label {n}");
        }
    }

    #[test]
    fn net_positions_are_drawn_above_back_positions() {
        let buf = rendered(CourtView {
            active: None,
            allowed: &[],
            flashing: false,
        });
        let (_, front) = find(&buf, "2").unwrap();
        let (_, back) = find(&buf, "6").unwrap();
        assert!(front < back);
    }

    #[test]
    fn active_position_is_highlighted_and_flashes() {
        let id = PositionId::new(5).unwrap();
        let buf = rendered(CourtView {
            active: Some(id),
            allowed: &[id],
            flashing: true,
        });
        let (x, y) = find(&buf, "5").unwrap();
        let cell = &buf[(x, y)];
        assert_eq!(cell.fg, Color::Yellow);
        assert!(cell.modifier.contains(Modifier::REVERSED));

        let buf = rendered(CourtView {
            active: Some(id),
            allowed: &[id],
            flashing: false,
        });
        let (x, y) = find(&buf, "5").unwrap();
        assert!(!buf[(x, y)].modifier.contains(Modifier::REVERSED));
    }
}
