//! Pure render function for the help overlay.

use super::styles::Palette;
use crate::keymap::{HelpCategory, HelpEntry};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Paragraph},
    Frame,
};

const KEY_COLUMN: usize = 10;

/// Build the overlay text from the keymap's help metadata.
pub fn help_lines(entries: &[(HelpCategory, Vec<HelpEntry>)], palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled("Keyboard Shortcuts", palette.style_accent())),
        Line::from(""),
    ];

    for (category, items) in entries {
        lines.push(Line::from(Span::styled(
            category.display_name(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for entry in items {
            let mut spans = vec![
                Span::styled(
                    format!("  {:<width$}", entry.key_display, width = KEY_COLUMN),
                    palette.style_key(),
                ),
                Span::raw(entry.description),
            ];
            if let Some(hint) = entry.context_hint {
                spans.push(Span::styled(format!("  ({hint})"), palette.style_muted()));
            }
            lines.push(Line::from(spans));
        }
        lines.push(Line::from(""));
    }

    lines.push(Line::from(Span::styled(
        "Esc to close",
        palette.style_muted(),
    )));
    lines
}

/// Render the help overlay.
pub fn render(
    frame: &mut Frame,
    area: Rect,
    entries: &[(HelpCategory, Vec<HelpEntry>)],
    palette: &Palette,
) {
    // Center the help popup
    let popup_area = centered_rect(60, 80, area);

    // Clear the background
    frame.render_widget(Clear, popup_area);

    let help = Paragraph::new(help_lines(entries, palette))
        .block(
            Block::default()
                .title(" Help ")
                .borders(Borders::ALL)
                .padding(Padding::uniform(1))
                .style(palette.style_status()),
        )
        .alignment(Alignment::Left);

    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(ratatui::layout::Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
