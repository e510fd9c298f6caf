//! Pure render functions for the comment thread and story list views.

use super::styles::Palette;
use crate::adapters::memory_page::MemoryRow;
use crate::domain::{EntityKind, VoteDirection};
use crate::ports::page::{Row, COLLAPSED_CLASS, DEAD_CLASS};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph},
    Frame,
};
use std::rc::Rc;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// A rendered screen line that belongs to a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub y: u16,
    pub row_id: String,
    /// Line is the reply input box.
    pub in_input: bool,
}

struct RenderedLine {
    line: Line<'static>,
    in_input: bool,
}

/// Render the visible rows starting at `scroll`. Returns the screen lines
/// each row occupies, for mapping clicks back to rows.
pub fn render(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    rows: &[&Rc<MemoryRow>],
    scroll: usize,
    active: Option<&str>,
    palette: &Palette,
) -> Vec<Hit> {
    let block = Block::default()
        .title(format!(" {title} "))
        .borders(Borders::ALL)
        .padding(Padding::horizontal(1));
    let inner = block.inner(area);

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut hits = Vec::new();
    let capacity = inner.height as usize;

    'rows: for row in rows.iter().skip(scroll) {
        let is_active = active == Some(row.id());
        for rendered in row_lines(row, inner.width, is_active, palette) {
            if lines.len() >= capacity {
                break 'rows;
            }
            hits.push(Hit {
                y: inner.y + lines.len() as u16,
                row_id: row.id().to_string(),
                in_input: rendered.in_input,
            });
            lines.push(rendered.line);
        }
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
    hits
}

/// Lines a row takes at `width` columns.
pub fn row_height(row: &MemoryRow, width: u16, palette: &Palette) -> usize {
    row_lines(row, width, false, palette).len()
}

/// Render the one-line status bar: a message when there is one, else key hints.
pub fn render_status(frame: &mut Frame, area: Rect, message: Option<&str>, palette: &Palette) {
    let line = match message {
        Some(message) => Line::from(Span::raw(format!(" {message}"))),
        None => {
            let mut spans = Vec::new();
            for (key, label) in [("j/k", "move"), ("?", "help"), ("q", "quit")] {
                spans.push(Span::styled(format!(" [{key}]"), palette.style_key()));
                spans.push(Span::raw(format!(" {label}")));
            }
            Line::from(spans)
        }
    };
    frame.render_widget(Paragraph::new(line).style(palette.style_status()), area);
}

/// First scroll offset at which row `target` is fully visible, moving as
/// little as possible from `scroll`.
pub fn scroll_to_fit(heights: &[usize], scroll: usize, target: usize, viewport: usize) -> usize {
    if target >= heights.len() {
        return scroll.min(heights.len().saturating_sub(1));
    }
    if target < scroll {
        return target;
    }
    let mut scroll = scroll;
    let mut used: usize = heights[scroll..=target].iter().sum();
    while used > viewport && scroll < target {
        used -= heights[scroll];
        scroll += 1;
    }
    scroll
}

fn row_lines(row: &MemoryRow, width: u16, active: bool, palette: &Palette) -> Vec<RenderedLine> {
    let mut out = match row.data().kind {
        EntityKind::Story => story_lines(row, palette),
        EntityKind::Comment => comment_lines(row, width, palette),
    };
    if active {
        for rendered in &mut out {
            let line = std::mem::take(&mut rendered.line);
            rendered.line = line.style(palette.style_active());
        }
    }
    out
}

fn badges(row: &MemoryRow, palette: &Palette) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    match row.vote() {
        Some(VoteDirection::Up) => spans.push(Span::styled(" ▲", palette.style_accent())),
        Some(VoteDirection::Down) => spans.push(Span::styled(" ▼", palette.style_accent())),
        None => {}
    }
    if row.favorited() {
        spans.push(Span::styled(" ★", ratatui::style::Style::default().fg(palette.favorite)));
    }
    if row.flagged() {
        spans.push(Span::styled(" ⚑", ratatui::style::Style::default().fg(palette.flag)));
    }
    spans
}

fn story_lines(row: &MemoryRow, palette: &Palette) -> Vec<RenderedLine> {
    let data = row.data();
    let mut title = vec![
        Span::styled(
            format!("{:>3}. ", data.rank.unwrap_or_default()),
            palette.style_muted(),
        ),
        Span::styled(data.text.clone(), palette.style_title()),
    ];
    if let Some(domain) = data.url.as_deref().and_then(domain_of) {
        title.push(Span::styled(format!(" ({domain})"), palette.style_muted()));
    }
    title.extend(badges(row, palette));

    let mut meta = String::from("     ");
    if let Some(points) = data.points {
        meta.push_str(&format!("{points} points "));
    }
    if let Some(author) = &data.author {
        meta.push_str(&format!("by {author} "));
    }
    if let Some(age) = &data.age {
        meta.push_str(age);
    }

    vec![
        RenderedLine {
            line: Line::from(title),
            in_input: false,
        },
        RenderedLine {
            line: Line::from(Span::styled(meta, palette.style_muted())),
            in_input: false,
        },
    ]
}

fn comment_lines(row: &MemoryRow, width: u16, palette: &Palette) -> Vec<RenderedLine> {
    let data = row.data();
    let indent = "  ".repeat(data.depth as usize);
    let mut out = Vec::new();

    if row.has_class(DEAD_CLASS) {
        out.push(RenderedLine {
            line: Line::from(vec![
                Span::raw(indent),
                Span::styled("[dead]", palette.style_dead()),
            ]),
            in_input: false,
        });
        return out;
    }

    let collapsed = row.has_class(COLLAPSED_CLASS);
    let mut header = vec![
        Span::raw(indent.clone()),
        Span::styled(
            data.author.clone().unwrap_or_else(|| "?".to_string()),
            palette.style_author(),
        ),
    ];
    if let Some(age) = &data.age {
        header.push(Span::styled(format!(" {age}"), palette.style_muted()));
    }
    let toggle = if collapsed {
        format!(" [{} more]", row.hidden_count() + 1)
    } else {
        " [–]".to_string()
    };
    header.push(Span::styled(toggle, palette.style_muted()));
    header.extend(badges(row, palette));
    out.push(RenderedLine {
        line: Line::from(header),
        in_input: false,
    });

    if collapsed {
        return out;
    }

    let body_indent = format!("{indent}  ");
    let body_width = (width as usize).saturating_sub(body_indent.width()).max(10);
    for text in wrap(&data.text, body_width) {
        out.push(RenderedLine {
            line: Line::from(vec![
                Span::raw(body_indent.clone()),
                Span::styled(text, palette.style_default()),
            ]),
            in_input: false,
        });
    }

    if row.is_reply_open() {
        out.push(RenderedLine {
            line: Line::from(vec![
                Span::raw(body_indent),
                Span::styled("┃ reply… (Esc to close)", palette.style_key()),
            ]),
            in_input: true,
        });
    }
    out
}

fn domain_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://")?.1;
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    (!host.is_empty()).then_some(host)
}

/// Greedy word wrap by display width. Explicit newlines are kept and
/// words wider than `width` are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let word_width = word.width();
            if current_width > 0 && current_width + 1 + word_width > width {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            if word_width > width {
                for ch in word.chars() {
                    let w = ch.width().unwrap_or(0);
                    if current_width + w > width {
                        lines.push(std::mem::take(&mut current));
                        current_width = 0;
                    }
                    current.push(ch);
                    current_width += w;
                }
                continue;
            }
            if current_width > 0 {
                current.push(' ');
                current_width += 1;
            }
            current.push_str(word);
            current_width += word_width;
        }
        lines.push(current);
    }

    // Collapse runs of blank lines left by paragraph breaks.
    lines.dedup_by(|a, b| a.is_empty() && b.is_empty());
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_page::{MemoryPage, RowData};
    use crate::ports::page::Control;
    use pretty_assertions::assert_eq;

    #[test]
    fn wrap_breaks_on_words_and_keeps_paragraphs() {
        assert_eq!(
            wrap("the quick brown fox", 9),
            vec!["the quick", "brown fox"]
        );
        assert_eq!(wrap("a\n\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap("", 10), Vec::<String>::new());
    }

    #[test]
    fn scroll_moves_just_enough() {
        let heights = [2, 2, 2, 2, 2];
        assert_eq!(scroll_to_fit(&heights, 0, 1, 4), 0);
        assert_eq!(scroll_to_fit(&heights, 0, 3, 4), 2);
        assert_eq!(scroll_to_fit(&heights, 3, 1, 4), 1);
        // A row taller than the viewport is pinned to the top.
        assert_eq!(scroll_to_fit(&[1, 10], 0, 1, 4), 1);
        assert_eq!(scroll_to_fit(&heights, 2, 9, 4), 2);
    }

    #[test]
    fn collapsed_and_dead_comments_render_headers_only() {
        let mut dead = RowData::comment("d", 0, "[deleted]");
        dead.dead = true;
        let page = MemoryPage::new(
            Some("1".to_string()),
            vec![
                RowData::comment("a", 0, "one two three"),
                RowData::comment("a1", 1, "child"),
                dead,
            ],
        );
        let palette = crate::ui::styles::find_palette("dark").unwrap();
        let a = page.row("a").unwrap();
        assert_eq!(row_height(a, 40, &palette), 2);

        let toggle = a.control(Control::ThreadToggle).unwrap();
        a.click(&toggle);
        assert_eq!(row_height(a, 40, &palette), 1);
        assert_eq!(row_height(page.row("d").unwrap(), 40, &palette), 1);
    }

    #[test]
    fn open_reply_adds_an_input_line() {
        let page = MemoryPage::new(Some("1".to_string()), vec![RowData::comment("a", 0, "hi")]);
        let a = page.row("a").unwrap();
        a.click(&a.control(Control::Reply).unwrap());

        let palette = crate::ui::styles::find_palette("dark").unwrap();
        let lines = row_lines(a, 40, false, &palette);
        assert_eq!(lines.len(), 3);
        assert!(lines[2].in_input);
    }

    #[test]
    fn domains_strip_scheme_and_www() {
        assert_eq!(domain_of("https://www.example.com/a?b"), Some("example.com"));
        assert_eq!(domain_of("http://sub.example.org"), Some("sub.example.org"));
        assert_eq!(domain_of("not a url"), None);
    }
}
