use crate::styles::Palette;
use crate::transcript::TranscriptLine;
use anyhow::Result;
use ratatui::{
    Frame, Terminal,
    backend::Backend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use textwrap::core::Fragment;
use textwrap::wrap_algorithms::wrap_first_fit;
use unicode_width::UnicodeWidthStr;

pub struct ViewSnap<'a> {
    pub palette: Palette,
    pub model: &'a str,
    pub input: &'a str,
    pub input_cursor: usize,
    pub lines: &'a [TranscriptLine],
    pub scroll: usize,
    pub busy: u32,
    pub spinner: &'static str,
    /// Labels of decoded attachments, in send order.
    pub attachments: Vec<String>,
    /// Names of files still decoding.
    pub decoding: Vec<String>,
    pub capacity: usize,
}

pub fn draw<B: Backend>(term: &mut Terminal<B>, snap: &ViewSnap<'_>) -> Result<()> {
    term.draw(|frame| render(frame, snap))?;
    Ok(())
}

fn render(frame: &mut Frame<'_>, snap: &ViewSnap<'_>) {
    let palette = snap.palette;
    let area = frame.area();
    frame.render_widget(Block::default().style(palette.base()), area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);

    // Header
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" Tilechat ", palette.accent()),
        Span::styled(
            format!("· {} · {} theme ", snap.model, palette.name()),
            palette.dim(),
        ),
    ]))
    .wrap(Wrap { trim: true });
    frame.render_widget(header, layout[0]);

    render_transcript(frame, layout[1], snap);
    render_attachments(frame, layout[2], snap);

    // Input box
    let input_box = Paragraph::new(snap.input.to_string())
        .style(palette.base())
        .block(Block::default().borders(Borders::ALL).title(" Message "));
    frame.render_widget(Clear, layout[3]);
    frame.render_widget(input_box, layout[3]);

    let caret_x = layout[3].x + 1 + visual_caret_col(snap.input, snap.input_cursor);
    let caret_y = layout[3].y + 1;
    frame.set_cursor_position(Position {
        x: caret_x,
        y: caret_y,
    });

    // Status bar
    let status_line = Line::from(vec![
        Span::raw(" "),
        Span::styled(snap.spinner, palette.busy()),
        Span::raw(" "),
        if snap.busy > 0 {
            Span::styled("Waiting for reply…", palette.busy())
        } else {
            Span::styled("Ready", palette.idle())
        },
        Span::styled(
            format!(" • requests: {} • /help for commands", snap.busy),
            palette.dim(),
        ),
    ]);
    let status = Paragraph::new(status_line)
        .block(Block::default().borders(Borders::ALL).title(" Status "));
    frame.render_widget(status, layout[4]);
}

fn render_transcript(frame: &mut Frame<'_>, area: Rect, snap: &ViewSnap<'_>) {
    let visible_h = area.height.saturating_sub(2) as usize;
    let content_width = area.width.saturating_sub(2) as usize;
    let wrapped = wrap_transcript(snap.lines, content_width);
    let total = wrapped.len();
    let scroll = snap.scroll.min(total.saturating_sub(visible_h));
    let start = total.saturating_sub(visible_h + scroll);
    let end = total.saturating_sub(scroll);

    let items: Vec<ListItem> = wrapped[start..end].iter().cloned().map(ListItem::new).collect();
    let title = if scroll > 0 {
        format!(" Conversation (↑{scroll}) ")
    } else {
        " Conversation ".to_string()
    };
    let body = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(body, area);
}

fn render_attachments(frame: &mut Frame<'_>, area: Rect, snap: &ViewSnap<'_>) {
    let palette = snap.palette;
    let used = snap.attachments.len() + snap.decoding.len();
    let mut spans = Vec::new();
    if used == 0 {
        spans.push(Span::styled("No images. /attach <path> to add one.", palette.dim()));
    }
    for (i, label) in snap.attachments.iter().enumerate() {
        spans.push(Span::styled(format!("[{}] ", i + 1), palette.accent()));
        spans.push(Span::styled(format!("{label}  "), palette.value()));
    }
    for name in &snap.decoding {
        spans.push(Span::styled(format!("[…] {name}  "), palette.dim()));
    }

    let title = format!(" Images {}/{} ", used, snap.capacity);
    let bar = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(bar, area);
}

fn visual_caret_col(input: &str, cursor: usize) -> u16 {
    UnicodeWidthStr::width(&input[..cursor]) as u16
}

/// A word of styled text with its trailing whitespace, as seen by the wrapper.
#[derive(Debug)]
struct StyledWord {
    word: String,
    whitespace: String,
    style: Style,
}

impl Fragment for StyledWord {
    fn width(&self) -> f64 {
        self.word.width() as f64
    }

    fn whitespace_width(&self) -> f64 {
        self.whitespace.width() as f64
    }

    fn penalty_width(&self) -> f64 {
        0.0
    }
}

fn styled_words(line: &TranscriptLine, width: usize) -> Vec<StyledWord> {
    let mut words: Vec<StyledWord> = Vec::new();
    for segment in &line.segments {
        for piece in segment.text.split_inclusive(' ') {
            let word = piece.trim_end_matches(' ');
            let whitespace = &piece[word.len()..];
            let chunks = split_wide(word, width);
            if chunks.is_empty() {
                // A run of spaces belongs to the preceding word.
                match words.last_mut() {
                    Some(last) => last.whitespace.push_str(whitespace),
                    None => words.push(StyledWord {
                        word: String::new(),
                        whitespace: whitespace.to_string(),
                        style: segment.style,
                    }),
                }
                continue;
            }
            let last = chunks.len() - 1;
            for (i, chunk) in chunks.into_iter().enumerate() {
                words.push(StyledWord {
                    word: chunk,
                    whitespace: if i == last {
                        whitespace.to_string()
                    } else {
                        String::new()
                    },
                    style: segment.style,
                });
            }
        }
    }
    words
}

/// Split a word wider than `width` columns into chunks that fit.
fn split_wide(word: &str, width: usize) -> Vec<String> {
    if word.is_empty() {
        return Vec::new();
    }
    if word.width() <= width {
        return vec![word.to_string()];
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if !current.is_empty() && current.width() + ch_width > width {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn wrap_transcript(lines: &[TranscriptLine], width: usize) -> Vec<Line<'static>> {
    let effective_width = width.max(1);
    let mut out = Vec::new();

    for entry in lines {
        let words = styled_words(entry, effective_width);
        if words.is_empty() {
            out.push(Line::default());
            continue;
        }

        for row in wrap_first_fit(&words, &[effective_width as f64]) {
            let mut spans = Vec::with_capacity(row.len() * 2);
            for (i, word) in row.iter().enumerate() {
                if !word.word.is_empty() {
                    spans.push(Span::styled(word.word.clone(), word.style));
                }
                if i + 1 < row.len() && !word.whitespace.is_empty() {
                    spans.push(Span::styled(word.whitespace.clone(), word.style));
                }
            }
            out.push(Line::from(spans));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Segment;
    use ratatui::backend::TestBackend;
    use ratatui::style::{Color, Modifier};

    fn text_of(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn wraps_across_styled_segments() {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let line = TranscriptLine::from_segments(vec![
            Segment::new("  use ", Style::default()),
            Segment::new("epoxy grout", bold),
            Segment::new(" for showers", Style::default()),
        ]);
        let rows = wrap_transcript(&[line], 12);
        let texts: Vec<_> = rows.iter().map(text_of).collect();
        assert_eq!(texts, ["  use epoxy", "grout for", "showers"]);
        assert!(rows[0].spans.iter().any(|s| s.content == "epoxy" && s.style == bold));
    }

    #[test]
    fn overlong_words_are_split() {
        let line = TranscriptLine::new("abcdefghij", Style::default());
        let texts: Vec<_> = wrap_transcript(&[line], 4).iter().map(text_of).collect();
        assert_eq!(texts, ["abcd", "efgh", "ij"]);
    }

    #[test]
    fn blank_lines_survive() {
        let rows = wrap_transcript(&[TranscriptLine::blank()], 10);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].spans.is_empty());
    }

    #[test]
    fn draws_transcript_attachments_and_status() {
        let mut term = Terminal::new(TestBackend::new(60, 16)).unwrap();
        let lines = vec![TranscriptLine::new("→ [You]", Style::default().fg(Color::Cyan))];
        let snap = ViewSnap {
            palette: Palette::new(false),
            model: "gemini-2.0-flash",
            input: "hello",
            input_cursor: 5,
            lines: &lines,
            scroll: 0,
            busy: 1,
            spinner: "⠋",
            attachments: vec!["floor.png (image/png, 1.0 KiB)".into()],
            decoding: vec!["wall.jpg".into()],
            capacity: 3,
        };
        draw(&mut term, &snap).unwrap();

        let buffer = term.backend().buffer().clone();
        let screen: String = (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n");

        assert!(screen.contains("light theme"));
        assert!(screen.contains("→ [You]"));
        assert!(screen.contains("Images 2/3"));
        assert!(screen.contains("[1] floor.png"));
        assert!(screen.contains("[…] wall.jpg"));
        assert!(screen.contains("Waiting for reply"));
    }
}
