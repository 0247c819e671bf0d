use crate::styles::{self, Palette};
use ratatui::style::Style;
use tilechat_common::{ChatMessage, ImageRef, Role};
use tilechat_format::{FormattedBlock, RichText};

/// A run of text drawn with one style.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub style: Style,
}

impl Segment {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// One logical transcript line, before wrapping to the terminal width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptLine {
    pub segments: Vec<Segment>,
}

impl TranscriptLine {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            segments: vec![Segment::new(text, style)],
        }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn plain(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// UI feedback that is not part of the conversation (rejections, help).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub lines: Vec<String>,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            lines: vec![text.into()],
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            lines: vec![text.into()],
        }
    }
}

pub fn render_notice(notice: &Notice, palette: &Palette) -> Vec<TranscriptLine> {
    let (marker, style) = match notice.level {
        NoticeLevel::Info => ("·", palette.system()),
        NoticeLevel::Error => ("×", palette.error()),
    };
    let mut out: Vec<TranscriptLine> = notice
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let prefix = if i == 0 { marker } else { " " };
            TranscriptLine::new(format!("{prefix} {line}"), style)
        })
        .collect();
    out.push(TranscriptLine::blank());
    out
}

/// Lines for one message. User text is shown verbatim; assistant text goes
/// through the reply formatter.
pub fn render_message(message: &ChatMessage, palette: &Palette) -> Vec<TranscriptLine> {
    let mut out = Vec::new();
    match message.role() {
        Role::User => {
            out.push(TranscriptLine::new("→ [You]", palette.user_header()));
            if let Some(text) = message.text() {
                for line in text.lines() {
                    out.push(TranscriptLine::new(format!("  {line}"), palette.user_text()));
                }
            }
            for image in message.attachments() {
                out.push(TranscriptLine::new(
                    format!("  ▣ {}", describe_image(image)),
                    palette.dim(),
                ));
            }
        }
        Role::Assistant => {
            out.push(TranscriptLine::new("← [Tilechat]", palette.assistant_header()));
            let blocks = tilechat_format::format_opt(message.text());
            out.extend(blocks.iter().map(|b| render_block(b, palette)));
        }
    }
    out.push(TranscriptLine::blank());
    out
}

fn render_block(block: &FormattedBlock, palette: &Palette) -> TranscriptLine {
    let mut segments = vec![Segment::new("  ", palette.assistant_text())];
    match block {
        FormattedBlock::SectionTitle(text) => {
            push_rich(&mut segments, text, palette.title());
        }
        FormattedBlock::Subsection(text) => {
            segments.push(Segment::new("• ", palette.subsection()));
            push_rich(&mut segments, text, palette.subsection());
        }
        FormattedBlock::KeyValue { key, value } => {
            push_rich(&mut segments, key, palette.label());
            segments.push(Segment::new(": ", palette.label()));
            push_rich(&mut segments, value, palette.value());
        }
        FormattedBlock::Paragraph(text) => {
            push_rich(&mut segments, text, palette.assistant_text());
        }
    }
    TranscriptLine::from_segments(segments)
}

fn push_rich(out: &mut Vec<Segment>, text: &RichText, base: Style) {
    out.extend(text.spans().iter().map(|span| {
        let style = if span.emphasis {
            styles::emphasis(base)
        } else {
            base
        };
        Segment::new(span.text.clone(), style)
    }));
}

/// `name (mime, size)` for previews and transcript entries.
pub fn describe_image(image: &ImageRef) -> String {
    format!(
        "{} ({}, {})",
        image.name(),
        image.mime_type(),
        human_size(image.len() as u64)
    )
}

pub fn human_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / (KIB * KIB))
    }
}
