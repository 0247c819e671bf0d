use serde::Serialize;
use std::fmt;

/// Characters that open and close emphasis runs in an intermediate
/// marked-up line. Both are private-use code points that the source text
/// does not contain, so reply text passes through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markers {
    pub open: char,
    pub close: char,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            open: '\u{E000}',
            close: '\u{E001}',
        }
    }
}

impl Markers {
    /// First two private-use characters that do not occur in `text`.
    pub fn unused_in(text: &str) -> Option<Self> {
        let mut free = ('\u{E000}'..='\u{F8FF}')
            .chain('\u{F0000}'..='\u{FFFFD}')
            .filter(|c| !text.contains(*c));
        Some(Self {
            open: free.next()?,
            close: free.next()?,
        })
    }
}

/// A run of text that is either emphasised (bold) or plain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub text: String,
    pub emphasis: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasis: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasis: true,
        }
    }
}

/// Display text made of plain and emphasised spans. Never contains markup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RichText {
    spans: Vec<Span>,
}

impl RichText {
    pub fn new(spans: Vec<Span>) -> Self {
        let mut text = Self::default();
        for span in spans {
            text.push(span);
        }
        text
    }

    pub fn plain_text(text: impl Into<String>) -> Self {
        Self::new(vec![Span::plain(text)])
    }

    /// Decode a marked-up line. Unbalanced markers are tolerated: an opener
    /// without a closer emphasises to the end, a stray closer is dropped.
    pub(crate) fn from_marked(marked: &str, markers: Markers) -> Self {
        let mut text = Self::default();
        let mut current = String::new();
        let mut emphasis = false;

        for ch in marked.chars() {
            if ch == markers.open || ch == markers.close {
                text.push(Span {
                    text: std::mem::take(&mut current),
                    emphasis,
                });
                emphasis = ch == markers.open;
            } else {
                current.push(ch);
            }
        }
        text.push(Span {
            text: current,
            emphasis,
        });
        text
    }

    /// Same text with every span emphasised.
    pub fn emphasized(mut self) -> Self {
        let text = self.plain();
        self.spans = Vec::new();
        self.push(Span::bold(text));
        self
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Text with emphasis dropped.
    pub fn plain(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    fn push(&mut self, span: Span) {
        if span.text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.emphasis == span.emphasis => last.text.push_str(&span.text),
            _ => self.spans.push(span),
        }
    }
}

/// Renders emphasis back as `**text**`, for logs and plain terminals.
impl fmt::Display for RichText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for span in &self.spans {
            if span.emphasis {
                write!(f, "**{}**", span.text)?;
            } else {
                f.write_str(&span.text)?;
            }
        }
        Ok(())
    }
}
