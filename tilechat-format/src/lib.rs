//! Reply formatting for assistant messages.
//!
//! Model replies arrive as loosely structured text: `**bold**` runs, `###`
//! section breaks, numbered titles, dash bullets and `key: value` lines.
//! [`format`] turns such a reply into an ordered list of [`FormattedBlock`]s
//! that a renderer can style without interpreting any markup itself.
//!
//! User input is never passed through this crate; it is displayed verbatim.
//!
//! ```
//! use tilechat_format::{format, FormattedBlock};
//!
//! let blocks = format("### A\n1. first\n- sub\nkey: val\nplain");
//! let kinds: Vec<_> = blocks.iter().map(FormattedBlock::kind).collect();
//! assert_eq!(
//!     kinds,
//!     ["paragraph", "section-title", "subsection", "key-value", "paragraph"]
//! );
//! ```

mod rich;
pub mod rules;

use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::LazyLock;

pub use rich::{Markers, RichText, Span};

const SECTION_DELIMITER: &str = "###";

static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("static emphasis pattern"));

/// One structured unit of formatted output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum FormattedBlock {
    SectionTitle(RichText),
    Subsection(RichText),
    KeyValue { key: RichText, value: RichText },
    Paragraph(RichText),
}

impl FormattedBlock {
    /// Stable name of the block kind, matching the classification rule.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SectionTitle(_) => "section-title",
            Self::Subsection(_) => "subsection",
            Self::KeyValue { .. } => "key-value",
            Self::Paragraph(_) => "paragraph",
        }
    }

    /// Text content with emphasis dropped; key-value blocks read `key: value`.
    pub fn plain_text(&self) -> String {
        match self {
            Self::SectionTitle(t) | Self::Subsection(t) | Self::Paragraph(t) => t.plain(),
            Self::KeyValue { key, value } => format!("{}: {}", key.plain(), value.plain()),
        }
    }
}

/// Format a reply into display blocks. Empty input yields no blocks.
pub fn format(text: &str) -> Vec<FormattedBlock> {
    if text.is_empty() {
        return Vec::new();
    }

    let (marked, markers) = mark_emphasis(text);
    let blocks: Vec<FormattedBlock> = marked
        .split(SECTION_DELIMITER)
        .filter(|section| !section.trim().is_empty())
        .flat_map(|section| {
            section
                .split('\n')
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(move |line| rules::classify(line, markers))
        })
        .collect();

    tracing::trace!(input_len = text.len(), blocks = blocks.len(), "reply formatted");
    blocks
}

/// [`format`] for an absent reply.
pub fn format_opt(text: Option<&str>) -> Vec<FormattedBlock> {
    text.map(format).unwrap_or_default()
}

/// Replace `**content**` pairs (never spanning lines) with emphasis markers.
///
/// The markers are private-use characters absent from `text`, so any
/// private-use characters in the reply are kept as text. Only a reply that
/// uses up every private-use code point loses the default pair instead.
fn mark_emphasis(text: &str) -> (String, Markers) {
    let (source, markers) = match Markers::unused_in(text) {
        Some(markers) => (Cow::Borrowed(text), markers),
        None => {
            let markers = Markers::default();
            tracing::debug!("no free marker characters; dropping the default pair");
            let cleaned = text
                .chars()
                .filter(|c| *c != markers.open && *c != markers.close)
                .collect();
            (Cow::Owned(cleaned), markers)
        }
    };
    let replacement = format!("{}${{1}}{}", markers.open, markers.close);
    let marked = EMPHASIS.replace_all(&source, replacement.as_str()).into_owned();
    (marked, markers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(s: &str) -> FormattedBlock {
        FormattedBlock::Paragraph(RichText::plain_text(s))
    }

    #[test]
    fn empty_and_absent_yield_nothing() {
        assert!(format("").is_empty());
        assert!(format_opt(None).is_empty());
        assert!(format("  \n\n ### \n").is_empty());
    }

    #[test]
    fn plain_lines_become_paragraphs_in_order() {
        let blocks = format("first line\n\n  second line  \nthird");
        assert_eq!(
            blocks,
            vec![para("first line"), para("second line"), para("third")]
        );
    }

    #[test]
    fn bold_only_reply_is_one_emphasised_paragraph() {
        let blocks = format("**bold**");
        assert_eq!(
            blocks,
            vec![FormattedBlock::Paragraph(RichText::new(vec![Span::bold("bold")]))]
        );
    }

    #[test]
    fn mixed_section_classifies_every_rule() {
        let blocks = format("### A\n1. first\n- sub\nkey: val\nplain");
        assert_eq!(
            blocks,
            vec![
                para("A"),
                FormattedBlock::SectionTitle(RichText::plain_text("1. first")),
                FormattedBlock::Subsection(RichText::new(vec![Span::bold("sub")])),
                FormattedBlock::KeyValue {
                    key: RichText::plain_text("key"),
                    value: RichText::plain_text("val"),
                },
                para("plain"),
            ]
        );
    }

    #[test]
    fn heading_text_after_delimiter_is_a_paragraph() {
        // "### A" leaves " A" as the first line of the section.
        let blocks = format("intro\n### A\nbody");
        assert_eq!(blocks, vec![para("intro"), para("A"), para("body")]);
    }

    #[test]
    fn emphasis_is_non_greedy_and_unmatched_stars_stay_literal() {
        let blocks = format("**a** and **b** but **c");
        assert_eq!(
            blocks,
            vec![FormattedBlock::Paragraph(RichText::new(vec![
                Span::bold("a"),
                Span::plain(" and "),
                Span::bold("b"),
                Span::plain(" but **c"),
            ]))]
        );
    }

    #[test]
    fn emphasis_does_not_span_lines() {
        let blocks = format("**open\nclose**");
        assert_eq!(blocks, vec![para("**open"), para("close**")]);
    }

    #[test]
    fn colon_inside_bold_still_makes_key_value() {
        let blocks = format("**Note: tiles** are ceramic");
        assert_eq!(
            blocks,
            vec![FormattedBlock::KeyValue {
                key: RichText::new(vec![Span::bold("Note")]),
                // The emphasis opened in the key does not carry over the split.
                value: RichText::plain_text("tiles are ceramic"),
            }]
        );
    }

    #[test]
    fn bold_numbered_line_is_not_a_title() {
        let blocks = format("**1. Bathroom**");
        assert_eq!(blocks[0].kind(), "paragraph");
    }

    #[test]
    fn private_use_characters_in_replies_are_kept_verbatim() {
        let blocks = format("a\u{E000}b\u{E001}c **d**");
        assert_eq!(
            blocks,
            vec![FormattedBlock::Paragraph(RichText::new(vec![
                Span::plain("a\u{E000}b\u{E001}c "),
                Span::bold("d"),
            ]))]
        );
    }

    #[test]
    fn formatting_is_deterministic() {
        let input = "### Grout\n1. Mix\n- Ratio: 3:1\nCure: 24h\n### \nDone";
        assert_eq!(format(input), format(input));
        assert_eq!(format(input).len(), 5);
    }

    #[test]
    fn blocks_serialize_with_kind_tag() {
        let json = serde_json::to_value(&format("k: v")[0]).unwrap();
        assert_eq!(json["kind"], "key_value");
        assert_eq!(json["content"]["key"][0]["text"], "k");
    }
}
