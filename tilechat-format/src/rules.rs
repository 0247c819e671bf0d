//! Line classification table.
//!
//! Rules are tried in order and the first match wins: numbered title, dash
//! subsection, `key: value`, then plain paragraph. Each rule sees the trimmed
//! line after emphasis substitution.

use regex::Regex;
use std::sync::LazyLock;

use crate::rich::{Markers, RichText};
use crate::FormattedBlock;

static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.").expect("static numbered-title pattern"));

/// One entry of the classification table.
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub build: fn(&str, Markers) -> FormattedBlock,
}

pub static RULES: [Rule; 4] = [
    Rule {
        name: "section-title",
        matches: is_numbered,
        build: section_title,
    },
    Rule {
        name: "subsection",
        matches: is_dashed,
        build: subsection,
    },
    Rule {
        name: "key-value",
        matches: has_colon,
        build: key_value,
    },
    Rule {
        name: "paragraph",
        matches: always,
        build: paragraph,
    },
];

/// Classify a single trimmed, marked-up line.
pub(crate) fn classify(line: &str, markers: Markers) -> FormattedBlock {
    RULES
        .iter()
        .find(|rule| (rule.matches)(line))
        .map(|rule| (rule.build)(line, markers))
        .unwrap_or_else(|| paragraph(line, markers))
}

fn is_numbered(line: &str) -> bool {
    NUMBERED.is_match(line)
}

fn is_dashed(line: &str) -> bool {
    line.starts_with('-')
}

fn has_colon(line: &str) -> bool {
    line.contains(':')
}

fn always(_: &str) -> bool {
    true
}

fn section_title(line: &str, markers: Markers) -> FormattedBlock {
    FormattedBlock::SectionTitle(RichText::from_marked(line, markers))
}

fn subsection(line: &str, markers: Markers) -> FormattedBlock {
    let rest = line.strip_prefix('-').unwrap_or(line).trim();
    FormattedBlock::Subsection(RichText::from_marked(rest, markers).emphasized())
}

fn key_value(line: &str, markers: Markers) -> FormattedBlock {
    let (key, value) = line.split_once(':').unwrap_or((line, ""));
    FormattedBlock::KeyValue {
        key: RichText::from_marked(key.trim(), markers),
        value: RichText::from_marked(value.trim(), markers),
    }
}

fn paragraph(line: &str, markers: Markers) -> FormattedBlock {
    FormattedBlock::Paragraph(RichText::from_marked(line, markers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rich::Span;

    fn rule(name: &str) -> &'static Rule {
        RULES.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn table_order_is_title_dash_colon_plain() {
        let names: Vec<_> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(names, ["section-title", "subsection", "key-value", "paragraph"]);
    }

    #[test]
    fn numbered_rule_needs_digits_then_dot() {
        let r = rule("section-title");
        assert!((r.matches)("1. Tiles"));
        assert!((r.matches)("12.Grout"));
        assert!(!(r.matches)("1 Tiles"));
        assert!(!(r.matches)("a1. Tiles"));
        assert!(!(r.matches)(".1 Tiles"));
    }

    #[test]
    fn dash_rule_strips_one_dash_and_emphasises() {
        let block = (rule("subsection").build)("-- deep", Markers::default());
        assert_eq!(
            block,
            FormattedBlock::Subsection(RichText::new(vec![Span::bold("- deep")]))
        );
    }

    #[test]
    fn colon_rule_splits_on_first_colon_only() {
        let block = (rule("key-value").build)("Time: 10:30 am", Markers::default());
        assert_eq!(
            block,
            FormattedBlock::KeyValue {
                key: RichText::plain_text("Time"),
                value: RichText::plain_text("10:30 am"),
            }
        );
    }

    #[test]
    fn colon_rule_allows_empty_sides() {
        let block = (rule("key-value").build)(": trailing", Markers::default());
        assert_eq!(
            block,
            FormattedBlock::KeyValue {
                key: RichText::default(),
                value: RichText::plain_text("trailing"),
            }
        );
    }

    #[test]
    fn dash_beats_colon_and_number_beats_dash() {
        let kind = |line| classify(line, Markers::default()).kind();
        assert_eq!(kind("- note: x"), "subsection");
        assert_eq!(kind("1. a: b"), "section-title");
        assert_eq!(kind("plain"), "paragraph");
    }
}
