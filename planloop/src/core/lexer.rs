//! Line lexer for plan documents.
//!
//! Each line is classified on its own, with no knowledge of the surrounding
//! document. Section tracking happens in [`crate::core::parser`].

use std::sync::LazyLock;

use regex::Regex;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#+)\s+(.*?)\s*$").expect("heading regex"));
static DONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*- \[[xX]\](?: (.*))?$").expect("done regex"));
static PENDING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*- \[ \](?: (.*))?$").expect("pending regex"));
static BLOCKED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*- \[[bB]\](?: (.*))?$").expect("blocked regex"));

/// Classification of a single document line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTag<'a> {
    /// `#`-style heading. `level` is the number of leading `#`.
    Heading { level: usize, text: &'a str },
    TaskDone(&'a str),
    TaskPending(&'a str),
    TaskBlocked(&'a str),
    /// Any other non-blank line.
    Annotation(&'a str),
    /// Blank or whitespace-only line.
    Other,
}

impl<'a> LineTag<'a> {
    /// Raw text carried by the tag, used for feedback-marker scanning.
    pub fn text(&self) -> Option<&'a str> {
        match *self {
            LineTag::Heading { text, .. }
            | LineTag::TaskDone(text)
            | LineTag::TaskPending(text)
            | LineTag::TaskBlocked(text)
            | LineTag::Annotation(text) => Some(text),
            LineTag::Other => None,
        }
    }
}

/// Classify one line. Checkbox forms are tried in fixed order: done, pending, blocked.
pub fn classify_line(line: &str) -> LineTag<'_> {
    if let Some(caps) = HEADING_RE.captures(line) {
        let level = caps.get(1).map_or(0, |m| m.as_str().len());
        let text = caps.get(2).map_or("", |m| m.as_str());
        return LineTag::Heading { level, text };
    }
    if let Some(text) = checkbox_text(&DONE_RE, line) {
        return LineTag::TaskDone(text);
    }
    if let Some(text) = checkbox_text(&PENDING_RE, line) {
        return LineTag::TaskPending(text);
    }
    if let Some(text) = checkbox_text(&BLOCKED_RE, line) {
        return LineTag::TaskBlocked(text);
    }
    if line.trim().is_empty() {
        return LineTag::Other;
    }
    LineTag::Annotation(line)
}

/// Lex a whole document, one tag per line.
pub fn lex(text: &str) -> impl Iterator<Item = LineTag<'_>> {
    text.lines().map(classify_line)
}

fn checkbox_text<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    re.captures(line)
        .map(|caps| caps.get(1).map_or("", |m| m.as_str().trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_headings_with_level() {
        assert_eq!(
            classify_line("## TODO"),
            LineTag::Heading {
                level: 2,
                text: "TODO"
            }
        );
        assert_eq!(
            classify_line("# Plan: auth  "),
            LineTag::Heading {
                level: 1,
                text: "Plan: auth"
            }
        );
    }

    #[test]
    fn hash_without_space_is_not_a_heading() {
        assert_eq!(classify_line("#TODO"), LineTag::Annotation("#TODO"));
    }

    #[test]
    fn classifies_all_checkbox_forms() {
        assert_eq!(classify_line("- [ ] a"), LineTag::TaskPending("a"));
        assert_eq!(classify_line("- [x] b"), LineTag::TaskDone("b"));
        assert_eq!(classify_line("- [X] c"), LineTag::TaskDone("c"));
        assert_eq!(classify_line("- [B] d"), LineTag::TaskBlocked("d"));
        assert_eq!(classify_line("- [b] e"), LineTag::TaskBlocked("e"));
    }

    #[test]
    fn indented_checkbox_is_still_a_task() {
        assert_eq!(classify_line("  - [ ] nested"), LineTag::TaskPending("nested"));
    }

    #[test]
    fn empty_checkbox_is_still_a_task() {
        assert_eq!(classify_line("- [x]"), LineTag::TaskDone(""));
        assert_eq!(classify_line("- [ ]"), LineTag::TaskPending(""));
        assert_eq!(classify_line("  - [B] "), LineTag::TaskBlocked(""));
        assert_eq!(classify_line("- [x]done"), LineTag::Annotation("- [x]done"));
    }

    #[test]
    fn unknown_marker_is_annotation() {
        assert_eq!(classify_line("- [?] maybe"), LineTag::Annotation("- [?] maybe"));
        assert_eq!(classify_line("- plain bullet"), LineTag::Annotation("- plain bullet"));
    }

    #[test]
    fn blank_lines_are_other() {
        assert_eq!(classify_line(""), LineTag::Other);
        assert_eq!(classify_line("   \t"), LineTag::Other);
        assert_eq!(LineTag::Other.text(), None);
    }

    #[test]
    fn lex_handles_crlf() {
        let tags: Vec<_> = lex("## TODO\r\n- [ ] a\r\n").collect();
        assert_eq!(
            tags,
            vec![
                LineTag::Heading {
                    level: 2,
                    text: "TODO"
                },
                LineTag::TaskPending("a"),
            ]
        );
    }
}
