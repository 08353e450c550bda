use anyhow::{Result, anyhow};
use regex::{Match, Regex};

/// Byte range of a located block in decoded save text.
///
/// Covers the newline that anchors the `BEGIN <tag>` opener through the end
/// of the matching `END` line, trailing newline included, so a substring
/// splice with a replacement block leaves the surrounding text untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub start: usize,
    pub end: usize,
}

impl BlockSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelimiterKind {
    /// `BEGIN <tag>` opening a multi-line block.
    Open,
    /// `BEGIN <tag> ... END` on one line; opens and closes itself.
    SelfClosed,
    /// A bare `END` line.
    Close,
}

#[derive(Debug, Clone, Copy)]
struct DelimiterEvent {
    /// Offset of the newline anchoring the delimiter line.
    pos: usize,
    /// Offset one past the line's trailing newline.
    line_end: usize,
    kind: DelimiterKind,
}

/// Emits line-anchored `BEGIN`/`END` delimiter events in text order.
///
/// Both patterns require the anchoring newline, and two adjacent delimiter
/// lines share one. The scan therefore resumes one character past each
/// event's anchor rather than past the whole match, keeping the shared
/// newline inside the next search window.
struct DelimiterScanner<'t> {
    text: &'t str,
    cursor: usize,
    begin: Regex,
    end: Regex,
}

impl<'t> DelimiterScanner<'t> {
    fn new(text: &'t str, cursor: usize) -> Result<Self> {
        let begin = Regex::new(r"(?i)\nBEGIN[ \t]+[^\n]*\n")
            .map_err(|err| anyhow!("delimiter pattern: {err}"))?;
        let end = Regex::new(r"(?i)\nEND[ \t\r]*\n")
            .map_err(|err| anyhow!("delimiter pattern: {err}"))?;
        Ok(Self {
            text,
            cursor,
            begin,
            end,
        })
    }

    fn next_event(&mut self) -> Option<DelimiterEvent> {
        if self.cursor >= self.text.len() {
            return None;
        }
        let begin = self.begin.find_at(self.text, self.cursor);
        let end = self.end.find_at(self.text, self.cursor);

        // A BEGIN and an END line cannot anchor on the same newline; if they
        // ever did, opening before closing keeps the depth conservative.
        let event = match (begin, end) {
            (Some(b), Some(e)) if b.start() <= e.start() => self.begin_event(b),
            (Some(b), None) => self.begin_event(b),
            (_, Some(e)) => DelimiterEvent {
                pos: e.start(),
                line_end: e.end(),
                kind: DelimiterKind::Close,
            },
            (None, None) => return None,
        };
        self.cursor = event.pos + 1;
        Some(event)
    }

    fn begin_event(&self, m: Match<'_>) -> DelimiterEvent {
        // `BEGIN Jobs Size 0 END` opens and closes on one line; the last
        // whitespace-separated token decides.
        let line = &self.text[m.start() + 1..m.end() - 1];
        let self_closed = line
            .split_ascii_whitespace()
            .next_back()
            .is_some_and(|token| token.eq_ignore_ascii_case("END"));
        DelimiterEvent {
            pos: m.start(),
            line_end: m.end(),
            kind: if self_closed {
                DelimiterKind::SelfClosed
            } else {
                DelimiterKind::Open
            },
        }
    }
}

/// Finds the span of the first top-level `BEGIN <tag> ... END` block.
///
/// The opener must sit alone on its line, anchored by a preceding newline;
/// nested blocks of the same delimiter shape are skipped by depth counting.
/// Returns `Ok(None)` when no opener exists or when the text runs out before
/// the block balances; an unbalanced file is never reported as a best-guess
/// span.
pub fn find_block(text: &str, tag: &str) -> Result<Option<BlockSpan>> {
    let opener = Regex::new(&format!(
        r"(?i)\nBEGIN[ \t]+{}[ \t\r]*\n",
        regex::escape(tag)
    ))
    .map_err(|err| anyhow!("opener pattern for '{tag}': {err}"))?;

    let Some(m) = opener.find(text) else {
        return Ok(None);
    };

    // Start on the opener's trailing newline so a delimiter on the very next
    // line is still anchored.
    let mut scanner = DelimiterScanner::new(text, m.end() - 1)?;
    let mut depth = 1usize;

    while let Some(event) = scanner.next_event() {
        match event.kind {
            DelimiterKind::Open => depth += 1,
            DelimiterKind::SelfClosed => {}
            DelimiterKind::Close => {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some(BlockSpan {
                        start: m.start(),
                        end: event.line_end,
                    }));
                }
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locate(text: &str) -> Option<BlockSpan> {
        find_block(text, "Construction").expect("patterns compile")
    }

    #[test]
    fn empty_block_has_minimal_span() {
        let text = "A\nBEGIN Construction\nEND\nB\n";
        let span = locate(text).expect("span");
        assert_eq!(&text[span.start..span.end], "\nBEGIN Construction\nEND\n");
    }

    #[test]
    fn one_line_children_do_not_change_depth() {
        let text = "Header\nBEGIN Construction\nBEGIN Jobs Size 5 END\n\
                    BEGIN PlanningJobs Size 100 END\nEND\nBEGIN Finance\nEND\n";
        let span = locate(text).expect("span");
        assert_eq!(
            &text[span.start..span.end],
            "\nBEGIN Construction\nBEGIN Jobs Size 5 END\nBEGIN PlanningJobs Size 100 END\nEND\n"
        );
        assert_eq!(&text[span.end..], "BEGIN Finance\nEND\n");
    }

    #[test]
    fn nested_child_immediately_after_opener_is_counted() {
        // The child opener shares its anchoring newline with the opener line;
        // missing it would close the span at the child's END.
        let text = "p\nBEGIN Construction\nBEGIN Jobs\nSize 1\nEND\nEND\nq\n";
        let span = locate(text).expect("span");
        assert_eq!(
            &text[span.start..span.end],
            "\nBEGIN Construction\nBEGIN Jobs\nSize 1\nEND\nEND\n"
        );
    }

    #[test]
    fn deep_nesting_balances() {
        let text = "X\nBEGIN Construction\nBEGIN A\nBEGIN B\nBEGIN C\nv 1\nEND\nEND\nEND\nEND\nY\n";
        let span = locate(text).expect("span");
        assert_eq!(&text[span.end..], "Y\n");
        assert!(text[span.start..span.end].ends_with("END\nEND\nEND\nEND\n"));
    }

    #[test]
    fn sibling_children_at_same_depth() {
        let text = "\nBEGIN Construction\nBEGIN Jobs\nEND\nBEGIN PlanningJobs\nEND\nEND\n";
        let span = locate(text).expect("span");
        assert_eq!(span.start, 0);
        assert_eq!(span.end, text.len());
    }

    #[test]
    fn mixed_one_line_and_nested_children() {
        let text = "\nBEGIN Construction\nBEGIN Jobs Size 2 END\nBEGIN BlockedAreas\nid 4\nEND\nEND\ntail\n";
        let span = locate(text).expect("span");
        assert_eq!(&text[span.end..], "tail\n");
    }

    #[test]
    fn missing_closer_is_not_found() {
        let text = "\nBEGIN Construction\nBEGIN Jobs\nEND\n";
        assert_eq!(locate(text), None);
    }

    #[test]
    fn closer_without_trailing_newline_is_not_found() {
        // EOF mid-scan: the final line never terminates, so the block never
        // balances.
        let text = "\nBEGIN Construction\nEND";
        assert_eq!(locate(text), None);
    }

    #[test]
    fn absent_tag_is_not_found() {
        let text = "\nBEGIN Finance\nEND\n";
        assert_eq!(locate(text), None);
    }

    #[test]
    fn tag_must_fill_its_line() {
        let text = "\nBEGIN ConstructionMaterials\nEND\n\nBEGIN Construction\nEND\n";
        let span = locate(text).expect("span");
        assert_eq!(&text[span.start..span.end], "\nBEGIN Construction\nEND\n");
    }

    #[test]
    fn delimiters_match_case_insensitively() {
        let text = "x\nbegin construction\nBegin Jobs Size 0 end\nEnd\ny\n";
        let span = locate(text).expect("span");
        assert_eq!(&text[span.end..], "y\n");
    }

    #[test]
    fn opener_requires_anchoring_newline() {
        let text = "BEGIN Construction\nEND\n";
        assert_eq!(locate(text), None);
    }

    #[test]
    fn crlf_lines_are_handled() {
        let text = "a\r\nBEGIN Construction\r\nBEGIN Jobs Size 0 END\r\nEND\r\nb\r\n";
        let span = locate(text).expect("span");
        assert_eq!(&text[span.end..], "b\r\n");
    }

    #[test]
    fn other_tags_can_be_located() {
        let text = "\nBEGIN Construction\nEND\n\nBEGIN Finance\nBalance 3\nEND\nrest\n";
        let span = find_block(text, "Finance").expect("patterns compile").expect("span");
        assert_eq!(&text[span.start..span.end], "\nBEGIN Finance\nBalance 3\nEND\n");
    }
}
