//! Inline bold / italic / strikethrough spans within a single line.
//!
//! Styles do not nest: when spans overlap, the one that starts first wins and
//! the others are dropped.

use crate::markdown::{
    blocks::{TextAttrs, TextRun},
    ConvertError, Patterns,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineFormat {
    Bold,
    Italic,
    Strikethrough,
}

impl InlineFormat {
    pub fn attrs(self) -> TextAttrs {
        match self {
            Self::Bold => TextAttrs::bold(),
            Self::Italic => TextAttrs::italic(),
            Self::Strikethrough => TextAttrs::strikethrough(),
        }
    }
}

/// Byte offsets into the line; `end` is exclusive and covers the delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMatch {
    pub start: usize,
    pub end: usize,
    pub format: InlineFormat,
    pub text: String,
}

impl InlineMatch {
    fn overlaps(&self, other: &InlineMatch) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Every candidate span, sorted by start offset. Spans with empty inner text
/// (`****`, `**` read as italic) are not candidates.
pub(crate) fn find_matches(patterns: &Patterns, line: &str) -> Vec<InlineMatch> {
    let mut matches = Vec::new();
    for (format, regex) in &patterns.inline {
        for captures in regex.captures_iter(line) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let inner = captures
                .iter()
                .skip(1)
                .flatten()
                .map(|group| group.as_str())
                .find(|text| !text.is_empty());
            if let Some(text) = inner {
                matches.push(InlineMatch {
                    start: whole.start(),
                    end: whole.end(),
                    format: *format,
                    text: text.to_string(),
                });
            }
        }
    }
    // Stable: on equal starts, bold beats italic beats strikethrough.
    matches.sort_by_key(|found| found.start);
    matches
}

pub fn resolve_overlaps(sorted: Vec<InlineMatch>) -> Vec<InlineMatch> {
    let mut accepted: Vec<InlineMatch> = Vec::with_capacity(sorted.len());
    for candidate in sorted {
        if !accepted.iter().any(|kept| candidate.overlaps(kept)) {
            accepted.push(candidate);
        }
    }
    accepted
}

/// Splits a line into runs: trimmed unstyled gaps around each accepted span.
pub(crate) fn build_runs(patterns: &Patterns, line: &str) -> Result<Vec<TextRun>, ConvertError> {
    let resolved = resolve_overlaps(find_matches(patterns, line));

    let mut runs = Vec::new();
    let mut cursor = 0;
    for found in resolved {
        if found.start > cursor {
            push_gap(&mut runs, slice(line, cursor, found.start)?);
        }
        runs.push(TextRun::styled(found.text, found.format.attrs()));
        cursor = found.end;
    }
    if cursor < line.len() {
        push_gap(&mut runs, slice(line, cursor, line.len())?);
    }

    if runs.is_empty() {
        runs.push(TextRun::plain(line.trim()));
    }
    Ok(runs)
}

fn push_gap(runs: &mut Vec<TextRun>, gap: &str) {
    let gap = gap.trim();
    if !gap.is_empty() {
        runs.push(TextRun::plain(gap));
    }
}

fn slice(line: &str, start: usize, end: usize) -> Result<&str, ConvertError> {
    line.get(start..end)
        .ok_or(ConvertError::Boundary { start, end })
}
