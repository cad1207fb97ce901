//! Detects whether a task's span in a document still holds the text the
//! cache last saw, and describes the difference when it doesn't.

use serde::Serialize;

use super::line;
use super::types::TaskLocation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanCheck {
    Identical,
    Diverged { known: String, current: String },
}

/// Exact comparison. Whitespace differences count.
pub fn detect(known: &str, current: &str) -> SpanCheck {
    if known == current {
        SpanCheck::Identical
    } else {
        SpanCheck::Diverged {
            known: known.to_string(),
            current: current.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSegment {
    pub text: String,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DiffLine {
    Same { text: String },
    Changed { known: Vec<DiffSegment>, current: Vec<DiffSegment> },
}

fn push_segment(segments: &mut Vec<DiffSegment>, ch: char, changed: bool) {
    match segments.last_mut() {
        Some(last) if last.changed == changed => last.text.push(ch),
        _ => segments.push(DiffSegment {
            text: ch.to_string(),
            changed,
        }),
    }
}

/// Positional diff: line `i` is compared with line `i`, then character `j`
/// with character `j`. No alignment is attempted.
pub fn diff_lines(known: &str, current: &str) -> Vec<DiffLine> {
    let old: Vec<&str> = known.split('\n').collect();
    let new: Vec<&str> = current.split('\n').collect();
    let rows = old.len().max(new.len());
    let mut out = Vec::with_capacity(rows);
    for i in 0..rows {
        let a = old.get(i).copied().unwrap_or_default();
        let b = new.get(i).copied().unwrap_or_default();
        if a == b {
            out.push(DiffLine::Same {
                text: a.to_string(),
            });
            continue;
        }
        let a_chars: Vec<char> = a.chars().collect();
        let b_chars: Vec<char> = b.chars().collect();
        let mut known_segments = Vec::new();
        let mut current_segments = Vec::new();
        for j in 0..a_chars.len().max(b_chars.len()) {
            let (x, y) = (a_chars.get(j), b_chars.get(j));
            let changed = x != y;
            if let Some(x) = x {
                push_segment(&mut known_segments, *x, changed);
            }
            if let Some(y) = y {
                push_segment(&mut current_segments, *y, changed);
            }
        }
        out.push(DiffLine::Changed {
            known: known_segments,
            current: current_segments,
        });
    }
    out
}

/// Everything an interactive resolver needs to show and settle a divergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanConflict {
    pub task_id: u64,
    pub rel_path: String,
    pub location: TaskLocation,
    pub known: String,
    pub current: String,
    pub proposed: String,
    pub diff: Vec<DiffLine>,
}

fn char_to_byte(s: &str, char_idx: usize) -> Option<usize> {
    if char_idx == 0 {
        return Some(0);
    }
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .nth(char_idx)
}

/// Spans run from the start column to the end of their last line, so text
/// appended to a task line counts as a change.
fn span_bounds(lines: &[&str], loc: &TaskLocation) -> Option<(usize, usize, usize, usize)> {
    if loc.start_line == 0 || loc.end_line < loc.start_line || loc.end_line > lines.len() {
        return None;
    }
    let (first, last) = (loc.start_line - 1, loc.end_line - 1);
    let start = char_to_byte(lines[first], loc.start_char_index)?;
    Some((first, start, last, lines[last].len()))
}

/// Text currently at `loc`, or `None` when the document no longer has those
/// lines or columns.
pub fn read_span(markdown: &str, loc: &TaskLocation) -> Option<String> {
    let lines = line::document_lines(markdown);
    let (first, start, last, end) = span_bounds(&lines, loc)?;
    if first == last {
        return Some(lines[first][start..end].to_string());
    }
    let mut parts = vec![&lines[first][start..]];
    parts.extend(lines[first + 1..last].iter().copied());
    parts.push(&lines[last][..end]);
    Some(parts.join("\n"))
}

/// Splices `replacement` over `loc`, keeping the document's line endings.
pub fn replace_span(markdown: &str, loc: &TaskLocation, replacement: &str) -> Option<String> {
    let newline = line::newline_of(markdown);
    let lines = line::document_lines(markdown);
    let (first, start, last, end) = span_bounds(&lines, loc)?;
    let spliced = format!("{}{}{}", &lines[first][..start], replacement, &lines[last][end..]);

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    out.extend(lines[..first].iter().copied());
    out.extend(spliced.split('\n'));
    out.extend(lines[last + 1..].iter().copied());
    Some(out.join(newline))
}
