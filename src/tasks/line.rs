use regex::Regex;
use std::sync::LazyLock;

use super::types::TaskStatus;

static TASK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ \t>]*)([-*+]|[0-9]+[.)]) \[([^\s\]]| )\] (.*)$").expect("valid task line regex")
});
static BLOCK_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\^([A-Za-z0-9-]+)\s*$").expect("valid block ref regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(#[\p{L}\p{N}_/-]+)").expect("valid tag regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLineMatch<'a> {
    pub indent: &'a str,
    pub marker: &'a str,
    pub status: TaskStatus,
    pub description: &'a str,
}

/// `indent marker [s] description`. Returns `None` for anything that is not a
/// checklist item with some text after the checkbox.
pub fn parse_task_line(line: &str) -> Option<TaskLineMatch<'_>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let caps = TASK_LINE_RE.captures(line)?;
    let description = caps.get(4)?.as_str();
    if description.trim().is_empty() {
        return None;
    }
    let symbol = caps.get(3)?.as_str().chars().next()?;
    Some(TaskLineMatch {
        indent: caps.get(1)?.as_str(),
        marker: caps.get(2)?.as_str(),
        status: TaskStatus::from_symbol(symbol),
        description,
    })
}

pub fn is_task_line(line: &str) -> bool {
    parse_task_line(line).is_some()
}

/// Splits a trailing ` ^block-id` off the description.
pub fn split_block_ref(description: &str) -> (&str, Option<String>) {
    match BLOCK_REF_RE.captures(description) {
        Some(caps) => {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(description.len());
            let id = caps.get(1).map(|m| m.as_str().to_string());
            (&description[..start], id)
        }
        None => (description, None),
    }
}

/// Removes `#tags` from `text`, returning them in order of appearance. A `#`
/// must start the text or follow whitespace, so URL fragments stay put.
pub fn take_tags(text: &mut String) -> Vec<String> {
    let mut tags = Vec::new();
    let mut spans = Vec::new();
    for caps in TAG_RE.captures_iter(text) {
        if let Some(tag) = caps.get(1) {
            if tag.as_str().len() > 1 {
                tags.push(tag.as_str().to_string());
                spans.push(tag.range());
            }
        }
    }
    for range in spans.into_iter().rev() {
        text.replace_range(range, " ");
    }
    tags
}

/// Lines of a document with any `\r` stripped, keeping a trailing empty
/// element when the document ends in a newline.
pub fn document_lines(markdown: &str) -> Vec<&str> {
    markdown
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect()
}

pub fn newline_of(markdown: &str) -> &'static str {
    if markdown.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

fn strip_quote(line: &str) -> &str {
    let trimmed = line.trim_start_matches(&[' ', '\t'][..]);
    match trimmed.strip_prefix('>') {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => line,
    }
}

fn leading_ws(line: &str) -> &str {
    let end = line
        .char_indices()
        .find(|(_, c)| *c != ' ' && *c != '\t')
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    &line[..end]
}

/// Non-blank lines after the task line at `task_idx` that are indented one
/// level deeper than the task. Stops at the first line that isn't.
pub fn body_lines(lines: &[&str], task_idx: usize, indentation: &str) -> Vec<String> {
    let Some(task_line) = lines.get(task_idx) else {
        return Vec::new();
    };
    let task_ws = leading_ws(strip_quote(task_line));
    let mut body = Vec::new();
    for line in lines.iter().skip(task_idx + 1) {
        let unquoted = strip_quote(line);
        if unquoted.trim().is_empty() {
            break;
        }
        let Some(rest) = unquoted.strip_prefix(task_ws) else {
            break;
        };
        let deeper = (!indentation.is_empty() && rest.starts_with(indentation))
            || rest.starts_with('\t')
            || rest.starts_with("    ");
        if !deeper {
            break;
        }
        body.push((*line).to_string());
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_checklist_shapes() {
        let m = parse_task_line("\t> - [x] Ship it").unwrap();
        assert_eq!(m.indent, "\t> ");
        assert_eq!(m.marker, "-");
        assert_eq!(m.status, TaskStatus::DONE);
        assert_eq!(m.description, "Ship it");

        let m = parse_task_line("12) [/] Ordered").unwrap();
        assert_eq!(m.marker, "12)");
        assert_eq!(m.status, TaskStatus::InProgress);

        assert_eq!(
            parse_task_line("* [?] Custom").unwrap().status,
            TaskStatus::Custom('?')
        );
        assert!(parse_task_line("- [ ]").is_none());
        assert!(parse_task_line("- [ ]   ").is_none());
        assert!(parse_task_line("- [] nope").is_none());
        assert!(parse_task_line("plain text").is_none());
        assert!(parse_task_line("-[ ] missing space").is_none());
    }

    #[test]
    fn block_ref_is_split_off() {
        let (rest, id) = split_block_ref("Call Bob ^abc-12");
        assert_eq!(rest, "Call Bob");
        assert_eq!(id.as_deref(), Some("abc-12"));
        assert_eq!(split_block_ref("2^10 is big").1, None);
    }

    #[test]
    fn tags_need_a_word_boundary() {
        let mut text = "Read #book see https://x.io/#frag and#not #a/b".to_string();
        let tags = take_tags(&mut text);
        assert_eq!(tags, vec!["#book".to_string(), "#a/b".to_string()]);
        assert!(text.contains("https://x.io/#frag"));
        assert!(text.contains("and#not"));
    }

    #[test]
    fn body_lines_stop_at_blank_or_outdent() {
        let doc = "- [ ] Parent\n\tfirst note\n\t- [ ] child\n\nlater\n";
        let lines = document_lines(doc);
        assert_eq!(
            body_lines(&lines, 0, "\t"),
            vec!["\tfirst note".to_string(), "\t- [ ] child".to_string()]
        );

        let quoted = "> - [ ] Quoted\n> \tdetail\n> other";
        let lines = document_lines(quoted);
        assert_eq!(body_lines(&lines, 0, "\t"), vec!["> \tdetail".to_string()]);
    }
}
