use serde_yaml::{Mapping, Value};

/// Splits leading `---` YAML from the body. Also returns how many lines the
/// frontmatter block (both fences included) occupies.
pub fn split_frontmatter(markdown: &str) -> (&str, &str, usize) {
    let markdown = markdown.strip_prefix('\u{feff}').unwrap_or(markdown);
    let rest = match markdown
        .strip_prefix("---\n")
        .or_else(|| markdown.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return ("", markdown, 0),
    };
    for fence in ["\n---\n", "\n---\r\n", "\r\n---\r\n", "\r\n---\n"] {
        if let Some(idx) = rest.find(fence) {
            let yaml = &rest[..idx];
            let body = &rest[idx + fence.len()..];
            let lines = yaml.split('\n').count() + 2;
            return (yaml, body, lines);
        }
    }
    if let Some(yaml) = rest.strip_suffix("\n---").or_else(|| rest.strip_suffix("\r\n---")) {
        let lines = yaml.split('\n').count() + 2;
        return (yaml, "", lines);
    }
    ("", markdown, 0)
}

pub fn parse_frontmatter(markdown: &str) -> Option<Mapping> {
    let (yaml, _, _) = split_frontmatter(markdown);
    if yaml.trim().is_empty() {
        return None;
    }
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(map)) => Some(map),
        Ok(_) => None,
        Err(error) => {
            tracing::debug!(error = %error, "unparsable frontmatter ignored");
            None
        }
    }
}

pub fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.iter().find_map(|(k, v)| {
        k.as_str()
            .filter(|k| k.eq_ignore_ascii_case(key))
            .map(|_| v)
    })
}

pub fn get_string(map: &Mapping, key: &str) -> Option<String> {
    match get(map, key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Tags under `tags`, written as a YAML list or a comma/space separated
/// string. Returned with a leading `#`, original case, deduplicated in order.
pub fn frontmatter_tags(map: &Mapping) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(value) = get(map, "tags") {
        collect_tags(value, &mut out);
    }
    let mut seen = std::collections::HashSet::new();
    out.retain(|t| seen.insert(t.clone()));
    out
}

fn normalize_tag(raw: &str) -> Option<String> {
    let t = raw.trim();
    let t = t.strip_prefix('#').unwrap_or(t).trim();
    if t.is_empty() {
        return None;
    }
    if t.chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '/')
    {
        Some(format!("#{t}"))
    } else {
        None
    }
}

fn collect_tags(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Sequence(items) => {
            for item in items {
                collect_tags(item, out);
            }
        }
        Value::String(s) => {
            let parts: Vec<&str> = if s.contains(',') {
                s.split(',').map(str::trim).collect()
            } else {
                s.split_whitespace().collect()
            };
            out.extend(parts.into_iter().filter_map(normalize_tag));
        }
        Value::Number(n) => out.extend(normalize_tag(&n.to_string())),
        _ => {}
    }
}

pub fn has_tag(tags: &[String], wanted: &str) -> bool {
    let wanted = wanted.trim().trim_start_matches('#');
    !wanted.is_empty()
        && tags
            .iter()
            .any(|t| t.trim_start_matches('#').eq_ignore_ascii_case(wanted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_counts_fence_lines() {
        let doc = "---\ntitle: Plan\ntags: [a, b]\n---\n- [ ] task\n";
        let (yaml, body, lines) = split_frontmatter(doc);
        assert_eq!(yaml, "title: Plan\ntags: [a, b]");
        assert_eq!(body, "- [ ] task\n");
        assert_eq!(lines, 4);

        assert_eq!(split_frontmatter("no fm\n").2, 0);
        let crlf = "---\r\ntitle: x\r\n---\r\nbody";
        assert_eq!(split_frontmatter(crlf).1, "body");
    }

    #[test]
    fn tags_from_list_or_string() {
        let map = parse_frontmatter("---\ntags: [work, '#taskNote']\n---\n").unwrap();
        assert_eq!(frontmatter_tags(&map), vec!["#work", "#taskNote"]);
        assert!(has_tag(&frontmatter_tags(&map), "taskNote"));

        let map = parse_frontmatter("---\ntags: home, errands\n---\n").unwrap();
        assert_eq!(frontmatter_tags(&map), vec!["#home", "#errands"]);

        let map = parse_frontmatter("---\nTags: one two one\n---\n").unwrap();
        assert_eq!(frontmatter_tags(&map), vec!["#one", "#two"]);
    }

    #[test]
    fn broken_yaml_yields_nothing() {
        assert!(parse_frontmatter("---\n: : [\n---\nbody").is_none());
    }
}
