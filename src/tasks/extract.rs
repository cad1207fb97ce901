use serde_yaml::{Mapping, Value};

use crate::settings::EngineSettings;
use crate::utils;

use super::dates;
use super::frontmatter;
use super::grammar::{self, TaskGrammar};
use super::line;
use super::types::{NoteRecord, TaskFields, TaskLocation, TaskRecord, TaskStatus};

/// Records pulled out of one document. Ids are left at 0 for the cache to
/// assign.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    pub tasks: Vec<TaskRecord>,
    pub note: Option<NoteRecord>,
    pub content_hash: String,
}

pub fn extract_document(
    rel_path: &str,
    markdown: &str,
    grammar: &dyn TaskGrammar,
    settings: &EngineSettings,
) -> ExtractedDocument {
    let content_hash = utils::sha256_hex(markdown.as_bytes());
    let meta = frontmatter::parse_frontmatter(markdown);
    let fm_tags = meta
        .as_ref()
        .map(frontmatter::frontmatter_tags)
        .unwrap_or_default();

    if let Some(map) = meta.as_ref() {
        if frontmatter::has_tag(&fm_tags, &settings.task_note_tag) {
            let record = task_note_record(rel_path, markdown, map, &fm_tags, settings);
            if !settings.scan_filters.tags.accepts(&record.fields.tags) {
                tracing::trace!(rel_path, "task note filtered out by tag");
                return ExtractedDocument {
                    content_hash,
                    ..ExtractedDocument::default()
                };
            }
            let note = NoteRecord {
                file_path: rel_path.to_string(),
                title: record.fields.title.clone(),
                frontmatter_tags: fm_tags,
            };
            return ExtractedDocument {
                tasks: vec![record],
                note: Some(note),
                content_hash,
            };
        }
    }

    let (_, _, fm_lines) = frontmatter::split_frontmatter(markdown);
    let lines = line::document_lines(markdown);
    let mut tasks = Vec::new();
    let mut idx = fm_lines;
    while idx < lines.len() {
        let Some(parsed) = grammar::parse_line(grammar, lines[idx]) else {
            idx += 1;
            continue;
        };
        let body_lines = line::body_lines(&lines, idx, &settings.indentation);
        let end_idx = idx + body_lines.len();
        // Sub-items belong to the body and are not tasks of their own.
        let next_idx = end_idx + 1;
        if !settings.scan_filters.tags.accepts(&parsed.fields.tags) {
            tracing::trace!(rel_path, line = idx + 1, "task filtered out by tag");
            idx = next_idx;
            continue;
        }
        let location = TaskLocation {
            start_line: idx + 1,
            start_char_index: 0,
            end_line: end_idx + 1,
            end_char_index: lines[end_idx].chars().count(),
        };
        tasks.push(TaskRecord {
            id: 0,
            fields: parsed.fields,
            body_lines,
            frontmatter_tags: if settings.show_frontmatter_tags {
                fm_tags.clone()
            } else {
                Vec::new()
            },
            file_path: rel_path.to_string(),
            location,
            indent: parsed.indent,
            marker: parsed.marker,
            source_text: lines[idx..=end_idx].join("\n"),
            is_task_note: false,
        });
        idx = next_idx;
    }

    tracing::trace!(rel_path, tasks = tasks.len(), "extracted document");
    ExtractedDocument {
        tasks,
        note: None,
        content_hash,
    }
}

fn note_status(raw: Option<String>) -> TaskStatus {
    let Some(raw) = raw else {
        return TaskStatus::Unchecked;
    };
    match raw.to_lowercase().as_str() {
        "todo" | "open" => TaskStatus::Unchecked,
        "done" | "complete" | "completed" => TaskStatus::DONE,
        "in-progress" | "inprogress" | "doing" => TaskStatus::InProgress,
        "cancelled" | "canceled" => TaskStatus::Cancelled,
        _ => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(symbol), None) => TaskStatus::from_symbol(symbol),
                _ => TaskStatus::Unchecked,
            }
        }
    }
}

fn note_ids(value: Option<&Value>) -> Vec<u64> {
    match value {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect(),
        Some(Value::Number(n)) => n.as_u64().into_iter().collect(),
        Some(Value::String(s)) => s.split(',').filter_map(|p| p.trim().parse().ok()).collect(),
        _ => Vec::new(),
    }
}

/// A document tagged as a task note is one task: its frontmatter carries the
/// fields and its checklist lines become the body.
fn task_note_record(
    rel_path: &str,
    markdown: &str,
    map: &Mapping,
    fm_tags: &[String],
    settings: &EngineSettings,
) -> TaskRecord {
    let date = |key: &str| frontmatter::get_string(map, key).filter(|d| dates::is_valid_date(d));
    let date_time =
        |key: &str| frontmatter::get_string(map, key).filter(|d| dates::is_valid_date_time(d));

    let fields = TaskFields {
        status: note_status(frontmatter::get_string(map, "status")),
        title: frontmatter::get_string(map, "title")
            .unwrap_or_else(|| utils::file_stem_title(rel_path)),
        priority: frontmatter::get_string(map, "priority")
            .and_then(|p| p.parse::<u8>().ok())
            .filter(|p| (1..=5).contains(p))
            .unwrap_or(0),
        time: frontmatter::get_string(map, "time").filter(|t| dates::is_valid_time_range(t)),
        created_date: date("created-date"),
        start_date: date("start-date"),
        scheduled_date: date("scheduled-date"),
        due_date: date("due-date"),
        completion_date: date_time("completed-date"),
        cancelled_date: date_time("cancelled-date"),
        tags: fm_tags
            .iter()
            .filter(|t| !frontmatter::has_tag(std::slice::from_ref(t), &settings.task_note_tag))
            .cloned()
            .collect(),
        depends_on: note_ids(frontmatter::get(map, "depends-on")),
        reminder: frontmatter::get_string(map, "reminder").filter(|r| dates::is_valid_reminder(r)),
        line_id: frontmatter::get_string(map, "id").and_then(|id| id.parse().ok()),
        block_ref: None,
    };

    let lines = line::document_lines(markdown);
    let (_, _, fm_lines) = frontmatter::split_frontmatter(markdown);
    let body_lines = lines
        .iter()
        .skip(fm_lines)
        .filter(|l| line::is_task_line(l))
        .map(|l| l.to_string())
        .collect();
    let last = lines.last().copied().unwrap_or_default();

    TaskRecord {
        id: 0,
        fields,
        body_lines,
        frontmatter_tags: fm_tags.to_vec(),
        file_path: rel_path.to_string(),
        location: TaskLocation {
            start_line: 1,
            start_char_index: 0,
            end_line: lines.len().max(1),
            end_char_index: last.chars().count(),
        },
        indent: String::new(),
        marker: "-".to_string(),
        source_text: String::new(),
        is_task_note: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{FilterPolarity, GrammarKind, ScanFilter, ScanFilters};
    use crate::tasks::grammar::grammar_for;

    fn extract(markdown: &str, settings: &EngineSettings) -> ExtractedDocument {
        extract_document("Notes/today.md", markdown, grammar_for(settings.grammar), settings)
    }

    #[test]
    fn finds_tasks_with_locations_and_bodies() {
        let doc = "# Today\n\n- [ ] Buy milk 📅 2024-09-21 #errand\n\tsemi-skimmed\n- [x] Call mum\n";
        let out = extract(doc, &EngineSettings::default());
        assert_eq!(out.tasks.len(), 2);

        let milk = &out.tasks[0];
        assert_eq!(milk.fields.title, "Buy milk");
        assert_eq!(milk.body_lines, vec!["\tsemi-skimmed".to_string()]);
        assert_eq!(
            milk.location,
            TaskLocation {
                start_line: 3,
                start_char_index: 0,
                end_line: 4,
                end_char_index: 13,
            }
        );
        assert_eq!(
            milk.source_text,
            "- [ ] Buy milk 📅 2024-09-21 #errand\n\tsemi-skimmed"
        );

        let call = &out.tasks[1];
        assert_eq!(call.fields.status, TaskStatus::DONE);
        assert_eq!(call.location.start_line, 5);
        assert_eq!(call.location.end_line, 5);
        assert_eq!(out.content_hash, utils::sha256_hex(doc.as_bytes()));
    }

    #[test]
    fn frontmatter_is_skipped_and_optionally_copied() {
        let doc = "---\ntags: [work]\n---\n- [ ] Write report\n";
        let settings = EngineSettings {
            show_frontmatter_tags: true,
            ..EngineSettings::default()
        };
        let out = extract(doc, &settings);
        assert_eq!(out.tasks.len(), 1);
        assert_eq!(out.tasks[0].location.start_line, 4);
        assert_eq!(out.tasks[0].frontmatter_tags, vec!["#work".to_string()]);

        let out = extract(doc, &EngineSettings::default());
        assert!(out.tasks[0].frontmatter_tags.is_empty());
    }

    #[test]
    fn task_note_becomes_a_single_record() {
        let doc = "---\ntitle: Quarterly review\ntags: [taskNote, work]\nstatus: x\npriority: 2\ndue-date: 2024-10-01\ndepends-on: [3, 4]\n---\n- [ ] gather numbers\n- [ ] write summary\n";
        let out = extract(doc, &EngineSettings::default());
        assert_eq!(out.tasks.len(), 1);
        let note = &out.tasks[0];
        assert!(note.is_task_note);
        assert_eq!(note.fields.title, "Quarterly review");
        assert_eq!(note.fields.status, TaskStatus::DONE);
        assert_eq!(note.fields.priority, 2);
        assert_eq!(note.fields.due_date.as_deref(), Some("2024-10-01"));
        assert_eq!(note.fields.depends_on, vec![3, 4]);
        assert_eq!(note.fields.tags, vec!["#work".to_string()]);
        assert_eq!(note.body_lines.len(), 2);
        assert_eq!(out.note.as_ref().map(|n| n.title.as_str()), Some("Quarterly review"));
    }

    #[test]
    fn sub_items_belong_to_the_parent_body() {
        let out = extract("- [ ] Parent\n\t- [ ] Child\n- [ ] Sibling\n", &EngineSettings::default());
        let titles: Vec<&str> = out.tasks.iter().map(|t| t.fields.title.as_str()).collect();
        assert_eq!(titles, vec!["Parent", "Sibling"]);
        assert_eq!(out.tasks[0].body_lines, vec!["\t- [ ] Child".to_string()]);
        assert_eq!(out.tasks[0].source_text, "- [ ] Parent\n\t- [ ] Child");
        assert_eq!(out.tasks[1].location.start_line, 3);
    }

    #[test]
    fn tag_filter_applies_per_line_and_to_task_notes() {
        let settings = EngineSettings {
            scan_filters: ScanFilters {
                tags: ScanFilter {
                    polarity: FilterPolarity::Deny,
                    values: vec!["#private*".to_string()],
                },
                ..ScanFilters::default()
            },
            ..EngineSettings::default()
        };
        let out = extract(
            "- [ ] Public #work\n- [ ] Secret #private/diary\n- [ ] Untagged\n",
            &settings,
        );
        let titles: Vec<&str> = out.tasks.iter().map(|t| t.fields.title.as_str()).collect();
        assert_eq!(titles, vec!["Public", "Untagged"]);

        let note = extract("---\ntags: [taskNote, privateStuff]\n---\n", &settings);
        assert!(note.tasks.is_empty());
        assert!(note.note.is_none());
    }

    #[test]
    fn unrecognised_lines_still_make_records() {
        let settings = EngineSettings {
            grammar: GrammarKind::InlineField,
            ..EngineSettings::default()
        };
        let out = extract("- [/] Half done 📅 2024-01-01\n", &settings);
        assert_eq!(out.tasks.len(), 1);
        assert_eq!(out.tasks[0].fields.status, TaskStatus::InProgress);
        assert_eq!(out.tasks[0].fields.title, "Half done 📅 2024-01-01");
    }
}
