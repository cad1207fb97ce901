//! Line grammars: how task metadata is written after the checkbox.
//!
//! Each grammar only knows its field patterns and how to render one field.
//! Matching, validation and title cleanup are shared so every grammar drops
//! malformed values the same way: the token stays in the title and the field
//! stays unset.

mod annotation;
mod emoji;
mod inline_field;

use regex::Regex;
use std::sync::LazyLock;

use crate::settings::GrammarKind;

use super::dates;
use super::line::{self, parse_task_line};
use super::types::TaskFields;

pub use annotation::AnnotationGrammar;
pub use emoji::{BracketFieldGrammar, DefaultGrammar};
pub use inline_field::InlineFieldGrammar;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKey {
    Time,
    Priority,
    Start,
    Created,
    Scheduled,
    Due,
    Completion,
    Cancelled,
    DependsOn,
    Reminder,
    Id,
}

impl FieldKey {
    pub const ALL: [FieldKey; 11] = [
        FieldKey::Time,
        FieldKey::Priority,
        FieldKey::Start,
        FieldKey::Created,
        FieldKey::Scheduled,
        FieldKey::Due,
        FieldKey::Completion,
        FieldKey::Cancelled,
        FieldKey::DependsOn,
        FieldKey::Reminder,
        FieldKey::Id,
    ];

    /// Key spelling used by the inline-field and annotation grammars.
    pub fn name(self) -> &'static str {
        match self {
            FieldKey::Time => "time",
            FieldKey::Priority => "priority",
            FieldKey::Start => "start",
            FieldKey::Created => "created",
            FieldKey::Scheduled => "scheduled",
            FieldKey::Due => "due",
            FieldKey::Completion => "completion",
            FieldKey::Cancelled => "cancelled",
            FieldKey::DependsOn => "dependsOn",
            FieldKey::Reminder => "reminder",
            FieldKey::Id => "id",
        }
    }
}

pub struct FieldPattern {
    pub key: FieldKey,
    pub re: Regex,
}

impl FieldPattern {
    pub fn new(key: FieldKey, pattern: &str) -> Self {
        Self {
            key,
            re: Regex::new(pattern).expect("valid field regex"),
        }
    }
}

pub trait TaskGrammar: Send + Sync {
    fn kind(&self) -> GrammarKind;

    /// One pattern per field. The first participating capture group holds
    /// the raw value.
    fn patterns(&self) -> &[FieldPattern];

    /// Renders one field from its canonical value string.
    fn format_field(&self, key: FieldKey, value: &str) -> String;

    /// Text between the title and the first field.
    fn separator(&self) -> &'static str {
        " "
    }
}

static DEFAULT: DefaultGrammar = DefaultGrammar;
static BRACKET_FIELD: BracketFieldGrammar = BracketFieldGrammar;
static INLINE_FIELD: InlineFieldGrammar = InlineFieldGrammar;
static ANNOTATION: AnnotationGrammar = AnnotationGrammar;

pub fn grammar_for(kind: GrammarKind) -> &'static dyn TaskGrammar {
    match kind {
        GrammarKind::Default => &DEFAULT,
        GrammarKind::BracketField => &BRACKET_FIELD,
        GrammarKind::InlineField => &INLINE_FIELD,
        GrammarKind::Annotation => &ANNOTATION,
    }
}

static TIME_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2}:\d{2}\s*-\s*\d{1,2}:\d{2})\s+").expect("valid time prefix regex")
});

pub(crate) const PRIORITY_EMOJI: [(u8, &str); 5] =
    [(1, "🔺"), (2, "⏫"), (3, "🔼"), (4, "🔽"), (5, "⏬")];

/// `0` is an explicit "none".
fn parse_priority(raw: &str) -> Option<u8> {
    let raw = raw.trim().trim_end_matches('\u{FE0F}');
    if let Ok(n) = raw.parse::<u8>() {
        return (0..=5).contains(&n).then_some(n);
    }
    PRIORITY_EMOJI
        .iter()
        .find(|(_, emoji)| *emoji == raw)
        .map(|(n, _)| *n)
}

fn parse_id_list(raw: &str) -> Option<Vec<u64>> {
    let ids = raw
        .split(',')
        .map(|p| p.trim().parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    (!ids.is_empty()).then_some(ids)
}

/// Validates `raw` for `key` and stores it. Returns false when the value is
/// malformed.
fn apply_value(fields: &mut TaskFields, key: FieldKey, raw: &str) -> bool {
    let raw = raw.trim();
    let date = |v: &str| dates::is_valid_date(v).then(|| v.to_string());
    let date_time = |v: &str| dates::is_valid_date_time(v).then(|| v.to_string());
    match key {
        FieldKey::Time => {
            if !dates::is_valid_time_range(raw) {
                return false;
            }
            fields.time = Some(raw.to_string());
        }
        FieldKey::Priority => match parse_priority(raw) {
            Some(p) => fields.priority = p,
            None => return false,
        },
        FieldKey::Start => match date(raw) {
            Some(v) => fields.start_date = Some(v),
            None => return false,
        },
        FieldKey::Created => match date(raw) {
            Some(v) => fields.created_date = Some(v),
            None => return false,
        },
        FieldKey::Scheduled => match date(raw) {
            Some(v) => fields.scheduled_date = Some(v),
            None => return false,
        },
        FieldKey::Due => match date(raw) {
            Some(v) => fields.due_date = Some(v),
            None => return false,
        },
        FieldKey::Completion => match date_time(raw) {
            Some(v) => fields.completion_date = Some(v),
            None => return false,
        },
        FieldKey::Cancelled => match date_time(raw) {
            Some(v) => fields.cancelled_date = Some(v),
            None => return false,
        },
        FieldKey::DependsOn => match parse_id_list(raw) {
            Some(ids) => fields.depends_on = ids,
            None => return false,
        },
        FieldKey::Reminder => {
            if !dates::is_valid_reminder(raw) {
                return false;
            }
            fields.reminder = Some(raw.to_string());
        }
        FieldKey::Id => match raw.parse::<u64>() {
            Ok(id) => fields.line_id = Some(id),
            Err(_) => return false,
        },
    }
    true
}

fn is_set(fields: &TaskFields, key: FieldKey) -> bool {
    match key {
        FieldKey::Time => fields.time.is_some(),
        FieldKey::Priority => fields.priority != 0,
        FieldKey::Start => fields.start_date.is_some(),
        FieldKey::Created => fields.created_date.is_some(),
        FieldKey::Scheduled => fields.scheduled_date.is_some(),
        FieldKey::Due => fields.due_date.is_some(),
        FieldKey::Completion => fields.completion_date.is_some(),
        FieldKey::Cancelled => fields.cancelled_date.is_some(),
        FieldKey::DependsOn => !fields.depends_on.is_empty(),
        FieldKey::Reminder => fields.reminder.is_some(),
        FieldKey::Id => fields.line_id.is_some(),
    }
}

/// Canonical value string of a set field.
fn value_of(fields: &TaskFields, key: FieldKey) -> Option<String> {
    match key {
        FieldKey::Time => fields.time.clone(),
        FieldKey::Priority => (1..=5)
            .contains(&fields.priority)
            .then(|| fields.priority.to_string()),
        FieldKey::Start => fields.start_date.clone(),
        FieldKey::Created => fields.created_date.clone(),
        FieldKey::Scheduled => fields.scheduled_date.clone(),
        FieldKey::Due => fields.due_date.clone(),
        FieldKey::Completion => fields.completion_date.clone(),
        FieldKey::Cancelled => fields.cancelled_date.clone(),
        FieldKey::DependsOn => (!fields.depends_on.is_empty()).then(|| {
            fields
                .depends_on
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        }),
        FieldKey::Reminder => fields.reminder.clone(),
        FieldKey::Id => fields.line_id.map(|id| id.to_string()),
    }
}

/// Parses the text after the checkbox. The returned flag is false when no
/// field marker of this grammar was found; the title is still usable.
pub fn parse_description(grammar: &dyn TaskGrammar, description: &str) -> (TaskFields, bool) {
    let mut fields = TaskFields::default();
    let (text, block_ref) = line::split_block_ref(description);
    fields.block_ref = block_ref;
    let mut text = text.to_string();
    let mut recognized = false;

    if let Some(caps) = TIME_PREFIX_RE.captures(&text) {
        let range = caps.get(0).map(|m| m.range());
        let value = caps.get(1).map(|m| m.as_str().to_string());
        if let (Some(range), Some(value)) = (range, value) {
            if apply_value(&mut fields, FieldKey::Time, &value) {
                text.replace_range(range, "");
                recognized = true;
            }
        }
    }

    for pattern in grammar.patterns() {
        if is_set(&fields, pattern.key) {
            continue;
        }
        let mut search_from = 0;
        while search_from <= text.len() {
            let Some(caps) = pattern.re.captures_at(&text, search_from) else {
                break;
            };
            let Some(whole) = caps.get(0) else {
                break;
            };
            let raw = caps
                .iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str())
                .unwrap_or_default();
            if apply_value(&mut fields, pattern.key, raw) {
                text.replace_range(whole.range(), " ");
                recognized = true;
                break;
            }
            tracing::trace!(field = pattern.key.name(), value = raw, "malformed field left in title");
            search_from = whole.end().max(whole.start() + 1);
        }
    }

    fields.tags = line::take_tags(&mut text);
    let title = text.split_whitespace().collect::<Vec<_>>().join(" ");
    fields.title = title.trim_end_matches('|').trim_end().to_string();
    (fields, recognized)
}

/// Renders the text after the checkbox in canonical field order.
pub fn format_description(grammar: &dyn TaskGrammar, fields: &TaskFields, time_prefix: bool) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut push = |key: FieldKey| {
        if key == FieldKey::Time && time_prefix {
            return;
        }
        if let Some(value) = value_of(fields, key) {
            tokens.push(grammar.format_field(key, &value));
        }
    };
    for key in [
        FieldKey::Time,
        FieldKey::Priority,
        FieldKey::Start,
        FieldKey::Created,
        FieldKey::Scheduled,
        FieldKey::Due,
    ] {
        push(key);
    }
    let mut tokens_after: Vec<String> = Vec::new();
    let mut push_after = |key: FieldKey| {
        if let Some(value) = value_of(fields, key) {
            tokens_after.push(grammar.format_field(key, &value));
        }
    };
    for key in [
        FieldKey::Completion,
        FieldKey::Cancelled,
        FieldKey::DependsOn,
        FieldKey::Reminder,
        FieldKey::Id,
    ] {
        push_after(key);
    }
    tokens.extend(fields.tags.iter().cloned());
    tokens.extend(tokens_after);

    let mut out = String::new();
    if time_prefix {
        if let Some(time) = fields.time.as_deref() {
            out.push_str(time);
            out.push(' ');
        }
    }
    out.push_str(&fields.title);
    if !tokens.is_empty() {
        if fields.title.is_empty() {
            out.push_str(&tokens.join(" "));
        } else {
            out.push_str(grammar.separator());
            out.push_str(&tokens.join(" "));
        }
    }
    if let Some(block_ref) = fields.block_ref.as_deref() {
        out.push_str(" ^");
        out.push_str(block_ref);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTaskLine {
    pub indent: String,
    pub marker: String,
    pub fields: TaskFields,
    pub recognized: bool,
}

/// `None` when the line is not a checklist item at all.
pub fn parse_line(grammar: &dyn TaskGrammar, line: &str) -> Option<ParsedTaskLine> {
    let m = parse_task_line(line)?;
    let (mut fields, recognized) = parse_description(grammar, m.description);
    fields.status = m.status;
    if !recognized {
        tracing::trace!(grammar = ?grammar.kind(), "no field markers on task line");
    }
    Some(ParsedTaskLine {
        indent: m.indent.to_string(),
        marker: m.marker.to_string(),
        fields,
        recognized,
    })
}

pub fn format_line(
    grammar: &dyn TaskGrammar,
    indent: &str,
    marker: &str,
    fields: &TaskFields,
    time_prefix: bool,
) -> String {
    format!(
        "{indent}{marker} [{}] {}",
        fields.status.symbol(),
        format_description(grammar, fields, time_prefix)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::types::TaskStatus;

    fn round_trip(kind: GrammarKind, line: &str) {
        let grammar = grammar_for(kind);
        let parsed = parse_line(grammar, line).unwrap();
        let rendered = format_line(grammar, &parsed.indent, &parsed.marker, &parsed.fields, false);
        assert_eq!(rendered, line, "{kind:?}");
    }

    #[test]
    fn canonical_lines_round_trip_in_every_grammar() {
        round_trip(
            GrammarKind::Default,
            "- [ ] Title | ⏰[09:00 - 10:00] 📅 2024-09-21 #tag ✅[2024-09-21/12:20]",
        );
        round_trip(
            GrammarKind::Default,
            "\t- [x] Pay rent | ⏫ 🛫 2024-09-01 ⏳ 2024-09-02 📅 2024-09-03 #home ⛔ 3, 4 🆔 7 ^rent",
        );
        round_trip(
            GrammarKind::BracketField,
            "- [x] Title 🔼 📅 2024-09-21 #tag ✅ 2024-09-21",
        );
        round_trip(
            GrammarKind::BracketField,
            "* [-] Dropped ⏰ 09:00 - 10:00 ❌ 2024-09-22 (@2024-09-20 08:00)",
        );
        round_trip(
            GrammarKind::InlineField,
            "- [x] Title [priority:: 2] [due:: 2024-09-21] #tag [completion:: 2024-09-21/12:20]",
        );
        round_trip(
            GrammarKind::InlineField,
            "1. [ ] Plan [time:: 09:00 - 10:00] [scheduled:: 2024-09-21] [dependsOn:: 1, 2] [id:: 9]",
        );
        round_trip(
            GrammarKind::Annotation,
            "- [x] Title @priority(2) @due(2024-09-21) #tag @completion(2024-09-21/12:20)",
        );
        round_trip(
            GrammarKind::Annotation,
            "> - [ ] Quoted @created(2024-01-02) @reminder(2024-09-21 09:00) @id(4)",
        );
        round_trip(GrammarKind::Default, "- [ ] Nothing extra");
        round_trip(GrammarKind::Default, "- [X] Upper case done | ✅[2024-09-21]");
    }

    #[test]
    fn upper_case_check_is_kept() {
        let grammar = grammar_for(GrammarKind::BracketField);
        let parsed = parse_line(grammar, "- [X] a").unwrap();
        assert_eq!(parsed.fields.status, TaskStatus::Checked('X'));
        assert_eq!(format_line(grammar, "", "-", &parsed.fields, false), "- [X] a");
    }

    #[test]
    fn zero_priority_means_none() {
        let inline = parse_line(
            grammar_for(GrammarKind::InlineField),
            "- [ ] Someday [priority:: 0]",
        )
        .unwrap();
        assert_eq!(inline.fields.priority, 0);
        assert_eq!(inline.fields.title, "Someday");
        assert!(inline.recognized);

        let annotated = parse_line(
            grammar_for(GrammarKind::Annotation),
            "- [ ] Someday @priority(0) @due(2024-09-21)",
        )
        .unwrap();
        assert_eq!(annotated.fields.priority, 0);
        assert_eq!(annotated.fields.title, "Someday");
        assert_eq!(
            format_line(grammar_for(GrammarKind::Annotation), "", "-", &annotated.fields, false),
            "- [ ] Someday @due(2024-09-21)"
        );
    }

    #[test]
    fn default_grammar_reads_free_form_lines() {
        let parsed = parse_line(
            grammar_for(GrammarKind::Default),
            "- [ ] Buy milk 📅 2024-09-21 #errand",
        )
        .unwrap();
        assert_eq!(parsed.fields.title, "Buy milk");
        assert_eq!(parsed.fields.due_date.as_deref(), Some("2024-09-21"));
        assert_eq!(parsed.fields.tags, vec!["#errand".to_string()]);
        assert_eq!(parsed.fields.status, TaskStatus::Unchecked);
        assert!(parsed.recognized);
    }

    #[test]
    fn malformed_values_stay_in_the_title() {
        let parsed = parse_line(
            grammar_for(GrammarKind::Default),
            "- [ ] Renew passport 📅 2024-13-45 🔺",
        )
        .unwrap();
        assert_eq!(parsed.fields.due_date, None);
        assert_eq!(parsed.fields.priority, 1);
        assert_eq!(parsed.fields.title, "Renew passport 📅 2024-13-45");

        let inline = parse_line(
            grammar_for(GrammarKind::InlineField),
            "- [ ] Odd [priority:: 9] [due:: soon]",
        )
        .unwrap();
        assert_eq!(inline.fields.priority, 0);
        assert_eq!(inline.fields.due_date, None);
        assert_eq!(inline.fields.title, "Odd [priority:: 9] [due:: soon]");
        assert!(!inline.recognized);
    }

    #[test]
    fn a_later_valid_token_wins_over_an_earlier_malformed_one() {
        let parsed = parse_line(
            grammar_for(GrammarKind::BracketField),
            "- [ ] Two dates 📅 someday 📅 2024-02-29",
        )
        .unwrap();
        assert_eq!(parsed.fields.due_date.as_deref(), Some("2024-02-29"));
        assert_eq!(parsed.fields.title, "Two dates 📅 someday");
    }

    #[test]
    fn other_grammars_leave_foreign_markers_alone() {
        let parsed = parse_line(
            grammar_for(GrammarKind::Annotation),
            "- [ ] Just text 📅 2024-09-21",
        )
        .unwrap();
        assert!(!parsed.recognized);
        assert_eq!(parsed.fields.title, "Just text 📅 2024-09-21");
    }

    #[test]
    fn time_prefix_is_read_and_written() {
        let grammar = grammar_for(GrammarKind::Default);
        let parsed = parse_line(grammar, "- [ ] 09:00 - 10:00 Standup 📅 2024-09-21").unwrap();
        assert_eq!(parsed.fields.time.as_deref(), Some("09:00 - 10:00"));
        assert_eq!(parsed.fields.title, "Standup");
        assert_eq!(
            format_line(grammar, "", "-", &parsed.fields, true),
            "- [ ] 09:00 - 10:00 Standup | 📅 2024-09-21"
        );
        assert_eq!(
            format_line(grammar, "", "-", &parsed.fields, false),
            "- [ ] Standup | ⏰[09:00 - 10:00] 📅 2024-09-21"
        );
    }

    #[test]
    fn alternate_emoji_and_variation_selectors() {
        let parsed = parse_line(
            grammar_for(GrammarKind::BracketField),
            "- [ ] Alt 🗓\u{FE0F} 2024-03-01 ⌛ 2024-02-28 ⏬",
        )
        .unwrap();
        assert_eq!(parsed.fields.due_date.as_deref(), Some("2024-03-01"));
        assert_eq!(parsed.fields.scheduled_date.as_deref(), Some("2024-02-28"));
        assert_eq!(parsed.fields.priority, 5);
        assert_eq!(parsed.fields.title, "Alt");
    }
}
