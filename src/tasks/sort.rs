//! Multi-criteria ordering for task columns.
//!
//! Criteria are listed most significant first and applied in reverse with a
//! stable sort, so each earlier criterion only reorders ties of the later
//! ones. Ascending puts missing values last; descending is the exact reverse
//! of ascending, so missing values come first.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use super::dates;
use super::types::TaskRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Title,
    Id,
    Status,
    Priority,
    DueDate,
    StartDate,
    ScheduledDate,
    CreatedDate,
    CompletionDate,
    CancelledDate,
    Tags,
    Time,
    FilePath,
    LineNumber,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortCriterion {
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortCriterion {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let field = match raw.trim().to_lowercase().as_str() {
            "title" | "content" => SortField::Title,
            "id" => SortField::Id,
            "status" => SortField::Status,
            "priority" => SortField::Priority,
            "due" | "duedate" => SortField::DueDate,
            "start" | "startdate" => SortField::StartDate,
            "scheduled" | "scheduleddate" => SortField::ScheduledDate,
            "created" | "createddate" => SortField::CreatedDate,
            "completion" | "completed" | "completiondate" => SortField::CompletionDate,
            "cancelled" | "cancelleddate" => SortField::CancelledDate,
            "tags" => SortField::Tags,
            "time" => SortField::Time,
            "file" | "path" | "filepath" => SortField::FilePath,
            "line" | "linenumber" => SortField::LineNumber,
            other => return Err(format!("unknown sort field: {other}")),
        };
        Ok(field)
    }
}

/// `field` or `field:asc` / `field:desc`.
impl FromStr for SortCriterion {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match raw.split_once(':') {
            Some((f, d)) => (f, d),
            None => (raw, "asc"),
        };
        let direction = match direction.trim().to_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => return Err(format!("unknown sort direction: {other}")),
        };
        Ok(SortCriterion {
            field: field.parse()?,
            direction,
        })
    }
}

/// Present values before missing ones.
fn missing_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn date_key(raw: Option<&String>) -> Option<(i32, u32, u32, u32)> {
    raw.and_then(|d| dates::parse_date_time(d))
}

fn text_key(raw: &str) -> Option<String> {
    let t = raw.trim();
    (!t.is_empty()).then(|| t.to_lowercase())
}

/// Unset (0) or out-of-range priorities rank after 5.
fn priority_rank(priority: u8) -> u8 {
    if (1..=5).contains(&priority) {
        priority
    } else {
        6
    }
}

fn ascending(a: &TaskRecord, b: &TaskRecord, field: SortField) -> Ordering {
    let (fa, fb) = (&a.fields, &b.fields);
    match field {
        SortField::Title => missing_last(text_key(&fa.title), text_key(&fb.title)),
        SortField::Id => a.id.cmp(&b.id),
        SortField::Status => fa.status.symbol().cmp(&fb.status.symbol()),
        SortField::Priority => priority_rank(fa.priority).cmp(&priority_rank(fb.priority)),
        SortField::DueDate => missing_last(date_key(fa.due_date.as_ref()), date_key(fb.due_date.as_ref())),
        SortField::StartDate => {
            missing_last(date_key(fa.start_date.as_ref()), date_key(fb.start_date.as_ref()))
        }
        SortField::ScheduledDate => missing_last(
            date_key(fa.scheduled_date.as_ref()),
            date_key(fb.scheduled_date.as_ref()),
        ),
        SortField::CreatedDate => missing_last(
            date_key(fa.created_date.as_ref()),
            date_key(fb.created_date.as_ref()),
        ),
        SortField::CompletionDate => missing_last(
            date_key(fa.completion_date.as_ref()),
            date_key(fb.completion_date.as_ref()),
        ),
        SortField::CancelledDate => missing_last(
            date_key(fa.cancelled_date.as_ref()),
            date_key(fb.cancelled_date.as_ref()),
        ),
        SortField::Tags => {
            let first = |r: &TaskRecord| r.fields.tags.iter().map(|t| t.to_lowercase()).min();
            missing_last(first(a), first(b))
        }
        SortField::Time => missing_last(
            fa.time.as_deref().and_then(dates::time_range_start),
            fb.time.as_deref().and_then(dates::time_range_start),
        ),
        SortField::FilePath => missing_last(text_key(&a.file_path), text_key(&b.file_path)),
        SortField::LineNumber => a.location.start_line.cmp(&b.location.start_line),
    }
}

pub fn compare(a: &TaskRecord, b: &TaskRecord, criterion: &SortCriterion) -> Ordering {
    let ordering = ascending(a, b, criterion.field);
    match criterion.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn apply_in_order<'a>(
    mut records: Vec<TaskRecord>,
    criteria: impl Iterator<Item = &'a SortCriterion>,
) -> Vec<TaskRecord> {
    for criterion in criteria {
        records.sort_by(|a, b| compare(a, b, criterion));
    }
    records
}

/// `criteria[0]` is the most significant key.
pub fn sort_tasks(records: Vec<TaskRecord>, criteria: &[SortCriterion]) -> Vec<TaskRecord> {
    apply_in_order(records, criteria.iter().rev())
}
