use serde::{Deserialize, Serialize};

/// Checkbox state. Serialized as the raw symbol between the brackets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Unchecked,
    /// `x` or `X`, kept as written.
    Checked(char),
    InProgress,
    Cancelled,
    Custom(char),
}

impl TaskStatus {
    pub const DONE: Self = Self::Checked('x');

    pub fn from_symbol(symbol: char) -> Self {
        match symbol {
            ' ' => Self::Unchecked,
            'x' | 'X' => Self::Checked(symbol),
            '/' => Self::InProgress,
            '-' => Self::Cancelled,
            other => Self::Custom(other),
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Self::Unchecked => ' ',
            Self::Checked(c) => *c,
            Self::InProgress => '/',
            Self::Cancelled => '-',
            Self::Custom(c) => *c,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        Self::from_symbol(raw.chars().next().unwrap_or(' '))
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.symbol().to_string()
    }
}

/// Everything a grammar reads from or writes into the text after the
/// checkbox.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskFields {
    pub status: TaskStatus,
    pub title: String,
    /// 0 = none, 1 (highest) ..= 5 (lowest).
    pub priority: u8,
    pub time: Option<String>,
    pub created_date: Option<String>,
    pub start_date: Option<String>,
    pub scheduled_date: Option<String>,
    pub due_date: Option<String>,
    pub completion_date: Option<String>,
    pub cancelled_date: Option<String>,
    pub tags: Vec<String>,
    pub depends_on: Vec<u64>,
    pub reminder: Option<String>,
    /// Id written on the line itself (`🆔 12`, `[id:: 12]`, `@id(12)`).
    pub line_id: Option<u64>,
    pub block_ref: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLocation {
    /// 1-based.
    pub start_line: usize,
    pub start_char_index: usize,
    pub end_line: usize,
    pub end_char_index: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: u64,
    #[serde(flatten)]
    pub fields: TaskFields,
    #[serde(default)]
    pub body_lines: Vec<String>,
    #[serde(default)]
    pub frontmatter_tags: Vec<String>,
    pub file_path: String,
    pub location: TaskLocation,
    /// Leading whitespace / blockquote markers of the task line.
    #[serde(default)]
    pub indent: String,
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Exact text covered by `location` at extraction time.
    #[serde(default)]
    pub source_text: String,
    #[serde(default)]
    pub is_task_note: bool,
}

fn default_marker() -> String {
    "-".to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub file_path: String,
    pub title: String,
    #[serde(default)]
    pub frontmatter_tags: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Partition {
    Pending,
    Completed,
}
