pub mod conflict;
pub mod dates;
pub mod extract;
mod frontmatter;
pub mod grammar;
pub mod line;
pub mod sort;
mod status;
mod types;

pub use conflict::{DiffLine, DiffSegment, SpanCheck, SpanConflict};
pub use extract::{extract_document, ExtractedDocument};
pub use grammar::{format_line, grammar_for, parse_line, ParsedTaskLine, TaskGrammar};
pub use sort::{sort_tasks, SortCriterion, SortDirection, SortField};
pub use status::StatusCatalog;
pub use types::{NoteRecord, Partition, TaskFields, TaskLocation, TaskRecord, TaskStatus};
