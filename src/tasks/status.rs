use crate::settings::{CustomStatus, StatusCategory};

use super::types::{Partition, TaskStatus};

/// Built-in statuses plus the user's custom symbol table.
#[derive(Clone, Debug, Default)]
pub struct StatusCatalog {
    custom: Vec<CustomStatus>,
}

impl StatusCatalog {
    pub fn new(custom: &[CustomStatus]) -> Self {
        Self {
            custom: custom.to_vec(),
        }
    }

    fn custom_entry(&self, symbol: char) -> Option<&CustomStatus> {
        self.custom.iter().find(|c| c.symbol == symbol)
    }

    pub fn category(&self, status: &TaskStatus) -> StatusCategory {
        match status {
            TaskStatus::Unchecked => StatusCategory::Todo,
            TaskStatus::Checked(_) => StatusCategory::Done,
            TaskStatus::InProgress => StatusCategory::InProgress,
            TaskStatus::Cancelled => StatusCategory::Cancelled,
            TaskStatus::Custom(symbol) => self
                .custom_entry(*symbol)
                .map(|c| c.category)
                .unwrap_or(StatusCategory::Todo),
        }
    }

    /// Checked and Cancelled always complete a task; custom symbols complete
    /// it when their configured category is done or cancelled.
    pub fn partition(&self, status: &TaskStatus) -> Partition {
        match self.category(status) {
            StatusCategory::Done | StatusCategory::Cancelled => Partition::Completed,
            StatusCategory::Todo | StatusCategory::InProgress | StatusCategory::NonTask => {
                Partition::Pending
            }
        }
    }

    pub fn next(&self, status: &TaskStatus) -> TaskStatus {
        let symbol = status.symbol();
        let configured = self
            .custom_entry(symbol)
            .or_else(|| {
                // `x` and `X` share a table entry.
                match symbol {
                    'x' => self.custom_entry('X'),
                    'X' => self.custom_entry('x'),
                    _ => None,
                }
            })
            .and_then(|c| c.next_symbol);
        if let Some(next) = configured {
            return TaskStatus::from_symbol(next);
        }
        match status {
            TaskStatus::Unchecked => TaskStatus::DONE,
            _ => TaskStatus::Unchecked,
        }
    }
}
