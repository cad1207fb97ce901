//! Writing task changes back into their documents.
//!
//! Every write first checks that the task's span still holds the text the
//! cache extracted. If the document moved on underneath us the write is
//! refused with a `SpanConflict` and nothing is touched until the caller
//! picks a side.

use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::io_atomic;
use crate::paths;
use crate::settings::StatusCategory;
use crate::tasks::conflict::{self, SpanCheck, SpanConflict};
use crate::tasks::{format_line, TaskFields, TaskLocation, TaskRecord};
use crate::utils;

use super::{EngineEvent, TaskEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditResolution {
    /// Overwrite the span with the proposed text.
    UseEdit,
    /// Keep the document as it is and re-extract it.
    KeepDocument,
}

impl TaskEngine {
    fn abs_path(&self, rel_path: &str) -> Result<PathBuf> {
        paths::join_under(self.root(), Path::new(rel_path)).map_err(EngineError::InvalidPath)
    }

    /// Task line plus body, rendered with the active grammar.
    pub fn render_task(&self, record: &TaskRecord, fields: &TaskFields) -> String {
        let line = format_line(
            self.grammar(),
            &record.indent,
            &record.marker,
            fields,
            self.settings().time_prefix,
        );
        std::iter::once(line)
            .chain(record.body_lines.iter().cloned())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Rewrites task `id` with `fields` if its span is unchanged on disk.
    pub async fn apply_edit(&self, id: u64, fields: TaskFields) -> Result<TaskRecord> {
        let record = self.lookup(id).ok_or(EngineError::TaskNotFound(id))?;
        if record.is_task_note {
            return Err(EngineError::InvalidEdit(format!(
                "task {id} is a task note; edit its frontmatter instead"
            )));
        }
        let proposed = self.render_task(&record, &fields);

        let abs = self.abs_path(&record.file_path)?;
        let markdown = read_document(&abs, &record.file_path).await?;
        let current = conflict::read_span(&markdown, &record.location).unwrap_or_default();
        match conflict::detect(&record.source_text, &current) {
            SpanCheck::Identical => {}
            SpanCheck::Diverged { known, current } => {
                tracing::debug!(task_id = id, rel_path = %record.file_path, "span diverged from cache");
                return Err(EngineError::SpanConflict(Box::new(SpanConflict {
                    task_id: id,
                    rel_path: record.file_path.clone(),
                    location: record.location.clone(),
                    diff: conflict::diff_lines(&known, &current),
                    known,
                    current,
                    proposed,
                })));
            }
        }

        self.write_span(&abs, &record.file_path, &markdown, &record.location, &proposed, id)
            .await
    }

    /// Settles a conflict returned by `apply_edit`.
    pub async fn resolve_conflict(
        &self,
        conflict: SpanConflict,
        resolution: EditResolution,
    ) -> Result<Option<TaskRecord>> {
        match resolution {
            EditResolution::KeepDocument => {
                self.on_document_modified(&conflict.rel_path);
                Ok(None)
            }
            EditResolution::UseEdit => {
                let abs = self.abs_path(&conflict.rel_path)?;
                let markdown = read_document(&abs, &conflict.rel_path).await?;
                let record = self
                    .write_span(
                        &abs,
                        &conflict.rel_path,
                        &markdown,
                        &conflict.location,
                        &conflict.proposed,
                        conflict.task_id,
                    )
                    .await?;
                Ok(Some(record))
            }
        }
    }

    /// Advances the status to its next symbol and stamps or clears the
    /// completion and cancellation dates to match. Completion carries the
    /// time of day; cancellation is a plain date.
    pub async fn toggle_task(&self, id: u64) -> Result<TaskRecord> {
        let record = self.lookup(id).ok_or(EngineError::TaskNotFound(id))?;
        let mut fields = record.fields.clone();
        fields.status = self.statuses().next(&record.fields.status);
        let now = utils::now_local();
        match self.statuses().category(&fields.status) {
            StatusCategory::Done => {
                fields.completion_date = Some(utils::format_with_pattern(
                    &self.settings().completion_date_time_format,
                    now,
                ));
                fields.cancelled_date = None;
            }
            StatusCategory::Cancelled => {
                fields.cancelled_date =
                    Some(utils::format_with_pattern(&self.settings().date_format, now));
                fields.completion_date = None;
            }
            StatusCategory::Todo | StatusCategory::InProgress | StatusCategory::NonTask => {
                fields.completion_date = None;
                fields.cancelled_date = None;
            }
        }
        self.apply_edit(id, fields).await
    }

    async fn write_span(
        &self,
        abs: &Path,
        rel_path: &str,
        markdown: &str,
        location: &TaskLocation,
        replacement: &str,
        id: u64,
    ) -> Result<TaskRecord> {
        let updated = conflict::replace_span(markdown, location, replacement).ok_or_else(|| {
            EngineError::InvalidEdit(format!("task {id} no longer fits in {rel_path}"))
        })?;

        let dest = abs.to_path_buf();
        let bytes = updated.clone().into_bytes();
        tokio::task::spawn_blocking(move || io_atomic::write_atomic(&dest, &bytes))
            .await
            .map_err(|e| EngineError::Io(std::io::Error::other(e)))??;

        self.apply_document(rel_path, &updated, &[(location.start_line, id)]);
        self.save_cache_async().await?;
        self.emit(EngineEvent::CacheUpdated {
            paths: vec![rel_path.to_string()],
        });
        tracing::debug!(task_id = id, rel_path, "task written");
        self.lookup(id).ok_or(EngineError::TaskNotFound(id))
    }
}

async fn read_document(abs: &Path, rel_path: &str) -> Result<String> {
    tokio::fs::read_to_string(abs)
        .await
        .map_err(|read_error| EngineError::DocumentRead {
            rel_path: rel_path.to_string(),
            source: read_error,
        })
}

#[cfg(test)]
mod tests {
    use super::super::tests::TempVault;
    use super::*;
    use crate::settings::{CustomStatus, EngineSettings};
    use crate::tasks::{Partition, TaskStatus};

    async fn engine_with(vault: &TempVault, rel: &str, content: &str) -> TaskEngine {
        vault.write(rel, content);
        let engine = TaskEngine::init(&vault.root).unwrap();
        engine.scan_file(rel).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn edit_rewrites_only_the_task_span() {
        let vault = TempVault::new();
        let engine = engine_with(&vault, "a.md", "# Day\n- [ ] Buy milk #errand\n\tskimmed\nafter\n").await;
        let task = engine.query(Partition::Pending).remove(0);

        let mut fields = task.fields.clone();
        fields.due_date = Some("2024-09-21".to_string());
        let updated = engine.apply_edit(task.id, fields).await.unwrap();

        assert_eq!(updated.id, task.id);
        assert_eq!(updated.fields.due_date.as_deref(), Some("2024-09-21"));
        assert_eq!(
            vault.read("a.md"),
            "# Day\n- [ ] Buy milk | 📅 2024-09-21 #errand\n\tskimmed\nafter\n"
        );
    }

    #[tokio::test]
    async fn external_change_raises_a_conflict() {
        let vault = TempVault::new();
        let engine = engine_with(&vault, "a.md", "- [ ] Draft\n").await;
        let task = engine.query(Partition::Pending).remove(0);

        vault.write("a.md", "- [ ] Draft \n");
        let mut fields = task.fields.clone();
        fields.title = "Final".to_string();
        let error = engine.apply_edit(task.id, fields).await.unwrap_err();
        let EngineError::SpanConflict(conflict) = error else {
            panic!("expected a conflict");
        };
        assert_eq!(conflict.known, "- [ ] Draft");
        assert_eq!(conflict.current, "- [ ] Draft ");
        assert_eq!(conflict.proposed, "- [ ] Final");
        assert_eq!(vault.read("a.md"), "- [ ] Draft \n");

        let kept = engine
            .resolve_conflict((*conflict).clone(), EditResolution::KeepDocument)
            .await
            .unwrap();
        assert!(kept.is_none());
        assert_eq!(engine.queued_paths(), vec!["a.md".to_string()]);

        let forced = engine
            .resolve_conflict(*conflict, EditResolution::UseEdit)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(forced.fields.title, "Final");
        assert_eq!(vault.read("a.md"), "- [ ] Final\n");
    }

    #[tokio::test]
    async fn toggle_moves_task_to_completed_and_back() {
        let vault = TempVault::new();
        let engine = engine_with(&vault, "a.md", "- [ ] Ship release\n").await;
        let id = engine.query(Partition::Pending)[0].id;

        let done = engine.toggle_task(id).await.unwrap();
        assert_eq!(done.fields.status, TaskStatus::DONE);
        assert!(done.fields.completion_date.is_some());
        assert!(engine.query(Partition::Pending).is_empty());
        assert_eq!(engine.query(Partition::Completed)[0].id, id);
        assert!(vault.read("a.md").starts_with("- [x] Ship release | ✅["));

        let reopened = engine.toggle_task(id).await.unwrap();
        assert_eq!(reopened.fields.status, TaskStatus::Unchecked);
        assert_eq!(reopened.fields.completion_date, None);
        assert_eq!(vault.read("a.md"), "- [ ] Ship release\n");
    }

    #[tokio::test]
    async fn cancelling_stamps_a_plain_date_in_the_configured_format() {
        let vault = TempVault::new();
        vault.write("a.md", "- [ ] Maybe later\n");
        let settings = EngineSettings {
            date_format: "DD-MM-YYYY".to_string(),
            custom_statuses: vec![CustomStatus {
                symbol: ' ',
                name: "Todo".to_string(),
                next_symbol: Some('-'),
                category: StatusCategory::Todo,
            }],
            ..EngineSettings::default()
        };
        let engine = TaskEngine::with_settings(&vault.root, settings).unwrap();
        engine.scan_file("a.md").await.unwrap();
        let id = engine.query(Partition::Pending)[0].id;

        let dropped = engine.toggle_task(id).await.unwrap();
        assert_eq!(dropped.fields.status, TaskStatus::Cancelled);
        let stamp = dropped.fields.cancelled_date.clone().unwrap();
        assert_eq!(stamp.len(), 10);
        assert_eq!((&stamp[2..3], &stamp[5..6]), ("-", "-"));
        assert_eq!(
            vault.read("a.md"),
            format!("- [-] Maybe later | ❌[{stamp}]\n")
        );
        assert_eq!(engine.query(Partition::Completed)[0].id, id);
    }

    #[tokio::test]
    async fn unknown_task_is_reported() {
        let vault = TempVault::new();
        let engine = TaskEngine::init(&vault.root).unwrap();
        assert!(matches!(
            engine.toggle_task(99).await,
            Err(EngineError::TaskNotFound(99))
        ));
    }
}
