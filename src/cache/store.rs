use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::paths;
use crate::tasks::{NoteRecord, Partition, StatusCatalog, TaskRecord};
use crate::utils;

type DocumentTasks = BTreeMap<String, Vec<TaskRecord>>;

/// In-memory index of every extracted task, keyed by vault-relative path and
/// split by partition. This is also the on-disk snapshot shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskCache {
    #[serde(rename = "VaultName", default)]
    pub vault_name: String,
    #[serde(rename = "Modified_at", default)]
    pub modified_at: String,
    #[serde(rename = "Pending", default)]
    pending: DocumentTasks,
    #[serde(rename = "Completed", default)]
    completed: DocumentTasks,
    #[serde(rename = "Notes", default)]
    notes: Vec<NoteRecord>,
    #[serde(rename = "ContentHashes", default)]
    content_hashes: BTreeMap<String, String>,
    #[serde(rename = "UniqueIdCounter", default)]
    id_counter: u64,
}

impl TaskCache {
    pub fn new(vault_name: impl Into<String>) -> Self {
        Self {
            vault_name: vault_name.into(),
            ..Self::default()
        }
    }

    pub fn id_counter(&self) -> u64 {
        self.id_counter
    }

    pub fn touch(&mut self) {
        self.modified_at = utils::format_with_pattern("YYYY-MM-DDTHH:mm:ss", utils::now_local());
    }

    pub fn content_hash(&self, rel_path: &str) -> Option<&str> {
        self.content_hashes.get(rel_path).map(String::as_str)
    }

    pub fn document_tasks(&self, rel_path: &str) -> impl Iterator<Item = &TaskRecord> {
        self.pending
            .get(rel_path)
            .into_iter()
            .chain(self.completed.get(rel_path))
            .flatten()
    }

    pub fn document_paths(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .pending
            .keys()
            .chain(self.completed.keys())
            .chain(self.content_hashes.keys())
            .cloned()
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Gives every record of `rel_path` an id. Explicit line ids win, then
    /// `pinned` `(start_line, id)` pairs for lines the engine just rewrote;
    /// an id-less record inherits the id of a previous record with the same
    /// source text; anything else takes the next counter value. Ids stay
    /// unique across the vault: an explicit id already held elsewhere falls
    /// back to a fresh one and only survives in `line_id`.
    pub fn assign_ids(&mut self, rel_path: &str, records: &mut [TaskRecord], pinned: &[(usize, u64)]) {
        for id in records.iter().filter_map(|r| r.fields.line_id) {
            self.id_counter = self.id_counter.max(id);
        }

        let mut previous: HashMap<String, VecDeque<u64>> = HashMap::new();
        let mut previous_note = None;
        for old in self.document_tasks(rel_path) {
            if old.is_task_note {
                previous_note = Some(old.id);
            } else {
                previous
                    .entry(old.source_text.clone())
                    .or_default()
                    .push_back(old.id);
            }
        }

        let mut used: HashSet<u64> = self
            .pending
            .iter()
            .chain(self.completed.iter())
            .filter(|(path, _)| path.as_str() != rel_path)
            .flat_map(|(_, tasks)| tasks.iter().map(|r| r.id))
            .collect();

        let pin_for = |record: &TaskRecord| {
            pinned
                .iter()
                .find(|(line, _)| *line == record.location.start_line)
                .map(|(_, id)| *id)
        };
        let reserved: Vec<Option<u64>> = records
            .iter()
            .map(|r| {
                r.fields
                    .line_id
                    .or_else(|| pin_for(r))
                    .filter(|id| used.insert(*id))
            })
            .collect();

        for (record, reserved) in records.iter_mut().zip(reserved) {
            if let Some(id) = reserved {
                record.id = id;
                continue;
            }
            let inherited = if record.is_task_note {
                previous_note.take()
            } else {
                previous
                    .get_mut(&record.source_text)
                    .and_then(VecDeque::pop_front)
            };
            let id = match inherited.filter(|id| !used.contains(id)) {
                Some(id) => id,
                None => loop {
                    self.id_counter += 1;
                    if !used.contains(&self.id_counter) {
                        break self.id_counter;
                    }
                },
            };
            used.insert(id);
            record.id = id;
        }
    }

    /// Swaps in the records for one document. Returns false when nothing
    /// changed.
    pub fn replace_document(
        &mut self,
        rel_path: &str,
        records: Vec<TaskRecord>,
        statuses: &StatusCatalog,
    ) -> bool {
        let mut pending = Vec::new();
        let mut completed = Vec::new();
        for record in records {
            match statuses.partition(&record.fields.status) {
                Partition::Pending => pending.push(record),
                Partition::Completed => completed.push(record),
            }
        }

        let old_pending = self.pending.remove(rel_path).unwrap_or_default();
        let old_completed = self.completed.remove(rel_path).unwrap_or_default();
        let changed = old_pending != pending || old_completed != completed;

        if !pending.is_empty() {
            self.pending.insert(rel_path.to_string(), pending);
        }
        if !completed.is_empty() {
            self.completed.insert(rel_path.to_string(), completed);
        }
        changed
    }

    pub fn set_content_hash(&mut self, rel_path: &str, hash: String) {
        self.content_hashes.insert(rel_path.to_string(), hash);
    }

    pub fn set_note(&mut self, rel_path: &str, note: Option<NoteRecord>) -> bool {
        let old = self
            .notes
            .iter()
            .position(|n| n.file_path == rel_path)
            .map(|i| self.notes.remove(i));
        let changed = match (&old, &note) {
            (Some(a), Some(b)) => a != b,
            (None, None) => false,
            _ => true,
        };
        if let Some(note) = note {
            self.notes.push(note);
        }
        changed
    }

    pub fn lookup(&self, id: u64) -> Option<&TaskRecord> {
        self.pending
            .values()
            .chain(self.completed.values())
            .flatten()
            .find(|r| r.id == id)
    }

    pub fn all_pending(&self) -> Vec<&TaskRecord> {
        self.pending.values().flatten().collect()
    }

    pub fn all_completed(&self) -> Vec<&TaskRecord> {
        self.completed.values().flatten().collect()
    }

    pub fn notes(&self) -> &[NoteRecord] {
        &self.notes
    }

    pub fn task_count(&self) -> usize {
        self.pending.values().chain(self.completed.values()).map(Vec::len).sum()
    }

    /// Re-keys everything at or under `old_path`. Returns the new paths that
    /// were touched.
    pub fn rename_path(&mut self, old_path: &str, new_path: &str) -> Vec<String> {
        let mut touched = Vec::new();
        for map in [&mut self.pending, &mut self.completed] {
            let moving: Vec<String> = map
                .keys()
                .filter(|k| paths::is_same_or_within(k, old_path))
                .cloned()
                .collect();
            for key in moving {
                let Some(rebased) = paths::rebase(&key, old_path, new_path) else {
                    continue;
                };
                if let Some(mut records) = map.remove(&key) {
                    for record in records.iter_mut() {
                        record.file_path = rebased.clone();
                    }
                    map.insert(rebased.clone(), records);
                    touched.push(rebased);
                }
            }
        }

        let moving: Vec<String> = self
            .content_hashes
            .keys()
            .filter(|k| paths::is_same_or_within(k, old_path))
            .cloned()
            .collect();
        for key in moving {
            if let (Some(rebased), Some(hash)) = (
                paths::rebase(&key, old_path, new_path),
                self.content_hashes.remove(&key),
            ) {
                self.content_hashes.insert(rebased, hash);
            }
        }

        for note in self.notes.iter_mut() {
            if let Some(rebased) = paths::rebase(&note.file_path, old_path, new_path) {
                note.file_path = rebased.clone();
                touched.push(rebased);
            }
        }

        touched.sort();
        touched.dedup();
        touched
    }

    /// Drops everything at or under `rel_path`. Returns the removed paths.
    pub fn delete_path(&mut self, rel_path: &str) -> Vec<String> {
        let mut removed = Vec::new();
        for map in [&mut self.pending, &mut self.completed] {
            map.retain(|k, _| {
                let hit = paths::is_same_or_within(k, rel_path);
                if hit {
                    removed.push(k.clone());
                }
                !hit
            });
        }
        self.content_hashes
            .retain(|k, _| !paths::is_same_or_within(k, rel_path));
        self.notes.retain(|n| {
            let hit = paths::is_same_or_within(&n.file_path, rel_path);
            if hit {
                removed.push(n.file_path.clone());
            }
            !hit
        });
        removed.sort();
        removed.dedup();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{CustomStatus, StatusCategory};
    use crate::tasks::{TaskFields, TaskLocation, TaskStatus};

    fn record(path: &str, text: &str, status: TaskStatus) -> TaskRecord {
        TaskRecord {
            id: 0,
            fields: TaskFields {
                status,
                title: text.to_string(),
                ..TaskFields::default()
            },
            body_lines: Vec::new(),
            frontmatter_tags: Vec::new(),
            file_path: path.to_string(),
            location: TaskLocation::default(),
            indent: String::new(),
            marker: "-".to_string(),
            source_text: format!("- [{}] {text}", status.symbol()),
            is_task_note: false,
        }
    }

    fn store(cache: &mut TaskCache, path: &str, mut records: Vec<TaskRecord>) -> bool {
        cache.assign_ids(path, &mut records, &[]);
        cache.replace_document(path, records, &StatusCatalog::default())
    }

    fn ids_by_path(cache: &TaskCache) -> Vec<(String, u64)> {
        cache
            .all_pending()
            .iter()
            .chain(cache.all_completed().iter())
            .map(|r| (r.file_path.clone(), r.id))
            .collect()
    }

    #[test]
    fn partitions_by_status() {
        let mut cache = TaskCache::new("vault");
        store(
            &mut cache,
            "a.md",
            vec![
                record("a.md", "open", TaskStatus::Unchecked),
                record("a.md", "done", TaskStatus::DONE),
                record("a.md", "dropped", TaskStatus::Cancelled),
                record("a.md", "busy", TaskStatus::InProgress),
            ],
        );
        let pending: Vec<_> = cache.all_pending().iter().map(|r| r.fields.title.clone()).collect();
        let completed: Vec<_> = cache
            .all_completed()
            .iter()
            .map(|r| r.fields.title.clone())
            .collect();
        assert_eq!(pending, vec!["open", "busy"]);
        assert_eq!(completed, vec!["done", "dropped"]);
    }

    #[test]
    fn replacing_moves_tasks_between_partitions() {
        let mut cache = TaskCache::new("vault");
        store(&mut cache, "a.md", vec![record("a.md", "t", TaskStatus::Unchecked)]);

        let changed = store(&mut cache, "a.md", vec![record("a.md", "t", TaskStatus::DONE)]);
        assert!(changed);
        assert!(cache.all_pending().is_empty());
        assert_eq!(cache.all_completed().len(), 1);
        assert_eq!(cache.task_count(), 1);
    }

    #[test]
    fn ids_are_stable_for_unchanged_lines_and_fresh_otherwise() {
        let mut cache = TaskCache::new("vault");
        store(
            &mut cache,
            "a.md",
            vec![
                record("a.md", "one", TaskStatus::Unchecked),
                record("a.md", "two", TaskStatus::Unchecked),
            ],
        );
        let before: Vec<u64> = cache.all_pending().iter().map(|r| r.id).collect();
        assert_eq!(before, vec![1, 2]);

        let changed = store(
            &mut cache,
            "a.md",
            vec![
                record("a.md", "zero", TaskStatus::Unchecked),
                record("a.md", "one", TaskStatus::Unchecked),
                record("a.md", "two", TaskStatus::Unchecked),
            ],
        );
        assert!(changed);
        let after: Vec<u64> = cache.all_pending().iter().map(|r| r.id).collect();
        assert_eq!(after, vec![3, 1, 2]);
    }

    #[test]
    fn pinned_lines_keep_their_id_after_a_rewrite() {
        let mut cache = TaskCache::new("vault");
        let mut first = record("a.md", "draft", TaskStatus::Unchecked);
        first.location.start_line = 3;
        store(&mut cache, "a.md", vec![first]);
        let id = cache.all_pending()[0].id;

        let mut edited = record("a.md", "final", TaskStatus::DONE);
        edited.location.start_line = 3;
        let mut records = vec![edited];
        cache.assign_ids("a.md", &mut records, &[(3, id)]);
        assert_eq!(records[0].id, id);
    }

    #[test]
    fn explicit_line_ids_advance_the_counter() {
        let mut cache = TaskCache::new("vault");
        let mut tagged = record("a.md", "tagged", TaskStatus::Unchecked);
        tagged.fields.line_id = Some(40);
        store(
            &mut cache,
            "a.md",
            vec![tagged, record("a.md", "plain", TaskStatus::Unchecked)],
        );
        let ids: Vec<u64> = cache.all_pending().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![40, 41]);
        assert_eq!(cache.id_counter(), 41);
    }

    #[test]
    fn explicit_ids_held_by_another_document_are_not_reused() {
        let mut cache = TaskCache::new("vault");
        store(
            &mut cache,
            "a.md",
            vec![
                record("a.md", "one", TaskStatus::Unchecked),
                record("a.md", "two", TaskStatus::Unchecked),
            ],
        );

        let mut copied = record("b.md", "copied", TaskStatus::Unchecked);
        copied.fields.line_id = Some(2);
        let mut twin = record("b.md", "twin", TaskStatus::Unchecked);
        twin.fields.line_id = Some(2);
        store(&mut cache, "b.md", vec![copied, twin]);

        assert_eq!(
            ids_by_path(&cache),
            vec![
                ("a.md".to_string(), 1),
                ("a.md".to_string(), 2),
                ("b.md".to_string(), 3),
                ("b.md".to_string(), 4),
            ]
        );
        assert_eq!(cache.lookup(2).map(|r| r.file_path.as_str()), Some("a.md"));
        assert_eq!(cache.lookup(3).and_then(|r| r.fields.line_id), Some(2));
    }

    #[test]
    fn custom_done_status_lands_in_completed() {
        let statuses = StatusCatalog::new(&[CustomStatus {
            symbol: '>',
            name: "Forwarded".to_string(),
            next_symbol: None,
            category: StatusCategory::Done,
        }]);
        let mut cache = TaskCache::new("vault");
        let mut records = vec![
            record("a.md", "forwarded", TaskStatus::Custom('>')),
            record("a.md", "unknown", TaskStatus::Custom('?')),
        ];
        cache.assign_ids("a.md", &mut records, &[]);
        cache.replace_document("a.md", records, &statuses);

        let completed: Vec<_> = cache.all_completed().iter().map(|r| r.fields.title.clone()).collect();
        let pending: Vec<_> = cache.all_pending().iter().map(|r| r.fields.title.clone()).collect();
        assert_eq!(completed, vec!["forwarded"]);
        assert_eq!(pending, vec!["unknown"]);
    }

    #[test]
    fn unchanged_document_reports_no_change() {
        let mut cache = TaskCache::new("vault");
        store(&mut cache, "a.md", vec![record("a.md", "t", TaskStatus::Unchecked)]);
        assert!(!store(&mut cache, "a.md", vec![record("a.md", "t", TaskStatus::Unchecked)]));
    }

    #[test]
    fn folder_rename_respects_path_boundaries() {
        let mut cache = TaskCache::new("vault");
        for path in ["Folder/sub/file.md", "Folder2/file.md"] {
            store(&mut cache, path, vec![record(path, "t", TaskStatus::Unchecked)]);
            cache.set_content_hash(path, "h".to_string());
        }

        let touched = cache.rename_path("Folder", "Renamed");
        assert_eq!(touched, vec!["Renamed/sub/file.md".to_string()]);

        let paths = cache.document_paths();
        assert_eq!(paths, vec!["Folder2/file.md", "Renamed/sub/file.md"]);
        let moved = cache.document_tasks("Renamed/sub/file.md").next().unwrap();
        assert_eq!(moved.file_path, "Renamed/sub/file.md");
        assert_eq!(cache.content_hash("Renamed/sub/file.md"), Some("h"));
        assert_eq!(
            cache.document_tasks("Folder2/file.md").next().unwrap().file_path,
            "Folder2/file.md"
        );
    }

    #[test]
    fn delete_removes_folder_contents_only() {
        let mut cache = TaskCache::new("vault");
        for path in ["Folder/a.md", "Folder2/b.md"] {
            store(&mut cache, path, vec![record(path, "t", TaskStatus::DONE)]);
        }
        cache.set_note(
            "Folder/a.md",
            Some(NoteRecord {
                file_path: "Folder/a.md".to_string(),
                title: "a".to_string(),
                frontmatter_tags: Vec::new(),
            }),
        );
        let removed = cache.delete_path("Folder");
        assert_eq!(removed, vec!["Folder/a.md".to_string()]);
        assert_eq!(cache.document_paths(), vec!["Folder2/b.md"]);
        assert!(cache.notes().is_empty());
    }
}
