mod edit;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex, MutexGuard, PoisonError};

use crate::board_paths;
use crate::cache::{self, TaskCache};
use crate::error::{EngineError, Result};
use crate::paths;
use crate::settings::{self, EngineSettings};
use crate::sync::{self, ChangeQueue, DrainReport, RescanReport, VaultDocuments};
use crate::tasks::{
    extract_document, grammar_for, sort_tasks, Partition, SortCriterion, StatusCatalog,
    TaskGrammar, TaskRecord,
};
use crate::utils;

pub use edit::EditResolution;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    CacheUpdated { paths: Vec<String> },
    RescanRecommended,
}

/// Owns the cache, the change queue and the active grammar for one vault.
/// Share it behind an `Arc`; every method takes `&self`.
pub struct TaskEngine {
    root: PathBuf,
    settings: EngineSettings,
    grammar: &'static dyn TaskGrammar,
    statuses: StatusCatalog,
    cache_path: PathBuf,
    cache: Mutex<TaskCache>,
    queue: Mutex<ChangeQueue>,
    busy: AtomicBool,
    rescan_recommended: AtomicBool,
    subscribers: Mutex<Vec<mpsc::Sender<EngineEvent>>>,
}

/// Held for the length of a drain or rescan.
pub(crate) struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EngineError::ScanInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TaskEngine {
    /// Opens the vault with the settings stored under `.taskboard/`.
    pub fn init(vault_root: &Path) -> Result<Self> {
        let settings = settings::read_settings(vault_root);
        Self::with_settings(vault_root, settings)
    }

    pub fn with_settings(vault_root: &Path, settings: EngineSettings) -> Result<Self> {
        if !vault_root.is_dir() {
            return Err(EngineError::InvalidPath(format!(
                "vault root is not a directory: {}",
                vault_root.display()
            )));
        }
        board_paths::ensure_board_dir(vault_root).map_err(EngineError::InvalidPath)?;
        let cache_path = board_paths::cache_path(vault_root).map_err(EngineError::InvalidPath)?;
        let queue_path = board_paths::queue_path(vault_root).map_err(EngineError::InvalidPath)?;

        let vault_name = settings.vault_name_for(vault_root);
        let loaded = cache::load_snapshot(&cache_path, &vault_name);
        let queue = ChangeQueue::load(&queue_path);
        tracing::info!(
            vault = %vault_root.display(),
            tasks = loaded.cache.task_count(),
            queued = queue.queued().len(),
            "task engine ready"
        );

        Ok(Self {
            root: vault_root.to_path_buf(),
            grammar: grammar_for(settings.grammar),
            statuses: StatusCatalog::new(&settings.custom_statuses),
            settings,
            cache_path,
            cache: Mutex::new(loaded.cache),
            queue: Mutex::new(queue),
            busy: AtomicBool::new(false),
            rescan_recommended: AtomicBool::new(loaded.rescan_recommended),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Persists the queue and the cache.
    pub fn shutdown(&self) -> Result<()> {
        self.lock_queue().persist();
        self.save_cache()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn grammar(&self) -> &'static dyn TaskGrammar {
        self.grammar
    }

    pub fn statuses(&self) -> &StatusCatalog {
        &self.statuses
    }

    /// True after startup found no usable cache snapshot and until a rescan
    /// has rebuilt it.
    pub fn rescan_recommended(&self) -> bool {
        self.rescan_recommended.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> mpsc::Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel();
        if self.rescan_recommended() {
            let _ = tx.send(EngineEvent::RescanRecommended);
        }
        self.lock_subscribers().push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: EngineEvent) {
        self.lock_subscribers()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<mpsc::Sender<EngineEvent>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_cache(&self) -> MutexGuard<'_, TaskCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_queue(&self) -> MutexGuard<'_, ChangeQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn begin_busy(&self) -> Result<BusyGuard<'_>> {
        BusyGuard::acquire(&self.busy)
    }

    pub(crate) fn set_rescan_recommended(&self, value: bool) {
        self.rescan_recommended.store(value, Ordering::Release);
    }

    /// Markdown files outside hidden folders that pass the scan filters.
    pub fn is_tracked(&self, rel_path: &str) -> bool {
        !rel_path.is_empty()
            && !paths::has_hidden_component(rel_path)
            && utils::is_markdown_path(Path::new(rel_path))
            && self.settings.is_scanned(rel_path)
    }

    pub fn on_document_modified(&self, rel_path: &str) {
        let rel_path = paths::normalize_rel(rel_path);
        if !self.is_tracked(&rel_path) {
            tracing::trace!(rel_path = %rel_path, "ignoring untracked path");
            return;
        }
        if self.lock_queue().on_document_modified(&rel_path) {
            tracing::debug!(rel_path = %rel_path, "queued for extraction");
        }
    }

    /// Re-keys cached tasks and queued work at or under `old_path`.
    pub fn on_document_renamed(&self, old_path: &str, new_path: &str) {
        let old_path = paths::normalize_rel(old_path);
        let new_path = paths::normalize_rel(new_path);
        if old_path.is_empty() || new_path.is_empty() || old_path == new_path {
            return;
        }

        let touched = self.lock_cache().rename_path(&old_path, &new_path);
        self.lock_queue().on_document_renamed(&old_path, &new_path);

        // A rename can move a file into or out of what we track.
        let mut untracked = Vec::new();
        for path in &touched {
            if !self.is_tracked(path) {
                untracked.extend(self.lock_cache().delete_path(path));
                self.lock_queue().on_document_deleted(path);
            }
        }
        if touched.is_empty() && self.is_tracked(&new_path) {
            self.on_document_modified(&new_path);
        }

        if touched.is_empty() && untracked.is_empty() {
            return;
        }
        tracing::debug!(old_path = %old_path, new_path = %new_path, documents = touched.len(), "renamed");
        self.persist_after_change(touched.into_iter().chain(untracked).collect());
    }

    pub fn on_document_deleted(&self, rel_path: &str) {
        let rel_path = paths::normalize_rel(rel_path);
        if rel_path.is_empty() {
            return;
        }
        self.lock_queue().on_document_deleted(&rel_path);
        let removed = self.lock_cache().delete_path(&rel_path);
        if removed.is_empty() {
            return;
        }
        tracing::debug!(rel_path = %rel_path, documents = removed.len(), "removed from cache");
        self.persist_after_change(removed);
    }

    fn persist_after_change(&self, paths: Vec<String>) {
        if let Err(error) = self.save_cache() {
            tracing::warn!(error = %error, "failed to persist task cache");
        }
        self.emit(EngineEvent::CacheUpdated { paths });
    }

    pub fn queued_paths(&self) -> Vec<String> {
        self.lock_queue().queued()
    }

    /// Re-extracts every queued document.
    pub async fn process_all_queued(&self) -> Result<DrainReport> {
        let source = VaultDocuments::new(&self.root);
        sync::drain_queue(self, &source).await
    }

    /// Extracts one document right away, outside the queue.
    pub async fn scan_file(&self, rel_path: &str) -> Result<bool> {
        let rel_path = paths::normalize_rel(rel_path);
        if !self.is_tracked(&rel_path) {
            return Err(EngineError::InvalidPath(rel_path));
        }
        let source = VaultDocuments::new(&self.root);
        let markdown = sync::read_with(&source, &rel_path).await?;
        let changed = self.apply_document(&rel_path, &markdown, &[]);
        if changed {
            self.save_cache_async().await?;
            self.emit(EngineEvent::CacheUpdated {
                paths: vec![rel_path],
            });
        }
        Ok(changed)
    }

    pub async fn rescan_vault(&self) -> Result<RescanReport> {
        sync::rescan_vault(self).await
    }

    /// Extracts `markdown` and swaps the result into the cache. Returns false
    /// when the content was already indexed or produced identical records.
    pub(crate) fn apply_document(&self, rel_path: &str, markdown: &str, pinned: &[(usize, u64)]) -> bool {
        let extracted = extract_document(rel_path, markdown, self.grammar, &self.settings);
        let mut cache = self.lock_cache();
        if pinned.is_empty() && cache.content_hash(rel_path) == Some(extracted.content_hash.as_str()) {
            tracing::trace!(rel_path, "content unchanged");
            return false;
        }
        let mut records = extracted.tasks;
        cache.assign_ids(rel_path, &mut records, pinned);
        let tasks_changed = cache.replace_document(rel_path, records, &self.statuses);
        let note_changed = cache.set_note(rel_path, extracted.note);
        cache.set_content_hash(rel_path, extracted.content_hash);
        if tasks_changed || note_changed {
            cache.touch();
        }
        tasks_changed || note_changed
    }

    pub fn lookup(&self, id: u64) -> Option<TaskRecord> {
        self.lock_cache().lookup(id).cloned()
    }

    pub fn query(&self, partition: Partition) -> Vec<TaskRecord> {
        let cache = self.lock_cache();
        let records = match partition {
            Partition::Pending => cache.all_pending(),
            Partition::Completed => cache.all_completed(),
        };
        records.into_iter().cloned().collect()
    }

    pub fn resort_column(&self, records: Vec<TaskRecord>, criteria: &[SortCriterion]) -> Vec<TaskRecord> {
        sort_tasks(records, criteria)
    }

    pub fn snapshot(&self) -> TaskCache {
        self.lock_cache().clone()
    }

    pub(crate) fn replace_cache(&self, next: TaskCache) {
        *self.lock_cache() = next;
    }

    fn save_cache(&self) -> Result<()> {
        let snapshot = self.snapshot();
        cache::save_snapshot(&self.cache_path, &snapshot)
    }

    pub(crate) async fn save_cache_async(&self) -> Result<()> {
        let snapshot = self.snapshot();
        let path = self.cache_path.clone();
        tokio::task::spawn_blocking(move || cache::save_snapshot(&path, &snapshot))
            .await
            .map_err(|e| EngineError::Io(std::io::Error::other(e)))?
    }
}
