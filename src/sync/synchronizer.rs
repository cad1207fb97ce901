use serde::Serialize;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use crate::engine::{EngineEvent, TaskEngine};
use crate::error::{EngineError, Result};
use crate::paths;
use crate::settings::EngineSettings;
use crate::utils;

/// Where document text comes from during a drain.
pub trait DocumentSource: Send + Sync {
    fn read_document(&self, rel_path: &str) -> impl Future<Output = io::Result<String>> + Send;
}

pub struct VaultDocuments {
    root: PathBuf,
}

impl VaultDocuments {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl DocumentSource for VaultDocuments {
    fn read_document(&self, rel_path: &str) -> impl Future<Output = io::Result<String>> + Send {
        let abs = paths::join_under(&self.root, Path::new(rel_path))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e));
        async move { tokio::fs::read_to_string(abs?).await }
    }
}

pub(crate) async fn read_with<S: DocumentSource>(source: &S, rel_path: &str) -> Result<String> {
    source
        .read_document(rel_path)
        .await
        .map_err(|read_error| EngineError::DocumentRead {
            rel_path: rel_path.to_string(),
            source: read_error,
        })
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub indexed: Vec<String>,
    pub unchanged: Vec<String>,
    pub removed: Vec<String>,
    /// Still queued; retried on the next drain.
    pub failed: Vec<String>,
}

impl DrainReport {
    pub fn changed_paths(&self) -> Vec<String> {
        self.indexed.iter().chain(&self.removed).cloned().collect()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RescanReport {
    pub documents: usize,
    pub tasks: usize,
    pub failed: Vec<String>,
}

/// Processes every path queued when the drain starts. A document that can't
/// be read stays queued and never stops the rest of the batch; one that no
/// longer exists is dropped from the cache.
pub async fn drain_queue<S: DocumentSource>(engine: &TaskEngine, source: &S) -> Result<DrainReport> {
    let _busy = engine.begin_busy()?;
    let batch = engine.lock_queue().begin_drain();
    let mut report = DrainReport::default();

    for rel_path in batch {
        match source.read_document(&rel_path).await {
            Ok(markdown) => {
                let changed = engine.apply_document(&rel_path, &markdown, &[]);
                engine.lock_queue().complete(&rel_path);
                if changed {
                    report.indexed.push(rel_path);
                } else {
                    report.unchanged.push(rel_path);
                }
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                let removed = engine.lock_cache().delete_path(&rel_path);
                engine.lock_queue().complete(&rel_path);
                if !removed.is_empty() {
                    report.removed.push(rel_path);
                }
            }
            Err(read_error) => {
                let error = EngineError::DocumentRead {
                    rel_path: rel_path.clone(),
                    source: read_error,
                };
                tracing::warn!(error = %error, "document left queued");
                engine.lock_queue().fail(&rel_path);
                report.failed.push(rel_path);
            }
        }
    }

    engine.lock_queue().persist();
    let changed = report.changed_paths();
    if !changed.is_empty() {
        engine.save_cache_async().await?;
        engine.emit(EngineEvent::CacheUpdated { paths: changed });
    }
    if !(report.indexed.is_empty() && report.removed.is_empty() && report.failed.is_empty()) {
        tracing::info!(
            indexed = report.indexed.len(),
            unchanged = report.unchanged.len(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            "drained change queue"
        );
    }
    Ok(report)
}

/// Tracked markdown files under `root`, sorted case-insensitively.
pub fn collect_markdown_files(root: &Path, settings: &EngineSettings) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(error) => {
                tracing::debug!(dir = %dir.display(), error = %error, "skipping unreadable directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel_s = paths::to_slash(rel);
            if rel_s.is_empty() || settings.is_excluded(&rel_s) {
                continue;
            }
            if meta.is_dir() {
                stack.push(path);
            } else if meta.is_file()
                && utils::is_markdown_path(&path)
                && settings.scan_filters.allows_path(&rel_s)
            {
                out.push(rel_s);
            }
        }
    }

    out.sort_by_key(|p| p.to_lowercase());
    out
}

/// Rebuilds the cache from every tracked file. Work happens on a copy that
/// replaces the live cache in one step; ids of unchanged lines survive.
pub async fn rescan_vault(engine: &TaskEngine) -> Result<RescanReport> {
    let source = VaultDocuments::new(engine.root());
    rescan_with(engine, &source).await
}

/// Paths queued before the walk are covered by it. Anything queued while
/// the walk runs stays queued for the next drain.
pub(crate) async fn rescan_with<S: DocumentSource>(engine: &TaskEngine, source: &S) -> Result<RescanReport> {
    let _busy = engine.begin_busy()?;
    let root = engine.root().to_path_buf();
    let settings = engine.settings().clone();
    let files = tokio::task::spawn_blocking(move || collect_markdown_files(&root, &settings))
        .await
        .map_err(|e| EngineError::Io(io::Error::other(e)))?;

    let covered = engine.lock_queue().begin_drain();
    let mut extracted = Vec::with_capacity(files.len());
    let mut failed = Vec::new();
    for rel_path in &files {
        match read_with(source, rel_path).await {
            Ok(markdown) => extracted.push((rel_path.clone(), markdown)),
            Err(error) => {
                tracing::warn!(error = %error, "document skipped during rescan");
                failed.push(rel_path.clone());
            }
        }
    }

    let mut next = engine.snapshot();
    let stale: Vec<String> = next
        .document_paths()
        .into_iter()
        .filter(|p| !files.contains(p))
        .collect();
    for path in &stale {
        next.delete_path(path);
    }
    for (rel_path, markdown) in &extracted {
        let doc = crate::tasks::extract_document(rel_path, markdown, engine.grammar(), engine.settings());
        let mut records = doc.tasks;
        next.assign_ids(rel_path, &mut records, &[]);
        next.replace_document(rel_path, records, engine.statuses());
        next.set_note(rel_path, doc.note);
        next.set_content_hash(rel_path, doc.content_hash);
    }
    next.touch();

    let report = RescanReport {
        documents: extracted.len(),
        tasks: next.task_count(),
        failed,
    };
    engine.replace_cache(next);
    {
        let mut queue = engine.lock_queue();
        for path in &covered {
            queue.complete(path);
        }
        for path in &report.failed {
            queue.on_document_modified(path);
        }
        queue.persist();
    }
    engine.set_rescan_recommended(false);
    engine.save_cache_async().await?;
    engine.emit(EngineEvent::CacheUpdated { paths: files });
    tracing::info!(documents = report.documents, tasks = report.tasks, failed = report.failed.len(), "rescanned vault");
    Ok(report)
}
