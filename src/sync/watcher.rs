use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;

use crate::engine::TaskEngine;
use crate::error::Result;
use crate::paths;

const DEBOUNCE_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
enum WatchEvent {
    Modified(String),
    Removed(String),
    Renamed(String, String),
}

/// Keeps the OS watcher alive; dropping it stops event delivery.
pub struct VaultWatcher {
    _watcher: notify::RecommendedWatcher,
}

fn rel_of(root: &Path, path: &Path) -> Option<String> {
    let rel = paths::to_slash(path.strip_prefix(root).ok()?);
    if rel.is_empty() || paths::has_hidden_component(&rel) {
        return None;
    }
    Some(rel)
}

fn translate(root: &Path, event: notify::Event) -> Vec<WatchEvent> {
    let rels = |paths: &[PathBuf]| -> Vec<String> {
        paths.iter().filter_map(|p| rel_of(root, p)).collect()
    };
    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            match (event.paths.first(), event.paths.get(1)) {
                (Some(from), Some(to)) => match (rel_of(root, from), rel_of(root, to)) {
                    (Some(from), Some(to)) => vec![WatchEvent::Renamed(from, to)],
                    // Moved into a hidden folder.
                    (Some(from), None) => vec![WatchEvent::Removed(from)],
                    (None, Some(to)) => vec![WatchEvent::Modified(to)],
                    (None, None) => Vec::new(),
                },
                _ => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            rels(&event.paths).into_iter().map(WatchEvent::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter_map(|p| {
                let rel = rel_of(root, p)?;
                Some(if p.exists() {
                    WatchEvent::Modified(rel)
                } else {
                    WatchEvent::Removed(rel)
                })
            })
            .collect(),
        EventKind::Remove(_) => rels(&event.paths).into_iter().map(WatchEvent::Removed).collect(),
        EventKind::Create(_) | EventKind::Modify(_) => {
            rels(&event.paths).into_iter().map(WatchEvent::Modified).collect()
        }
        _ => Vec::new(),
    }
}

fn apply(engine: &TaskEngine, event: WatchEvent) {
    match event {
        WatchEvent::Modified(rel) => engine.on_document_modified(&rel),
        WatchEvent::Removed(rel) => engine.on_document_deleted(&rel),
        WatchEvent::Renamed(from, to) => engine.on_document_renamed(&from, &to),
    }
}

/// Feeds file system changes under the vault into the engine's change queue.
/// Draining the queue is left to the caller.
pub fn watch_vault(engine: Arc<TaskEngine>) -> Result<VaultWatcher> {
    let root = engine.root().to_path_buf();
    let (tx, rx) = std_mpsc::channel::<WatchEvent>();

    std::thread::spawn(move || {
        let debounce = std::time::Duration::from_millis(DEBOUNCE_MS);
        while let Ok(first) = rx.recv() {
            let mut pending = vec![first];

            let deadline = std::time::Instant::now() + debounce;
            loop {
                let remaining = deadline.saturating_duration_since(std::time::Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match rx.recv_timeout(remaining) {
                    Ok(event) => {
                        if !pending.contains(&event) {
                            pending.push(event);
                        }
                    }
                    Err(std_mpsc::RecvTimeoutError::Timeout) => break,
                    Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                        pending.into_iter().for_each(|e| apply(&engine, e));
                        return;
                    }
                }
            }

            for event in pending {
                apply(&engine, event);
            }
        }
    });

    let root2 = root.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let event = match res {
            Ok(e) => e,
            Err(error) => {
                tracing::warn!(error = %error, "watch error");
                return;
            }
        };
        for change in translate(&root2, event) {
            let _ = tx.send(change);
        }
    })?;
    watcher.watch(&root, notify::RecursiveMode::Recursive)?;
    tracing::info!(vault = %root.display(), "watching vault");

    Ok(VaultWatcher { _watcher: watcher })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> notify::Event {
        let mut e = notify::Event::new(kind);
        for p in paths {
            e = e.add_path(PathBuf::from(p));
        }
        e
    }

    #[test]
    fn maps_notify_events_to_queue_operations() {
        let root = Path::new("/vault");
        assert_eq!(
            translate(root, event(EventKind::Create(CreateKind::File), &["/vault/a.md"])),
            vec![WatchEvent::Modified("a.md".to_string())]
        );
        assert_eq!(
            translate(
                root,
                event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &["/vault/d/b.md"])
            ),
            vec![WatchEvent::Modified("d/b.md".to_string())]
        );
        assert_eq!(
            translate(root, event(EventKind::Remove(RemoveKind::File), &["/vault/a.md"])),
            vec![WatchEvent::Removed("a.md".to_string())]
        );
        assert_eq!(
            translate(
                root,
                event(
                    EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                    &["/vault/Folder", "/vault/Renamed"]
                )
            ),
            vec![WatchEvent::Renamed("Folder".to_string(), "Renamed".to_string())]
        );
    }

    #[test]
    fn hidden_paths_are_ignored() {
        let root = Path::new("/vault");
        assert!(translate(
            root,
            event(EventKind::Create(CreateKind::File), &["/vault/.taskboard/tasks-cache.json"])
        )
        .is_empty());
        assert_eq!(
            translate(
                root,
                event(
                    EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                    &["/vault/a.md", "/vault/.trash/a.md"]
                )
            ),
            vec![WatchEvent::Removed("a.md".to_string())]
        );
    }
}
