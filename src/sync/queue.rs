use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{io_atomic, paths};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathState {
    Idle,
    Queued,
    Processing,
}

/// Paths waiting for re-extraction. Each path is queued at most once;
/// queued and in-flight paths are persisted so a crash loses nothing.
#[derive(Debug, Default)]
pub struct ChangeQueue {
    states: BTreeMap<String, PathState>,
    store_path: Option<PathBuf>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores whatever was queued or in flight when the queue was last
    /// persisted. Everything comes back as Queued.
    pub fn load(store_path: &Path) -> Self {
        let mut queue = Self {
            states: BTreeMap::new(),
            store_path: Some(store_path.to_path_buf()),
        };
        let bytes = match std::fs::read(store_path) {
            Ok(bytes) => bytes,
            Err(_) => return queue,
        };
        match serde_json::from_slice::<Vec<String>>(&bytes) {
            Ok(paths) => {
                for path in paths {
                    queue.states.insert(path, PathState::Queued);
                }
            }
            Err(error) => {
                tracing::warn!(path = %store_path.display(), error = %error, "discarding unreadable change queue");
            }
        }
        queue
    }

    pub fn state(&self, rel_path: &str) -> PathState {
        self.states.get(rel_path).copied().unwrap_or(PathState::Idle)
    }

    pub fn is_empty(&self) -> bool {
        !self.states.values().any(|s| *s == PathState::Queued)
    }

    pub fn queued(&self) -> Vec<String> {
        self.states
            .iter()
            .filter(|(_, s)| **s == PathState::Queued)
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Returns false if the path was already queued. A path that is being
    /// processed is queued again so the newer content gets picked up.
    pub fn on_document_modified(&mut self, rel_path: &str) -> bool {
        match self.state(rel_path) {
            PathState::Queued => false,
            PathState::Idle | PathState::Processing => {
                self.states.insert(rel_path.to_string(), PathState::Queued);
                self.persist();
                true
            }
        }
    }

    /// Moves queued entries at or under `old_path` so they drain under their
    /// new name.
    pub fn on_document_renamed(&mut self, old_path: &str, new_path: &str) {
        let moving: Vec<String> = self
            .states
            .keys()
            .filter(|k| paths::is_same_or_within(k, old_path))
            .cloned()
            .collect();
        if moving.is_empty() {
            return;
        }
        for key in moving {
            let (Some(state), Some(rebased)) =
                (self.states.remove(&key), paths::rebase(&key, old_path, new_path))
            else {
                continue;
            };
            // In-flight work was done against the old name; redo it.
            let state = if state == PathState::Processing {
                PathState::Queued
            } else {
                state
            };
            self.states.insert(rebased, state);
        }
        self.persist();
    }

    pub fn on_document_deleted(&mut self, rel_path: &str) {
        let before = self.states.len();
        self.states
            .retain(|k, _| !paths::is_same_or_within(k, rel_path));
        if self.states.len() != before {
            self.persist();
        }
    }

    /// Marks every queued path as processing and hands them out.
    pub fn begin_drain(&mut self) -> Vec<String> {
        let batch = self.queued();
        for path in &batch {
            self.states.insert(path.clone(), PathState::Processing);
        }
        batch
    }

    /// Only clears the path if nothing re-queued it mid-flight.
    pub fn complete(&mut self, rel_path: &str) {
        if self.state(rel_path) == PathState::Processing {
            self.states.remove(rel_path);
        }
    }

    pub fn fail(&mut self, rel_path: &str) {
        if self.state(rel_path) == PathState::Processing {
            self.states.insert(rel_path.to_string(), PathState::Queued);
        }
    }

    pub fn persist(&self) {
        let Some(store_path) = self.store_path.as_deref() else {
            return;
        };
        let pending: Vec<&String> = self
            .states
            .iter()
            .filter(|(_, s)| **s != PathState::Idle)
            .map(|(p, _)| p)
            .collect();
        if let Err(error) = io_atomic::write_json_atomic(store_path, &pending) {
            tracing::warn!(path = %store_path.display(), error = %error, "failed to persist change queue");
        }
    }
}
