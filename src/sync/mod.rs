mod queue;
mod synchronizer;
mod watcher;

pub use queue::{ChangeQueue, PathState};
pub(crate) use synchronizer::{read_with, rescan_vault};
pub use synchronizer::{
    collect_markdown_files, drain_queue, DocumentSource, DrainReport, RescanReport, VaultDocuments,
};
pub use watcher::{watch_vault, VaultWatcher};
