use crate::paths;
use std::path::{Path, PathBuf};

pub const BOARD_DIR_NAME: &str = ".taskboard";
pub const CACHE_FILE_NAME: &str = "tasks-cache.json";
pub const QUEUE_FILE_NAME: &str = "pending-scan.json";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub fn board_dir(vault_root: &Path) -> Result<PathBuf, String> {
    paths::join_under(vault_root, Path::new(BOARD_DIR_NAME))
}

pub fn cache_path(vault_root: &Path) -> Result<PathBuf, String> {
    Ok(board_dir(vault_root)?.join(CACHE_FILE_NAME))
}

pub fn queue_path(vault_root: &Path) -> Result<PathBuf, String> {
    Ok(board_dir(vault_root)?.join(QUEUE_FILE_NAME))
}

pub fn settings_path(vault_root: &Path) -> Result<PathBuf, String> {
    Ok(board_dir(vault_root)?.join(SETTINGS_FILE_NAME))
}

pub fn ensure_board_dir(vault_root: &Path) -> Result<PathBuf, String> {
    let dir = board_dir(vault_root)?;
    std::fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
    Ok(dir)
}
