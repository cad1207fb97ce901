use std::path::{Component, Path, PathBuf};

pub fn join_under(root: &Path, rel: &Path) -> Result<PathBuf, String> {
    if rel.is_absolute() {
        return Err("relative path must not be absolute".to_string());
    }

    for c in rel.components() {
        match c {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err("relative path must not contain '..'".to_string()),
            Component::RootDir | Component::Prefix(_) => {
                return Err("invalid path component".to_string())
            }
        }
    }

    Ok(root.join(rel))
}

pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Vault-relative key form: forward slashes, no leading `./` or `/`, no
/// trailing separator.
pub fn normalize_rel(raw: &str) -> String {
    let slashed = raw.replace('\\', "/");
    slashed
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// True when `path` is `prefix` itself or lives underneath it. `Folder` does
/// not contain `Folder2/file.md`.
pub fn is_same_or_within(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

/// Moves `path` from under `old_prefix` to under `new_prefix`.
pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if !is_same_or_within(path, old_prefix) {
        return None;
    }
    let old_prefix = old_prefix.trim_end_matches('/');
    let new_prefix = new_prefix.trim_end_matches('/');
    let rest = &path[old_prefix.len()..];
    Some(format!("{new_prefix}{rest}"))
}

pub fn has_hidden_component(rel: &str) -> bool {
    rel.split('/').any(|p| p.starts_with('.'))
}
