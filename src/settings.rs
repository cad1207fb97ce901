use crate::{board_paths, io_atomic, paths};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GrammarKind {
    /// Emoji markers with a ` | ` separator and bracketed time/completion.
    #[default]
    Default,
    /// Tasks-plugin style: emoji markers, space separated.
    BracketField,
    /// Dataview style `[key:: value]`.
    InlineField,
    /// `@key(value)`.
    Annotation,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StatusCategory {
    Todo,
    InProgress,
    Done,
    Cancelled,
    NonTask,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CustomStatus {
    pub symbol: char,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub next_symbol: Option<char>,
    pub category: StatusCategory,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FilterPolarity {
    /// Only matching entries are scanned.
    Allow,
    /// Matching entries are skipped.
    Deny,
    #[default]
    Off,
}

/// One allow/deny list. Path values wrapped in slashes (`/^Daily/`) are
/// regular expressions; tag values may use `*` wildcards.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ScanFilter {
    pub polarity: FilterPolarity,
    pub values: Vec<String>,
}

impl ScanFilter {
    fn is_active(&self) -> bool {
        self.polarity != FilterPolarity::Off && !self.values.is_empty()
    }

    fn decide(&self, hit: bool) -> bool {
        match self.polarity {
            FilterPolarity::Allow => hit,
            FilterPolarity::Deny => !hit,
            FilterPolarity::Off => true,
        }
    }

    /// Tag check for one task. Case and the leading `#` are ignored.
    pub fn accepts(&self, tags: &[String]) -> bool {
        if !self.is_active() {
            return true;
        }
        let hit = tags
            .iter()
            .any(|tag| self.values.iter().any(|pattern| tag_matches(pattern, tag)));
        self.decide(hit)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ScanFilters {
    pub files: ScanFilter,
    pub folders: ScanFilter,
    pub tags: ScanFilter,
}

impl ScanFilters {
    /// A file entry that matches decides first. Otherwise the folder list
    /// decides on the parent folder, and with neither the file is scanned.
    pub fn allows_path(&self, rel_path: &str) -> bool {
        if self.files.is_active()
            && self
                .files
                .values
                .iter()
                .any(|v| path_matches(v, rel_path, false))
        {
            return self.files.polarity == FilterPolarity::Allow;
        }
        if self.folders.is_active() {
            let parent = rel_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
            let hit = !parent.is_empty()
                && self
                    .folders
                    .values
                    .iter()
                    .any(|v| path_matches(v, parent, true));
            return self.folders.decide(hit);
        }
        true
    }
}

fn path_matches(pattern: &str, path: &str, include_children: bool) -> bool {
    let pattern = pattern.trim();
    if let Some(expr) = pattern
        .strip_prefix('/')
        .and_then(|p| p.strip_suffix('/'))
        .filter(|p| !p.is_empty())
    {
        return match Regex::new(expr) {
            Ok(re) => re.is_match(path),
            Err(error) => {
                tracing::debug!(pattern, error = %error, "ignoring invalid scan filter");
                false
            }
        };
    }
    let pattern = paths::normalize_rel(pattern);
    if pattern.is_empty() {
        return false;
    }
    if include_children {
        paths::is_same_or_within(path, &pattern)
    } else {
        pattern == path
    }
}

fn tag_matches(pattern: &str, tag: &str) -> bool {
    let norm = |s: &str| s.trim().trim_start_matches('#').to_lowercase();
    let pattern = norm(pattern);
    if pattern.is_empty() {
        return false;
    }
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$")).is_ok_and(|re| re.is_match(&norm(tag)))
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct EngineSettings {
    pub grammar: GrammarKind,
    pub time_prefix: bool,
    pub date_format: String,
    pub completion_date_time_format: String,
    pub custom_statuses: Vec<CustomStatus>,
    pub task_note_tag: String,
    pub show_frontmatter_tags: bool,
    pub indentation: String,
    pub excluded_folders: Vec<String>,
    pub scan_filters: ScanFilters,
    pub archived_tasks_file: Option<String>,
    pub vault_name: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            grammar: GrammarKind::Default,
            time_prefix: false,
            date_format: "YYYY-MM-DD".to_string(),
            completion_date_time_format: "YYYY-MM-DD/HH:mm".to_string(),
            custom_statuses: Vec::new(),
            task_note_tag: "taskNote".to_string(),
            show_frontmatter_tags: false,
            indentation: "\t".to_string(),
            excluded_folders: Vec::new(),
            scan_filters: ScanFilters::default(),
            archived_tasks_file: None,
            vault_name: None,
        }
    }
}

impl EngineSettings {
    /// Excluded folders and the archive file never reach the extractor.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        let archived = self
            .archived_tasks_file
            .as_deref()
            .map(paths::normalize_rel)
            .filter(|a| !a.is_empty())
            .is_some_and(|a| a == rel_path);
        archived
            || self
                .excluded_folders
                .iter()
                .map(|f| paths::normalize_rel(f))
                .filter(|f| !f.is_empty())
                .any(|f| paths::is_same_or_within(rel_path, &f))
    }

    /// Whether a file is handed to the extractor at all.
    pub fn is_scanned(&self, rel_path: &str) -> bool {
        !self.is_excluded(rel_path) && self.scan_filters.allows_path(rel_path)
    }

    pub fn vault_name_for(&self, vault_root: &Path) -> String {
        if let Some(name) = self.vault_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        vault_root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("vault")
            .to_string()
    }
}

pub fn read_settings(vault_root: &Path) -> EngineSettings {
    let Ok(path) = board_paths::settings_path(vault_root) else {
        return EngineSettings::default();
    };
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(_) => return EngineSettings::default(),
    };
    match serde_json::from_slice(&bytes) {
        Ok(settings) => settings,
        Err(error) => {
            tracing::warn!(path = %path.display(), error = %error, "unreadable settings, using defaults");
            EngineSettings::default()
        }
    }
}

pub fn write_settings(vault_root: &Path, settings: &EngineSettings) -> Result<(), String> {
    board_paths::ensure_board_dir(vault_root)?;
    let path = board_paths::settings_path(vault_root)?;
    io_atomic::write_json_atomic(&path, settings).map_err(|e| e.to_string())
}
