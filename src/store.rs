//! JSON persistence for stats, bookmarks, and theme preferences.
//!
//! Each concern lives in its own file under the stats directory. A missing,
//! empty, or corrupt file is treated as absent: the default value is used
//! and immediately written back so the next load sees a well-formed file.
//! Saves rewrite the whole file; errors are logged and ignored to keep the
//! playback loop responsive.

use crate::stats::ReadingStats;
use crate::theme::ThemePreferences;
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const STATS_FILE: &str = "reading_stats.json";
pub const BOOKMARKS_FILE: &str = "bookmarks.json";
pub const THEME_FILE: &str = "theme_preferences.json";

/// One saved reading position. Append-only; never mutated after creation.
#[derive(Debug, Clone, serde::Deserialize, Serialize)]
pub struct Bookmark {
    pub book: String,
    pub position: usize,
    pub word: String,
    pub timestamp: String,
}

/// Persistence store rooted at a stats directory.
pub struct DataStore {
    stats_path: PathBuf,
    bookmarks_path: PathBuf,
    theme_path: PathBuf,
}

impl DataStore {
    pub fn open(stats_dir: &Path) -> Result<Self> {
        fs::create_dir_all(stats_dir)
            .with_context(|| format!("Failed to create stats dir {}", stats_dir.display()))?;
        Ok(Self {
            stats_path: stats_dir.join(STATS_FILE),
            bookmarks_path: stats_dir.join(BOOKMARKS_FILE),
            theme_path: stats_dir.join(THEME_FILE),
        })
    }

    pub fn load_stats(&self) -> ReadingStats {
        load_or_init(&self.stats_path)
    }

    pub fn save_stats(&self, stats: &ReadingStats) {
        write_json(&self.stats_path, stats);
    }

    pub fn load_bookmarks(&self) -> Vec<Bookmark> {
        load_or_init(&self.bookmarks_path)
    }

    pub fn save_bookmarks(&self, bookmarks: &[Bookmark]) {
        write_json(&self.bookmarks_path, &bookmarks);
    }

    pub fn load_theme_preferences(&self) -> ThemePreferences {
        load_or_init(&self.theme_path)
    }

    pub fn save_theme_preferences(&self, prefs: &ThemePreferences) {
        write_json(&self.theme_path, prefs);
    }
}

/// Read a JSON value, falling back to the default and rewriting the file
/// when it is missing, empty, or does not parse. Never fatal.
fn load_or_init<T>(path: &Path) -> T
where
    T: Default + Serialize + DeserializeOwned,
{
    match fs::read_to_string(path) {
        Ok(data) if !data.trim().is_empty() => match serde_json::from_str(&data) {
            Ok(value) => {
                debug!(path = %path.display(), "Loaded persisted data");
                value
            }
            Err(err) => {
                warn!(path = %path.display(), "Replacing corrupt data file: {err}");
                let value = T::default();
                write_json(path, &value);
                value
            }
        },
        _ => {
            debug!(path = %path.display(), "Initializing data file with defaults");
            let value = T::default();
            write_json(path, &value);
            value
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match serde_json::to_string(value) {
        Ok(contents) => {
            if let Err(err) = fs::write(path, contents) {
                warn!(path = %path.display(), "Failed to persist data: {err}");
            }
        }
        Err(err) => {
            warn!(path = %path.display(), "Failed to serialize data: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_store() -> (DataStore, PathBuf) {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("speedreader-store-{nonce}"));
        let store = DataStore::open(&dir).expect("store should open");
        (store, dir)
    }

    #[test]
    fn missing_files_yield_defaults_and_are_rewritten() {
        let (store, dir) = scratch_store();
        let stats = store.load_stats();
        assert_eq!(stats.total_words_read, 0);
        assert!(dir.join(STATS_FILE).exists());
        assert!(store.load_bookmarks().is_empty());
        assert!(dir.join(BOOKMARKS_FILE).exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_file_is_replaced_with_defaults() {
        let (store, dir) = scratch_store();
        fs::write(dir.join(STATS_FILE), "{not json").expect("write corrupt file");
        let stats = store.load_stats();
        assert_eq!(stats.total_words_read, 0);
        let rewritten = fs::read_to_string(dir.join(STATS_FILE)).expect("rewritten file");
        assert!(serde_json::from_str::<ReadingStats>(&rewritten).is_ok());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_bookmarks_file_is_replaced_with_defaults() {
        let (store, dir) = scratch_store();
        fs::write(dir.join(BOOKMARKS_FILE), "{not json").expect("write corrupt file");
        assert!(store.load_bookmarks().is_empty());
        let rewritten = fs::read_to_string(dir.join(BOOKMARKS_FILE)).expect("rewritten file");
        assert!(serde_json::from_str::<Vec<Bookmark>>(&rewritten).is_ok());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_theme_file_is_replaced_with_defaults() {
        let (store, dir) = scratch_store();
        fs::write(dir.join(THEME_FILE), "{not json").expect("write corrupt file");
        let prefs = store.load_theme_preferences();
        assert_eq!(prefs.current_theme, "dark");
        let rewritten = fs::read_to_string(dir.join(THEME_FILE)).expect("rewritten file");
        assert!(serde_json::from_str::<ThemePreferences>(&rewritten).is_ok());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn bookmarks_round_trip() {
        let (store, dir) = scratch_store();
        let bookmarks = vec![Bookmark {
            book: "moby.txt".to_string(),
            position: 7,
            word: "whale".to_string(),
            timestamp: "2026-08-04 12:00:00".to_string(),
        }];
        store.save_bookmarks(&bookmarks);
        let loaded = store.load_bookmarks();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].book, "moby.txt");
        assert_eq!(loaded[0].position, 7);
        assert_eq!(loaded[0].word, "whale");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn theme_preferences_round_trip() {
        let (store, dir) = scratch_store();
        let mut prefs = store.load_theme_preferences();
        assert_eq!(prefs.current_theme, "dark");
        prefs.current_theme = "ocean".to_string();
        store.save_theme_preferences(&prefs);
        assert_eq!(store.load_theme_preferences().current_theme, "ocean");
        let _ = fs::remove_dir_all(dir);
    }
}
