use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::Result;

#[derive(Serialize, Deserialize, Default)]
struct HistoryFile {
    history: Vec<String>,
}

/// Bounded most-recent-first list of previously opened folders, persisted as
/// JSON next to the executable's working directory.
pub struct FolderHistory {
    file: PathBuf,
    capacity: usize,
}

impl FolderHistory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            file: config.folder_history_file.clone(),
            capacity: config.history_capacity,
        }
    }

    /// Valid entries, most-recent-first, de-duplicated, capped. Paths that no
    /// longer exist as directories are dropped. Any failure degrades to an
    /// empty list.
    pub fn load(&self) -> Vec<String> {
        match self.try_load() {
            Ok(history) => history,
            Err(err) => {
                error!("failed to load folder history {}: {err}", self.file.display());
                Vec::new()
            }
        }
    }

    fn try_load(&self) -> Result<Vec<String>> {
        if !self.file.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.file)?;
        let parsed: HistoryFile = serde_json::from_str(&raw)?;

        let mut history = Vec::new();
        for folder in parsed.history {
            if Path::new(&folder).is_dir() && !history.contains(&folder) {
                history.push(folder);
            }
        }
        history.truncate(self.capacity);
        Ok(history)
    }

    /// Record `folder` as the most recently opened. Non-directories are
    /// ignored; write failures are logged and swallowed.
    pub fn save(&self, folder: &str) {
        if !Path::new(folder).is_dir() {
            return;
        }
        if let Err(err) = self.try_save(folder) {
            error!("failed to save folder history {}: {err}", self.file.display());
        }
    }

    fn try_save(&self, folder: &str) -> Result<()> {
        let mut history = self.load();
        history.retain(|f| f != folder);
        history.insert(0, folder.to_string());
        history.truncate(self.capacity);

        let json = serde_json::to_string_pretty(&HistoryFile { history: history.clone() })?;
        fs::write(&self.file, json)?;
        info!("folder history updated: {} ({} entries)", folder, history.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_in(dir: &Path) -> FolderHistory {
        let config = AppConfig {
            folder_history_file: dir.join("folder_history.json"),
            ..AppConfig::default()
        };
        FolderHistory::new(&config)
    }

    fn make_dirs(root: &Path, n: usize) -> Vec<String> {
        (0..n)
            .map(|i| {
                let dir = root.join(format!("folder{i:02}"));
                fs::create_dir(&dir).unwrap();
                dir.to_string_lossy().into_owned()
            })
            .collect()
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(history_in(tmp.path()).load().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("folder_history.json"), "[oops").unwrap();
        assert!(history_in(tmp.path()).load().is_empty());
    }

    #[test]
    fn save_puts_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let history = history_in(tmp.path());
        let dirs = make_dirs(tmp.path(), 3);

        for dir in &dirs {
            history.save(dir);
        }
        assert_eq!(
            history.load(),
            vec![dirs[2].clone(), dirs[1].clone(), dirs[0].clone()]
        );
    }

    #[test]
    fn capacity_caps_at_ten() {
        let tmp = tempfile::tempdir().unwrap();
        let history = history_in(tmp.path());
        let dirs = make_dirs(tmp.path(), 11);

        for dir in &dirs {
            history.save(dir);
        }
        let loaded = history.load();
        assert_eq!(loaded.len(), 10);
        assert_eq!(loaded[0], dirs[10]);
        // The oldest entry fell off.
        assert!(!loaded.contains(&dirs[0]));
    }

    #[test]
    fn resaving_moves_to_front_without_duplicating() {
        let tmp = tempfile::tempdir().unwrap();
        let history = history_in(tmp.path());
        let dirs = make_dirs(tmp.path(), 3);

        for dir in &dirs {
            history.save(dir);
        }
        history.save(&dirs[0]);

        let loaded = history.load();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0], dirs[0]);
    }

    #[test]
    fn nondirectory_is_not_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let history = history_in(tmp.path());
        history.save(tmp.path().join("nope").to_str().unwrap());
        assert!(history.load().is_empty());
    }

    #[test]
    fn load_filters_deleted_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let history = history_in(tmp.path());
        let dirs = make_dirs(tmp.path(), 2);
        for dir in &dirs {
            history.save(dir);
        }

        fs::remove_dir(&dirs[1]).unwrap();
        assert_eq!(history.load(), vec![dirs[0].clone()]);
    }
}
