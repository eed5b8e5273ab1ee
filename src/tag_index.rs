use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::Result;
use crate::normalize::{normalize, split_tags};

/// Outcome of a full rescan, shown to the user as a confirmation dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildSummary {
    pub processed: usize,
    pub total: usize,
    pub distinct: usize,
}

/// Per-folder tag frequency table backing the suggestion list.
///
/// Counts accumulate incrementally through [`update`](TagIndex::update) as
/// captions are committed, and can be recomputed from the sidecar files on
/// disk with [`rebuild`](TagIndex::rebuild) when the two have drifted apart
/// (external edits). Persisted as a JSON object in a fixed filename inside
/// the scoped folder.
pub struct TagIndex {
    folder: Option<PathBuf>,
    counts: HashMap<String, u64>,
    history_filename: String,
}

impl TagIndex {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            folder: None,
            counts: HashMap::new(),
            history_filename: config.tag_history_filename.clone(),
        }
    }

    /// Switch scope to `folder`: drop all counts, then load that folder's
    /// persisted table if one exists. Absent or corrupt files leave the
    /// table empty.
    pub fn set_folder(&mut self, folder: &Path) {
        self.folder = Some(folder.to_path_buf());
        self.counts.clear();

        let path = folder.join(&self.history_filename);
        if !path.exists() {
            debug!("no tag history at {}, starting empty", path.display());
            return;
        }
        match Self::try_load(&path) {
            Ok(counts) => {
                info!("loaded {} tags from {}", counts.len(), path.display());
                self.counts = counts;
            }
            Err(err) => {
                error!("failed to load tag history {}: {err}", path.display());
            }
        }
    }

    fn try_load(path: &Path) -> Result<HashMap<String, u64>> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Incremental path: count each tag of the committed caption once.
    pub fn update(&mut self, caption: &str) {
        if caption.is_empty() {
            return;
        }
        let tags = split_tags(caption);
        for tag in &tags {
            *self.counts.entry(tag.clone()).or_insert(0) += 1;
        }
        debug!("counted {} tags, {} distinct total", tags.len(), self.counts.len());
    }

    /// Recompute counts from the sidecar files on disk, replacing whatever
    /// incremental history accumulated. Unreadable files are skipped.
    pub fn rebuild(&mut self, sidecar_files: &[PathBuf]) -> RebuildSummary {
        self.counts.clear();

        let total = sidecar_files.len();
        let mut processed = 0;
        for file in sidecar_files {
            match fs::read_to_string(file) {
                Ok(raw) => {
                    self.update(&normalize(&raw));
                    processed += 1;
                }
                Err(err) => {
                    error!("rebuild: failed to read {}: {err}", file.display());
                }
            }
        }

        let summary = RebuildSummary {
            processed,
            total,
            distinct: self.counts.len(),
        };
        info!(
            "rebuilt tag index: {}/{} files, {} distinct tags",
            summary.processed, summary.total, summary.distinct
        );
        summary
    }

    /// Write the table to the scoped folder, count-descending, blank tags
    /// excluded. Warns and does nothing when no folder is set; I/O failures
    /// are logged and swallowed.
    pub fn save(&self) {
        let Some(folder) = &self.folder else {
            warn!("no folder set, skipping tag history save");
            return;
        };
        let path = folder.join(&self.history_filename);
        if let Err(err) = self.try_save(&path) {
            error!("failed to save tag history {}: {err}", path.display());
        }
    }

    fn try_save(&self, path: &Path) -> Result<()> {
        // serde_json keeps insertion order here, so the file reads
        // top-tag-first.
        let mut map = serde_json::Map::new();
        for (count, tag) in self.sorted_tags() {
            map.insert(tag, serde_json::Value::from(count));
        }
        let json = serde_json::to_string_pretty(&serde_json::Value::Object(map))?;
        fs::write(path, json)?;
        info!("saved {} tags to {}", self.counts.len(), path.display());
        Ok(())
    }

    /// `(count, tag)` pairs, count-descending, ties alphabetical. Blank tags
    /// never make it into the table, but filter anyway in case a persisted
    /// file was edited by hand.
    pub fn sorted_tags(&self) -> Vec<(u64, String)> {
        let mut tags: Vec<(u64, String)> = self
            .counts
            .iter()
            .filter(|(tag, _)| !tag.trim().is_empty())
            .map(|(tag, count)| (*count, tag.clone()))
            .collect();
        tags.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        tags
    }

    /// Append `tag` to `current` unless already present, returning the
    /// renormalized caption. Does not touch the counts; those change only
    /// when the caption is committed through [`update`](TagIndex::update).
    pub fn insert_tag(&self, current: &str, tag: &str) -> String {
        let mut tags = split_tags(current);
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
        normalize(&tags.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> TagIndex {
        TagIndex::new(&AppConfig::default())
    }

    #[test]
    fn update_counts_each_tag_once() {
        let mut idx = index();
        idx.update("a,b");
        idx.update("b,c");
        assert_eq!(
            idx.sorted_tags(),
            vec![(2, "b".to_string()), (1, "a".to_string()), (1, "c".to_string())]
        );
    }

    #[test]
    fn update_empty_caption_is_noop() {
        let mut idx = index();
        idx.update("");
        assert!(idx.sorted_tags().is_empty());
    }

    #[test]
    fn insert_tag_skips_duplicates_and_preserves_order() {
        let idx = index();
        assert_eq!(idx.insert_tag("a,b", "a"), "a,b");
        assert_eq!(idx.insert_tag("a,b", "c"), "a,b,c");
        assert_eq!(idx.insert_tag("", "solo"), "solo");
    }

    #[test]
    fn rebuild_matches_incremental_updates() {
        let tmp = tempfile::tempdir().unwrap();
        let contents = ["cat, grey fur", "cat，dog", "dog\nbird, cat"];
        let mut files = Vec::new();
        for (i, content) in contents.iter().enumerate() {
            let path = tmp.path().join(format!("{i}.txt"));
            fs::write(&path, content).unwrap();
            files.push(path);
        }

        let mut incremental = index();
        for content in &contents {
            incremental.update(&normalize(content));
        }

        let mut rebuilt = index();
        let summary = rebuilt.rebuild(&files);

        assert_eq!(summary, RebuildSummary { processed: 3, total: 3, distinct: 4 });
        assert_eq!(rebuilt.sorted_tags(), incremental.sorted_tags());
    }

    #[test]
    fn rebuild_skips_unreadable_files() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("good.txt");
        fs::write(&good, "a,b").unwrap();
        let missing = tmp.path().join("gone.txt");

        let mut idx = index();
        let summary = idx.rebuild(&[good, missing]);
        assert_eq!(summary, RebuildSummary { processed: 1, total: 2, distinct: 2 });
    }

    #[test]
    fn save_then_set_folder_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut idx = index();
        idx.set_folder(tmp.path());
        idx.update("a,b");
        idx.update("a");
        idx.save();

        let mut reloaded = index();
        reloaded.set_folder(tmp.path());
        assert_eq!(
            reloaded.sorted_tags(),
            vec![(2, "a".to_string()), (1, "b".to_string())]
        );
    }

    #[test]
    fn save_writes_count_descending() {
        let tmp = tempfile::tempdir().unwrap();
        let mut idx = index();
        idx.set_folder(tmp.path());
        idx.update("rare,common");
        idx.update("common");
        idx.save();

        let raw = fs::read_to_string(tmp.path().join("lora_tag_history.json")).unwrap();
        assert!(raw.find("common").unwrap() < raw.find("rare").unwrap());
    }

    #[test]
    fn save_without_folder_is_noop() {
        let mut idx = index();
        idx.update("a");
        idx.save();
    }

    #[test]
    fn set_folder_with_corrupt_history_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("lora_tag_history.json"), "{not json").unwrap();

        let mut idx = index();
        idx.update("stale");
        idx.set_folder(tmp.path());
        assert!(idx.sorted_tags().is_empty());
    }

    #[test]
    fn set_folder_clears_previous_scope() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();

        let mut idx = index();
        idx.set_folder(a.path());
        idx.update("a-only");
        idx.set_folder(b.path());
        assert!(idx.sorted_tags().is_empty());
    }
}
