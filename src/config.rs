use std::path::PathBuf;

/// Explicit configuration for the core components.
///
/// These were process-wide constants in earlier iterations; passing them in
/// lets tests point everything at temporary directories.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Per-folder tag frequency file, created inside the opened folder.
    pub tag_history_filename: String,
    /// Recently-opened-folders file, relative to the working directory.
    pub folder_history_file: PathBuf,
    /// Most-recent-first cap on the folder history.
    pub history_capacity: usize,
    /// Image extensions the folder scan accepts (lowercase, no dot).
    pub supported_extensions: Vec<String>,
    /// Longest edge of the decoded preview texture, in pixels.
    pub preview_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tag_history_filename: "lora_tag_history.json".to_string(),
            folder_history_file: PathBuf::from("folder_history.json"),
            history_capacity: 10,
            supported_extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
            preview_size: 800,
        }
    }
}

impl AppConfig {
    /// Whether a path has one of the supported image extensions.
    pub fn is_supported_image(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.supported_extensions.iter().any(|s| *s == e))
    }
}
