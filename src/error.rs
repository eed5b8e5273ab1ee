/// Errors from the persistence paths (sidecar files, JSON history files).
///
/// Callers at the UI boundary never see these: every public load/save entry
/// point catches, logs, and degrades to an empty value.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
