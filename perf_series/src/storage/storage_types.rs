use std::{io, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Series file {} is locked by another writer. Remove the lock file if no writer is running.", path.display())]
    Locked { path: PathBuf },

    #[error("I/O failure on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Commit {commit} already has a run in series '{series}'")]
    DuplicateCommit { series: String, commit: String },

    #[error("Failed to encode bench run for series '{series}'")]
    Encode {
        series: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub(super) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> PersistenceError {
        let path = path.into();
        move |source| PersistenceError::Io { path, source }
    }
}
