use std::path::PathBuf;

/// All errors produced by the kometa-core crate.
#[derive(Debug, thiserror::Error)]
pub enum KometaError {
    /// Filesystem failure while reading or writing a specific path.
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted state document is unusable.
    #[error("state error: {0}")]
    State(String),

    /// Another process holds the state lock.
    #[error("state directory is locked by another run: {0}")]
    Locked(PathBuf),

    /// Invalid schedule specifier.
    #[error("schedule error: {0}")]
    Schedule(String),
}

impl KometaError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KometaError::Io {
            path: path.into(),
            source,
        }
    }
}
