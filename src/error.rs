use std::path::PathBuf;

use thiserror::Error;

use crate::model::RevisionId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the revision store, scheduler, and scan operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("revision {0} not found")]
    NotFound(RevisionId),

    #[error("source file missing: {}", .path.display())]
    SourceMissing { path: PathBuf },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("document {0:?} is already watched")]
    AlreadyWatched(String),
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn persistence(message: impl Into<String>) -> Self {
        Error::Persistence(message.into())
    }
}
