//! Errors surfaced by sync and tracking operations.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::fs::FsError;
use crate::store::StoreError;
use crate::tag_path::TagPathError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    InvalidPath(TagPathError),

    #[error("failed to fetch items: {0}")]
    RemoteFetch(#[source] StoreError),

    #[error("duplicate note title {title:?} under tag {tag:?}")]
    DuplicateNoteTitle { tag: String, title: String },

    #[error("no remote dotfiles found")]
    NoRemoteDotfiles,

    #[error("paths not found: {}", display_paths(.0))]
    PathNotFound(Vec<PathBuf>),

    #[error("no items to push")]
    NoItemsToPush,

    #[error("failed to push items: {0}")]
    RemotePush(#[source] StoreError),

    /// Some pulls failed. Counts cover the work that did land.
    #[error("failed to write: {} (pushed {pushed}, pulled {pulled})", display_failures(.failures))]
    LocalWrite {
        failures: Vec<WriteFailure>,
        pushed: usize,
        pulled: usize,
    },

    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<TagPathError> for Error {
    fn from(e: TagPathError) -> Self {
        match e {
            TagPathError::Configuration(msg) => Error::Configuration(msg.to_string()),
            other => Error::InvalidPath(other),
        }
    }
}

/// One local write that failed during a pull.
#[derive(Debug)]
pub struct WriteFailure {
    pub path: PathBuf,
    pub error: FsError,
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.error)
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_failures(failures: &[WriteFailure]) -> String {
    failures
        .iter()
        .map(WriteFailure::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_not_found_names_every_path() {
        let err = Error::PathNotFound(vec![PathBuf::from("/h/.a"), PathBuf::from("/h/.b")]);
        assert_eq!(err.to_string(), "paths not found: /h/.a, /h/.b");
    }

    #[test]
    fn test_configuration_maps_from_tag_path_error() {
        let err: Error = TagPathError::Configuration("tag title required").into();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("tag title required"));
    }
}
