//! dotsync-core: Reconciliation engine for dotfiles kept in a tag-organized note store.
//!
//! This crate provides the core functionality for:
//! - Mapping local paths to tags under the reserved `dotfiles` tag and back
//! - Assembling the tracked tag/note relationship from the store
//! - Diffing local files against remote notes and pushing or pulling changes
//! - Adding and removing tracked files, cleaning up emptied tags
//! - FileSystem and ItemStore trait abstractions

pub mod diff;
pub mod error;
pub mod fs;
pub mod item;
pub mod preflight;
pub mod reconcile;
pub mod relationship;
pub mod store;
pub mod tag_path;
pub mod tracking;

pub use diff::{ItemDiff, SyncStatus, compare_file_to_note, diff_all};
pub use error::{Error, Result, WriteFailure};
pub use fs::{FileEntry, FileStat, FileSystem, FsError, InMemoryFs};
pub use item::{ContentType, Item, ItemContent};
pub use preflight::preflight;
pub use reconcile::{SyncOutcome, pull, push, reconcile, status, sync};
pub use relationship::{Relationship, TagWithNotes, TrackedNote, fetch_relationship};
pub use store::{InMemoryStore, ItemStore, PutResult, StoreError};
pub use tag_path::{DOTFILES_TAG, TagPath, TagPathError, TrackedPath};
pub use tracking::{AddOutcome, RemoveOutcome, RemovedPath, WipeOutcome, add, dedupe, remove, wipe};
