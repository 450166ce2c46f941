//! Diff engine: compares tracked local files with their remote notes.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, FsError};
use crate::item::Item;
use crate::relationship::Relationship;
use crate::tag_path::home_relative;

/// How a local file relates to its remote note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Identical,
    /// Local content differs and was modified after the note; push
    LocalNewer,
    /// Content differs and the note is at least as recent; pull
    RemoteNewer,
    /// Note exists but the file does not; pull creates it
    LocalMissing,
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStatus::Identical => "identical",
            SyncStatus::LocalNewer => "local newer",
            SyncStatus::RemoteNewer => "remote newer",
            SyncStatus::LocalMissing => "local missing",
        })
    }
}

/// Comparison of one tracked file with its note. Built fresh per pass.
#[derive(Debug, Clone)]
pub struct ItemDiff {
    pub tag_title: String,
    pub note_title: String,
    pub local_path: PathBuf,
    /// e.g. `.config/fish/config.fish`
    pub home_rel_path: String,
    pub remote: Item,
    /// Local bytes, `None` when the file is missing
    pub local: Option<Vec<u8>>,
    pub status: SyncStatus,
}

/// Classify a local file against a remote note.
///
/// Ties on timestamp go to the remote side.
pub fn classify(
    local: Option<&[u8]>,
    local_mtime_millis: u64,
    remote_text: &str,
    remote_updated_at: DateTime<Utc>,
) -> SyncStatus {
    let Some(local) = local else {
        return SyncStatus::LocalMissing;
    };
    if local == remote_text.as_bytes() {
        return SyncStatus::Identical;
    }
    let remote_millis = remote_updated_at.timestamp_millis();
    if i128::from(local_mtime_millis) > i128::from(remote_millis) {
        SyncStatus::LocalNewer
    } else {
        SyncStatus::RemoteNewer
    }
}

/// Compare the file at `local_path` with `remote`.
pub async fn compare_file_to_note<F: FileSystem + ?Sized>(
    fs: &F,
    tag_title: &str,
    local_path: &Path,
    home: &Path,
    remote: &Item,
) -> Result<ItemDiff> {
    let rel = home_relative(local_path, home)?;

    let (local, mtime) = if fs.exists(&rel).await? {
        let stat = fs.stat(&rel).await?;
        if stat.is_dir {
            return Err(Error::Fs(FsError::IsDirectory(rel)));
        }
        (Some(fs.read(&rel).await?), stat.mtime_millis)
    } else {
        (None, 0)
    };

    let status = classify(local.as_deref(), mtime, remote.text(), remote.updated_at);
    debug!("{}: {}", rel, status);

    Ok(ItemDiff {
        tag_title: tag_title.to_string(),
        note_title: remote.title().to_string(),
        local_path: local_path.to_path_buf(),
        home_rel_path: rel,
        remote: remote.clone(),
        local,
        status,
    })
}

/// Diff every tracked note, or only those at or below `explicit_paths`.
///
/// Output follows tag order then note order.
pub async fn diff_all<F: FileSystem + ?Sized>(
    fs: &F,
    relationship: &Relationship,
    home: &Path,
    explicit_paths: &[PathBuf],
) -> Result<Vec<ItemDiff>> {
    if relationship.is_empty() {
        return Err(Error::NoRemoteDotfiles);
    }

    let targets: Vec<_> = relationship
        .tracked_notes()
        .map(|tracked| (tracked, tracked.tracked_path().local_path(home)))
        .filter(|(_, path)| {
            explicit_paths.is_empty() || explicit_paths.iter().any(|p| path.starts_with(p))
        })
        .collect();

    for explicit in explicit_paths {
        if !targets.iter().any(|(_, path)| path.starts_with(explicit)) {
            debug!("{} is not tracked", explicit.display());
        }
    }

    try_join_all(targets.iter().map(|(tracked, path)| {
        compare_file_to_note(fs, tracked.tag.tag.title(), path, home, tracked.note)
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use chrono::Duration;

    fn home() -> PathBuf {
        PathBuf::from("/home/jo")
    }

    #[test]
    fn test_classify_is_total() {
        let now = Utc::now();
        let now_ms = now.timestamp_millis() as u64;

        assert_eq!(classify(None, 0, "x", now), SyncStatus::LocalMissing);
        assert_eq!(classify(None, u64::MAX, "", now), SyncStatus::LocalMissing);
        assert_eq!(classify(Some(b"x"), 0, "x", now), SyncStatus::Identical);
        assert_eq!(
            classify(Some(b"x"), now_ms + 1, "y", now),
            SyncStatus::LocalNewer
        );
        assert_eq!(
            classify(Some(b"x"), now_ms - 1, "y", now),
            SyncStatus::RemoteNewer
        );
    }

    #[test]
    fn test_classify_tie_goes_to_remote() {
        let now = Utc::now();
        let now_ms = now.timestamp_millis() as u64;
        assert_eq!(classify(Some(b"x"), now_ms, "y", now), SyncStatus::RemoteNewer);
    }

    #[tokio::test]
    async fn test_compare_identical() {
        let fs = InMemoryFs::new();
        fs.write("apple", b"apple content").await.unwrap();
        let note = Item::new_note("apple", "apple content");
        let path = home().join("apple");

        let diff = compare_file_to_note(&fs, "dotfiles.fruit", &path, &home(), &note)
            .await
            .unwrap();

        assert_eq!(diff.status, SyncStatus::Identical);
        assert_eq!(diff.tag_title, "dotfiles.fruit");
        assert_eq!(diff.note_title, "apple");
        assert_eq!(diff.local_path, path);
        assert_eq!(diff.home_rel_path, "apple");
        assert_eq!(diff.remote, note);
    }

    #[tokio::test]
    async fn test_compare_remote_newer() {
        let fs = InMemoryFs::new();
        fs.write("lemon", b"lemon content").await.unwrap();
        let mut note = Item::new_note("lemon", "lemon content 2");
        note.updated_at = Utc::now() + Duration::hours(1);

        let diff = compare_file_to_note(&fs, "dotfiles", &home().join("lemon"), &home(), &note)
            .await
            .unwrap();

        assert_eq!(diff.status, SyncStatus::RemoteNewer);
        assert_eq!(diff.local.as_deref(), Some(&b"lemon content"[..]));
    }

    #[tokio::test]
    async fn test_compare_local_newer() {
        let fs = InMemoryFs::new();
        fs.write("lemon", b"lemon content").await.unwrap();
        let mut note = Item::new_note("lemon", "lemon content 2");
        note.updated_at = Utc::now() - Duration::hours(1);

        let diff = compare_file_to_note(&fs, "dotfiles", &home().join("lemon"), &home(), &note)
            .await
            .unwrap();

        assert_eq!(diff.status, SyncStatus::LocalNewer);
    }

    #[tokio::test]
    async fn test_compare_local_missing() {
        let fs = InMemoryFs::new();
        let note = Item::new_note("grape", "grape content");

        let diff = compare_file_to_note(&fs, "dotfiles", &home().join("grape"), &home(), &note)
            .await
            .unwrap();

        assert_eq!(diff.status, SyncStatus::LocalMissing);
        assert!(diff.local.is_none());
    }

    #[tokio::test]
    async fn test_compare_directory_is_an_error() {
        let fs = InMemoryFs::new();
        fs.write("grape/seed", b"").await.unwrap();
        let note = Item::new_note("grape", "grape content");

        let err = compare_file_to_note(&fs, "dotfiles", &home().join("grape"), &home(), &note)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fs(FsError::IsDirectory(_))));
    }

    #[tokio::test]
    async fn test_diff_all_requires_remote_dotfiles() {
        let fs = InMemoryFs::new();
        let err = diff_all(&fs, &Relationship::default(), &home(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoRemoteDotfiles));
    }

    #[tokio::test]
    async fn test_diff_all_is_ordered_and_filterable() {
        let fs = InMemoryFs::new();
        fs.write(".bashrc", b"alias ll='ls -l'").await.unwrap();
        fs.write("fruit/apple", b"apple content").await.unwrap();

        let bashrc = Item::new_note(".bashrc", "alias ll='ls -l'");
        let apple = Item::new_note("apple", "apple content");
        let lemon = Item::new_note("lemon", "lemon content");
        let relationship = Relationship::from_items(vec![
            Item::new_tag("dotfiles.fruit")
                .with_reference(apple.uuid)
                .with_reference(lemon.uuid),
            Item::new_tag("dotfiles").with_reference(bashrc.uuid),
            bashrc,
            apple,
            lemon,
        ]);

        let diffs = diff_all(&fs, &relationship, &home(), &[]).await.unwrap();
        let summary: Vec<(&str, SyncStatus)> = diffs
            .iter()
            .map(|d| (d.home_rel_path.as_str(), d.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                (".bashrc", SyncStatus::Identical),
                ("fruit/apple", SyncStatus::Identical),
                ("fruit/lemon", SyncStatus::LocalMissing),
            ]
        );

        let only_fruit = diff_all(&fs, &relationship, &home(), &[home().join("fruit")])
            .await
            .unwrap();
        assert_eq!(only_fruit.len(), 2);

        let only_lemon = diff_all(&fs, &relationship, &home(), &[home().join("fruit/lemon")])
            .await
            .unwrap();
        assert_eq!(only_lemon.len(), 1);
        assert_eq!(only_lemon[0].note_title, "lemon");
    }
}
