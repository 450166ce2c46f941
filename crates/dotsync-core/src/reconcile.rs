//! Reconciler: applies classified diffs by pushing to the store or pulling to disk.

use futures::future::join_all;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::diff::{diff_all, ItemDiff, SyncStatus};
use crate::error::{Error, Result, WriteFailure};
use crate::fs::{FileSystem, FsError};
use crate::item::Item;
use crate::preflight::preflight;
use crate::relationship::fetch_relationship;
use crate::store::{ItemStore, PutResult};

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Every comparison made, in report order
    pub diffs: Vec<ItemDiff>,
    pub pushed: usize,
    pub pulled: usize,
}

impl SyncOutcome {
    pub fn nothing_to_do(&self) -> bool {
        self.pushed == 0 && self.pulled == 0
    }
}

/// Upload local content for `diffs` in one batch.
pub async fn push<S: ItemStore + ?Sized>(store: &S, diffs: &[ItemDiff]) -> Result<PutResult> {
    if diffs.is_empty() {
        return Err(Error::NoItemsToPush);
    }

    // A note shared by two tags has one diff per path; stage it once
    let mut staged: Vec<Item> = Vec::with_capacity(diffs.len());
    for diff in diffs {
        let bytes = diff
            .local
            .as_deref()
            .ok_or_else(|| FsError::NotFound(diff.home_rel_path.clone()))?;
        let text = std::str::from_utf8(bytes)
            .map_err(|_| FsError::NotText(diff.home_rel_path.clone()))?;

        match staged.iter().find(|item| item.uuid == diff.remote.uuid) {
            Some(first) if first.text() != text => warn!(
                "{} shares note {} with another file; pushing the first copy only",
                diff.home_rel_path, diff.remote.uuid
            ),
            Some(_) => {}
            None => staged.push(diff.remote.with_text(text)),
        }
    }

    info!("Pushing {} items", staged.len());
    store.put_items(staged).await.map_err(Error::RemotePush)
}

/// Write remote content for `diffs` to disk.
///
/// Every write is attempted; failures are reported together and successful
/// writes are kept.
pub async fn pull<F: FileSystem + ?Sized>(fs: &F, diffs: &[ItemDiff]) -> Result<usize> {
    let writes = diffs.iter().map(|diff| async move {
        debug!("Writing {}", diff.home_rel_path);
        fs.write(&diff.home_rel_path, diff.remote.text().as_bytes())
            .await
            .map_err(|error| WriteFailure {
                path: diff.local_path.clone(),
                error,
            })
    });

    let failures: Vec<WriteFailure> = join_all(writes)
        .await
        .into_iter()
        .filter_map(|r| r.err())
        .collect();

    if !failures.is_empty() {
        for failure in &failures {
            warn!("Failed to write {}", failure);
        }
        return Err(Error::LocalWrite {
            pushed: 0,
            pulled: diffs.len() - failures.len(),
            failures,
        });
    }
    Ok(diffs.len())
}

/// Partition `diffs` and apply them. Push runs first so a failed upload
/// leaves the local side untouched.
///
/// A failed pull still reports how many items were pushed and pulled.
pub async fn reconcile<S, F>(store: &S, fs: &F, diffs: Vec<ItemDiff>) -> Result<SyncOutcome>
where
    S: ItemStore + ?Sized,
    F: FileSystem + ?Sized,
{
    let (to_push, to_pull): (Vec<ItemDiff>, Vec<ItemDiff>) = diffs
        .iter()
        .filter(|d| d.status != SyncStatus::Identical)
        .cloned()
        .partition(|d| d.status == SyncStatus::LocalNewer);

    if to_push.is_empty() && to_pull.is_empty() {
        info!("Nothing to do");
        return Ok(SyncOutcome {
            diffs,
            pushed: 0,
            pulled: 0,
        });
    }

    let pushed = if to_push.is_empty() {
        0
    } else {
        push(store, &to_push).await?.saved.len()
    };
    let pulled = if to_pull.is_empty() {
        0
    } else {
        match pull(fs, &to_pull).await {
            Ok(pulled) => pulled,
            Err(Error::LocalWrite {
                failures, pulled, ..
            }) => {
                return Err(Error::LocalWrite {
                    failures,
                    pushed,
                    pulled,
                });
            }
            Err(e) => return Err(e),
        }
    };

    info!("Pushed {}, pulled {}", pushed, pulled);
    Ok(SyncOutcome {
        diffs,
        pushed,
        pulled,
    })
}

/// Compare tracked files with the store without changing either side.
pub async fn status<S, F>(store: &S, fs: &F, home: &Path, paths: &[PathBuf]) -> Result<Vec<ItemDiff>>
where
    S: ItemStore + ?Sized,
    F: FileSystem + ?Sized,
{
    let relationship = fetch_relationship(store).await?;
    preflight(&relationship)?;
    diff_all(fs, &relationship, home, paths).await
}

/// One full pass: fetch, check, diff, then push and pull.
pub async fn sync<S, F>(store: &S, fs: &F, home: &Path, paths: &[PathBuf]) -> Result<SyncOutcome>
where
    S: ItemStore + ?Sized,
    F: FileSystem + ?Sized,
{
    let diffs = status(store, fs, home, paths).await?;
    reconcile(store, fs, diffs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use crate::store::InMemoryStore;
    use chrono::{Duration, Utc};

    fn home() -> PathBuf {
        PathBuf::from("/home/jo")
    }

    fn fruit(notes: &[&Item]) -> Vec<Item> {
        let tag = notes
            .iter()
            .fold(Item::new_tag("dotfiles.fruit"), |t, n| t.with_reference(n.uuid));
        let mut items = vec![tag];
        items.extend(notes.iter().map(|n| (*n).clone()));
        items
    }

    fn diff_for(note: &Item, rel: &str, local: Option<&[u8]>, status: SyncStatus) -> ItemDiff {
        ItemDiff {
            tag_title: "dotfiles".into(),
            note_title: note.title().to_string(),
            local_path: home().join(rel),
            home_rel_path: rel.to_string(),
            remote: note.clone(),
            local: local.map(<[u8]>::to_vec),
            status,
        }
    }

    #[tokio::test]
    async fn test_push_requires_items() {
        let store = InMemoryStore::new();
        let err = push(&store, &[]).await.unwrap_err();
        assert!(matches!(err, Error::NoItemsToPush));
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_push_rejects_binary_content() {
        let store = InMemoryStore::new();
        let note = Item::new_note("blob", "");
        let diff = diff_for(&note, "blob", Some(&[0xff, 0xfe]), SyncStatus::LocalNewer);

        let err = push(&store, &[diff]).await.unwrap_err();
        assert!(matches!(err, Error::Fs(FsError::NotText(_))));
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_sync_pulls_remote_newer() {
        let fs = InMemoryFs::new();
        fs.write("fruit/lemon", b"lemon content").await.unwrap();
        let mut lemon = Item::new_note("lemon", "lemon content 2");
        lemon.updated_at = Utc::now() + Duration::hours(1);
        let store = InMemoryStore::with_items(fruit(&[&lemon]));

        let outcome = sync(&store, &fs, &home(), &[]).await.unwrap();

        assert_eq!(outcome.pulled, 1);
        assert_eq!(outcome.pushed, 0);
        assert_eq!(outcome.diffs[0].status, SyncStatus::RemoteNewer);
        assert_eq!(fs.read_string("fruit/lemon").as_deref(), Some("lemon content 2"));
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_sync_creates_missing_files() {
        let fs = InMemoryFs::new();
        let apple = Item::new_note("apple", "apple content");
        let store = InMemoryStore::with_items(fruit(&[&apple]));

        let outcome = sync(&store, &fs, &home(), &[]).await.unwrap();

        assert_eq!(outcome.pulled, 1);
        assert_eq!(fs.read_string("fruit/apple").as_deref(), Some("apple content"));
    }

    #[tokio::test]
    async fn test_sync_pushes_local_newer() {
        let fs = InMemoryFs::new();
        fs.write("fruit/lemon", b"fresh lemon").await.unwrap();
        let mut lemon = Item::new_note("lemon", "stale lemon");
        lemon.updated_at = Utc::now() - Duration::hours(1);
        let store = InMemoryStore::with_items(fruit(&[&lemon]));

        let outcome = sync(&store, &fs, &home(), &[]).await.unwrap();

        assert_eq!(outcome.pushed, 1);
        assert_eq!(store.put_calls(), 1);
        let saved = store
            .items()
            .into_iter()
            .find(|i| i.uuid == lemon.uuid)
            .unwrap();
        assert_eq!(saved.text(), "fresh lemon");
        assert!(saved.updated_at > lemon.updated_at);
    }

    #[tokio::test]
    async fn test_sync_identical_is_nothing_to_do() {
        let fs = InMemoryFs::new();
        fs.write("fruit/apple", b"apple content").await.unwrap();
        let apple = Item::new_note("apple", "apple content");
        let store = InMemoryStore::with_items(fruit(&[&apple]));

        let outcome = sync(&store, &fs, &home(), &[]).await.unwrap();

        assert!(outcome.nothing_to_do());
        assert_eq!(outcome.diffs.len(), 1);
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_sync_without_remote_dotfiles() {
        let fs = InMemoryFs::new();
        let store = InMemoryStore::with_items(vec![Item::new_note("recipe", "flour")]);

        let err = sync(&store, &fs, &home(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::NoRemoteDotfiles));
    }

    #[tokio::test]
    async fn test_duplicate_titles_abort_before_writes() {
        let fs = InMemoryFs::new();
        let first = Item::new_note("apple", "one");
        let second = Item::new_note("apple", "two");
        let store = InMemoryStore::with_items(fruit(&[&first, &second]));

        let err = sync(&store, &fs, &home(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateNoteTitle { .. }));
        assert!(!fs.exists("fruit/apple").await.unwrap());
    }

    #[tokio::test]
    async fn test_push_failure_skips_pull() {
        let fs = InMemoryFs::new();
        fs.write("fruit/lemon", b"fresh lemon").await.unwrap();
        let mut lemon = Item::new_note("lemon", "stale lemon");
        lemon.updated_at = Utc::now() - Duration::hours(1);
        let apple = Item::new_note("apple", "apple content");
        let store = InMemoryStore::with_items(fruit(&[&lemon, &apple]));
        store.fail_puts(true);

        let err = sync(&store, &fs, &home(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::RemotePush(_)));
        assert!(!fs.exists("fruit/apple").await.unwrap());
    }

    #[tokio::test]
    async fn test_pull_reports_every_failure_and_keeps_successes() {
        let fs = InMemoryFs::new();
        fs.deny_writes("a");
        fs.deny_writes("c");
        let diffs: Vec<ItemDiff> = ["a", "b", "c"]
            .iter()
            .map(|name| {
                let note = Item::new_note(name, format!("{name} content"));
                diff_for(&note, name, None, SyncStatus::LocalMissing)
            })
            .collect();

        let err = pull(&fs, &diffs).await.unwrap_err();
        match err {
            Error::LocalWrite {
                failures,
                pushed,
                pulled,
            } => {
                let paths: Vec<PathBuf> = failures.into_iter().map(|f| f.path).collect();
                assert_eq!(paths, vec![home().join("a"), home().join("c")]);
                assert_eq!((pushed, pulled), (0, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs.read_string("b").as_deref(), Some("b content"));
    }

    #[tokio::test]
    async fn test_failed_pull_keeps_push_count() {
        let fs = InMemoryFs::new();
        fs.write("fruit/lemon", b"fresh lemon").await.unwrap();
        let mut lemon = Item::new_note("lemon", "stale lemon");
        lemon.updated_at = Utc::now() - Duration::hours(1);
        let apple = Item::new_note("apple", "apple content");
        let store = InMemoryStore::with_items(fruit(&[&lemon, &apple]));
        fs.deny_writes("fruit/apple");

        let err = sync(&store, &fs, &home(), &[]).await.unwrap_err();

        match err {
            Error::LocalWrite {
                failures,
                pushed,
                pulled,
            } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].path, home().join("fruit/apple"));
                assert_eq!((pushed, pulled), (1, 0));
            }
            other => panic!("unexpected error: {other}"),
        }
        let saved = store
            .items()
            .into_iter()
            .find(|i| i.uuid == lemon.uuid)
            .unwrap();
        assert_eq!(saved.text(), "fresh lemon");
    }

    #[tokio::test]
    async fn test_push_stages_shared_note_once() {
        let store = InMemoryStore::new();
        let shared = Item::new_note("config", "old");
        let diffs = vec![
            diff_for(&shared, "a/config", Some(b"from a"), SyncStatus::LocalNewer),
            diff_for(&shared, "b/config", Some(b"from b"), SyncStatus::LocalNewer),
        ];

        let result = push(&store, &diffs).await.unwrap();

        assert_eq!(result.saved.len(), 1);
        assert_eq!(result.saved[0].text(), "from a");
        assert_eq!(store.items().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_restricted_to_explicit_paths() {
        let fs = InMemoryFs::new();
        let apple = Item::new_note("apple", "apple content");
        let bashrc = Item::new_note(".bashrc", "set -o vi");
        let mut items = fruit(&[&apple]);
        items.push(Item::new_tag("dotfiles").with_reference(bashrc.uuid));
        items.push(bashrc);
        let store = InMemoryStore::with_items(items);

        let outcome = sync(&store, &fs, &home(), &[home().join(".bashrc")])
            .await
            .unwrap();

        assert_eq!(outcome.pulled, 1);
        assert!(fs.exists(".bashrc").await.unwrap());
        assert!(!fs.exists("fruit/apple").await.unwrap());
    }
}
