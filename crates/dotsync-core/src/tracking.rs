//! Tracking lifecycle: start or stop tracking local files.
//!
//! Both directions validate every requested path before touching the store and
//! submit their changes as a single batch. Removing the last note below a tag
//! deletes the tag as well.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::fs::{walk_files, FileSystem, FsError};
use crate::item::Item;
use crate::preflight::preflight;
use crate::relationship::fetch_relationship;
use crate::store::ItemStore;
use crate::tag_path::{home_relative, TagPath, TagPathError, TrackedPath};

/// Drop repeated entries, keeping the first occurrence of each.
pub fn dedupe<T: Eq + Hash + Clone>(xs: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(xs.len());
    xs.iter().filter(|x| seen.insert(*x)).cloned().collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// Home-relative paths of newly tracked files
    pub added: Vec<String>,
    pub already_tracked: Vec<String>,
    pub tags_created: usize,
}

/// Per-path result of a removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedPath {
    pub path: String,
    /// Notes matched at or below this path
    pub matches: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub results: Vec<RemovedPath>,
    pub notes_removed: usize,
    pub tags_removed: usize,
    pub not_tracked: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WipeOutcome {
    pub notes: usize,
    pub tags: usize,
}

/// Resolve requested paths to home-relative form and check they all exist.
///
/// Fails before any store access, naming every missing path at once.
async fn resolve_existing<F: FileSystem + ?Sized>(
    fs: &F,
    home: &Path,
    paths: &[PathBuf],
) -> Result<Vec<(PathBuf, String)>> {
    let mut resolved = Vec::with_capacity(paths.len());
    let mut missing = Vec::new();
    for path in dedupe(paths) {
        let rel = home_relative(&path, home)?;
        if fs.exists(&rel).await? {
            resolved.push((path, rel));
        } else {
            missing.push(path);
        }
    }
    if !missing.is_empty() {
        return Err(Error::PathNotFound(missing));
    }
    Ok(resolved)
}

/// Home itself maps to the root tag and is never a valid target.
fn reject_home(resolved: &[(PathBuf, String)]) -> Result<()> {
    match resolved.iter().find(|(_, rel)| rel.is_empty()) {
        Some((path, _)) => Err(Error::InvalidPath(TagPathError::InvalidSegment {
            segment: path.display().to_string(),
            reason: "home directory cannot be tracked",
        })),
        None => Ok(()),
    }
}

/// Start tracking `paths`. Directories add every regular file below them.
pub async fn add<S, F>(store: &S, fs: &F, home: &Path, paths: &[PathBuf]) -> Result<AddOutcome>
where
    S: ItemStore + ?Sized,
    F: FileSystem + ?Sized,
{
    let resolved = resolve_existing(fs, home, paths).await?;
    reject_home(&resolved)?;

    let mut files = Vec::new();
    for (_, rel) in &resolved {
        files.extend(walk_files(fs, rel).await?);
    }
    let files = dedupe(&files);

    let relationship = fetch_relationship(store).await?;
    preflight(&relationship)?;

    let mut outcome = AddOutcome::default();
    // Tags to submit: new ones and existing ones gaining references
    let mut staged_tags: BTreeMap<TagPath, Item> = BTreeMap::new();
    let mut staged_notes = Vec::new();

    for rel in files {
        let tracked = TrackedPath::from_local(&home.join(&rel), home)?;
        if relationship.contains(&tracked) {
            debug!("{} is already tracked", rel);
            outcome.already_tracked.push(rel);
            continue;
        }

        let bytes = fs.read(&rel).await?;
        let text = String::from_utf8(bytes).map_err(|_| FsError::NotText(rel.clone()))?;
        let note = Item::new_note(tracked.note_title(), text);

        for tag in tracked.tag().chain() {
            if staged_tags.contains_key(&tag) || relationship.find_tag(&tag).is_some() {
                continue;
            }
            debug!("Creating tag {}", tag.title());
            staged_tags.insert(tag.clone(), Item::new_tag(&tag.title()));
            outcome.tags_created += 1;
        }

        let owner = staged_tags.entry(tracked.tag().clone()).or_insert_with(|| {
            relationship
                .find_tag(tracked.tag())
                .map(|existing| existing.tag.clone())
                .unwrap_or_else(|| Item::new_tag(&tracked.tag().title()))
        });
        *owner = owner.with_reference(note.uuid);

        staged_notes.push(note);
        outcome.added.push(rel);
    }

    if staged_notes.is_empty() {
        info!("Nothing to add");
        return Ok(outcome);
    }

    let mut batch = staged_notes;
    batch.extend(staged_tags.into_values());
    store.put_items(batch).await.map_err(Error::RemotePush)?;

    info!(
        "Added {} files, created {} tags",
        outcome.added.len(),
        outcome.tags_created
    );
    Ok(outcome)
}

/// Stop tracking `paths`, deleting their notes and any tag left empty.
pub async fn remove<S, F>(store: &S, fs: &F, home: &Path, paths: &[PathBuf]) -> Result<RemoveOutcome>
where
    S: ItemStore + ?Sized,
    F: FileSystem + ?Sized,
{
    let resolved = resolve_existing(fs, home, paths).await?;
    reject_home(&resolved)?;

    let relationship = fetch_relationship(store).await?;
    preflight(&relationship)?;

    let mut outcome = RemoveOutcome::default();
    let mut removed: HashSet<Uuid> = HashSet::new();
    let mut staged = Vec::new();

    for (path, rel) in &resolved {
        let matches = relationship.notes_at(path, home);
        if matches.is_empty() {
            debug!("{} is not tracked", rel);
            outcome.not_tracked += 1;
        }
        for tracked in &matches {
            if removed.insert(tracked.note.uuid) {
                staged.push(tracked.note.marked_deleted());
            }
        }
        outcome.results.push(RemovedPath {
            path: rel.clone(),
            matches: matches.len(),
        });
    }
    outcome.notes_removed = staged.len();

    // A tag goes once nothing is left in it or in any tag below it
    for entry in relationship.tags() {
        let mut subtree = relationship
            .tags()
            .iter()
            .filter(|t| entry.path.contains(&t.path))
            .flat_map(|t| t.notes.iter())
            .peekable();
        let emptied = subtree.peek().is_some() && subtree.all(|n| removed.contains(&n.uuid));
        if emptied {
            debug!("Removing empty tag {}", entry.tag.title());
            staged.push(entry.tag.marked_deleted());
            outcome.tags_removed += 1;
        }
    }

    if staged.is_empty() {
        info!("Nothing to remove");
        return Ok(outcome);
    }

    store.put_items(staged).await.map_err(Error::RemotePush)?;
    info!(
        "Removed {} notes and {} tags",
        outcome.notes_removed, outcome.tags_removed
    );
    Ok(outcome)
}

/// Delete every tracked note and tag.
pub async fn wipe<S: ItemStore + ?Sized>(store: &S) -> Result<WipeOutcome> {
    let relationship = fetch_relationship(store).await?;

    let mut seen = HashSet::new();
    let mut staged: Vec<Item> = relationship
        .tracked_notes()
        .filter(|t| seen.insert(t.note.uuid))
        .map(|t| t.note.marked_deleted())
        .collect();
    let outcome = WipeOutcome {
        notes: staged.len(),
        tags: relationship.tags().len(),
    };
    staged.extend(relationship.tags().iter().map(|t| t.tag.marked_deleted()));

    if staged.is_empty() {
        info!("Nothing to wipe");
        return Ok(outcome);
    }

    store.put_items(staged).await.map_err(Error::RemotePush)?;
    info!("Wiped {} notes and {} tags", outcome.notes, outcome.tags);
    Ok(outcome)
}
