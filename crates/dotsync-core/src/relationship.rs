//! The tracked relationship: tags under the root tag and their member notes.
//!
//! Built once per invocation from a single `fetch_all` and treated as a
//! read-only snapshot afterwards. Tags are held in title order; each tag keeps
//! its notes in reference order. A side index maps note uuids to the tags that
//! reference them.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::item::Item;
use crate::store::ItemStore;
use crate::tag_path::{TagPath, TrackedPath};

/// One tag and the notes that belong to it.
#[derive(Debug, Clone)]
pub struct TagWithNotes {
    pub tag: Item,
    pub path: TagPath,
    pub notes: Vec<Item>,
}

/// A tracked note located on disk.
#[derive(Debug, Clone, Copy)]
pub struct TrackedNote<'a> {
    pub tag: &'a TagWithNotes,
    pub note: &'a Item,
}

impl TrackedNote<'_> {
    pub fn tracked_path(&self) -> TrackedPath {
        // Note titles were validated when the relationship was built
        TrackedPath::from_validated(self.tag.path.clone(), self.note.title())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Relationship {
    tags: Vec<TagWithNotes>,
    /// note uuid -> positions in `tags`
    note_tags: HashMap<Uuid, Vec<usize>>,
}

impl Relationship {
    /// Assemble the relationship from a full item listing.
    pub fn from_items(items: Vec<Item>) -> Self {
        let live: Vec<Item> = items.into_iter().filter(|i| !i.deleted).collect();

        let notes: HashMap<Uuid, &Item> = live
            .iter()
            .filter(|i| i.is_note())
            .map(|i| (i.uuid, i))
            .collect();

        let mut tags: Vec<TagWithNotes> = Vec::new();
        let mut seen_titles = HashSet::new();

        let mut candidates: Vec<&Item> = live
            .iter()
            .filter(|i| i.is_tag() && TagPath::is_tracked_title(i.title()))
            .collect();
        candidates.sort_by(|a, b| a.title().cmp(b.title()).then(a.created_at.cmp(&b.created_at)));

        for tag in candidates {
            let path: TagPath = match tag.title().parse() {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping tag {}: {}", tag.title(), e);
                    continue;
                }
            };
            if !seen_titles.insert(tag.title().to_string()) {
                warn!("Skipping duplicate tag {} ({})", tag.title(), tag.uuid);
                continue;
            }

            let mut members = Vec::new();
            for reference in tag.references() {
                let Some(note) = notes.get(reference) else {
                    continue;
                };
                if TrackedPath::new(path.clone(), note.title()).is_err() {
                    warn!(
                        "Skipping note {:?} under {}: title is not a file name",
                        note.title(),
                        tag.title()
                    );
                    continue;
                }
                members.push((*note).clone());
            }

            tags.push(TagWithNotes {
                tag: tag.clone(),
                path,
                notes: members,
            });
        }

        let mut note_tags: HashMap<Uuid, Vec<usize>> = HashMap::new();
        for (index, entry) in tags.iter().enumerate() {
            for note in &entry.notes {
                note_tags.entry(note.uuid).or_default().push(index);
            }
        }

        Self { tags, note_tags }
    }

    /// True when no tag exists under the root.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[TagWithNotes] {
        &self.tags
    }

    pub fn find_tag(&self, path: &TagPath) -> Option<&TagWithNotes> {
        self.tags.iter().find(|t| &t.path == path)
    }

    /// Tags referencing the given note.
    pub fn tags_of(&self, note: Uuid) -> impl Iterator<Item = &TagWithNotes> {
        self.note_tags
            .get(&note)
            .into_iter()
            .flatten()
            .map(|&index| &self.tags[index])
    }

    /// Every tracked note, in tag order then note order.
    pub fn tracked_notes(&self) -> impl Iterator<Item = TrackedNote<'_>> {
        self.tags
            .iter()
            .flat_map(|tag| tag.notes.iter().map(move |note| TrackedNote { tag, note }))
    }

    /// Notes whose local path is `path`, or lies below it.
    pub fn notes_at<'a>(&'a self, path: &Path, home: &Path) -> Vec<TrackedNote<'a>> {
        self.tracked_notes()
            .filter(|tracked| tracked.tracked_path().local_path(home).starts_with(path))
            .collect()
    }

    /// Whether a note for `tracked` already exists.
    pub fn contains(&self, tracked: &TrackedPath) -> bool {
        self.find_tag(tracked.tag())
            .is_some_and(|t| t.notes.iter().any(|n| n.title() == tracked.note_title()))
    }
}

/// Fetch every item and assemble the tracked relationship.
pub async fn fetch_relationship<S: ItemStore + ?Sized>(store: &S) -> Result<Relationship> {
    let items = store.fetch_all().await.map_err(Error::RemoteFetch)?;
    let fetched = items.len();
    let relationship = Relationship::from_items(items);
    debug!(
        "Fetched {} items: {} tracked tags, {} tracked notes",
        fetched,
        relationship.tags().len(),
        relationship.note_tags.len()
    );
    Ok(relationship)
}
