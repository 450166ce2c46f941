//! Consistency checks run on a fetched relationship before anything else.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::relationship::Relationship;

/// Reject relationships where one tag holds two notes with the same title.
///
/// Later stages rely on at most one note per (tag, title).
pub fn preflight(relationship: &Relationship) -> Result<()> {
    for entry in relationship.tags() {
        let mut titles = HashSet::new();
        for note in &entry.notes {
            if !titles.insert(note.title()) {
                return Err(Error::DuplicateNoteTitle {
                    tag: entry.tag.title().to_string(),
                    title: note.title().to_string(),
                });
            }
        }
    }
    Ok(())
}
