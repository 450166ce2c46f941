//! Items as held by the remote note store.
//!
//! A tag lists its member notes in `content.references`. Mutations are always
//! staged on copies (`with_text`, `with_reference`, `marked_deleted`) so a
//! fetched snapshot is never changed in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Note,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemContent {
    pub title: String,
    /// Note body; always empty for tags
    #[serde(default)]
    pub text: String,
    /// Notes belonging to a tag, in display order
    #[serde(default)]
    pub references: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub uuid: Uuid,
    pub content_type: ContentType,
    pub content: ItemContent,
    pub created_at: DateTime<Utc>,
    /// Stamped by the store on every accepted upsert
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
}

impl Item {
    fn new(content_type: ContentType, title: &str, text: String) -> Self {
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4(),
            content_type,
            content: ItemContent {
                title: title.to_string(),
                text,
                references: Vec::new(),
            },
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }

    pub fn new_note(title: &str, text: impl Into<String>) -> Self {
        Self::new(ContentType::Note, title, text.into())
    }

    pub fn new_tag(title: &str) -> Self {
        Self::new(ContentType::Tag, title, String::new())
    }

    pub fn title(&self) -> &str {
        &self.content.title
    }

    pub fn text(&self) -> &str {
        &self.content.text
    }

    pub fn references(&self) -> &[Uuid] {
        &self.content.references
    }

    pub fn is_note(&self) -> bool {
        self.content_type == ContentType::Note
    }

    pub fn is_tag(&self) -> bool {
        self.content_type == ContentType::Tag
    }

    /// Staged copy carrying new note text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        let mut staged = self.clone();
        staged.content.text = text.into();
        staged
    }

    /// Staged copy referencing `note` (no-op if already referenced).
    pub fn with_reference(&self, note: Uuid) -> Self {
        let mut staged = self.clone();
        if !staged.content.references.contains(&note) {
            staged.content.references.push(note);
        }
        staged
    }

    /// Staged copy flagged for deletion.
    pub fn marked_deleted(&self) -> Self {
        let mut staged = self.clone();
        staged.deleted = true;
        staged
    }
}
