//! The note record and the store-type tag attached to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies which store backend produced a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum StoreType {
    /// Per-note encrypted files with an encrypted index.
    SecureFile,
}

/// A single note.
///
/// The full form carries `content`; the metadata-only form (see
/// [`Note::metadata`]) drops it so the index can list notes without
/// touching their bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set by the store on read and list; never persisted.
    #[serde(skip)]
    pub store_type: Option<StoreType>,
}

impl Note {
    /// Creates a note with a fresh UUID v4 id and the current time.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: Some(content.into()),
            created_at: Utc::now(),
            store_type: None,
        }
    }

    /// Returns the metadata-only form of this note.
    #[must_use]
    pub fn metadata(&self) -> Self {
        Self {
            content: None,
            ..self.clone()
        }
    }

    /// Returns this note tagged with `store`.
    #[must_use]
    pub fn with_store_type(mut self, store: StoreType) -> Self {
        self.store_type = Some(store);
        self
    }
}

// The store tag describes where a note came from, not what it is.
impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.content == other.content
            && self.created_at == other.created_at
    }
}

impl Eq for Note {}
