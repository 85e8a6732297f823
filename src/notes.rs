//! Study notes, persisted as one collection.

use crate::persistence::{self, keys, Store, StoreError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_important: bool,
    /// Milliseconds since the Unix epoch.
    pub updated_at: i64,
}

impl Note {
    /// Plain-text rendering used for single-note export.
    pub fn to_txt(&self) -> String {
        format!(
            "{}\n\n{}\n\nTags: {}",
            self.title,
            self.content,
            self.tags.join(", ")
        )
    }

    /// Export file name: the title with each run of whitespace replaced by
    /// `_`, plus `.txt`.
    pub fn txt_file_name(&self) -> String {
        let mut name = String::with_capacity(self.title.len() + 4);
        let mut in_space = false;
        for c in self.title.chars() {
            if c.is_whitespace() {
                if !in_space {
                    name.push('_');
                }
                in_space = true;
            } else {
                name.push(c);
                in_space = false;
            }
        }
        name.push_str(".txt");
        name
    }

    fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.content.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

/// Fields supplied when creating a note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_important: bool,
}

impl NoteDraft {
    /// True when both title and content are empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }
}

/// Partial note update; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_important: Option<bool>,
}

/// Notes, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Notebook {
    notes: Vec<Note>,
}

impl Notebook {
    pub fn load(store: &dyn Store) -> Self {
        persistence::load_or(store, keys::NOTES, Self::default)
    }

    pub fn save(&self, store: &dyn Store) -> Result<(), StoreError> {
        persistence::save(store, keys::NOTES, self)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Creates a note at the top of the list and returns it. Blank drafts
    /// are rejected with `None`.
    pub fn add(&mut self, draft: NoteDraft) -> Option<&Note> {
        if draft.is_blank() {
            return None;
        }
        let note = Note {
            id: Uuid::new_v4().simple().to_string(),
            title: draft.title,
            content: draft.content,
            tags: draft.tags,
            is_important: draft.is_important,
            updated_at: Utc::now().timestamp_millis(),
        };
        self.notes.insert(0, note);
        self.notes.first()
    }

    /// Applies `update` to the note with `id`. Returns false if there is none.
    pub fn update(&mut self, id: &str, update: NoteUpdate) -> bool {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if let Some(title) = update.title {
            note.title = title;
        }
        if let Some(content) = update.content {
            note.content = content;
        }
        if let Some(tags) = update.tags {
            note.tags = tags;
        }
        if let Some(is_important) = update.is_important {
            note.is_important = is_important;
        }
        note.updated_at = Utc::now().timestamp_millis();
        true
    }

    /// Flips the important flag of the note with `id`, returning its new value.
    pub fn toggle_important(&mut self, id: &str) -> Option<bool> {
        let important = !self.get(id)?.is_important;
        self.update(
            id,
            NoteUpdate {
                is_important: Some(important),
                ..NoteUpdate::default()
            },
        );
        Some(important)
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        self.notes.len() != before
    }

    /// Case-insensitive match on title, content or any tag. An empty query
    /// matches everything.
    pub fn search(&self, query: &str) -> Vec<&Note> {
        let needle = query.trim().to_lowercase();
        self.notes.iter().filter(|n| n.matches(&needle)).collect()
    }
}
