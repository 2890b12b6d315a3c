use serde::{Deserialize, Serialize};

use crate::content::ContentTree;
use crate::pages::UpdatePageInput;

/// User-visible persistence state of an open page. Exactly one holds at any
/// instant; only the sync engine moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveState {
    /// Everything the user typed has been confirmed by the store
    Saved,
    /// Unsaved edits exist or a write is underway
    Saving,
    /// The last write failed; edits are kept locally
    Error,
}

/// A single local edit routed to the sync engine. Content changes are whole
/// tree replacements; the editor has no delta contract.
#[derive(Debug, Clone)]
pub enum Edit {
    Title(String),
    Content(ContentTree),
}

/// Fields changed locally since the last confirmed save
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageDraft {
    pub title: Option<String>,
    pub content: Option<ContentTree>,
}

impl PageDraft {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }

    /// Fold a local edit into the unsaved field set
    pub fn apply(&mut self, edit: Edit) {
        match edit {
            Edit::Title(title) => self.title = Some(title),
            Edit::Content(content) => self.content = Some(content),
        }
    }

    /// Patch carrying exactly the unsaved fields
    pub fn to_update(&self) -> UpdatePageInput {
        UpdatePageInput {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }

    /// Drop the fields a successful write confirmed, keeping any the user
    /// changed again while that write was in flight.
    pub fn confirm(&mut self, sent: &PageDraft) {
        if self.title == sent.title {
            self.title = None;
        }
        if self.content == sent.content {
            self.content = None;
        }
    }
}
