use serde::{Deserialize, Serialize};

use crate::content::{ContentError, ContentTree};

/// A page stored in the remote document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub content: ContentTree,
    pub created_at: i64,
    pub updated_at: i64,
    pub owner_id: String,
}

/// List projection of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub id: String,
    pub title: String,
    pub updated_at: i64,
}

impl From<&Page> for PageSummary {
    fn from(page: &Page) -> Self {
        PageSummary {
            id: page.id.clone(),
            title: page.title.clone(),
            updated_at: page.updated_at,
        }
    }
}

/// Input for creating a new page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePageInput {
    pub title: String,
    /// Body for the new page; an empty document when absent
    pub content: Option<ContentTree>,
}

/// Partial patch for an existing page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePageInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentTree>,
}

impl UpdatePageInput {
    /// True when the patch carries no fields
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Errors surfaced by the document store and its callers.
///
/// `Clone` so a single result can be handed to every reader waiting on a
/// deduplicated fetch; transport details are carried as text, not as a
/// source chain, for the same reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Missing, or owned by someone else; the two are indistinguishable
    #[error("page not found")]
    NotFound,
    #[error("no user is signed in")]
    Unauthenticated,
    #[error("invalid page data: {0}")]
    Validation(String),
    #[error("document store request failed: {0}")]
    Transport(String),
}

impl From<ContentError> for StoreError {
    fn from(e: ContentError) -> Self {
        StoreError::Validation(e.to_string())
    }
}
