use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::gateway::PageBackend;
use super::types::{CreatePageInput, Page, PageSummary, StoreError, UpdatePageInput};
use crate::content::ContentTree;

/// In-process page store with the same contract as the hosted backend:
/// recency-ordered listing, case-insensitive title search, partial patches
/// and per-owner row scoping. Backs tests and offline demos.
pub struct InMemoryPageBackend {
    pages: RwLock<HashMap<String, Page>>,
}

impl InMemoryPageBackend {
    pub fn new() -> Self {
        InMemoryPageBackend {
            pages: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPageBackend {
    fn default() -> Self {
        InMemoryPageBackend::new()
    }
}

#[async_trait]
impl PageBackend for InMemoryPageBackend {
    async fn list(
        &self,
        owner_id: &str,
        title_filter: Option<&str>,
    ) -> Result<Vec<PageSummary>, StoreError> {
        let pages = self.pages.read().await;
        let needle = title_filter.map(|f| f.to_lowercase());

        let mut matches: Vec<&Page> = pages
            .values()
            .filter(|p| p.owner_id == owner_id)
            .filter(|p| match &needle {
                Some(needle) => p.title.to_lowercase().contains(needle),
                None => true,
            })
            .collect();

        matches.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        Ok(matches.into_iter().map(PageSummary::from).collect())
    }

    async fn get(&self, owner_id: &str, id: &str) -> Result<Page, StoreError> {
        let pages = self.pages.read().await;

        pages
            .get(id)
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, owner_id: &str, input: CreatePageInput) -> Result<Page, StoreError> {
        let mut pages = self.pages.write().await;
        let now = chrono::Utc::now().timestamp_millis();
        let id = uuid::Uuid::new_v4().to_string();

        let page = Page {
            id: id.clone(),
            title: input.title,
            content: input.content.unwrap_or_else(ContentTree::empty),
            created_at: now,
            updated_at: now,
            owner_id: owner_id.to_string(),
        };

        pages.insert(id, page.clone());
        Ok(page)
    }

    async fn update(
        &self,
        owner_id: &str,
        id: &str,
        input: UpdatePageInput,
    ) -> Result<Page, StoreError> {
        let mut pages = self.pages.write().await;

        let page = pages
            .get_mut(id)
            .filter(|p| p.owner_id == owner_id)
            .ok_or(StoreError::NotFound)?;

        // An empty patch is a plain read
        if input.is_empty() {
            return Ok(page.clone());
        }

        if let Some(title) = input.title {
            page.title = title;
        }
        if let Some(content) = input.content {
            page.content = content;
        }
        page.updated_at = chrono::Utc::now().timestamp_millis();

        Ok(page.clone())
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<(), StoreError> {
        let mut pages = self.pages.write().await;

        match pages.get(id) {
            Some(p) if p.owner_id == owner_id => {
                pages.remove(id);
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }
}
