use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::types::{CreatePageInput, Page, PageSummary, StoreError, UpdatePageInput};
use crate::auth::IdentityProvider;
use crate::content::validate_title;

/// Store-level access to pages, scoped to an owner on every call.
///
/// Implementations must treat rows belonging to another owner as if they do
/// not exist: `get`, `update` and `delete` on a foreign id return
/// [`StoreError::NotFound`], never a permission error. No operation retries
/// internally; retry policy belongs to the caller.
#[async_trait]
pub trait PageBackend: Send + Sync {
    /// Pages for `owner_id`, most recently updated first. `title_filter` is a
    /// case-insensitive substring match against the title.
    async fn list(
        &self,
        owner_id: &str,
        title_filter: Option<&str>,
    ) -> Result<Vec<PageSummary>, StoreError>;

    async fn get(&self, owner_id: &str, id: &str) -> Result<Page, StoreError>;

    async fn create(&self, owner_id: &str, input: CreatePageInput) -> Result<Page, StoreError>;

    /// Apply a partial patch and refresh `updated_at`. An empty patch is a read.
    async fn update(
        &self,
        owner_id: &str,
        id: &str,
        input: UpdatePageInput,
    ) -> Result<Page, StoreError>;

    async fn delete(&self, owner_id: &str, id: &str) -> Result<(), StoreError>;
}

/// Attaches the current identity to every store call and validates input
/// before anything goes on the wire.
#[derive(Clone)]
pub struct PageGateway {
    identity: Arc<dyn IdentityProvider>,
    backend: Arc<dyn PageBackend>,
}

impl PageGateway {
    pub fn new(identity: Arc<dyn IdentityProvider>, backend: Arc<dyn PageBackend>) -> Self {
        PageGateway { identity, backend }
    }

    /// Owner id for the current session, or `Unauthenticated`
    pub fn owner(&self) -> Result<String, StoreError> {
        self.identity
            .current_user()
            .ok_or(StoreError::Unauthenticated)
    }

    pub async fn list(&self, title_filter: Option<&str>) -> Result<Vec<PageSummary>, StoreError> {
        let owner = self.owner()?;
        self.backend.list(&owner, title_filter).await
    }

    pub async fn get(&self, id: &str) -> Result<Page, StoreError> {
        let owner = self.owner()?;
        self.backend.get(&owner, id).await
    }

    pub async fn create(&self, input: CreatePageInput) -> Result<Page, StoreError> {
        let owner = self.owner()?;
        validate_title(&input.title)?;
        debug!(owner = %owner, title = %input.title, "creating page");
        self.backend.create(&owner, input).await
    }

    pub async fn update(&self, id: &str, input: UpdatePageInput) -> Result<Page, StoreError> {
        let owner = self.owner()?;
        if let Some(title) = &input.title {
            validate_title(title)?;
        }
        self.backend.update(&owner, id, input).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let owner = self.owner()?;
        debug!(owner = %owner, id = %id, "deleting page");
        self.backend.delete(&owner, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionIdentity;
    use crate::content::MAX_TITLE_LEN;
    use crate::pages::InMemoryPageBackend;

    fn gateway(identity: SessionIdentity) -> PageGateway {
        PageGateway::new(Arc::new(identity), Arc::new(InMemoryPageBackend::new()))
    }

    #[tokio::test]
    async fn test_calls_fail_without_identity() {
        let gw = gateway(SessionIdentity::anonymous());

        assert_eq!(gw.list(None).await, Err(StoreError::Unauthenticated));
        assert_eq!(gw.get("some-id").await, Err(StoreError::Unauthenticated));
        assert_eq!(
            gw.delete("some-id").await,
            Err(StoreError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn test_title_validated_before_create() {
        let gw = gateway(SessionIdentity::signed_in("user-1"));

        let input = CreatePageInput {
            title: "x".repeat(MAX_TITLE_LEN + 1),
            content: None,
        };
        let err = gw.create(input).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        // Nothing reached the store
        assert_eq!(gw.list(None).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_title_validated_before_update() {
        let gw = gateway(SessionIdentity::signed_in("user-1"));

        let page = gw.create(CreatePageInput::default()).await.unwrap();
        let patch = UpdatePageInput {
            title: Some("x".repeat(MAX_TITLE_LEN + 1)),
            content: None,
        };
        let err = gw.update(&page.id, patch).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        // The stored title is untouched
        assert_eq!(gw.get(&page.id).await.unwrap().title, "");
    }
}
