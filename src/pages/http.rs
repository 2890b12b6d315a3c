use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

use super::gateway::PageBackend;
use super::types::{CreatePageInput, Page, PageSummary, StoreError, UpdatePageInput};

/// HTTP access to the hosted document store.
///
/// The store speaks plain JSON over five routes: `GET /pages`,
/// `GET /pages/{id}`, `POST /pages`, `PATCH /pages/{id}` and
/// `DELETE /pages/{id}`. Row-level scoping is enforced server-side from the
/// `X-Owner-Id` header, so a foreign id comes back as 404, never 403.
#[derive(Debug, Clone)]
pub struct HttpPageBackend {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpPageBackend {
    pub fn new(base_url: String, bearer_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        HttpPageBackend {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        }
    }

    fn pages_url(&self) -> String {
        format!("{}/pages", self.base_url)
    }

    fn page_url(&self, id: &str) -> String {
        format!("{}/pages/{}", self.base_url, id)
    }

    fn attach_headers(&self, request: RequestBuilder, owner_id: &str) -> RequestBuilder {
        let mut request = request
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("X-Owner-Id", owner_id);

        if let Some(ref token) = self.bearer_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        request
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, StoreError> {
        check_status(response.status())?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Transport(format!("malformed store response: {}", e)))
    }
}

/// Map a store status code onto the caller-facing error surface
fn check_status(status: StatusCode) -> Result<(), StoreError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(StoreError::NotFound),
        StatusCode::UNAUTHORIZED => Err(StoreError::Unauthenticated),
        s => Err(StoreError::Transport(format!("store returned {}", s))),
    }
}

fn send_error(e: reqwest::Error) -> StoreError {
    warn!("document store request failed: {}", e);
    StoreError::Transport(e.to_string())
}

#[async_trait]
impl PageBackend for HttpPageBackend {
    async fn list(
        &self,
        owner_id: &str,
        title_filter: Option<&str>,
    ) -> Result<Vec<PageSummary>, StoreError> {
        let mut request = self.client.get(self.pages_url());
        if let Some(filter) = title_filter {
            request = request.query(&[("title_like", filter)]);
        }

        let response = self
            .attach_headers(request, owner_id)
            .send()
            .await
            .map_err(send_error)?;

        self.read_json(response).await
    }

    async fn get(&self, owner_id: &str, id: &str) -> Result<Page, StoreError> {
        let response = self
            .attach_headers(self.client.get(self.page_url(id)), owner_id)
            .send()
            .await
            .map_err(send_error)?;

        self.read_json(response).await
    }

    async fn create(&self, owner_id: &str, input: CreatePageInput) -> Result<Page, StoreError> {
        let response = self
            .attach_headers(self.client.post(self.pages_url()), owner_id)
            .json(&input)
            .send()
            .await
            .map_err(send_error)?;

        self.read_json(response).await
    }

    async fn update(
        &self,
        owner_id: &str,
        id: &str,
        input: UpdatePageInput,
    ) -> Result<Page, StoreError> {
        let response = self
            .attach_headers(self.client.patch(self.page_url(id)), owner_id)
            .json(&input)
            .send()
            .await
            .map_err(send_error)?;

        self.read_json(response).await
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<(), StoreError> {
        let response = self
            .attach_headers(self.client.delete(self.page_url(id)), owner_id)
            .send()
            .await
            .map_err(send_error)?;

        check_status(response.status())
    }
}
