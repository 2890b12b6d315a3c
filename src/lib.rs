//! Client-side sync core for a block-based note-taking app: an open-schema
//! content model, a pluggable document store gateway, a request-deduplicating
//! cache and a debounced per-page sync engine, composed by [`PageClient`].

mod auth;
mod cache;
mod client;
mod content;
mod pages;
mod sync;

pub use auth::{IdentityProvider, SessionIdentity};
pub use cache::{CacheEvent, CacheKey, PageCache};
pub use client::PageClient;
pub use content::{validate, validate_title, ContentError, ContentTree, MAX_TITLE_LEN};
pub use pages::{
    CreatePageInput, HttpPageBackend, InMemoryPageBackend, Page, PageBackend, PageGateway,
    PageSummary, StoreError, UpdatePageInput,
};
pub use sync::{SaveState, SyncEngine, SyncHandle, DEFAULT_QUIET_PERIOD};
