mod gateway;
mod http;
mod memory;
mod types;

pub use gateway::{PageBackend, PageGateway};
pub use http::HttpPageBackend;
pub use memory::InMemoryPageBackend;
pub use types::{CreatePageInput, Page, PageSummary, StoreError, UpdatePageInput};
