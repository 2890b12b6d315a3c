mod store;

pub use store::{CacheEvent, CacheKey, PageCache};
