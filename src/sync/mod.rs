mod engine;
mod types;

pub use engine::{SyncEngine, SyncHandle, DEFAULT_QUIET_PERIOD};
pub use types::SaveState;
