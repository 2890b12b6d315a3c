mod types;
mod validator;

pub use types::ContentTree;
pub use validator::{validate, validate_title, ContentError, MAX_TITLE_LEN};
