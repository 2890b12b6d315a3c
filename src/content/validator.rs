use serde_json::{Map, Value};

use super::types::ContentTree;

/// Longest title the store accepts
pub const MAX_TITLE_LEN: usize = 200;

/// Structural problems in editor output
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("page body must be a JSON object")]
    RootNotObject,
    #[error("node `type` must be a string")]
    TypeTagNotString,
    #[error("node `content` must be an array")]
    ChildrenNotArray,
    #[error("title exceeds {MAX_TITLE_LEN} characters")]
    TitleTooLong,
}

/// Check the shape of a raw editor document and take ownership of it.
///
/// Only structural rules are enforced: the root must be an object, and on
/// every object node a `type` key must hold a string and a `content` key
/// must hold an array. Everything else passes through unmodified;
/// interpreting node types is the editor's job, not ours.
pub fn validate(raw: Value) -> Result<ContentTree, ContentError> {
    let Value::Object(mut fields) = raw else {
        return Err(ContentError::RootNotObject);
    };
    check_node(&fields)?;

    let kind = match fields.remove("type") {
        Some(Value::String(tag)) => Some(tag),
        _ => None,
    };
    let content = match fields.remove("content") {
        Some(Value::Array(children)) => Some(children),
        _ => None,
    };

    Ok(ContentTree {
        kind,
        content,
        extra: fields,
    })
}

fn check_node(node: &Map<String, Value>) -> Result<(), ContentError> {
    if let Some(tag) = node.get("type") {
        if !tag.is_string() {
            return Err(ContentError::TypeTagNotString);
        }
    }

    match node.get("content") {
        None => Ok(()),
        Some(Value::Array(children)) => {
            for child in children {
                // Scalar entries in a content list are opaque editor data
                if let Value::Object(child) = child {
                    check_node(child)?;
                }
            }
            Ok(())
        }
        Some(_) => Err(ContentError::ChildrenNotArray),
    }
}

/// Enforce the store's title length bound before anything goes on the wire
pub fn validate_title(title: &str) -> Result<(), ContentError> {
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ContentError::TitleTooLong);
    }
    Ok(())
}
