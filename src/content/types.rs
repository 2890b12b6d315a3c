use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The structured body of a page, as produced by the block editor.
///
/// The schema is deliberately open: only the root `type` tag and the ordered
/// `content` children are known to this client. Every other field the editor
/// attaches, at any depth, is carried through untouched so a page written by
/// a newer editor build survives a round trip through an older client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTree {
    /// Root node tag, conventionally "doc"
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Ordered child nodes; each child keeps whatever shape the editor gave it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<Value>>,
    /// Fields this client does not recognize, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentTree {
    /// The body of a freshly created page
    pub fn empty() -> Self {
        ContentTree {
            kind: Some("doc".to_string()),
            content: Some(Vec::new()),
            extra: Map::new(),
        }
    }

    /// True when the tree holds no child nodes
    pub fn is_empty(&self) -> bool {
        self.content.as_ref().map(|c| c.is_empty()).unwrap_or(true)
    }
}

impl Default for ContentTree {
    fn default() -> Self {
        ContentTree::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_tree_shape() {
        let tree = ContentTree::empty();
        assert_eq!(tree.kind.as_deref(), Some("doc"));
        assert_eq!(tree.content, Some(vec![]));
        assert!(tree.is_empty());

        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value, json!({ "type": "doc", "content": [] }));
    }

    #[test]
    fn test_round_trip_preserves_unknown_fields() {
        let raw = json!({
            "type": "doc",
            "attrs": { "textAlign": "left" },
            "content": [
                { "type": "paragraph", "content": [{ "type": "text", "text": "hi", "marks": [{ "type": "bold" }] }] }
            ],
            "version": 7
        });

        let tree: ContentTree = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(tree.extra.get("version"), Some(&json!(7)));

        let back = serde_json::to_value(&tree).unwrap();
        assert_eq!(back, raw);
    }
}
