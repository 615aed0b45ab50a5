use serde_json::Value;
use std::sync::Arc;

use super::VisibilityOracle;
use crate::dispatcher::RawDocumentStore;

/// The ActivityStreams public collection.
pub const PUBLIC_COLLECTION: &str = "https://www.w3.org/ns/activitystreams#Public";

fn is_public_address(v: &Value) -> bool {
    match v {
        Value::String(s) => matches!(s.as_str(), PUBLIC_COLLECTION | "as:Public" | "Public"),
        Value::Array(items) => items.iter().any(is_public_address),
        _ => false,
    }
}

fn addressed_to_public(doc: &Value) -> bool {
    ["to", "cc"]
        .iter()
        .filter_map(|field| doc.get(field))
        .any(is_public_address)
        || doc.get("object").is_some_and(|o| o.is_object() && addressed_to_public(o))
}

/// Reads the stored object and checks its addressing.
///
/// A missing or unparsable document is treated as not public.
pub struct DocumentVisibility {
    store: Arc<dyn RawDocumentStore>,
}

impl DocumentVisibility {
    pub fn new(store: Arc<dyn RawDocumentStore>) -> Self {
        Self { store }
    }
}

impl VisibilityOracle for DocumentVisibility {
    fn is_public(&self, nickname: &str, object_id: &str) -> bool {
        let path = format!("/users/{nickname}/statuses/{object_id}");
        self.store
            .load(&path)
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
            .is_some_and(|doc| addressed_to_public(&doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_addressing() {
        assert!(addressed_to_public(&json!({"to": [PUBLIC_COLLECTION]})));
        assert!(addressed_to_public(&json!({"cc": "as:Public"})));
        assert!(addressed_to_public(&json!({
            "type": "Create",
            "object": {"to": ["https://social.example/users/alice/followers"], "cc": [PUBLIC_COLLECTION]}
        })));
        assert!(!addressed_to_public(&json!({"to": ["https://social.example/users/alice/followers"]})));
        assert!(!addressed_to_public(&json!({})));
    }
}
