//! Purpose: Define the node model shared by every store backend.
//! Exports: `NodeId`, `Attrs`, `Node`, `TitleMatch`.
//! Role: Plain data types; tree semantics live in the store implementations.
//! Invariants: Ids are opaque strings, stable for a node's lifetime.
//! Invariants: Attrs hold only JSON-representable values; tree linkage is never stored in attrs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Attribute mapping carried by every node. Values keep their JSON kind
/// across the wire: integers stay integers, floats stay floats.
pub type Attrs = serde_json::Map<String, Value>;

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Point-in-time snapshot of one node. `parent` is `None` only for the root.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub attrs: Attrs,
    pub children: Vec<NodeId>,
}

/// One row of a title search result.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TitleMatch {
    pub nodeid: NodeId,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::NodeId;

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(NodeId::generate(), NodeId::generate());
    }

    #[test]
    fn id_round_trips_through_serde_as_bare_string() {
        let id = NodeId::new("n1");
        let json = serde_json::to_string(&id).expect("encode");
        assert_eq!(json, "\"n1\"");
        let back: NodeId = serde_json::from_str(&json).expect("decode");
        assert_eq!(back, id);
    }
}
