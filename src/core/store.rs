//! Purpose: Define the backend-agnostic store interface over the node tree.
//! Exports: `NodeStore`, `StoreResult`.
//! Role: The only surface application code programs against; backends are
//! selected at construction time (`MemoryStore` or `RemoteStore`).
//! Invariants: Every operation fully applies or fully fails with a
//! distinguishable `ErrorKind`; no partial mutations are observable.

use crate::core::error::Error;
use crate::core::node::{Attrs, Node, NodeId, TitleMatch};

pub type StoreResult<T> = Result<T, Error>;

pub trait NodeStore {
    /// Id of the notebook root. Fails with `NotConnected` on a client
    /// that has no recorded endpoint yet.
    fn root_id(&self) -> StoreResult<NodeId>;

    /// Full snapshot of one node: attrs, parent, and ordered children.
    fn node(&self, id: &NodeId) -> StoreResult<Node>;

    /// Create a node under `parent`. When `id` is `None` the store assigns
    /// one; an explicit id that already exists fails with `DuplicateId`.
    fn create_node(&self, parent: &NodeId, attrs: Attrs, id: Option<NodeId>)
    -> StoreResult<NodeId>;

    /// Shallow-merge `partial` into the node's attrs; each key is replaced
    /// wholesale.
    fn set_attrs(&self, id: &NodeId, partial: Attrs) -> StoreResult<()>;

    /// Delete the node and its entire subtree. The root cannot be deleted.
    fn delete_node(&self, id: &NodeId) -> StoreResult<()>;

    /// Re-parent the node, appending it to the end of the new parent's
    /// child list. Moving a node under itself or a descendant fails with
    /// `CycleDetected`.
    fn move_node(&self, id: &NodeId, new_parent: &NodeId) -> StoreResult<()>;

    /// Case-insensitive substring search over the string `"title"` attr,
    /// ordered by (title, id).
    fn search_title(&self, query: &str) -> StoreResult<Vec<TitleMatch>>;

    fn attrs(&self, id: &NodeId) -> StoreResult<Attrs> {
        Ok(self.node(id)?.attrs)
    }

    fn children(&self, id: &NodeId) -> StoreResult<Vec<NodeId>> {
        Ok(self.node(id)?.children)
    }
}
